//! Canonical string forms for cell values.
//!
//! Snapshot determinism lives or dies here: semantically identical content
//! must always serialize to the same bytes, because file hashes are the
//! sole basis for change detection downstream. All functions are pure and
//! total; values that cannot be interpreted degrade to a best-effort string
//! instead of failing the extraction.

use chrono::NaiveDateTime;

/// A typed raw cell value, decided once at the extraction boundary.
///
/// Canonicalization is a match over this closed set; the crate never
/// inspects "whatever came out of a cell" at runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Number(f64),
    Bool(bool),
    /// Timezone-naive timestamp as stored by the workbook. Rendered as
    /// ISO-8601 with a `Z` suffix (UTC is assumed, never local time).
    Date(NaiveDateTime),
    Text(String),
}

impl RawValue {
    /// The canonical string form of this value.
    pub fn canonical(&self) -> String {
        canonicalize_value(self)
    }

    /// True when the canonical form would be the empty string.
    pub fn is_empty(&self) -> bool {
        matches!(self, RawValue::Text(s) if s.is_empty())
    }
}

/// Canonicalize a typed value.
pub fn canonicalize_value(value: &RawValue) -> String {
    match value {
        RawValue::Number(n) => canonicalize_number(*n),
        RawValue::Bool(b) => canonicalize_boolean(*b).to_string(),
        RawValue::Date(d) => canonicalize_date(d),
        RawValue::Text(s) => canonicalize_string(s),
    }
}

/// Canonicalize a number.
///
/// Integral values print as bare integers (`10.0` → `"10"`); everything
/// else is bounded to 15 significant digits (the precision workbook
/// engines actually keep) in plain decimal notation. Non-finite values
/// degrade to their display form.
pub fn canonicalize_number(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    // 2^53: beyond this an f64 no longer holds exact integers.
    const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

    if value == value.trunc() && value.abs() <= MAX_EXACT_INT {
        return format!("{}", value as i64);
    }

    let rounded = round_significant(value, 15);
    if rounded == rounded.trunc() && rounded.abs() <= MAX_EXACT_INT {
        return format!("{}", rounded as i64);
    }
    // f64 Display never emits scientific notation, so magnitudes in
    // [1e-6, 1e15] stay in plain decimal form.
    format!("{rounded}")
}

fn round_significant(value: f64, digits: i32) -> f64 {
    if value == 0.0 {
        return 0.0;
    }
    let magnitude = value.abs().log10().floor() as i32;
    let factor = 10f64.powi(digits - 1 - magnitude);
    if !factor.is_finite() || factor == 0.0 {
        return value;
    }
    (value * factor).round() / factor
}

/// Canonical boolean token.
pub fn canonicalize_boolean(value: bool) -> &'static str {
    if value { "TRUE" } else { "FALSE" }
}

/// Coerce a boolean-like string (`TRUE`/`1`/`YES`, `FALSE`/`0`/`NO`,
/// case/whitespace-insensitive) to the canonical token.
pub fn coerce_boolean(value: &str) -> Option<&'static str> {
    match value.trim().to_ascii_uppercase().as_str() {
        "TRUE" | "1" | "YES" => Some("TRUE"),
        "FALSE" | "0" | "NO" => Some("FALSE"),
        _ => None,
    }
}

/// Canonicalize a timezone-naive date/time: ISO-8601 with `Z` appended.
///
/// Sub-second precision is emitted only when present, so the common
/// whole-second case stays compact and stable.
pub fn canonicalize_date(value: &NaiveDateTime) -> String {
    format!("{}Z", value.format("%Y-%m-%dT%H:%M:%S%.f"))
}

/// Canonicalize a string: CRLF/CR become LF, nothing else changes.
///
/// No trimming and no case folding; diff fidelity requires the content to
/// survive byte-for-byte apart from line endings.
pub fn canonicalize_string(value: &str) -> String {
    if !value.contains('\r') {
        return value.to_string();
    }
    value.replace("\r\n", "\n").replace('\r', "\n")
}

/// Canonicalize a formula string.
///
/// Trims surrounding whitespace, guarantees a leading `=`, and uppercases
/// identifiers in function-call position (`sum(` → `SUM(`). Cell
/// references, argument separators, and string literals are untouched;
/// the formula's semantics are never altered.
pub fn canonicalize_formula(formula: &str) -> String {
    let trimmed = formula.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let body = trimmed.strip_prefix('=').map(str::trim).unwrap_or(trimmed);

    let chars: Vec<char> = body.chars().collect();
    let mut out = String::with_capacity(body.len() + 1);
    out.push('=');

    let mut i = 0;
    let mut in_string = false;
    while i < chars.len() {
        let ch = chars[i];

        if in_string {
            out.push(ch);
            if ch == '"' {
                // A doubled quote is an escaped quote inside the literal.
                if chars.get(i + 1) == Some(&'"') {
                    out.push('"');
                    i += 2;
                    continue;
                }
                in_string = false;
            }
            i += 1;
            continue;
        }

        if ch == '"' {
            in_string = true;
            out.push(ch);
            i += 1;
            continue;
        }

        if ch.is_ascii_alphabetic() || ch == '_' {
            let start = i;
            while i < chars.len()
                && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '.')
            {
                i += 1;
            }
            let mut j = i;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            let call_position = chars.get(j) == Some(&'(');
            for c in &chars[start..i] {
                if call_position {
                    out.push(c.to_ascii_uppercase());
                } else {
                    out.push(*c);
                }
            }
            continue;
        }

        out.push(ch);
        i += 1;
    }

    out
}

/// Canonicalize a color reference.
///
/// RGB forms normalize to `#RRGGBB` uppercase; an 8-hex-digit ARGB form
/// loses its leading alpha byte. `theme:<n>` / `indexed:<n>` references
/// pass through with whitespace stripped. Anything else degrades to the
/// input string.
pub fn canonicalize_color(color: &str) -> String {
    let c = color.trim();
    if c.is_empty() {
        return String::new();
    }
    if let Some(n) = c.strip_prefix("theme:") {
        return format!("theme:{}", n.trim());
    }
    if let Some(n) = c.strip_prefix("indexed:") {
        return format!("indexed:{}", n.trim());
    }

    let hex_part = c.strip_prefix('#').unwrap_or(c);
    if hex_part.chars().all(|ch| ch.is_ascii_hexdigit()) {
        match hex_part.len() {
            6 => return format!("#{}", hex_part.to_ascii_uppercase()),
            8 => return format!("#{}", hex_part[2..].to_ascii_uppercase()),
            _ => {}
        }
    }

    c.to_string()
}

/// Format RGB components as a canonical `#RRGGBB` string.
pub fn rgb_hex(r: u8, g: u8, b: u8) -> String {
    format!("#{r:02X}{g:02X}{b:02X}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn numbers_integral_values_print_bare() {
        assert_eq!(canonicalize_number(10.0), "10");
        assert_eq!(canonicalize_number(-3.0), "-3");
        assert_eq!(canonicalize_number(0.0), "0");
        assert_eq!(canonicalize_number(1e6), "1000000");
    }

    #[test]
    fn numbers_fractional_values_keep_decimal_form() {
        assert_eq!(canonicalize_number(10.5), "10.5");
        assert_eq!(canonicalize_number(-0.25), "-0.25");
        assert_eq!(canonicalize_number(0.0000015), "0.0000015");
    }

    #[test]
    fn numbers_bounded_to_fifteen_significant_digits() {
        let third = 1.0 / 3.0;
        assert_eq!(canonicalize_number(third), "0.333333333333333");
        // Rounding at the 15th digit can collapse back to an integer.
        assert_eq!(canonicalize_number(2.999_999_999_999_999_6), "3");
    }

    #[test]
    fn numbers_called_twice_agree() {
        for v in [10.0, 10.5, 1.0 / 3.0, -1e-6, 123456.789] {
            assert_eq!(canonicalize_number(v), canonicalize_number(v));
        }
    }

    #[test]
    fn numbers_non_finite_degrade() {
        assert_eq!(canonicalize_number(f64::NAN), "NaN");
        assert_eq!(canonicalize_number(f64::INFINITY), "inf");
    }

    #[test]
    fn booleans_uppercase_tokens() {
        assert_eq!(canonicalize_boolean(true), "TRUE");
        assert_eq!(canonicalize_boolean(false), "FALSE");
    }

    #[test]
    fn boolean_strings_coerce() {
        assert_eq!(coerce_boolean("true"), Some("TRUE"));
        assert_eq!(coerce_boolean(" YES "), Some("TRUE"));
        assert_eq!(coerce_boolean("1"), Some("TRUE"));
        assert_eq!(coerce_boolean("No"), Some("FALSE"));
        assert_eq!(coerce_boolean("0"), Some("FALSE"));
        assert_eq!(coerce_boolean("maybe"), None);
    }

    #[test]
    fn naive_dates_get_utc_marker() {
        let d = NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(canonicalize_date(&d), "2025-01-01T00:00:00Z");
    }

    #[test]
    fn dates_keep_subseconds_only_when_present() {
        let d = NaiveDate::from_ymd_opt(2025, 10, 27)
            .unwrap()
            .and_hms_milli_opt(13, 45, 30, 250)
            .unwrap();
        assert_eq!(canonicalize_date(&d), "2025-10-27T13:45:30.250Z");
    }

    #[test]
    fn strings_normalize_line_endings_only() {
        assert_eq!(canonicalize_string("a\r\nb\rc\nd"), "a\nb\nc\nd");
        assert_eq!(canonicalize_string("  padded  "), "  padded  ");
        assert_eq!(canonicalize_string("MiXeD Case"), "MiXeD Case");
    }

    #[test]
    fn formulas_get_leading_equals_and_upper_functions() {
        assert_eq!(canonicalize_formula("sum(A1:A3)"), "=SUM(A1:A3)");
        assert_eq!(canonicalize_formula("  =sum(A1:A3)  "), "=SUM(A1:A3)");
        assert_eq!(
            canonicalize_formula("=if(a1>0, sum(B:B), average(C1:C9))"),
            "=IF(a1>0, SUM(B:B), AVERAGE(C1:C9))"
        );
    }

    #[test]
    fn formulas_leave_references_and_literals_alone() {
        // Named range not in call position stays as written.
        assert_eq!(canonicalize_formula("=my_range+1"), "=my_range+1");
        // String literals are never case-folded, even when they look like calls.
        assert_eq!(
            canonicalize_formula("=concat(\"sum(\", lower(A1))"),
            "=CONCAT(\"sum(\", LOWER(A1))"
        );
        // Escaped quotes keep the scanner inside the literal.
        assert_eq!(
            canonicalize_formula("=len(\"he said \"\"sum(\"\" twice\")"),
            "=LEN(\"he said \"\"sum(\"\" twice\")"
        );
    }

    #[test]
    fn formulas_empty_input_stays_empty() {
        assert_eq!(canonicalize_formula(""), "");
        assert_eq!(canonicalize_formula("   "), "");
    }

    #[test]
    fn colors_normalize_to_rgb_hex() {
        assert_eq!(canonicalize_color("ff8800"), "#FF8800");
        assert_eq!(canonicalize_color("#ff8800"), "#FF8800");
        // ARGB drops the alpha byte.
        assert_eq!(canonicalize_color("FFFF8800"), "#FF8800");
        assert_eq!(canonicalize_color("theme: 4"), "theme:4");
        assert_eq!(canonicalize_color("indexed:64"), "indexed:64");
        assert_eq!(canonicalize_color("not-a-color"), "not-a-color");
        assert_eq!(rgb_hex(255, 136, 0), "#FF8800");
    }

    #[test]
    fn tagged_values_dispatch() {
        assert_eq!(RawValue::Number(10.0).canonical(), "10");
        assert_eq!(RawValue::Bool(true).canonical(), "TRUE");
        assert_eq!(RawValue::Text("x\r\ny".into()).canonical(), "x\ny");
        assert!(RawValue::Text(String::new()).is_empty());
        assert!(!RawValue::Number(0.0).is_empty());
    }
}
