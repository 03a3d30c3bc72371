//! Line-based unified diff for non-tabular snapshot files.
//!
//! Tabular category files get key-level comparison in `compare`; everything
//! else (VBA module code, free-form text) falls back to this. The LCS is a
//! plain dynamic program with a work limit: oversized inputs degrade to a
//! single whole-file replacement hunk instead of burning quadratic time.

/// Cap on `len(a) * len(b)` for the LCS dynamic program.
const LCS_WORK_LIMIT: usize = 4_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Equal,
    Delete,
    Insert,
    Replace,
}

#[derive(Debug, Clone, Copy)]
struct OpCode {
    tag: Tag,
    a1: usize,
    a2: usize,
    b1: usize,
    b2: usize,
}

/// Produce a unified diff between two texts.
///
/// Returns an empty string when the inputs are line-identical. `context`
/// is the number of unchanged lines shown around each hunk.
pub fn unified_diff(
    a: &str,
    b: &str,
    from_label: &str,
    to_label: &str,
    context: usize,
) -> String {
    let a_lines: Vec<&str> = split_lines(a);
    let b_lines: Vec<&str> = split_lines(b);

    if a_lines == b_lines {
        return String::new();
    }

    let ops = opcodes(&a_lines, &b_lines);
    let groups = group_opcodes(&ops, context);
    if groups.is_empty() {
        return String::new();
    }

    let mut out = String::new();
    out.push_str(&format!("--- {from_label}\n"));
    out.push_str(&format!("+++ {to_label}\n"));

    for group in groups {
        let first = group[0];
        let last = group[group.len() - 1];
        out.push_str(&format!(
            "@@ -{} +{} @@\n",
            format_range(first.a1, last.a2),
            format_range(first.b1, last.b2)
        ));
        for op in group {
            match op.tag {
                Tag::Equal => {
                    for line in &a_lines[op.a1..op.a2] {
                        out.push(' ');
                        out.push_str(line);
                        out.push('\n');
                    }
                }
                Tag::Delete | Tag::Replace => {
                    for line in &a_lines[op.a1..op.a2] {
                        out.push('-');
                        out.push_str(line);
                        out.push('\n');
                    }
                    if op.tag == Tag::Replace {
                        for line in &b_lines[op.b1..op.b2] {
                            out.push('+');
                            out.push_str(line);
                            out.push('\n');
                        }
                    }
                }
                Tag::Insert => {
                    for line in &b_lines[op.b1..op.b2] {
                        out.push('+');
                        out.push_str(line);
                        out.push('\n');
                    }
                }
            }
        }
    }

    out
}

fn split_lines(text: &str) -> Vec<&str> {
    if text.is_empty() {
        Vec::new()
    } else {
        text.lines().collect()
    }
}

/// Unified hunk range: `start,len`, with `len` omitted when it is 1 and
/// the start shifted back when the range is empty.
fn format_range(lo: usize, hi: usize) -> String {
    let len = hi - lo;
    if len == 1 {
        format!("{}", lo + 1)
    } else if len == 0 {
        format!("{lo},0")
    } else {
        format!("{},{len}", lo + 1)
    }
}

fn opcodes(a: &[&str], b: &[&str]) -> Vec<OpCode> {
    let blocks = matching_blocks(a, b);

    let mut ops = Vec::new();
    let (mut ai, mut bi) = (0usize, 0usize);
    for (i, j, size) in blocks {
        let tag = match (ai < i, bi < j) {
            (true, true) => Some(Tag::Replace),
            (true, false) => Some(Tag::Delete),
            (false, true) => Some(Tag::Insert),
            (false, false) => None,
        };
        if let Some(tag) = tag {
            ops.push(OpCode {
                tag,
                a1: ai,
                a2: i,
                b1: bi,
                b2: j,
            });
        }
        if size > 0 {
            ops.push(OpCode {
                tag: Tag::Equal,
                a1: i,
                a2: i + size,
                b1: j,
                b2: j + size,
            });
        }
        ai = i + size;
        bi = j + size;
    }
    ops
}

/// Matched (a_start, b_start, len) runs in ascending order, ending with a
/// zero-length sentinel at (len(a), len(b)).
fn matching_blocks(a: &[&str], b: &[&str]) -> Vec<(usize, usize, usize)> {
    let n = a.len();
    let m = b.len();

    // Work limit exceeded: no matches, so the whole file becomes one
    // replacement hunk. Correct, just coarse.
    if n.saturating_mul(m) > LCS_WORK_LIMIT {
        return vec![(n, m, 0)];
    }

    // Standard LCS table; dp[i][j] = LCS length of a[i..] / b[j..].
    let mut dp = vec![0u32; (n + 1) * (m + 1)];
    let idx = |i: usize, j: usize| i * (m + 1) + j;
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            dp[idx(i, j)] = if a[i] == b[j] {
                dp[idx(i + 1, j + 1)] + 1
            } else {
                dp[idx(i + 1, j)].max(dp[idx(i, j + 1)])
            };
        }
    }

    let mut blocks = Vec::new();
    let (mut i, mut j) = (0usize, 0usize);
    while i < n && j < m {
        if a[i] == b[j] {
            let (start_a, start_b) = (i, j);
            while i < n && j < m && a[i] == b[j] {
                i += 1;
                j += 1;
            }
            blocks.push((start_a, start_b, i - start_a));
        } else if dp[idx(i + 1, j)] >= dp[idx(i, j + 1)] {
            i += 1;
        } else {
            j += 1;
        }
    }
    blocks.push((n, m, 0));
    blocks
}

/// Group opcodes into hunks, trimming equal runs to `context` lines and
/// splitting where the gap between changes exceeds `2 * context`.
fn group_opcodes(ops: &[OpCode], context: usize) -> Vec<Vec<OpCode>> {
    let mut codes: Vec<OpCode> = ops.to_vec();
    if codes.is_empty() {
        return Vec::new();
    }

    if let Some(first) = codes.first_mut() {
        if first.tag == Tag::Equal {
            first.a1 = first.a1.max(first.a2.saturating_sub(context));
            first.b1 = first.b1.max(first.b2.saturating_sub(context));
        }
    }
    if let Some(last) = codes.last_mut() {
        if last.tag == Tag::Equal {
            last.a2 = last.a2.min(last.a1 + context);
            last.b2 = last.b2.min(last.b1 + context);
        }
    }

    let gap = context * 2;
    let mut groups: Vec<Vec<OpCode>> = Vec::new();
    let mut group: Vec<OpCode> = Vec::new();

    for op in codes {
        let mut op = op;
        if op.tag == Tag::Equal && op.a2 - op.a1 > gap {
            group.push(OpCode {
                tag: Tag::Equal,
                a1: op.a1,
                a2: (op.a1 + context).min(op.a2),
                b1: op.b1,
                b2: (op.b1 + context).min(op.b2),
            });
            groups.push(std::mem::take(&mut group));
            op.a1 = op.a1.max(op.a2.saturating_sub(context));
            op.b1 = op.b1.max(op.b2.saturating_sub(context));
        }
        group.push(op);
    }

    if !group.is_empty() && !(group.len() == 1 && group[0].tag == Tag::Equal) {
        groups.push(group);
    }
    groups
}
