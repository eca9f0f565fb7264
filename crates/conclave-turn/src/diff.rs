//! Unified diff generation (§4.7.3): `diff(old, new, path, k)` renders the
//! standard `--- `/`+++ `/`@@` hunk format with `k` lines of context.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditOp {
    Equal,
    Delete,
    Insert,
}

/// Line-level edit script via a classic LCS table. Quadratic in line count,
/// which is fine for the file sizes this tool operates on.
fn edit_script<'a>(old: &'a [&'a str], new: &'a [&'a str]) -> Vec<(EditOp, &'a str)> {
    let (n, m) = (old.len(), new.len());
    let mut lcs = vec![vec![0u32; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if old[i] == new[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut ops = Vec::with_capacity(n + m);
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if old[i] == new[j] {
            ops.push((EditOp::Equal, old[i]));
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            ops.push((EditOp::Delete, old[i]));
            i += 1;
        } else {
            ops.push((EditOp::Insert, new[j]));
            j += 1;
        }
    }
    while i < n {
        ops.push((EditOp::Delete, old[i]));
        i += 1;
    }
    while j < m {
        ops.push((EditOp::Insert, new[j]));
        j += 1;
    }
    ops
}

struct Hunk {
    old_start: usize,
    old_count: usize,
    new_start: usize,
    new_count: usize,
    lines: Vec<(EditOp, String)>,
}

/// Render a unified diff between `old` and `new`, both labeled `path`, with
/// `k` lines of context around each change. Returns an empty string when the
/// inputs are identical.
pub fn diff(old: &str, new: &str, path: &str, k: usize) -> String {
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();
    let ops = edit_script(&old_lines, &new_lines);

    if ops.iter().all(|(op, _)| *op == EditOp::Equal) {
        return String::new();
    }

    // Track positions as we walk the script, then group changed regions
    // (plus k lines of surrounding context) into hunks, merging hunks whose
    // context windows overlap.
    let mut regions: Vec<(usize, usize)> = Vec::new(); // change index ranges into `ops`
    let mut i = 0;
    while i < ops.len() {
        if ops[i].0 != EditOp::Equal {
            let start = i;
            while i < ops.len() && ops[i].0 != EditOp::Equal {
                i += 1;
            }
            regions.push((start, i));
        } else {
            i += 1;
        }
    }

    let mut hunks: Vec<(usize, usize)> = Vec::new(); // [lo, hi) into ops, including context
    for (start, end) in regions {
        let lo = start.saturating_sub(k);
        let hi = (end + k).min(ops.len());
        match hunks.last_mut() {
            Some((_, prev_hi)) if lo <= *prev_hi => {
                *prev_hi = hi;
            }
            _ => hunks.push((lo, hi)),
        }
    }

    let mut old_pos = 0usize;
    let mut new_pos = 0usize;
    let mut op_idx = 0usize;
    let mut rendered = Vec::new();

    for (lo, hi) in hunks {
        // Advance counters through any equal ops preceding this hunk.
        while op_idx < lo {
            match ops[op_idx].0 {
                EditOp::Equal => {
                    old_pos += 1;
                    new_pos += 1;
                }
                EditOp::Delete => old_pos += 1,
                EditOp::Insert => new_pos += 1,
            }
            op_idx += 1;
        }

        let old_start = old_pos;
        let new_start = new_pos;
        let mut old_count = 0;
        let mut new_count = 0;
        let mut lines = Vec::new();
        for &(op, text) in &ops[lo..hi] {
            match op {
                EditOp::Equal => {
                    old_count += 1;
                    new_count += 1;
                }
                EditOp::Delete => old_count += 1,
                EditOp::Insert => new_count += 1,
            }
            lines.push((op, text.to_string()));
        }
        for &(op, _) in &ops[lo..hi] {
            match op {
                EditOp::Equal => {
                    old_pos += 1;
                    new_pos += 1;
                }
                EditOp::Delete => old_pos += 1,
                EditOp::Insert => new_pos += 1,
            }
        }
        op_idx = hi;

        rendered.push(Hunk {
            old_start: if old_count == 0 { old_start } else { old_start + 1 },
            old_count,
            new_start: if new_count == 0 { new_start } else { new_start + 1 },
            new_count,
            lines,
        });
    }

    let mut out = format!("--- a/{path}\n+++ b/{path}\n");
    for hunk in rendered {
        out.push_str(&format!(
            "@@ -{},{} +{},{} @@\n",
            hunk.old_start, hunk.old_count, hunk.new_start, hunk.new_count
        ));
        for (op, text) in hunk.lines {
            let marker = match op {
                EditOp::Equal => ' ',
                EditOp::Delete => '-',
                EditOp::Insert => '+',
            };
            out.push(marker);
            out.push_str(&text);
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_inputs_produce_no_diff() {
        assert_eq!(diff("a\nb\nc", "a\nb\nc", "f.txt", 3), "");
    }

    #[test]
    fn single_line_change_produces_one_hunk() {
        let out = diff("a\nb\nc", "a\nX\nc", "f.txt", 1);
        assert!(out.starts_with("--- a/f.txt\n+++ b/f.txt\n"));
        assert!(out.contains("@@ -1,3 +1,3 @@"));
        assert!(out.contains("-b"));
        assert!(out.contains("+X"));
        assert!(out.contains(" a"));
        assert!(out.contains(" c"));
    }

    #[test]
    fn empty_old_file_produces_zero_old_count_header() {
        let out = diff("", "line1\nline2\n", "empty.txt", 3);
        let mut lines = out.lines();
        assert_eq!(lines.next(), Some("--- a/empty.txt"));
        assert_eq!(lines.next(), Some("+++ b/empty.txt"));
        assert_eq!(lines.next(), Some("@@ -0,0 +1,2 @@"));
    }

    #[test]
    fn distant_changes_produce_separate_hunks() {
        let old = "1\n2\n3\n4\n5\n6\n7\n8\n9\n10";
        let new = "X\n2\n3\n4\n5\n6\n7\n8\n9\nY";
        let out = diff(old, new, "f.txt", 1);
        assert_eq!(out.matches("@@").count(), 4);
    }

    #[test]
    fn pure_insertion_has_zero_old_count() {
        let out = diff("a\nb", "a\nX\nb", "f.txt", 1);
        assert!(out.contains("+X"));
    }
}
