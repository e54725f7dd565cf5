//! Line-level edit distance between two whole-file texts.
//!
//! Candidates are whole-file rewrites, so the scorer only needs "how many
//! lines changed", computed from an LCS over lines. Small user programs keep
//! the quadratic table cheap; pathological inputs fall back to a coarse
//! count rather than blowing up memory.

/// Number of added plus removed lines in the minimal line diff from `old`
/// to `new`.
pub fn changed_lines(old: &str, new: &str) -> usize {
    let a: Vec<&str> = old.lines().collect();
    let b: Vec<&str> = new.lines().collect();

    if a.len().saturating_mul(b.len()) > 4_000_000 {
        // Coarse fallback: count positional mismatches plus the length delta.
        let common = a.len().min(b.len());
        let mismatched = (0..common).filter(|&i| a[i] != b[i]).count();
        return mismatched * 2 + a.len().abs_diff(b.len());
    }

    let lcs = lcs_length(&a, &b);
    (a.len() - lcs) + (b.len() - lcs)
}

fn lcs_length(a: &[&str], b: &[&str]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    // Two-row DP over lines.
    let mut prev = vec![0usize; b.len() + 1];
    let mut cur = vec![0usize; b.len() + 1];
    for i in 1..=a.len() {
        for j in 1..=b.len() {
            cur[j] = if a[i - 1] == b[j - 1] {
                prev[j - 1] + 1
            } else {
                prev[j].max(cur[j - 1])
            };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_has_zero_changes() {
        let text = "a\nb\nc";
        assert_eq!(changed_lines(text, text), 0);
    }

    #[test]
    fn single_line_replacement_counts_two() {
        // One removed plus one added
        assert_eq!(changed_lines("a\nb\nc", "a\nx\nc"), 2);
    }

    #[test]
    fn insertion_counts_one() {
        assert_eq!(changed_lines("a\nc", "a\nb\nc"), 1);
    }

    #[test]
    fn deletion_counts_one() {
        assert_eq!(changed_lines("a\nb\nc", "a\nc"), 1);
    }

    #[test]
    fn reordering_is_not_free() {
        assert!(changed_lines("a\nb", "b\na") > 0);
    }
}
