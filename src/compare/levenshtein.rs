use super::Comparator;

/// Normalized Levenshtein similarity over Unicode scalar values.
///
/// Two shortcuts make this cheaper than a plain edit-distance ratio and
/// both change the result on purpose:
///
/// * when the shorter string is at most half as long as the longer one the
///   score is `0.0`, because the similarity can be no higher than `0.5` and
///   callers treat anything in that range as a non-match;
/// * the distance table is abandoned as soon as a cell on the main diagonal
///   exceeds half the shorter length, and that cell is used as the distance.
#[derive(Debug, Clone, Copy, Default)]
pub struct Levenshtein;

impl Levenshtein {
    pub const TOKENIZED: bool = true;
}

impl Comparator for Levenshtein {
    fn compare(&self, s1: &str, s2: &str) -> f64 {
        let left: Vec<char> = s1.chars().collect();
        let right: Vec<char> = s2.chars().collect();
        let len = left.len().min(right.len());
        let maxlen = left.len().max(right.len());

        if maxlen == 0 {
            return 1.0;
        }
        if len as f64 / maxlen as f64 <= 0.5 {
            return 0.0;
        }
        if len == maxlen && s1 == s2 {
            return 1.0;
        }

        let dist = edit_distance(&left, &right, Some(len / 2)).min(len);
        1.0 - dist as f64 / len as f64
    }

    fn is_tokenized(&self) -> bool {
        Self::TOKENIZED
    }
}

/// Exact edit distance with unit insert, delete and substitute costs.
pub fn distance(s1: &str, s2: &str) -> usize {
    let left: Vec<char> = s1.chars().collect();
    let right: Vec<char> = s2.chars().collect();
    edit_distance(&left, &right, None)
}

/// Edit distance that stops at the first main-diagonal cell greater than
/// `min(|s1|, |s2|) / 2` and returns that cell. The result is exact only
/// when no such cell exists.
pub fn cutoff_distance(s1: &str, s2: &str) -> usize {
    let left: Vec<char> = s1.chars().collect();
    let right: Vec<char> = s2.chars().collect();
    let maxdist = left.len().min(right.len()) / 2;
    edit_distance(&left, &right, Some(maxdist))
}

fn edit_distance(left: &[char], right: &[char], cutoff: Option<usize>) -> usize {
    if left.is_empty() {
        return right.len();
    }
    if right.is_empty() {
        return left.len();
    }

    // Row-major (|left| + 1) x (|right| + 1) table.
    let width = right.len() + 1;
    let mut matrix = vec![0usize; (left.len() + 1) * width];
    for (col, cell) in matrix.iter_mut().take(width).enumerate() {
        *cell = col;
    }
    for row in 0..=left.len() {
        matrix[row * width] = row;
    }

    for (ix1, ch1) in left.iter().enumerate() {
        for (ix2, ch2) in right.iter().enumerate() {
            let cost = usize::from(ch1 != ch2);
            let deletion = matrix[ix1 * width + ix2 + 1] + 1;
            let insertion = matrix[(ix1 + 1) * width + ix2] + 1;
            let substitution = matrix[ix1 * width + ix2] + cost;
            let dist = deletion.min(insertion).min(substitution);

            if let Some(maxdist) = cutoff
                && ix1 == ix2
                && dist > maxdist
            {
                return dist;
            }
            matrix[(ix1 + 1) * width + ix2 + 1] = dist;
        }
    }

    matrix[left.len() * width + right.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(s1: &str, s2: &str) -> f64 {
        Levenshtein.compare(s1, s2)
    }

    #[test]
    fn identical_strings_score_one() {
        assert_eq!(score("duke", "duke"), 1.0);
        assert_eq!(score("Zürich", "Zürich"), 1.0);
    }

    #[test]
    fn two_empty_strings_score_one() {
        assert_eq!(score("", ""), 1.0);
    }

    #[test]
    fn empty_against_non_empty_scores_zero() {
        assert_eq!(score("", "a"), 0.0);
        assert_eq!(score("abc", ""), 0.0);
    }

    #[test]
    fn kitten_sitting_is_one_half() {
        assert_eq!(distance("kitten", "sitting"), 3);
        assert_eq!(cutoff_distance("kitten", "sitting"), 3);
        assert_eq!(score("kitten", "sitting"), 0.5);
    }

    #[test]
    fn length_ratio_at_one_half_collapses_to_zero() {
        assert_eq!(score("ab", "abcd"), 0.0);
        assert_eq!(score("abc", "abcdefg"), 0.0);
        assert!(score("abc", "abcde") > 0.0);
    }

    #[test]
    fn single_substitution() {
        let expected = 1.0 - 1.0 / 3.0;
        assert_eq!(score("abc", "abd"), expected);
        assert_eq!(score("abc", "abcd"), expected);
    }

    #[test]
    fn diagonal_cutoff_is_observable() {
        assert_eq!(distance("abcd", "wxyz"), 4);
        assert_eq!(cutoff_distance("abcd", "wxyz"), 3);
        assert_eq!(score("abcd", "wxyz"), 0.25);
    }

    #[test]
    fn counts_characters_not_bytes() {
        assert_eq!(distance("héllo", "hello"), 1);
        assert!((score("héllo", "hello") - 0.8).abs() < 1e-12);
    }

    #[test]
    fn distance_handles_empty_sides() {
        assert_eq!(distance("", "abc"), 3);
        assert_eq!(distance("abc", ""), 3);
        assert_eq!(cutoff_distance("", ""), 0);
    }

    #[test]
    fn advertises_tokenized_input() {
        assert!(Levenshtein.is_tokenized());
    }
}
