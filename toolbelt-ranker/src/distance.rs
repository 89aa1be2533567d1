//! Bounded edit distance used for fuzzy term matching.

/// Returns the Levenshtein distance between `a` and `b` when it does not
/// exceed `max`, or `None` otherwise.
///
/// Distances are counted in `char`s. The computation stops as soon as every
/// cell in the current row exceeds `max`.
#[must_use]
pub fn bounded_levenshtein(a: &str, b: &str, max: usize) -> Option<usize> {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.len().abs_diff(b.len()) > max {
        return None;
    }
    if a.is_empty() || b.is_empty() {
        return Some(a.len().max(b.len()));
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        let mut row_min = current[0];

        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            let insertion = current[j] + 1;
            let deletion = previous[j + 1] + 1;
            current[j + 1] = substitution.min(insertion).min(deletion);
            row_min = row_min.min(current[j + 1]);
        }

        if row_min > max {
            return None;
        }
        std::mem::swap(&mut previous, &mut current);
    }

    let distance = previous[b.len()];
    (distance <= max).then_some(distance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_have_zero_distance() {
        assert_eq!(bounded_levenshtein("search", "search", 0), Some(0));
    }

    #[test]
    fn counts_single_edits() {
        assert_eq!(bounded_levenshtein("calculate", "calculte", 2), Some(1));
        assert_eq!(bounded_levenshtein("search", "serach", 2), Some(2));
        assert_eq!(bounded_levenshtein("kitten", "sitting", 3), Some(3));
    }

    #[test]
    fn respects_bound() {
        assert_eq!(bounded_levenshtein("kitten", "sitting", 2), None);
        assert_eq!(bounded_levenshtein("ab", "abcdef", 1), None);
    }

    #[test]
    fn handles_empty_inputs() {
        assert_eq!(bounded_levenshtein("", "ab", 2), Some(2));
        assert_eq!(bounded_levenshtein("", "abc", 2), None);
    }
}
