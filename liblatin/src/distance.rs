//! Damerau-Levenshtein distance (optimal string alignment variant).

/// Edit distance between two code sequences counting substitutions,
/// insertions, deletions and swaps of adjacent characters.
pub fn code_distance(a: &[u32], b: &[u32]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    // matrix[i][j]: distance between b[..i] and a[..j]
    let mut matrix = vec![vec![0usize; a.len() + 1]; b.len() + 1];
    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=a.len() {
        matrix[0][j] = j;
    }

    for i in 1..=b.len() {
        for j in 1..=a.len() {
            let cell = if b[i - 1] == a[j - 1] {
                matrix[i - 1][j - 1]
            } else {
                (matrix[i - 1][j - 1] + 1)
                    .min(matrix[i][j - 1] + 1)
                    .min(matrix[i - 1][j] + 1)
            };
            matrix[i][j] = cell;
            if i > 1 && j > 1 && b[i - 1] == a[j - 2] && b[i - 2] == a[j - 1] {
                let swap = if b[i - 1] == a[j - 1] { 0 } else { 1 };
                matrix[i][j] = matrix[i][j].min(matrix[i - 2][j - 2] + swap);
            }
        }
    }
    matrix[b.len()][a.len()]
}

/// Damerau-Levenshtein distance between two strings, by character.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<u32> = a.chars().map(u32::from).collect();
    let b: Vec<u32> = b.chars().map(u32::from).collect();
    code_distance(&a, &b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classic_pairs() {
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("abc", ""), 3);
        assert_eq!(levenshtein_distance("same", "same"), 0);
    }

    #[test]
    fn adjacent_swap_costs_one() {
        assert_eq!(levenshtein_distance("teh", "the"), 1);
        assert_eq!(levenshtein_distance("tihs", "this"), 1);
    }

    #[test]
    fn counts_characters_not_bytes() {
        assert_eq!(levenshtein_distance("café", "cafe"), 1);
    }
}
