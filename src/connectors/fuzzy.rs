/*!
 * Levenshtein-based similarity for fuzzy matches.
 */

/// Similarity of two strings, 0 (nothing in common) to 100 (identical).
pub fn similarity(a: &str, b: &str) -> u8 {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let max_len = a_chars.len().max(b_chars.len());
    if max_len == 0 {
        return 100;
    }

    let distance = levenshtein_distance(&a_chars, &b_chars);
    (100 - (distance * 100).div_ceil(max_len)) as u8
}

/// Similarity of two strings when it can reach `threshold`, `None` otherwise.
///
/// The length ratio bounds the best possible score, so pairs of very
/// different lengths are rejected without computing the distance.
pub fn similarity_at_least(a: &str, b: &str, threshold: u8) -> Option<u8> {
    let a_len = a.chars().count();
    let b_len = b.chars().count();
    let (short, long) = if a_len < b_len { (a_len, b_len) } else { (b_len, a_len) };
    if long > 0 && short * 100 < long * threshold as usize {
        return None;
    }

    let score = similarity(a, b);
    (score >= threshold).then_some(score)
}

/// Edit distance between two character sequences.
fn levenshtein_distance(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev_row: Vec<usize> = (0..=b.len()).collect();
    let mut curr_row: Vec<usize> = vec![0; b.len() + 1];

    for i in 1..=a.len() {
        curr_row[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr_row[j] = (prev_row[j] + 1)
                .min(curr_row[j - 1] + 1)
                .min(prev_row[j - 1] + cost);
        }
        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    prev_row[b.len()]
}
