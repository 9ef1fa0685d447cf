/// Split `text` into consecutive slices of at most `size` characters.
///
/// Splitting is on char boundaries, in order, without overlap, so
/// concatenating the result gives back `text`. A zero `size` is treated as 1.
pub fn split_chunks(text: &str, size: usize) -> Vec<&str> {
    let size = size.max(1);
    let mut chunks = Vec::with_capacity(text.len() / size + 1);
    let mut start = 0;
    let mut count = 0;

    for (idx, _) in text.char_indices() {
        if count == size {
            chunks.push(&text[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        chunks.push(&text[start..]);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_lengths() {
        let text = "x".repeat(20_000);
        let lens: Vec<usize> = split_chunks(&text, 8_000).iter().map(|c| c.len()).collect();
        assert_eq!(lens, vec![8_000, 8_000, 4_000]);
    }

    #[test]
    fn test_chunk_count_is_ceiling() {
        for (len, size, expected) in [(1, 5, 1), (5, 5, 1), (6, 5, 2), (16, 4, 4), (17, 4, 5)] {
            let text = "a".repeat(len);
            assert_eq!(split_chunks(&text, size).len(), expected, "len={len} size={size}");
        }
    }

    #[test]
    fn test_concatenation_reconstructs_input() {
        let text = "<p>héllo wörld</p><div>日本語</div>".repeat(7);
        let chunks = split_chunks(&text, 9);
        assert_eq!(chunks.concat(), text);
        let (last, rest) = chunks.split_last().unwrap();
        assert!(rest.iter().all(|c| c.chars().count() == 9));
        assert!(last.chars().count() <= 9);
    }

    #[test]
    fn test_empty_input_has_no_chunks() {
        assert!(split_chunks("", 8_000).is_empty());
    }
}
