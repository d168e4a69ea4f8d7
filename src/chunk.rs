// Split text into overlapping word windows.
//
// Each window holds up to `chunk_size` words and starts `chunk_size - overlap`
// words after the previous one. Callers keep `overlap < chunk_size`.
pub fn split_text_words(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let step = chunk_size.saturating_sub(overlap).max(1);

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < words.len() {
        let end = (start + chunk_size).min(words.len());
        chunks.push(words[start..end].join(" "));
        start += step;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_has_no_chunks() {
        assert!(split_text_words("", 10, 2).is_empty());
        assert!(split_text_words("   \n\t ", 10, 2).is_empty());
    }

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = split_text_words("alpha  beta\ngamma", 10, 2);
        assert_eq!(chunks, vec!["alpha beta gamma"]);
    }

    #[test]
    fn windows_overlap() {
        let text = "w1 w2 w3 w4 w5 w6 w7";
        let chunks = split_text_words(text, 4, 2);
        assert_eq!(
            chunks,
            vec!["w1 w2 w3 w4", "w3 w4 w5 w6", "w5 w6 w7", "w7"]
        );
    }

    #[test]
    fn no_overlap_partitions_words() {
        let chunks = split_text_words("a b c d e", 2, 0);
        assert_eq!(chunks, vec!["a b", "c d", "e"]);
    }
}
