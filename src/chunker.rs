/// Default paragraph size, in characters, used as context for one question.
pub const DEFAULT_PARAGRAPH_CHARS: usize = 280;

/// Collapses every run of whitespace to a single space and trims both ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// Returns at most the first `limit` characters of `text`, cut on a char
/// boundary.
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Splits text into sentences.
///
/// Whitespace is normalized first; a sentence ends after `.`, `!` or `?`
/// when whitespace follows. Terminal punctuation stays with its sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let normalized = collapse_whitespace(text);
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut prev: Option<char> = None;

    for c in normalized.chars() {
        if c == ' ' && matches!(prev, Some('.') | Some('!') | Some('?')) {
            sentences.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
        prev = Some(c);
    }
    if !current.is_empty() {
        sentences.push(current);
    }

    sentences
}

/// Greedily packs consecutive sentences into paragraphs.
///
/// Sentences accumulate until the space-joined paragraph is longer than
/// `target_chars`, then a new paragraph starts. The trailing partial
/// paragraph is kept even when it is short. Every sentence lands in exactly
/// one paragraph, in order.
pub fn pack_paragraphs(sentences: &[String], target_chars: usize) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut bucket: Vec<&str> = Vec::new();
    let mut joined_len = 0;

    for sentence in sentences {
        if !bucket.is_empty() {
            joined_len += 1;
        }
        joined_len += sentence.chars().count();
        bucket.push(sentence);

        if joined_len > target_chars {
            paragraphs.push(bucket.join(" "));
            bucket.clear();
            joined_len = 0;
        }
    }
    if !bucket.is_empty() {
        paragraphs.push(bucket.join(" "));
    }

    paragraphs
}

/// Sentence split followed by paragraph packing.
pub fn paragraphs(text: &str, target_chars: usize) -> Vec<String> {
    pack_paragraphs(&split_sentences(text), target_chars)
}
