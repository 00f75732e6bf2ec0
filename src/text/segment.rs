//! Sentence-aware segmentation of document text into speakable chunks.
//!
//! Text is first cut into sentence fragments after every terminal mark
//! (`.` `!` `?` `。` `．`) and at every newline.  Fragments are then packed
//! greedily, joined by a single space, into segments of at most
//! `max_chars` characters.  A fragment that is longer than `max_chars` on
//! its own becomes a segment of its own; it is never cut mid-sentence.
//!
//! Lengths are counted in Unicode scalar values, so Thai text is measured
//! by character rather than by UTF-8 byte.

/// Default upper bound for a multi-sentence segment.
pub const DEFAULT_MAX_SEGMENT_CHARS: usize = 200;

/// Characters after which a sentence fragment ends.
const SENTENCE_TERMINATORS: [char; 5] = ['.', '!', '?', '。', '．'];

/// Split `text` into speakable segments with the default length bound.
///
/// # Examples
///
/// ```
/// use speech_reader::text::segment;
///
/// let segments = segment("Hello world. This is a test! Another sentence?");
/// assert_eq!(segments, vec!["Hello world. This is a test! Another sentence?"]);
///
/// assert!(segment("   \n\n  ").is_empty());
/// ```
pub fn segment(text: &str) -> Vec<String> {
    segment_with_limit(text, DEFAULT_MAX_SEGMENT_CHARS)
}

/// Split `text` into speakable segments of at most `max_chars` characters.
///
/// Never fails and runs in a single pass over the input.  Every returned
/// segment is non-empty after trimming, and the non-whitespace characters
/// of the input appear across the segments in their original order.
pub fn segment_with_limit(text: &str, max_chars: usize) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let mut segments = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for fragment in fragments(trimmed) {
        let fragment_len = fragment.chars().count();

        if !current.is_empty() && current_len + 1 + fragment_len > max_chars {
            segments.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(fragment);
        current_len += fragment_len;
    }

    if !current.is_empty() {
        segments.push(current);
    }

    if segments.is_empty() {
        segments.push(trimmed.to_string());
    }

    segments
}

/// Cut `text` into trimmed, non-empty sentence fragments.
///
/// A terminator stays attached to the fragment it closes; newlines are
/// dropped, so runs of blank lines never yield empty fragments.
fn fragments(text: &str) -> impl Iterator<Item = &str> {
    let mut pieces = Vec::new();
    let mut start = 0usize;

    for (i, c) in text.char_indices() {
        if c == '\n' {
            pieces.push(&text[start..i]);
            start = i + c.len_utf8();
        } else if SENTENCE_TERMINATORS.contains(&c) {
            let end = i + c.len_utf8();
            pieces.push(&text[start..end]);
            start = end;
        }
    }
    pieces.push(&text[start..]);

    pieces
        .into_iter()
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn non_whitespace(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    // --- empty input ---

    #[test]
    fn empty_input_yields_no_segments() {
        assert!(segment("").is_empty());
    }

    #[test]
    fn whitespace_only_yields_no_segments() {
        assert!(segment(" \t\n\n  \r\n ").is_empty());
    }

    // --- packing ---

    #[test]
    fn short_sentences_pack_into_one_segment() {
        let segments = segment("Hello world. This is a test! Another sentence?");
        assert_eq!(segments, vec!["Hello world. This is a test! Another sentence?"]);
    }

    #[test]
    fn text_without_terminators_is_one_segment() {
        let segments = segment("  สวัสดีครับ ยินดีต้อนรับ  ");
        assert_eq!(segments, vec!["สวัสดีครับ ยินดีต้อนรับ"]);
    }

    #[test]
    fn oversized_sentence_stands_alone() {
        let first = "First sentence.";
        let second = format!("{}.", "a".repeat(249));
        let third = "Third sentence.";
        let text = format!("{first} {second} {third}");

        let segments = segment(&text);
        assert_eq!(segments, vec![first.to_string(), second, third.to_string()]);
    }

    #[test]
    fn buffer_closes_before_exceeding_limit() {
        // 3 fragments of 9 chars: two fit in 19, the third would make 29.
        let segments = segment_with_limit("aaaaaaaa. bbbbbbbb. cccccccc.", 20);
        assert_eq!(segments, vec!["aaaaaaaa. bbbbbbbb.", "cccccccc."]);
    }

    #[test]
    fn joining_space_counts_toward_limit() {
        // 10 + 1 + 10 = 21 > 20, so the fragments must not be joined.
        let segments = segment_with_limit("aaaaaaaaa.bbbbbbbbb.", 20);
        assert_eq!(segments, vec!["aaaaaaaaa.", "bbbbbbbbb."]);
    }

    #[test]
    fn no_multi_fragment_segment_exceeds_limit() {
        let text = "One. Two two. Three three three. ".repeat(40);
        for s in segment_with_limit(&text, 50) {
            assert!(s.chars().count() <= 50, "too long: {s:?}");
        }
    }

    #[test]
    fn thai_length_is_counted_in_characters() {
        // Each fragment is 5 Thai characters (15 bytes in UTF-8).
        let segments = segment_with_limit("กขคงจ\nฉชซฌญ", 11);
        assert_eq!(segments, vec!["กขคงจ ฉชซฌญ"]);
    }

    // --- splitting rules ---

    #[test]
    fn newline_runs_split_without_empty_fragments() {
        let segments = segment_with_limit("line one\n\n\nline two", 8);
        assert_eq!(segments, vec!["line one", "line two"]);
    }

    #[test]
    fn cjk_terminators_split() {
        let segments = segment_with_limit("今日は。明日は．", 4);
        assert_eq!(segments, vec!["今日は。", "明日は．"]);
    }

    #[test]
    fn extra_whitespace_is_collapsed_at_joins() {
        let segments = segment("Hello.    World.");
        assert_eq!(segments, vec!["Hello. World."]);
    }

    // --- properties ---

    #[test]
    fn preserves_non_whitespace_characters_in_order() {
        let text = "ข้อความแรก. Second line!\n\nThird?   ภาษาไทย。 end";
        let joined: String = segment_with_limit(text, 12).join(" ");
        assert_eq!(non_whitespace(&joined), non_whitespace(text));
    }

    #[test]
    fn every_segment_is_non_empty_after_trim() {
        let text = ". . ! ?\n\n. word .";
        let segments = segment(text);
        assert!(!segments.is_empty());
        assert!(segments.iter().all(|s| !s.trim().is_empty()));
    }

    #[test]
    fn segmentation_is_deterministic() {
        let text = "A. B! C?\nD。E．".repeat(30);
        assert_eq!(segment_with_limit(&text, 17), segment_with_limit(&text, 17));
    }
}
