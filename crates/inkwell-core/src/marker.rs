//! Positional markers: cursor and selection offsets carried through a
//! text-in/text-out model call as reserved literal tokens.
//!
//! [`encode`] embeds the caller's caret or selection into the document text,
//! and [`decode_all`] recovers the positions from whatever text comes back,
//! reporting each offset against the *cleaned* text (every token removed).
//!
//! All offsets are 0-based character (Unicode scalar value) indices.
//!
//! ## Duplicate tokens
//!
//! A model may echo a marker more than once. Every occurrence is stripped
//! from the cleaned text, and the **first** occurrence of each marker defines
//! its position. This is a defined rule, not an accident of the scan order.

use std::collections::BTreeMap;
use std::fmt;

/// A reserved position marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Marker {
    /// Caret position when nothing is selected.
    Cursor,
    /// Start of the selected range.
    SelectionStart,
    /// End of the selected range.
    SelectionEnd,
}

impl Marker {
    /// Every marker, in vocabulary order.
    pub const ALL: [Marker; 3] = [Marker::Cursor, Marker::SelectionStart, Marker::SelectionEnd];

    /// The literal token embedded in text.
    pub const fn token(self) -> &'static str {
        match self {
            Marker::Cursor => "[CURSOR]",
            Marker::SelectionStart => "[SELECTION_START]",
            Marker::SelectionEnd => "[SELECTION_END]",
        }
    }

    /// Human-readable meaning, shown to the model in the prompt.
    pub const fn description(self) -> &'static str {
        match self {
            Marker::Cursor => "Cursor position.",
            Marker::SelectionStart => "Start selection text position.",
            Marker::SelectionEnd => "End selection text position.",
        }
    }

    /// Token length in characters (tokens are ASCII).
    pub const fn token_len(self) -> usize {
        self.token().len()
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Errors from encoding or decoding markers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarkerError {
    #[error("offset {offset} is past the end of the text ({len} chars)")]
    OffsetOutOfRange { offset: usize, len: usize },

    #[error("selection start {start} is after selection end {end}")]
    InvalidSelection { start: usize, end: usize },

    #[error("text already contains the reserved token {0}")]
    TokenCollision(Marker),

    #[error("selection end marker (offset {end}) appears before selection start marker (offset {start})")]
    ReversedSelection { start: usize, end: usize },

    #[error("removing marker tokens joined the surrounding text into the reserved token {0}")]
    SplicedToken(Marker),
}

/// Marker positions in cleaned text. A marker that was not found is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkerPlacement {
    positions: BTreeMap<Marker, usize>,
}

impl MarkerPlacement {
    /// Offset of `marker`, or `None` if it was not present.
    pub fn get(&self, marker: Marker) -> Option<usize> {
        self.positions.get(&marker).copied()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.get(Marker::Cursor)
    }

    /// The selected range, only when both selection markers were present.
    pub fn selection(&self) -> Option<(usize, usize)> {
        Some((
            self.get(Marker::SelectionStart)?,
            self.get(Marker::SelectionEnd)?,
        ))
    }

    /// Whether no marker was found.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Number of distinct markers found.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Iterate over present markers and their offsets.
    pub fn iter(&self) -> impl Iterator<Item = (Marker, usize)> + '_ {
        self.positions.iter().map(|(m, at)| (*m, *at))
    }
}

/// Result of [`decode_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    /// Text with every marker token removed.
    pub text: String,
    /// Positions of the markers in `text`.
    pub placement: MarkerPlacement,
}

/// Embed the caret or selection into `text`.
///
/// When `selection_start == selection_end` a single [`Marker::Cursor`] is
/// inserted at `caret`. Otherwise the selection markers wrap the selected
/// range and no cursor token is emitted.
///
/// Fails if `text` already contains a reserved token, if a used offset is
/// out of range, or if the selection is reversed.
pub fn encode(
    text: &str,
    caret: usize,
    selection_start: usize,
    selection_end: usize,
) -> Result<String, MarkerError> {
    for marker in Marker::ALL {
        if text.contains(marker.token()) {
            return Err(MarkerError::TokenCollision(marker));
        }
    }

    let mut marked = String::with_capacity(
        text.len() + Marker::SelectionStart.token_len() + Marker::SelectionEnd.token_len(),
    );

    if selection_start == selection_end {
        let at = byte_offset(text, caret)?;
        marked.push_str(&text[..at]);
        marked.push_str(Marker::Cursor.token());
        marked.push_str(&text[at..]);
    } else {
        if selection_start > selection_end {
            return Err(MarkerError::InvalidSelection {
                start: selection_start,
                end: selection_end,
            });
        }
        let start = byte_offset(text, selection_start)?;
        let end = byte_offset(text, selection_end)?;
        marked.push_str(&text[..start]);
        marked.push_str(Marker::SelectionStart.token());
        marked.push_str(&text[start..end]);
        marked.push_str(Marker::SelectionEnd.token());
        marked.push_str(&text[end..]);
    }

    Ok(marked)
}

/// Strip every marker token from `marked` and report where each marker sat
/// in the cleaned text.
///
/// Text without markers comes back unchanged with an empty placement. A
/// selection end marker that textually precedes the selection start marker
/// is rejected rather than reported as a bogus range, and so is text whose
/// leftovers join into a new token once the markers are removed
/// (`"[CUR[CURSOR]SOR]"`). The cleaned text of a successful decode never
/// contains a marker token.
pub fn decode_all(marked: &str) -> Result<Decoded, MarkerError> {
    let mut text = String::with_capacity(marked.len());
    let mut placement = MarkerPlacement::default();
    let mut clean_chars = 0usize;
    let mut reversed = false;
    let mut rest = marked;

    while let Some((at, marker)) = next_marker(rest) {
        let (before, after) = rest.split_at(at);
        text.push_str(before);
        clean_chars += before.chars().count();

        if !placement.positions.contains_key(&marker) {
            if marker == Marker::SelectionStart
                && placement.positions.contains_key(&Marker::SelectionEnd)
            {
                reversed = true;
            }
            placement.positions.insert(marker, clean_chars);
        }

        rest = &after[marker.token_len()..];
    }
    text.push_str(rest);

    if let Some(marker) = Marker::ALL.into_iter().find(|m| text.contains(m.token())) {
        return Err(MarkerError::SplicedToken(marker));
    }

    if reversed {
        if let Some((start, end)) = placement.selection() {
            return Err(MarkerError::ReversedSelection { start, end });
        }
    }

    Ok(Decoded { text, placement })
}

/// Numbered description of the marker vocabulary for the model.
pub fn vocabulary() -> String {
    let mut out = String::from("The source may contain the following special markers:\n");
    for (i, marker) in Marker::ALL.iter().enumerate() {
        out.push_str(&format!(
            "{}. {} - {}\n",
            i + 1,
            marker.token(),
            marker.description()
        ));
    }
    out.push_str(
        "Keep the markers in your answer, moved to where the cursor or selection \
         should be after your change.\n",
    );
    out
}

/// Earliest marker token in `text` as (byte offset, marker).
fn next_marker(text: &str) -> Option<(usize, Marker)> {
    Marker::ALL
        .iter()
        .filter_map(|m| text.find(m.token()).map(|at| (at, *m)))
        .min_by_key(|(at, _)| *at)
}

/// Convert a character offset into a byte offset, allowing one-past-the-end.
fn byte_offset(text: &str, offset: usize) -> Result<usize, MarkerError> {
    match text.char_indices().nth(offset) {
        Some((idx, _)) => Ok(idx),
        None => {
            let len = text.chars().count();
            if offset == len {
                Ok(text.len())
            } else {
                Err(MarkerError::OffsetOutOfRange { offset, len })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cursor_encoding() {
        assert_eq!(encode("ab", 1, 1, 1).unwrap(), "a[CURSOR]b");
    }

    #[test]
    fn test_cursor_decoding() {
        let decoded = decode_all("a[CURSOR]b").unwrap();
        assert_eq!(decoded.text, "ab");
        assert_eq!(decoded.placement.cursor(), Some(1));
        assert_eq!(decoded.placement.selection(), None);
    }

    #[test]
    fn test_selection_encoding() {
        let marked = encode("hello world", 5, 0, 5).unwrap();
        assert!(marked.contains("[SELECTION_START]hello[SELECTION_END] world"));
        assert!(!marked.contains("[CURSOR]"));

        let decoded = decode_all(&marked).unwrap();
        assert_eq!(decoded.text, "hello world");
        assert_eq!(decoded.placement.selection(), Some((0, 5)));
        assert_eq!(decoded.placement.cursor(), None);
    }

    #[test]
    fn test_no_markers_unchanged() {
        let decoded = decode_all("<Task><Log/></Task>").unwrap();
        assert_eq!(decoded.text, "<Task><Log/></Task>");
        assert!(decoded.placement.is_empty());
    }

    #[test]
    fn test_marker_at_start_is_zero_not_absent() {
        let decoded = decode_all("[CURSOR]abc").unwrap();
        assert_eq!(decoded.placement.cursor(), Some(0));
    }

    #[test]
    fn test_round_trip_all_offsets() {
        let texts = ["", "x", "hello world", "<Task>\n  <Log/>\n</Task>", "naïve – ünïcödé"];
        for text in texts {
            let len = text.chars().count();
            for caret in 0..=len {
                let decoded = decode_all(&encode(text, caret, caret, caret).unwrap()).unwrap();
                assert_eq!(decoded.text, text);
                assert_eq!(decoded.placement.cursor(), Some(caret));
                assert_eq!(decoded.placement.len(), 1);
            }
            for start in 0..=len {
                for end in start + 1..=len {
                    let decoded = decode_all(&encode(text, end, start, end).unwrap()).unwrap();
                    assert_eq!(decoded.text, text);
                    assert_eq!(decoded.placement.selection(), Some((start, end)));
                    assert_eq!(decoded.placement.cursor(), None);
                }
            }
        }
    }

    #[test]
    fn test_offsets_corrected_for_preceding_tokens() {
        let decoded = decode_all("[SELECTION_START]ab[SELECTION_END]cd[CURSOR]e").unwrap();
        assert_eq!(decoded.text, "abcde");
        assert_eq!(decoded.placement.selection(), Some((0, 2)));
        assert_eq!(decoded.placement.cursor(), Some(4));
    }

    #[test]
    fn test_duplicate_marker_first_occurrence_wins() {
        let decoded = decode_all("a[CURSOR]bc[CURSOR]d").unwrap();
        assert_eq!(decoded.text, "abcd");
        assert_eq!(decoded.placement.cursor(), Some(1));
    }

    #[test]
    fn test_duplicates_do_not_skew_later_markers() {
        let decoded = decode_all("[CURSOR]a[CURSOR]b[SELECTION_START]c[SELECTION_END]").unwrap();
        assert_eq!(decoded.text, "abc");
        assert_eq!(decoded.placement.cursor(), Some(0));
        assert_eq!(decoded.placement.selection(), Some((2, 3)));
    }

    #[test]
    fn test_reversed_selection_rejected() {
        let err = decode_all("a[SELECTION_END]bc[SELECTION_START]d").unwrap_err();
        assert_eq!(err, MarkerError::ReversedSelection { start: 3, end: 1 });
    }

    #[test]
    fn test_joined_leftovers_rejected() {
        let err = decode_all("<A>[CUR[CURSOR]SOR]</A>").unwrap_err();
        assert_eq!(err, MarkerError::SplicedToken(Marker::Cursor));

        let err = decode_all("[SELECTION_[CURSOR]END]").unwrap_err();
        assert_eq!(err, MarkerError::SplicedToken(Marker::SelectionEnd));

        // Brackets that stay apart after stripping are ordinary text.
        let decoded = decode_all("[CUR[CURSOR] SOR]").unwrap();
        assert_eq!(decoded.text, "[CUR SOR]");
        assert_eq!(decoded.placement.cursor(), Some(4));
    }

    #[test]
    fn test_lone_selection_marker_is_not_a_selection() {
        let decoded = decode_all("ab[SELECTION_END]c").unwrap();
        assert_eq!(decoded.placement.selection(), None);
        assert_eq!(decoded.placement.get(Marker::SelectionEnd), Some(2));
    }

    #[test]
    fn test_encode_rejects_existing_token() {
        let err = encode("already [CURSOR] here", 0, 0, 0).unwrap_err();
        assert_eq!(err, MarkerError::TokenCollision(Marker::Cursor));
    }

    #[test]
    fn test_encode_rejects_out_of_range() {
        let err = encode("abc", 4, 4, 4).unwrap_err();
        assert_eq!(err, MarkerError::OffsetOutOfRange { offset: 4, len: 3 });
    }

    #[test]
    fn test_encode_rejects_reversed_selection() {
        let err = encode("abcdef", 0, 4, 2).unwrap_err();
        assert_eq!(err, MarkerError::InvalidSelection { start: 4, end: 2 });
    }

    #[test]
    fn test_vocabulary_lists_every_token() {
        let vocab = vocabulary();
        for marker in Marker::ALL {
            assert!(vocab.contains(marker.token()));
            assert!(vocab.contains(marker.description()));
        }
    }
}
