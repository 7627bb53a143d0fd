// src/utils/text.rs

//! Text helpers for issue messages.

use unicode_segmentation::UnicodeSegmentation;

/// Collapse runs of whitespace into single spaces and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cut `text` to at most `max` grapheme clusters, appending `…` when cut.
pub fn truncate(text: &str, max: usize) -> String {
    let mut graphemes = text.graphemes(true);
    let head: String = graphemes.by_ref().take(max).collect();
    if graphemes.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}
