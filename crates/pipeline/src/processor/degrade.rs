//! Text transforms for the degradation chain

use longform_tts_config::constants::degradation::PREVIEW_CHARS;

use crate::chunker::TextPatterns;

/// Keep only letters, digits and spaces, collapsing whitespace
///
/// Letters and digits of any script are kept so non-English input is not
/// wiped out.
pub fn sanitize_for_speech(text: &str) -> String {
    let kept: String = text
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove markup symbols, collapsing whitespace
pub fn strip_markup(patterns: &TextPatterns, text: &str) -> String {
    let stripped = patterns.markup.replace_all(text, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First characters of `text` for warnings, with an ellipsis when cut
pub fn preview(text: &str) -> String {
    let mut chars = text.trim().chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
