//! Reading-time estimate

use super::ContentSection;

/// Default reading speed
pub const WORDS_PER_MINUTE: usize = 200;

/// Whitespace-delimited words across every heading and body block
pub fn count_words(content: &[ContentSection]) -> usize {
    content
        .iter()
        .map(|section| {
            let heading = section.heading.split_whitespace().count();
            let body: usize = section
                .body
                .blocks()
                .iter()
                .map(|b| b.text.split_whitespace().count())
                .sum();
            heading + body
        })
        .sum()
}

/// Minutes to read `content`: whole minutes of reading plus one, so never below one
pub fn estimate(content: &[ContentSection], words_per_minute: usize) -> usize {
    let wpm = if words_per_minute == 0 {
        WORDS_PER_MINUTE
    } else {
        words_per_minute
    };
    count_words(content) / wpm + 1
}
