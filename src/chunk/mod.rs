//! Plain-text chunking
//!
//! Splits extracted document text into overlapping spans sized for the
//! embedding backend. Boundaries snap to paragraph or sentence breaks
//! where one falls near the target size, and always to char boundaries.

use crate::config::ChunkConfig;

/// A text span produced by the splitter
#[derive(Debug, Clone)]
pub struct TextSpan {
    pub text: String,
    pub index: usize,
}

/// Split text into overlapping spans according to config
pub fn split_text(text: &str, config: &ChunkConfig) -> Vec<TextSpan> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let mut spans = Vec::new();
    let mut start = 0;
    let mut index = 0;

    while start < text.len() {
        start = snap_to_char_boundary(text, start);
        if start >= text.len() {
            break;
        }

        let target = start + config.max_chars;
        let end = if target >= text.len() {
            text.len()
        } else {
            best_break(text, start, target, config.min_chars)
        };

        let span_text = text[start..end].trim();
        // A runt tail folds into nothing rather than producing noise
        if !span_text.is_empty() && (span_text.len() >= config.min_chars || end >= text.len()) {
            spans.push(TextSpan {
                text: span_text.to_string(),
                index,
            });
            index += 1;
        }

        if end >= text.len() {
            break;
        }

        let next_start = if end > config.overlap_chars {
            snap_to_char_boundary(text, end - config.overlap_chars)
        } else {
            end
        };
        // The overlap must never pull the window backwards
        start = if next_start > start { next_start } else { end };
    }

    spans
}

/// Find the best break position in (start, target], preferring paragraph
/// breaks, then sentence ends, then whitespace.
fn best_break(text: &str, start: usize, target: usize, min_chars: usize) -> usize {
    let target = snap_to_char_boundary(text, target);
    let floor = snap_to_char_boundary(text, start + min_chars.min(target - start));
    let window = &text[floor..target];

    if let Some(pos) = window.rfind("\n\n") {
        return floor + pos + 2;
    }

    if let Some(pos) = window.rfind(['.', '!', '?']) {
        let candidate = floor + pos + 1;
        if text.is_char_boundary(candidate) {
            return candidate;
        }
    }

    if let Some(pos) = window.rfind(char::is_whitespace) {
        let candidate = floor + pos + 1;
        if text.is_char_boundary(candidate) {
            return candidate;
        }
    }

    target
}

fn snap_to_char_boundary(text: &str, mut pos: usize) -> usize {
    if pos >= text.len() {
        return text.len();
    }
    while pos < text.len() && !text.is_char_boundary(pos) {
        pos += 1;
    }
    pos
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max: usize, min: usize, overlap: usize) -> ChunkConfig {
        ChunkConfig {
            max_chars: max,
            min_chars: min,
            overlap_chars: overlap,
        }
    }

    #[test]
    fn test_short_text_is_single_span() {
        let spans = split_text("A short note.", &config(1500, 5, 200));
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "A short note.");
        assert_eq!(spans[0].index, 0);
    }

    #[test]
    fn test_empty_text_yields_nothing() {
        assert!(split_text("", &config(100, 10, 20)).is_empty());
        assert!(split_text("   \n ", &config(100, 10, 20)).is_empty());
    }

    #[test]
    fn test_long_text_splits_with_overlap() {
        let sentence = "The quick brown fox jumps over the lazy dog. ";
        let text = sentence.repeat(40);
        let spans = split_text(&text, &config(200, 20, 40));

        assert!(spans.len() > 1);
        for (i, span) in spans.iter().enumerate() {
            assert_eq!(span.index, i);
            assert!(span.text.len() <= 200);
        }
        // Overlap carries trailing context into the next span
        let first_tail = &spans[0].text[spans[0].text.len().saturating_sub(10)..];
        assert!(spans[1].text.contains(first_tail.trim()));
    }

    #[test]
    fn test_prefers_paragraph_breaks() {
        let text = format!("{}\n\n{}", "alpha ".repeat(20).trim(), "beta ".repeat(20).trim());
        let spans = split_text(&text, &config(140, 10, 0));
        assert!(spans[0].text.starts_with("alpha"));
        assert!(!spans[0].text.contains("beta"));
    }

    #[test]
    fn test_multibyte_text_never_panics() {
        let text = "héllo wörld — ümlaut “quotes” ".repeat(50);
        let spans = split_text(&text, &config(97, 10, 13));
        assert!(!spans.is_empty());
        for span in spans {
            assert!(!span.text.is_empty());
        }
    }
}
