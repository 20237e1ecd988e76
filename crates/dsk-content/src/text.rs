//! Text helpers for post composition.
//!
//! Lengths are counted in Unicode scalar values (`char`s); facet offsets are
//! UTF-8 byte offsets, as the publisher expects.

/// Maximum post length accepted by the publisher.
pub const MAX_POST_CHARS: usize = 300;

/// Characters kept when a post has to be truncated.
pub const TRUNCATED_CHARS: usize = 295;

/// Appended after a truncated post; carries the link back to the full text.
pub const ELLIPSIS_MARKER: &str = "(…)";

/// Upper-case the first letter of every word, leave everything else as is.
///
/// A word starts at the first alphanumeric character after a
/// non-alphanumeric one (so `"foo-bar"` becomes `"Foo-Bar"`).
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_alphanumeric() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.push(c);
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

/// Byte offset of the `n`-th char, or `None` if `s` has `n` chars or fewer.
fn byte_offset_of_char(s: &str, n: usize) -> Option<usize> {
    s.char_indices().nth(n).map(|(i, _)| i)
}

/// Result of fitting a text into the post length limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fitted {
    pub text: String,
    /// Byte span of the ellipsis marker, present only when truncated.
    pub marker_span: Option<(usize, usize)>,
}

/// Truncate `text` to [`TRUNCATED_CHARS`] plus [`ELLIPSIS_MARKER`] when it
/// exceeds [`MAX_POST_CHARS`]; otherwise return it untouched.
pub fn fit_to_limit(text: String) -> Fitted {
    if text.chars().count() <= MAX_POST_CHARS {
        return Fitted {
            text,
            marker_span: None,
        };
    }

    // count > MAX_POST_CHARS > TRUNCATED_CHARS, so the offset exists
    let cut = byte_offset_of_char(&text, TRUNCATED_CHARS).unwrap_or(text.len());
    let mut truncated = text;
    truncated.truncate(cut);

    let start = truncated.len();
    truncated.push_str(ELLIPSIS_MARKER);
    let end = truncated.len();

    Fitted {
        text: truncated,
        marker_span: Some((start, end)),
    }
}
