use std::borrow::Cow;
use std::sync::LazyLock;

use quick_xml::escape::{resolve_html5_entity, unescape_with};
use regex::Regex;
use unicode_width::UnicodeWidthChar;

/// Maximum length, in characters, of any cleaned title or summary.
pub const MAX_TEXT_CHARS: usize = 300;

/// Longest entity reference we try to resolve (`&CounterClockwiseContourIntegral;` is 33).
const MAX_ENTITY_LEN: usize = 40;

/// Ellipsis appended by [`truncate_to_width`].
const ELLIPSIS: &str = "...";

/// Permissive tag pattern: anything between `<` and the next `>`, across lines.
static TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("tag pattern is a valid regex"));

/// Normalizes feed-provided markup into a short plain-text string.
///
/// The passes run in this order:
///
/// 1. Decode HTML5 named entities and numeric character references.
///    Unknown references (and bare `&`) are kept literally.
/// 2. Remove every `<...>` tag. Escaped markup (`&lt;p&gt;`) is decoded in
///    step 1 and therefore stripped here too.
/// 3. Collapse whitespace runs to a single space, trim both ends, and drop
///    control characters so feed text cannot carry terminal escapes.
/// 4. Keep at most [`MAX_TEXT_CHARS`] characters.
///
/// # Examples
///
/// ```
/// use briefing::util::clean_html;
///
/// assert_eq!(clean_html("<b>Hello</b> &amp; world"), "Hello & world");
/// assert_eq!(clean_html("  spaced\n\n out  "), "spaced out");
/// ```
pub fn clean_html(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let decoded = decode_entities(text);
    let stripped = TAG_PATTERN.replace_all(&decoded, "");

    let mut out = String::with_capacity(stripped.len().min(MAX_TEXT_CHARS * 4));
    let mut count = 0;
    let mut pending_space = false;

    for c in stripped.chars() {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if c.is_control() {
            continue;
        }
        if pending_space {
            if count == MAX_TEXT_CHARS {
                break;
            }
            out.push(' ');
            count += 1;
            pending_space = false;
        }
        if count == MAX_TEXT_CHARS {
            break;
        }
        out.push(c);
        count += 1;
    }

    out
}

/// Resolves `&name;`, `&#NNN;` and `&#xHH;` references, leaving anything
/// unrecognized untouched.
fn decode_entities(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];

        // Only the first MAX_ENTITY_LEN bytes can hold a reference; scanning
        // further makes long runs of `&` quadratic.
        let reference = tail[..entity_window(tail)]
            .find(';')
            .filter(|&end| end > 1)
            .map(|end| &tail[..=end])
            .filter(|r| {
                r[1..r.len() - 1]
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '#')
            });

        match reference.and_then(|r| unescape_with(r, resolve_html5_entity).ok().map(|d| (r, d))) {
            Some((raw, decoded)) => {
                out.push_str(&decoded);
                rest = &tail[raw.len()..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    Cow::Owned(out)
}

/// Byte length of the prefix of `tail` that may contain a complete entity
/// reference, stepped back to a char boundary.
fn entity_window(tail: &str) -> usize {
    let mut end = tail.len().min(MAX_ENTITY_LEN + 1);
    while !tail.is_char_boundary(end) {
        end -= 1;
    }
    end
}

/// Cuts a string to fit `max_width` terminal columns, appending `...` when
/// anything was removed.
///
/// Wide characters (CJK, emoji) count as two columns. Returns the input
/// unchanged when it already fits.
///
/// ```
/// use briefing::util::truncate_to_width;
///
/// assert_eq!(truncate_to_width("Short", 10), "Short");
/// assert_eq!(truncate_to_width("Hello World", 8), "Hello...");
/// ```
pub fn truncate_to_width(s: &str, max_width: usize) -> Cow<'_, str> {
    let ellipsis_width = ELLIPSIS.len();
    let budget = max_width.saturating_sub(ellipsis_width);

    let mut width = 0;
    let mut cut = None;

    for (idx, c) in s.char_indices() {
        let w = c.width().unwrap_or(0);
        if cut.is_none() && width + w > budget {
            cut = Some(idx);
        }
        if width + w > max_width {
            let end = cut.unwrap_or(idx);
            if max_width <= ellipsis_width {
                return Cow::Owned(s[..idx].to_string());
            }
            return Cow::Owned(format!("{}{}", s[..end].trim_end(), ELLIPSIS));
        }
        width += w;
    }

    Cow::Borrowed(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_tags_and_entities() {
        assert_eq!(clean_html("<b>Hello</b> &amp; world"), "Hello & world");
    }

    #[test]
    fn test_plain_text_truncated_to_limit() {
        let input = "a".repeat(500);
        let cleaned = clean_html(&input);
        assert_eq!(cleaned.chars().count(), 300);
    }

    #[test]
    fn test_truncation_counts_chars_not_bytes() {
        let input = "é".repeat(400);
        let cleaned = clean_html(&input);
        assert_eq!(cleaned.chars().count(), 300);
        assert_eq!(cleaned.len(), 600);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(clean_html(""), "");
        assert_eq!(clean_html("   \n\t "), "");
    }

    #[test]
    fn test_escaped_markup_is_stripped() {
        // Entities decode first, so escaped tags are removed as real tags
        assert_eq!(
            clean_html("&lt;p&gt;Escaped &lt;em&gt;paragraph&lt;/em&gt;&lt;/p&gt;"),
            "Escaped paragraph"
        );
    }

    #[test]
    fn test_numeric_and_named_entities() {
        assert_eq!(clean_html("it&#39;s &#x2014; &quot;fine&quot;"), "it's — \"fine\"");
        assert_eq!(clean_html("caf&eacute;&nbsp;time"), "café time");
    }

    #[test]
    fn test_unknown_entities_and_bare_ampersands_kept() {
        assert_eq!(clean_html("AT&T &bogus; R&D"), "AT&T &bogus; R&D");
        assert_eq!(clean_html("a & b"), "a & b");
    }

    #[test]
    fn test_longest_entity_still_resolved() {
        assert_eq!(clean_html("&CounterClockwiseContourIntegral;"), "\u{2233}");
        // `;` beyond the entity window is not a reference terminator
        let far = format!("&{};", "a".repeat(60));
        assert_eq!(clean_html(&far), far);
    }

    #[test]
    fn test_entity_window_respects_char_boundaries() {
        // Byte 41 falls inside a two-byte char and must be stepped back
        let input = format!("&&{}", "é".repeat(40));
        assert_eq!(entity_window(&input), 40);
        assert_eq!(clean_html(&input), input);
    }

    #[test]
    fn test_ampersand_flood_is_linear() {
        let bare = "&".repeat(400_000);
        let escaped = "&amp;".repeat(400_000);

        let start = std::time::Instant::now();
        assert_eq!(clean_html(&bare), "&".repeat(MAX_TEXT_CHARS));
        assert_eq!(clean_html(&escaped), "&".repeat(MAX_TEXT_CHARS));
        assert!(
            start.elapsed() < std::time::Duration::from_secs(5),
            "took {:?}",
            start.elapsed()
        );
    }

    #[test]
    fn test_multiline_tags_removed() {
        let input = "<a\n  href=\"https://example.com\"\n>link</a> text";
        assert_eq!(clean_html(input), "link text");
    }

    #[test]
    fn test_unclosed_angle_bracket_survives() {
        // Only complete `<...>` runs are tags
        assert_eq!(clean_html("1 < 2 and more"), "1 < 2 and more");
    }

    #[test]
    fn test_control_characters_removed() {
        assert_eq!(clean_html("safe\x1b\x07 text\x00"), "safe text");
    }

    #[test]
    fn test_whitespace_collapsed() {
        assert_eq!(
            clean_html("<p>one</p>\n\n<p>two</p>\t\tthree"),
            "one two three"
        );
    }

    #[test]
    fn test_truncate_fits() {
        assert_eq!(truncate_to_width("Short", 10), "Short");
        assert!(matches!(truncate_to_width("Short", 10), Cow::Borrowed(_)));
        assert_eq!(truncate_to_width("12345", 5), "12345");
    }

    #[test]
    fn test_truncate_ascii() {
        assert_eq!(truncate_to_width("Hello World", 8), "Hello...");
        assert_eq!(truncate_to_width("Testing", 4), "T...");
    }

    #[test]
    fn test_truncate_wide_chars() {
        // Each CJK character is two columns wide
        assert_eq!(truncate_to_width("你好世界", 7), "你好...");
    }

    #[test]
    fn test_truncate_narrow_widths() {
        assert_eq!(truncate_to_width("Test", 0), "");
        assert_eq!(truncate_to_width("Test", 2), "Te");
    }

    proptest! {
        #[test]
        fn prop_clean_html_is_bounded(input in ".{0,800}") {
            let cleaned = clean_html(&input);
            prop_assert!(cleaned.chars().count() <= MAX_TEXT_CHARS);
        }

        #[test]
        fn prop_clean_html_has_no_whitespace_runs(input in "[a-z <>/&;\n\t]{0,400}") {
            let cleaned = clean_html(&input);
            prop_assert!(!cleaned.contains("  "));
            prop_assert!(!cleaned.starts_with(' '));
            prop_assert!(!cleaned.contains('\n'));
            prop_assert!(!cleaned.contains('\t'));
        }

        #[test]
        fn prop_clean_html_is_tag_free(words in proptest::collection::vec("[a-z]{1,8}", 0..20)) {
            let html = words
                .iter()
                .map(|w| format!("<span class=\"x\">{w}</span>"))
                .collect::<Vec<_>>()
                .join("<br/>");
            let cleaned = clean_html(&html);
            prop_assert!(!cleaned.contains('<'));
            prop_assert!(!cleaned.contains('>'));
        }
    }
}
