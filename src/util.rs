use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

/// Delay primitive used between requests.
///
/// The runner only ever waits through this seam so tests can record pauses
/// instead of sleeping.
pub trait Pacer {
    fn pause(&mut self, delay: Duration);
}

impl<P: Pacer + ?Sized> Pacer for &mut P {
    fn pause(&mut self, delay: Duration) {
        (**self).pause(delay);
    }
}

/// Blocks the current thread for the requested delay.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleep;

impl Pacer for ThreadSleep {
    fn pause(&mut self, delay: Duration) {
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }
}

/// Split operator input into query items.
///
/// Items are separated by newlines or commas; each is trimmed and blanks are
/// dropped. Order and duplicates are preserved.
pub fn split_items(input: &str) -> Vec<String> {
    input
        .split(['\n', ','])
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn whitespace_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static whitespace regex"))
}

/// Collapse every whitespace run (tabs and newlines included) to one space.
pub fn collapse_whitespace(text: &str) -> String {
    whitespace_run().replace_all(text, " ").into_owned()
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_items_accepts_newlines_and_commas() {
        let items = split_items("A1\n A2 ,A3\r\n\n, ,A1");
        assert_eq!(items, vec!["A1", "A2", "A3", "A1"]);
    }

    #[test]
    fn split_items_on_blank_input_is_empty() {
        assert!(split_items("  \n , \t").is_empty());
    }

    #[test]
    fn collapse_whitespace_flattens_tabs_and_newlines() {
        assert_eq!(collapse_whitespace("a\tb\n\nc  d"), "a b c d");
    }

    #[test]
    fn escape_html_covers_markup_characters() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }
}
