//! Targeted field extraction from login-flow HTML pages.
//!
//! Only a handful of values are ever needed: hidden form inputs, the
//! `csrf-token` meta tag and the error message the page embeds in its
//! client-side state. No DOM is built.

use std::sync::LazyLock;

use regex::Regex;

/// Pulls single values out of an HTML page.
pub trait FieldExtractor: Send + Sync {
    /// `value` of the first `<input>` whose `name` matches.
    fn input_value(&self, html: &str, name: &str) -> Option<String>;

    /// `content` of the first `<meta>` whose `name` matches.
    fn meta_content(&self, html: &str, name: &str) -> Option<String>;

    /// Error message embedded in the page's initial client state, if any.
    fn page_error(&self, html: &str) -> Option<String>;
}

static INPUT_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<\s*input\b([^>]*)>").expect("valid input tag regex"));

static META_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<\s*meta\b([^>]*)>").expect("valid meta tag regex"));

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)([a-zA-Z_:][-a-zA-Z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`/]+))"#)
        .expect("valid attribute regex")
});

static PAGE_ERROR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"REDUX_INITIAL_STATE\.bladeState\.messages\s*=\s*\{[^}]*?error\s*:\s*"((?:\\.|[^"\\])*)""#,
    )
    .expect("valid page error regex")
});

/// Regex-based [`FieldExtractor`].
///
/// Tolerates attribute order, quote style, whitespace and letter case.
/// Empty values count as absent.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegexExtractor;

impl RegexExtractor {
    pub fn new() -> Self {
        Self
    }

    fn attribute_of_tag(tag: &Regex, html: &str, name: &str, wanted: &str) -> Option<String> {
        tag.captures_iter(html).find_map(|tag| {
            let attrs = attributes(tag.get(1)?.as_str());
            let matches_name = attrs
                .iter()
                .any(|(key, value)| key.eq_ignore_ascii_case("name") && value.eq_ignore_ascii_case(name));
            if !matches_name {
                return None;
            }
            attrs
                .into_iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(wanted))
                .map(|(_, value)| value)
                .filter(|value| !value.is_empty())
        })
    }
}

impl FieldExtractor for RegexExtractor {
    fn input_value(&self, html: &str, name: &str) -> Option<String> {
        Self::attribute_of_tag(&INPUT_TAG, html, name, "value")
    }

    fn meta_content(&self, html: &str, name: &str) -> Option<String> {
        Self::attribute_of_tag(&META_TAG, html, name, "content")
    }

    fn page_error(&self, html: &str) -> Option<String> {
        let raw = PAGE_ERROR.captures(html)?.get(1)?.as_str();
        let message = unescape_js(raw);
        (!message.is_empty()).then_some(message)
    }
}

fn attributes(raw: &str) -> Vec<(String, String)> {
    ATTRIBUTE
        .captures_iter(raw)
        .filter_map(|caps| {
            let key = caps.get(1)?.as_str().to_string();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| unescape_html(m.as_str()))
                .unwrap_or_default();
            Some((key, value))
        })
        .collect()
}

fn unescape_html(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    raw.replace("&quot;", "\"")
        .replace("&#34;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Undo backslash escapes of a JS string literal. Unknown escapes keep the
/// escaped character.
fn unescape_js(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
