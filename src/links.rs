//! Finds candidate URLs in chat message text.

use linkify::{LinkFinder, LinkKind};
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

/// IRC control codes: bold, italic, underline, reverse, reset, monospace,
/// strikethrough, plus `\x03` colours (`fg[,bg]`) and `\x04` hex colours.
static FORMATTING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\x02|\x1D|\x1F|\x16|\x0F|\x11|\x1E|\x03(?:[0-9]{1,2}(?:,[0-9]{1,2})?)?|\x04(?:[0-9a-f]{6}(?:,[0-9a-f]{6})?)?",
    )
    .expect("formatting pattern is valid")
});

/// A URL found in message text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkCandidate {
    pub url: Url,
    /// Zero-based order of appearance among the accepted links.
    pub position: usize,
    /// Byte offset in the formatting-stripped text.
    pub offset: usize,
}

impl LinkCandidate {
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

/// Removes IRC formatting control codes so they cannot glue onto a URL.
pub fn strip_formatting(text: &str) -> String {
    FORMATTING_RE.replace_all(text, "").into_owned()
}

/// Extracts absolute URLs in order of first appearance.
///
/// Duplicates are kept: every occurrence gets its own pipeline. Anything
/// that looks like a link but does not parse as an absolute URL with a host
/// is dropped.
pub fn extract_links(text: &str) -> Vec<LinkCandidate> {
    let clean = strip_formatting(text);

    let mut finder = LinkFinder::new();
    finder.kinds(&[LinkKind::Url]);

    finder
        .links(&clean)
        .filter_map(|link| {
            let url = Url::parse(link.as_str()).ok()?;
            url.host_str()?;
            Some((url, link.start()))
        })
        .enumerate()
        .map(|(position, (url, offset))| LinkCandidate {
            url,
            position,
            offset,
        })
        .collect()
}
