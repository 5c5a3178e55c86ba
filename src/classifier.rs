//! Decides whether a fetched resource is an image, an HTML page or
//! something we do not extract from.

use crate::fetcher::FetchResult;
use infer::MatcherType;
use mime::Mime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Image,
    /// HTML or XHTML; metadata is extracted from it.
    Html,
    /// Anything else. Still previewed as a page, with nothing extracted.
    Other,
}

/// Parses the declared `Content-Type`, dropping parameters like `charset`.
pub fn declared_mime(result: &FetchResult) -> Option<Mime> {
    result.content_type.as_deref()?.trim().parse::<Mime>().ok()
}

#[must_use]
pub fn sniff_mime(body: &[u8]) -> Option<infer::Type> {
    infer::get(body)
}

/// Declared type wins; bytes are only sniffed when the server did not say
/// or said `application/octet-stream`.
pub fn classify(result: &FetchResult) -> ContentKind {
    match declared_mime(result) {
        Some(m) if m.type_() == mime::IMAGE => ContentKind::Image,
        Some(m) if is_markup(m.essence_str()) => ContentKind::Html,
        Some(m) if m != mime::APPLICATION_OCTET_STREAM => ContentKind::Other,
        _ => match sniff_mime(&result.body) {
            Some(kind) if matches!(kind.matcher_type(), MatcherType::Image) => ContentKind::Image,
            Some(kind) if is_markup(kind.mime_type()) => ContentKind::Html,
            _ => ContentKind::Other,
        },
    }
}

fn is_markup(essence: &str) -> bool {
    matches!(essence, "text/html" | "application/xhtml+xml")
}

/// `type/subtype` of the resource, from the header or the bytes.
pub fn media_type(result: &FetchResult) -> Option<String> {
    match declared_mime(result) {
        Some(m) if m != mime::APPLICATION_OCTET_STREAM => Some(m.essence_str().to_string()),
        _ => sniff_mime(&result.body).map(|kind| kind.mime_type().to_string()),
    }
}
