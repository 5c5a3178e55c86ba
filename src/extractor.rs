use crate::PreviewError;
use scraper::{Html, Selector};
use tracing::debug;

/// Head-level metadata found in a document. Absent tags stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Raw `og:image` value, not yet validated.
    pub image: Option<String>,
}

/// Metadata extractor, responsible for pulling preview fields out of page markup.
///
/// Parsing is tolerant: broken markup, missing tags or empty attributes
/// just leave the corresponding field empty. Scripts are never run; only
/// `<title>` and `<meta>` elements are read.
#[derive(Clone)]
pub struct MetadataExtractor;

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, html: &str) -> PageMetadata {
        let document = Html::parse_document(html);

        let metadata = PageMetadata {
            title: self.extract_title(&document),
            description: self.extract_description(&document),
            image: self.extract_image(&document),
        };

        debug!(
            title = ?metadata.title,
            description = ?metadata.description,
            image = ?metadata.image,
            "Metadata extraction results"
        );
        metadata
    }

    /// `og:title`, falling back to `<title>`.
    fn extract_title(&self, document: &Html) -> Option<String> {
        meta_content(document, "meta[property='og:title']")
            .or_else(|| meta_content(document, "meta[name='og:title']"))
            .or_else(|| {
                let selector = parse_selector("title")?;
                document
                    .select(&selector)
                    .next()
                    .map(|el| el.text().collect::<String>())
                    .and_then(non_empty)
            })
    }

    /// `og:description`, falling back to `<meta name="description">`.
    fn extract_description(&self, document: &Html) -> Option<String> {
        meta_content(document, "meta[property='og:description']")
            .or_else(|| meta_content(document, "meta[name='og:description']"))
            .or_else(|| meta_content(document, "meta[name='description']"))
    }

    fn extract_image(&self, document: &Html) -> Option<String> {
        meta_content(document, "meta[property='og:image']")
            .or_else(|| meta_content(document, "meta[name='og:image']"))
    }
}

fn parse_selector(selector: &str) -> Option<Selector> {
    match Selector::parse(selector) {
        Ok(selector) => Some(selector),
        Err(e) => {
            PreviewError::UnparsableMetadata(format!("{selector}: {e:?}")).log();
            None
        }
    }
}

/// First matching element's non-blank `content` attribute.
fn meta_content(document: &Html, selector: &str) -> Option<String> {
    let selector = parse_selector(selector)?;
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("content"))
        .find_map(|content| non_empty(content.to_string()))
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(html: &str) -> PageMetadata {
        MetadataExtractor::new().extract(html)
    }

    #[test]
    fn plain_title_and_description() {
        let meta = extract(
            "<title>test title</title><meta name='description' content='simple description'>",
        );
        assert_eq!(meta.title.as_deref(), Some("test title"));
        assert_eq!(meta.description.as_deref(), Some("simple description"));
        assert_eq!(meta.image, None);
    }

    #[test]
    fn open_graph_title_wins() {
        let meta = extract("<title>test</title><meta property='og:title' content='opengraph test'>");
        assert_eq!(meta.title.as_deref(), Some("opengraph test"));
    }

    #[test]
    fn open_graph_description_wins_regardless_of_order() {
        let meta = extract(
            "<meta name='description' content='simple description'>\
             <meta property='og:description' content='opengraph description'>",
        );
        assert_eq!(meta.description.as_deref(), Some("opengraph description"));
    }

    #[test]
    fn blank_open_graph_values_fall_back() {
        let meta = extract(
            "<title>  real title </title><meta property='og:title' content='   '>\
             <meta property='og:description' content=''><meta name='description' content='fallback'>",
        );
        assert_eq!(meta.title.as_deref(), Some("real title"));
        assert_eq!(meta.description.as_deref(), Some("fallback"));
    }

    #[test]
    fn og_image_is_returned_raw() {
        let meta = extract("<meta property='og:image' content='/relative.png'>");
        assert_eq!(meta.image.as_deref(), Some("/relative.png"));
        assert_eq!(meta.title, None);
    }

    #[test]
    fn entities_are_decoded() {
        let meta = extract("<title>Tom &amp; Jerry</title>");
        assert_eq!(meta.title.as_deref(), Some("Tom & Jerry"));
    }

    #[test]
    fn malformed_markup_yields_what_it_can() {
        let meta = extract("<html><head><meta property='og:title' content='ok'><body><div><p>unclosed");
        assert_eq!(meta.title.as_deref(), Some("ok"));
        assert_eq!(meta.description, None);

        assert_eq!(extract(""), PageMetadata::default());
        assert_eq!(extract("\u{0}\u{1}<<<>>>"), PageMetadata::default());
    }

    #[test]
    fn scripts_are_not_metadata() {
        let meta = extract(
            "<script>document.title = 'injected'</script><title>static</title>",
        );
        assert_eq!(meta.title.as_deref(), Some("static"));
    }
}
