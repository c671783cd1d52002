use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Turns the leading bytes of a stored file into preview text.
pub trait PreviewExtractor: Send + Sync {
    fn name(&self) -> &'static str;
    /// At most `max_chars` characters of text from `prefix`.
    fn extract(&self, prefix: &[u8], max_chars: usize) -> anyhow::Result<String>;
}

/// Reads the bytes as UTF-8; invalid sequences become U+FFFD.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextExtractor;

impl PreviewExtractor for TextExtractor {
    fn name(&self) -> &'static str {
        "text"
    }

    fn extract(&self, prefix: &[u8], max_chars: usize) -> anyhow::Result<String> {
        Ok(String::from_utf8_lossy(prefix).chars().take(max_chars).collect())
    }
}

/// Extractors keyed by lowercase file extension, with a fallback for everything else.
pub struct ExtractorRegistry {
    by_ext: HashMap<String, Arc<dyn PreviewExtractor>>,
    fallback: Arc<dyn PreviewExtractor>,
}

const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "csv", "json", "html", "xml", "tex", "rs", "py"];

impl ExtractorRegistry {
    pub fn new(fallback: Arc<dyn PreviewExtractor>) -> Self {
        Self {
            by_ext: HashMap::new(),
            fallback,
        }
    }

    pub fn with_builtin() -> Self {
        let text: Arc<dyn PreviewExtractor> = Arc::new(TextExtractor);
        let mut registry = Self::new(text.clone());
        for ext in TEXT_EXTENSIONS {
            registry.register(ext, text.clone());
        }
        registry
    }

    pub fn register(&mut self, ext: &str, extractor: Arc<dyn PreviewExtractor>) {
        self.by_ext.insert(ext.to_ascii_lowercase(), extractor);
    }

    pub fn for_key(&self, key: &str) -> &dyn PreviewExtractor {
        let found = Path::new(key)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(|e| self.by_ext.get(&e.to_ascii_lowercase()))
            .unwrap_or(&self.fallback);
        &**found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Shouting;

    impl PreviewExtractor for Shouting {
        fn name(&self) -> &'static str {
            "shouting"
        }

        fn extract(&self, prefix: &[u8], max_chars: usize) -> anyhow::Result<String> {
            Ok(TextExtractor.extract(prefix, max_chars)?.to_uppercase())
        }
    }

    #[test]
    fn text_extractor_truncates_on_char_boundaries() {
        let text = "é".repeat(300);
        let out = TextExtractor.extract(text.as_bytes(), 200).unwrap();
        assert_eq!(out.chars().count(), 200);
        assert!(out.chars().all(|c| c == 'é'));
    }

    #[test]
    fn text_extractor_keeps_short_files_whole() {
        assert_eq!(TextExtractor.extract(b"short notes", 200).unwrap(), "short notes");
        assert_eq!(TextExtractor.extract(b"", 200).unwrap(), "");
    }

    #[test]
    fn text_extractor_is_lossy_on_invalid_utf8() {
        let out = TextExtractor.extract(&[b'a', 0xff, b'b'], 200).unwrap();
        assert_eq!(out, "a\u{fffd}b");
    }

    #[test]
    fn registry_picks_by_extension_and_falls_back() {
        let mut registry = ExtractorRegistry::with_builtin();
        registry.register("SHOUT", Arc::new(Shouting));

        assert_eq!(registry.for_key("file-1.txt").name(), "text");
        assert_eq!(registry.for_key("file-1.shout").name(), "shouting");
        assert_eq!(registry.for_key("file-1.pdf").name(), "text");
        assert_eq!(registry.for_key("file-1").name(), "text");
    }
}
