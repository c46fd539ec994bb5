//! Section content classification used by the verification pass.

use serde::{Deserialize, Serialize};

use crate::payload::is_legacy_payload;

pub const DEFAULT_HOSTED_URL_MARKER: &str = "res.cloudinary.com";
pub const DEFAULT_PLACEHOLDER_MARKER: &str = "[image removed]";

/// Classification of a non-empty content string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentClass {
    HostedUrl,
    LegacyPayload,
    Placeholder,
    Other,
}

/// Classifies section content against the configured markers.
///
/// Precedence: legacy payload prefix, then hosted URL marker, then placeholder
/// marker, else other.
#[derive(Debug, Clone)]
pub struct ContentClassifier {
    hosted_url_marker: String,
    placeholder_marker: String,
}

impl Default for ContentClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_HOSTED_URL_MARKER, DEFAULT_PLACEHOLDER_MARKER)
    }
}

impl ContentClassifier {
    pub fn new(
        hosted_url_marker: impl Into<String>,
        placeholder_marker: impl Into<String>,
    ) -> Self {
        Self {
            hosted_url_marker: hosted_url_marker.into(),
            placeholder_marker: placeholder_marker.into(),
        }
    }

    /// Returns `None` for empty content.
    pub fn classify(&self, content: &str) -> Option<ContentClass> {
        if content.is_empty() {
            return None;
        }
        if is_legacy_payload(content) {
            Some(ContentClass::LegacyPayload)
        } else if !self.hosted_url_marker.is_empty() && content.contains(&self.hosted_url_marker) {
            Some(ContentClass::HostedUrl)
        } else if !self.placeholder_marker.is_empty()
            && content.contains(&self.placeholder_marker)
        {
            Some(ContentClass::Placeholder)
        } else {
            Some(ContentClass::Other)
        }
    }
}

/// Per-class section counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCounts {
    pub hosted_url: u64,
    pub legacy_payload: u64,
    pub placeholder: u64,
    pub other: u64,
    pub empty: u64,
}

impl ClassCounts {
    pub fn record(&mut self, class: Option<ContentClass>) {
        match class {
            Some(ContentClass::HostedUrl) => self.hosted_url += 1,
            Some(ContentClass::LegacyPayload) => self.legacy_payload += 1,
            Some(ContentClass::Placeholder) => self.placeholder += 1,
            Some(ContentClass::Other) => self.other += 1,
            None => self.empty += 1,
        }
    }

    pub fn merge(&mut self, other: &ClassCounts) {
        self.hosted_url += other.hosted_url;
        self.legacy_payload += other.legacy_payload;
        self.placeholder += other.placeholder;
        self.other += other.other;
        self.empty += other.empty;
    }

    pub fn total(&self) -> u64 {
        self.hosted_url + self.legacy_payload + self.placeholder + self.other + self.empty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_each_kind_of_content() {
        let classifier = ContentClassifier::default();
        assert_eq!(
            classifier.classify("https://res.cloudinary.com/demo/image/upload/a.png"),
            Some(ContentClass::HostedUrl)
        );
        assert_eq!(
            classifier.classify("data:image/png;base64,AAAA"),
            Some(ContentClass::LegacyPayload)
        );
        assert_eq!(
            classifier.classify("[image removed]"),
            Some(ContentClass::Placeholder)
        );
        assert_eq!(
            classifier.classify("A timber pavilion by the lake"),
            Some(ContentClass::Other)
        );
        assert_eq!(classifier.classify(""), None);
    }

    #[test]
    fn legacy_prefix_takes_precedence_over_markers() {
        let classifier = ContentClassifier::new("data:image", "data");
        assert_eq!(
            classifier.classify("data:image/png;base64,AAAA"),
            Some(ContentClass::LegacyPayload)
        );
    }

    #[test]
    fn custom_markers() {
        let classifier = ContentClassifier::new("cdn.example.com", "(removed)");
        assert_eq!(
            classifier.classify("https://cdn.example.com/x.png"),
            Some(ContentClass::HostedUrl)
        );
        assert_eq!(
            classifier.classify("https://res.cloudinary.com/x.png"),
            Some(ContentClass::Other)
        );
        assert_eq!(
            classifier.classify("(removed)"),
            Some(ContentClass::Placeholder)
        );
    }

    #[test]
    fn counts_record_and_merge() {
        let mut a = ClassCounts::default();
        a.record(Some(ContentClass::HostedUrl));
        a.record(None);
        let mut b = ClassCounts::default();
        b.record(Some(ContentClass::LegacyPayload));
        b.record(Some(ContentClass::Other));
        a.merge(&b);
        assert_eq!(a.hosted_url, 1);
        assert_eq!(a.legacy_payload, 1);
        assert_eq!(a.other, 1);
        assert_eq!(a.empty, 1);
        assert_eq!(a.total(), 4);
    }
}
