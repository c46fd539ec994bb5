//! Project and section schema shared by every pass.
//!
//! Stores map their native document shape onto these types; the passes only
//! ever see `Project` and `Section`.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::payload::is_legacy_payload;

/// Store-assigned project identifier.
///
/// For MongoDB this is the 24 character hex form of the document `ObjectId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ProjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProjectId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Section content kind.
///
/// Tags other than `text`, `image` and `gif` are kept verbatim so a whole-array
/// write-back never rewrites a section the passes did not touch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SectionKind {
    Text,
    Image,
    Gif,
    Other(String),
}

impl SectionKind {
    pub fn as_str(&self) -> &str {
        match self {
            SectionKind::Text => "text",
            SectionKind::Image => "image",
            SectionKind::Gif => "gif",
            SectionKind::Other(tag) => tag,
        }
    }
}

impl From<String> for SectionKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "text" => SectionKind::Text,
            "image" => SectionKind::Image,
            "gif" => SectionKind::Gif,
            _ => SectionKind::Other(tag),
        }
    }
}

impl From<SectionKind> for String {
    fn from(kind: SectionKind) -> Self {
        match kind {
            SectionKind::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl Display for SectionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// One ordered content block of a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Sub-document identifier assigned by the store, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: SectionKind,
    #[serde(default)]
    pub content: String,
}

impl Section {
    pub fn new(kind: SectionKind, content: impl Into<String>) -> Self {
        Self {
            id: None,
            kind,
            content: content.into(),
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::new(SectionKind::Text, content)
    }

    pub fn image(content: impl Into<String>) -> Self {
        Self::new(SectionKind::Image, content)
    }

    pub fn gif(content: impl Into<String>) -> Self {
        Self::new(SectionKind::Gif, content)
    }

    pub fn has_legacy_payload(&self) -> bool {
        is_legacy_payload(&self.content)
    }
}

/// A portfolio entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sections: Vec<Section>,
}

impl Project {
    pub fn new(id: impl Into<ProjectId>, name: impl Into<String>, sections: Vec<Section>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            sections,
        }
    }

    /// Indices of sections whose content is a legacy inline payload, in order.
    pub fn legacy_section_indices(&self) -> Vec<usize> {
        self.sections
            .iter()
            .enumerate()
            .filter(|(_, section)| section.has_legacy_payload())
            .map(|(index, _)| index)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_kind_round_trips_known_and_unknown_tags() {
        assert_eq!(SectionKind::from("image".to_string()), SectionKind::Image);
        assert_eq!(SectionKind::from("gif".to_string()), SectionKind::Gif);
        assert_eq!(SectionKind::from("text".to_string()), SectionKind::Text);
        assert_eq!(
            SectionKind::from("video".to_string()),
            SectionKind::Other("video".to_string())
        );
        assert_eq!(String::from(SectionKind::Other("video".into())), "video");
        assert_eq!(String::from(SectionKind::Gif), "gif");
    }

    #[test]
    fn section_serializes_type_field() {
        let section = Section::image("https://res.cloudinary.com/demo/x.png");
        let json = serde_json::to_value(&section).unwrap();
        assert_eq!(json["type"], "image");
        assert_eq!(json["content"], "https://res.cloudinary.com/demo/x.png");
        assert!(json.get("id").is_none());
    }

    #[test]
    fn section_missing_content_reads_as_empty() {
        let section: Section = serde_json::from_str(r#"{"type":"text"}"#).unwrap();
        assert_eq!(section.content, "");
        assert_eq!(section.kind, SectionKind::Text);
    }

    #[test]
    fn legacy_section_indices_follow_section_order() {
        let project = Project::new(
            "p1",
            "Harbour House",
            vec![
                Section::text("intro"),
                Section::image("data:image/png;base64,AAAA"),
                Section::image("https://res.cloudinary.com/demo/a.png"),
                Section::gif("data:image/gif;base64,R0lG"),
            ],
        );
        assert_eq!(project.legacy_section_indices(), vec![1, 3]);
    }
}
