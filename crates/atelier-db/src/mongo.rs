//! MongoDB content store.
//!
//! Project documents are read as raw BSON and mapped onto the shared schema.
//! The raw `_id` and `sections` array of the most recently read project are
//! kept so a write-back targets the stored `_id` as it was typed and starts
//! from the stored element documents: fields the schema does not model (and
//! untouched sections as a whole) are written back as they were read.

use crate::traits::{ContentStore, ProjectStream, ScanOptions, StoreError, StoreResult};
use async_trait::async_trait;
use atelier_core::{Project, ProjectId, Section, SectionKind, StoreConfig};
use futures::StreamExt;
use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use mongodb::error::{Error as MongoError, ErrorKind};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection};
use std::sync::{Arc, Mutex};

const APP_NAME: &str = "atelier-media";

/// Raw `_id` and element documents of the last project handed out by a scan.
#[derive(Debug)]
struct RawSections {
    project_id: ProjectId,
    id: Bson,
    sections: Vec<Document>,
}

/// MongoDB store implementation
#[derive(Clone)]
pub struct MongoContentStore {
    client: Client,
    collection: Collection<Document>,
    database: String,
    last_read: Arc<Mutex<Option<RawSections>>>,
}

impl MongoContentStore {
    /// Create a client for the configured database and collection.
    ///
    /// The driver connects lazily; call `ping` to validate the connection.
    #[tracing::instrument(skip(config), fields(db.collection = %config.collection))]
    pub async fn connect(config: &StoreConfig) -> StoreResult<Self> {
        let mut options = ClientOptions::parse(&config.uri)
            .await
            .map_err(|e| StoreError::ConfigError(format!("Invalid MONGODB_URI: {}", e)))?;
        options.app_name = Some(APP_NAME.to_string());

        let database = config
            .database
            .clone()
            .or_else(|| options.default_database.clone())
            .ok_or_else(|| {
                StoreError::ConfigError(
                    "MONGODB_DATABASE not set and MONGODB_URI names no database".to_string(),
                )
            })?;

        let client = Client::with_options(options)
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;
        let collection = client
            .database(&database)
            .collection::<Document>(&config.collection);

        tracing::debug!(db.name = %database, "MongoDB client created");

        Ok(Self {
            client,
            collection,
            database,
            last_read: Arc::new(Mutex::new(None)),
        })
    }

    /// Close pooled connections and stop background monitoring.
    pub async fn shutdown(self) {
        tracing::debug!(db.name = %self.database, "Shutting down MongoDB client");
        self.client.shutdown().await;
    }

    fn remember(last_read: &Mutex<Option<RawSections>>, raw: RawSections) {
        if let Ok(mut guard) = last_read.lock() {
            *guard = Some(raw);
        }
    }

    /// Take the cached raw document if it belongs to `id`.
    fn take_raw(&self, id: &ProjectId) -> Option<RawSections> {
        let mut guard = self.last_read.lock().ok()?;
        match guard.take() {
            Some(raw) if raw.project_id == *id => Some(raw),
            Some(raw) => {
                tracing::warn!(
                    project_id = %id,
                    cached_project_id = %raw.project_id,
                    "Raw document not available for write-back, rebuilding from schema"
                );
                None
            }
            None => None,
        }
    }
}

/// Section `_id` value: ObjectId when the id parses as one, string otherwise.
fn id_value(id: &str) -> Bson {
    match ObjectId::parse_str(id) {
        Ok(oid) => Bson::ObjectId(oid),
        Err(_) => Bson::String(id.to_string()),
    }
}

/// Filter for a project known only by its string id. A 24-hex id may be
/// stored as an ObjectId or as a plain string.
fn id_filter(id: &ProjectId) -> Document {
    match ObjectId::parse_str(id.as_str()) {
        Ok(oid) => doc! { "_id": { "$in": [oid, id.as_str()] } },
        Err(_) => doc! { "_id": id.as_str() },
    }
}

fn id_to_string(value: Option<&Bson>) -> Option<String> {
    match value {
        Some(Bson::ObjectId(oid)) => Some(oid.to_hex()),
        Some(Bson::String(s)) => Some(s.clone()),
        _ => None,
    }
}

fn is_connection_error(err: &MongoError) -> bool {
    matches!(
        *err.kind,
        ErrorKind::Io(_)
            | ErrorKind::ServerSelection { .. }
            | ErrorKind::ConnectionPoolCleared { .. }
    )
}

/// Map a stored project document onto the schema, returning its raw parts.
fn decode_project(document: Document) -> StoreResult<(Project, RawSections)> {
    let raw_id = document.get("_id").cloned().unwrap_or(Bson::Null);
    let id = id_to_string(Some(&raw_id)).ok_or_else(|| StoreError::Unreadable {
        id: match raw_id {
            Bson::Null => "<missing>".to_string(),
            ref other => other.to_string(),
        },
        message: "_id is neither an ObjectId nor a string".to_string(),
    })?;

    let name = document.get_str("name").unwrap_or_default().to_string();

    let raw_sections: Vec<Document> = match document.get("sections") {
        None | Some(Bson::Null) => Vec::new(),
        Some(Bson::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(index, item)| match item {
                Bson::Document(section) => Ok(section.clone()),
                other => Err(StoreError::Unreadable {
                    id: id.clone(),
                    message: format!("section {} is not a document: {}", index, other),
                }),
            })
            .collect::<StoreResult<_>>()?,
        Some(other) => {
            return Err(StoreError::Unreadable {
                id,
                message: format!("sections is not an array: {:?}", other.element_type()),
            })
        }
    };

    let sections = raw_sections.iter().map(decode_section).collect();
    let project = Project::new(ProjectId::new(id), name, sections);
    let raw = RawSections {
        project_id: project.id.clone(),
        id: raw_id,
        sections: raw_sections,
    };

    Ok((project, raw))
}

fn decode_section(raw: &Document) -> Section {
    let kind = SectionKind::from(raw.get_str("type").unwrap_or_default().to_string());
    let content = raw.get_str("content").unwrap_or_default().to_string();
    Section {
        id: id_to_string(raw.get("_id")),
        kind,
        content,
    }
}

fn encode_section(section: &Section) -> Document {
    let mut encoded = Document::new();
    if let Some(ref id) = section.id {
        encoded.insert("_id", id_value(id));
    }
    encoded.insert("type", section.kind.as_str());
    encoded.insert("content", section.content.as_str());
    encoded
}

/// Overlay schema fields onto a stored element, touching only what changed.
///
/// Missing or non-string values decode to an empty string, so they compare
/// equal to an untouched empty field and are left as stored.
fn merge_section(mut raw: Document, section: &Section) -> Document {
    if raw.get_str("type").unwrap_or_default() != section.kind.as_str() {
        raw.insert("type", section.kind.as_str());
    }
    if raw.get_str("content").unwrap_or_default() != section.content {
        raw.insert("content", section.content.as_str());
    }
    raw
}

#[async_trait]
impl ContentStore for MongoContentStore {
    #[tracing::instrument(skip(self), fields(db.system = "mongodb", db.operation = "ping"))]
    async fn ping(&self) -> StoreResult<()> {
        self.client
            .database(&self.database)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;
        Ok(())
    }

    #[tracing::instrument(
        skip(self),
        fields(
            db.system = "mongodb",
            db.collection = %self.collection.name(),
            db.operation = "find"
        )
    )]
    async fn stream_projects(&self, options: &ScanOptions) -> StoreResult<ProjectStream<'_>> {
        let filter = match options.project_id {
            Some(ref id) => id_filter(id),
            None => doc! {},
        };

        let cursor = self
            .collection
            .find(filter)
            .projection(doc! { "name": 1, "sections": 1 })
            .batch_size(options.batch_size.max(1))
            .await
            .map_err(|e| {
                if is_connection_error(&e) {
                    StoreError::ConnectionFailed(e.to_string())
                } else {
                    StoreError::QueryFailed(e.to_string())
                }
            })?;

        let last_read = Arc::clone(&self.last_read);
        let stream = cursor.map(move |item| -> StoreResult<Project> {
            let document = item.map_err(|e| StoreError::QueryFailed(e.to_string()))?;
            let (project, raw) = decode_project(document)?;
            Self::remember(&last_read, raw);
            Ok(project)
        });

        Ok(Box::pin(stream))
    }

    #[tracing::instrument(
        skip(self, sections),
        fields(
            db.system = "mongodb",
            db.collection = %self.collection.name(),
            db.operation = "update",
            db.record_id = %id,
            sections = sections.len()
        )
    )]
    async fn replace_sections(&self, id: &ProjectId, sections: &[Section]) -> StoreResult<()> {
        let raw = self.take_raw(id);
        let filter = match raw {
            Some(ref raw) => doc! { "_id": raw.id.clone() },
            None => id_filter(id),
        };
        let raw_sections = raw
            .map(|raw| raw.sections)
            .filter(|raw| raw.len() == sections.len());

        let encoded: Vec<Bson> = match raw_sections {
            Some(raw) => raw
                .into_iter()
                .zip(sections)
                .map(|(raw, section)| Bson::Document(merge_section(raw, section)))
                .collect(),
            None => sections
                .iter()
                .map(|section| Bson::Document(encode_section(section)))
                .collect(),
        };

        let result = self
            .collection
            .update_one(filter, doc! { "$set": { "sections": encoded } })
            .await
            .map_err(|e| {
                if is_connection_error(&e) {
                    StoreError::ConnectionFailed(e.to_string())
                } else {
                    StoreError::WriteFailed(e.to_string())
                }
            })?;

        if result.matched_count == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }

        tracing::debug!(
            project_id = %id,
            modified = result.modified_count,
            "Sections replaced"
        );

        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "mongodb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored_project() -> Document {
        doc! {
            "_id": ObjectId::parse_str("64b7f0c2a1b2c3d4e5f60718").unwrap(),
            "name": "Harbour House",
            "sections": [
                {
                    "_id": ObjectId::parse_str("64b7f0c2a1b2c3d4e5f60719").unwrap(),
                    "type": "image",
                    "content": "data:image/png;base64,AAAA",
                },
                { "type": "text", "content": "hello", "caption": "kept" },
                { "type": "gif" },
            ],
        }
    }

    #[test]
    fn decodes_project_document() {
        let (project, raw) = decode_project(stored_project()).unwrap();
        assert_eq!(project.id.as_str(), "64b7f0c2a1b2c3d4e5f60718");
        assert_eq!(project.name, "Harbour House");
        assert_eq!(project.sections.len(), 3);
        assert_eq!(raw.sections.len(), 3);
        assert!(matches!(raw.id, Bson::ObjectId(_)));
        assert_eq!(
            project.sections[0].id.as_deref(),
            Some("64b7f0c2a1b2c3d4e5f60719")
        );
        assert_eq!(project.sections[0].kind, SectionKind::Image);
        assert!(project.sections[0].has_legacy_payload());
        assert_eq!(project.sections[1].content, "hello");
        assert_eq!(project.sections[2].kind, SectionKind::Gif);
        assert_eq!(project.sections[2].content, "");
    }

    #[test]
    fn missing_sections_and_name_are_tolerated() {
        let (project, raw) = decode_project(doc! { "_id": "legacy-slug" }).unwrap();
        assert_eq!(project.id.as_str(), "legacy-slug");
        assert_eq!(project.name, "");
        assert!(project.sections.is_empty());
        assert!(raw.sections.is_empty());
    }

    #[test]
    fn malformed_sections_make_the_document_unreadable() {
        let err = decode_project(doc! { "_id": "p1", "sections": "oops" }).unwrap_err();
        assert!(matches!(err, StoreError::Unreadable { .. }));

        let err = decode_project(doc! { "_id": "p1", "sections": [1, 2] }).unwrap_err();
        assert!(matches!(err, StoreError::Unreadable { ref id, .. } if id == "p1"));

        let err = decode_project(doc! { "name": "no id" }).unwrap_err();
        assert!(err.is_document_scoped());
    }

    #[test]
    fn merge_keeps_untouched_elements_identical() {
        let (project, raw) = decode_project(stored_project()).unwrap();
        let raw = raw.sections;
        let merged = merge_section(raw[1].clone(), &project.sections[1]);
        assert_eq!(merged, raw[1]);
        // Missing content stays missing when the section was not rewritten.
        let merged = merge_section(raw[2].clone(), &project.sections[2]);
        assert_eq!(merged, raw[2]);
    }

    #[test]
    fn merge_rewrites_content_and_keeps_element_id() {
        let (mut project, raw) = decode_project(stored_project()).unwrap();
        let raw = raw.sections;
        project.sections[0].content = "https://res.cloudinary.com/studio/x.png".to_string();
        let merged = merge_section(raw[0].clone(), &project.sections[0]);
        assert_eq!(
            merged.get_str("content").unwrap(),
            "https://res.cloudinary.com/studio/x.png"
        );
        assert_eq!(merged.get("_id"), raw[0].get("_id"));
        assert_eq!(merged.get_str("type").unwrap(), "image");
    }

    #[test]
    fn encode_section_uses_object_id_when_possible() {
        let section = Section {
            id: Some("64b7f0c2a1b2c3d4e5f60719".to_string()),
            kind: SectionKind::Image,
            content: "".to_string(),
        };
        let encoded = encode_section(&section);
        assert!(matches!(encoded.get("_id"), Some(Bson::ObjectId(_))));
        assert_eq!(encoded.get_str("type").unwrap(), "image");
        assert_eq!(encoded.get_str("content").unwrap(), "");
    }

    #[test]
    fn hex_string_ids_keep_their_stored_type() {
        let stored = doc! { "_id": "64b7f0c2a1b2c3d4e5f60718", "sections": [] };
        let (project, raw) = decode_project(stored).unwrap();
        assert_eq!(project.id.as_str(), "64b7f0c2a1b2c3d4e5f60718");
        assert_eq!(raw.id, Bson::String("64b7f0c2a1b2c3d4e5f60718".to_string()));
    }

    #[test]
    fn id_filter_matches_either_id_type() {
        let oid = ObjectId::parse_str("64b7f0c2a1b2c3d4e5f60718").unwrap();
        assert_eq!(
            id_filter(&ProjectId::from("64b7f0c2a1b2c3d4e5f60718")),
            doc! { "_id": { "$in": [oid, "64b7f0c2a1b2c3d4e5f60718"] } }
        );
        assert_eq!(
            id_filter(&ProjectId::from("harbour-house")),
            doc! { "_id": "harbour-house" }
        );
    }
}
