//! Resource paths.
//!
//! A [`DatabaseRoot`] names one database of one project. A [`DocumentPath`]
//! is a document's slash-separated path relative to that root; its string
//! form is the canonical document key used to match batched read results
//! back to requests.

use crate::{Error, Result, types::PROJECT_ID_PLACEHOLDER};
use core::fmt;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Fully-qualified database identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DatabaseRoot {
    project_id: String,
    database_id: String,
}

impl DatabaseRoot {
    /// Creates a root, rejecting empty ids.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if either id is empty.
    pub fn new(project_id: impl Into<String>, database_id: impl Into<String>) -> Result<Self> {
        let project_id = project_id.into();
        let database_id = database_id.into();
        if project_id.is_empty() {
            return Err(Error::invalid_argument("Project id must be a non-empty string"));
        }
        if database_id.is_empty() {
            return Err(Error::invalid_argument("Database id must be a non-empty string"));
        }
        Ok(Self {
            project_id,
            database_id,
        })
    }

    /// A root whose project id has not been resolved yet.
    pub fn unresolved(database_id: impl Into<String>) -> Self {
        Self {
            project_id: PROJECT_ID_PLACEHOLDER.to_string(),
            database_id: database_id.into(),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn database_id(&self) -> &str {
        &self.database_id
    }

    /// `projects/{project}/databases/{database}`
    pub fn formatted_name(&self) -> String {
        format!(
            "projects/{}/databases/{}",
            self.project_id, self.database_id
        )
    }

    /// `projects/{project}/databases/{database}/documents`
    pub fn documents_name(&self) -> String {
        format!("{}/documents", self.formatted_name())
    }
}

/// Path of a document relative to its database root, e.g. `users/alice`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentPath {
    segments: Vec<String>,
}

impl DocumentPath {
    /// Parses a relative document path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for empty segments or a path that
    /// points at a collection (odd segment count).
    pub fn parse(path: &str) -> Result<Self> {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            return Err(Error::invalid_argument("Path must be a non-empty string"));
        }
        if trimmed.contains("//") {
            return Err(Error::invalid_argument(format!(
                "Paths must not contain //: \"{path}\""
            )));
        }
        let segments: Vec<String> = trimmed.split('/').map(str::to_string).collect();
        if segments.len() % 2 != 0 {
            return Err(Error::invalid_argument(format!(
                "Path \"{path}\" does not point to a document: it has an odd number of segments"
            )));
        }
        Ok(Self { segments })
    }

    /// Extracts the relative path from a fully-qualified resource name of the
    /// form `projects/{p}/databases/{d}/documents/{path}`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedResponse`] when the name has a different
    /// shape; resource names come from the backend.
    pub fn from_resource_name(name: &str) -> Result<Self> {
        let mut parts = name.splitn(6, '/');
        let shape = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        );
        match shape {
            (Some("projects"), Some(_), Some("databases"), Some(_), Some("documents"), Some(rest)) => {
                Self::parse(rest).map_err(|_| Error::unexpected(format!("Invalid resource name: {name}")))
            }
            _ => Err(Error::unexpected(format!("Invalid resource name: {name}"))),
        }
    }

    /// Last segment.
    pub fn id(&self) -> &str {
        self.segments.last().map_or("", String::as_str)
    }

    /// Id of the collection containing the document.
    pub fn collection_id(&self) -> &str {
        &self.segments[self.segments.len() - 2]
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Canonical document key: the slash-joined relative path.
    pub fn canonical_key(&self) -> String {
        self.segments.join("/")
    }

    /// Fully-qualified resource name under `root`.
    pub fn formatted_name(&self, root: &DatabaseRoot) -> String {
        format!("{}/{}", root.documents_name(), self.canonical_key())
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical_key())
    }
}

impl core::str::FromStr for DocumentPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

// Serialized as the canonical key.
impl Serialize for DocumentPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.canonical_key())
    }
}

impl<'de> Deserialize<'de> for DocumentPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
