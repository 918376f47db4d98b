use ferrodoc_core::{Error, Result, path::DocumentPath};
use serde::Serialize;
use serde_json::{Map, Value};

/// A document as read at one point in time.
///
/// Field values are kept in their wire encoding; timestamps are the RFC 3339
/// strings the backend sends. Serializes as `{path, exists, fields,
/// createTime, updateTime, readTime}` with `fields: null` for a missing
/// document.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSnapshot {
    path: DocumentPath,
    exists: bool,
    fields: Option<Map<String, Value>>,
    create_time: Option<String>,
    update_time: Option<String>,
    read_time: Option<String>,
}

impl DocumentSnapshot {
    /// Snapshot of an existing document (`{name, fields, createTime,
    /// updateTime}`).
    pub(crate) fn from_document(document: &Value, read_time: Option<&str>) -> Result<Self> {
        let name = document
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::unexpected("Document without a name"))?;
        let fields = match document.get("fields") {
            Some(Value::Object(fields)) => fields.clone(),
            None | Some(Value::Null) => Map::new(),
            Some(other) => {
                return Err(Error::unexpected(format!(
                    "Document fields must be an object, got {other}"
                )));
            }
        };
        Ok(Self {
            path: DocumentPath::from_resource_name(name)?,
            exists: true,
            fields: Some(fields),
            create_time: string_field(document, "createTime"),
            update_time: string_field(document, "updateTime"),
            read_time: read_time.map(str::to_string),
        })
    }

    pub(crate) fn missing(path: DocumentPath, read_time: Option<&str>) -> Self {
        Self {
            path,
            exists: false,
            fields: None,
            create_time: None,
            update_time: None,
            read_time: read_time.map(str::to_string),
        }
    }

    /// Interprets one `BatchGetDocuments` response, which reports either a
    /// `found` document or a `missing` resource name.
    pub(crate) fn from_batch_get_response(response: &Value) -> Result<Self> {
        let read_time = response.get("readTime").and_then(Value::as_str);
        if let Some(document) = response.get("found") {
            return Self::from_document(document, read_time);
        }
        if let Some(name) = response.get("missing").and_then(Value::as_str) {
            return Ok(Self::missing(DocumentPath::from_resource_name(name)?, read_time));
        }
        Err(Error::unexpected(format!(
            "Batch get response carries neither a document nor a missing name: {response}"
        )))
    }

    pub fn path(&self) -> &DocumentPath {
        &self.path
    }

    pub fn id(&self) -> &str {
        self.path.id()
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    /// All fields, or `None` for a missing document.
    pub fn fields(&self) -> Option<&Map<String, Value>> {
        self.fields.as_ref()
    }

    /// A single top-level field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.as_ref()?.get(field)
    }

    pub fn create_time(&self) -> Option<&str> {
        self.create_time.as_deref()
    }

    pub fn update_time(&self) -> Option<&str> {
        self.update_time.as_deref()
    }

    pub fn read_time(&self) -> Option<&str> {
        self.read_time.as_deref()
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn found_response_carries_fields_and_times() {
        let response = json!({
            "found": {
                "name": "projects/demo/databases/(default)/documents/users/alice",
                "fields": {"age": {"integerValue": "42"}},
                "createTime": "2024-01-01T00:00:00Z",
                "updateTime": "2024-01-02T00:00:00Z",
            },
            "readTime": "2024-01-03T00:00:00Z",
        });
        let snapshot = DocumentSnapshot::from_batch_get_response(&response).unwrap();
        assert!(snapshot.exists());
        assert_eq!(snapshot.id(), "alice");
        assert_eq!(snapshot.get("age"), Some(&json!({"integerValue": "42"})));
        assert_eq!(snapshot.update_time(), Some("2024-01-02T00:00:00Z"));
        assert_eq!(snapshot.read_time(), Some("2024-01-03T00:00:00Z"));

        let wire = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(wire["exists"], true);
        assert_eq!(wire["fields"], json!({"age": {"integerValue": "42"}}));
        assert_eq!(wire["createTime"], "2024-01-01T00:00:00Z");
    }

    #[test]
    fn missing_response_has_no_fields() {
        let response = json!({
            "missing": "projects/demo/databases/(default)/documents/users/bob",
            "readTime": "2024-01-03T00:00:00Z",
        });
        let snapshot = DocumentSnapshot::from_batch_get_response(&response).unwrap();
        assert!(!snapshot.exists());
        assert_eq!(snapshot.path().canonical_key(), "users/bob");
        assert!(snapshot.get("age").is_none());
    }

    #[test]
    fn serializes_with_wire_names() {
        let snapshot = DocumentSnapshot::missing(DocumentPath::parse("users/bob").unwrap(), Some("t"));
        assert_eq!(
            serde_json::to_value(&snapshot).unwrap(),
            json!({
                "path": "users/bob",
                "exists": false,
                "fields": null,
                "createTime": null,
                "updateTime": null,
                "readTime": "t",
            })
        );
    }

    #[test]
    fn rejects_response_without_result() {
        let response = json!({"transaction": "abc"});
        assert!(matches!(
            DocumentSnapshot::from_batch_get_response(&response),
            Err(Error::UnexpectedResponse { .. })
        ));
    }
}
