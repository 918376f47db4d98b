//! Atomic writes.
//!
//! A [`WriteBatch`] collects create, set, update and delete operations and
//! applies them in a single `Commit` call. Commits are not idempotent, so
//! they get exactly one attempt.

use crate::client::{executor::Executor, rpc::RpcClient, transport::GrpcClient};
use ferrodoc_core::{
    Error, Result,
    path::{DatabaseRoot, DocumentPath},
    types::Method,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::Arc;

/// Outcome of a commit.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitResponse {
    pub commit_time: Option<String>,
    /// One entry per write, in the order the writes were added.
    #[serde(default)]
    pub write_results: Vec<WriteResult>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResult {
    /// Last update time of the document after the write. Absent for
    /// deletes and no-op writes.
    pub update_time: Option<String>,
}

impl CommitResponse {
    fn from_response(response: Value) -> Result<Self> {
        serde_json::from_value(response)
            .map_err(|e| Error::unexpected(format!("Malformed commit response: {e}")))
    }
}

/// Wire form of the pending writes.
#[derive(Clone, Debug, Default)]
pub(crate) struct Writes {
    writes: Vec<Value>,
}

impl Writes {
    pub(crate) fn create(&mut self, root: &DatabaseRoot, path: &DocumentPath, fields: Map<String, Value>) {
        self.writes.push(json!({
            "update": document(root, path, fields),
            "currentDocument": {"exists": false},
        }));
    }

    pub(crate) fn set(&mut self, root: &DatabaseRoot, path: &DocumentPath, fields: Map<String, Value>) {
        self.writes.push(json!({ "update": document(root, path, fields) }));
    }

    pub(crate) fn update(&mut self, root: &DatabaseRoot, path: &DocumentPath, fields: Map<String, Value>) {
        let mask: Vec<String> = fields.keys().map(|key| field_path(key)).collect();
        self.writes.push(json!({
            "update": document(root, path, fields),
            "updateMask": {"fieldPaths": mask},
            "currentDocument": {"exists": true},
        }));
    }

    pub(crate) fn delete(&mut self, root: &DatabaseRoot, path: &DocumentPath) {
        self.writes
            .push(json!({ "delete": path.formatted_name(root) }));
    }

    pub(crate) fn len(&self) -> usize {
        self.writes.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub(crate) fn take(&mut self) -> Vec<Value> {
        std::mem::take(&mut self.writes)
    }
}

fn document(root: &DatabaseRoot, path: &DocumentPath, fields: Map<String, Value>) -> Value {
    json!({
        "name": path.formatted_name(root),
        "fields": fields,
    })
}

/// Escapes a top-level field name for use in an update mask. Names that are
/// not plain identifiers are backtick-quoted.
fn field_path(name: &str) -> String {
    let mut chars = name.chars();
    let simple = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        name.to_string()
    } else {
        format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

/// Sends `writes` in one non-retried `Commit`, inside `transaction` if given.
pub(crate) async fn commit_writes<C: RpcClient>(
    executor: &Executor<C>,
    writes: Vec<Value>,
    transaction: Option<&str>,
) -> Result<CommitResponse> {
    let mut payload = json!({
        "database": executor.root_hint().formatted_name(),
        "writes": writes,
    });
    if let Some(transaction) = transaction {
        payload["transaction"] = Value::String(transaction.to_string());
    }
    let response = executor.request(Method::Commit, payload, false).await?;
    CommitResponse::from_response(response)
}

/// A set of writes applied atomically by [`commit`](Self::commit).
pub struct WriteBatch<C = GrpcClient> {
    executor: Arc<Executor<C>>,
    root: Arc<DatabaseRoot>,
    writes: Writes,
}

impl<C: RpcClient> WriteBatch<C> {
    pub(crate) fn new(executor: Arc<Executor<C>>) -> Self {
        let root = executor.root_hint();
        Self {
            executor,
            root,
            writes: Writes::default(),
        }
    }

    /// Creates a document; the commit fails if it already exists.
    pub fn create(&mut self, path: &DocumentPath, fields: Map<String, Value>) -> &mut Self {
        self.writes.create(&self.root, path, fields);
        self
    }

    /// Overwrites a document, creating it if needed.
    pub fn set(&mut self, path: &DocumentPath, fields: Map<String, Value>) -> &mut Self {
        self.writes.set(&self.root, path, fields);
        self
    }

    /// Replaces the given top-level fields of an existing document; the
    /// commit fails if it does not exist.
    pub fn update(&mut self, path: &DocumentPath, fields: Map<String, Value>) -> &mut Self {
        self.writes.update(&self.root, path, fields);
        self
    }

    pub fn delete(&mut self, path: &DocumentPath) -> &mut Self {
        self.writes.delete(&self.root, path);
        self
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Applies every write atomically.
    ///
    /// # Errors
    ///
    /// Returns the backend's error; the call is not retried.
    pub async fn commit(mut self) -> Result<CommitResponse> {
        commit_writes(&self.executor, self.writes.take(), None).await
    }
}
