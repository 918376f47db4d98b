//! Batched document reads.
//!
//! One `BatchGetDocuments` stream serves any number of requested documents.
//! Duplicate requests are collapsed before sending; results arrive in no
//! particular order and are put back into the caller's order afterwards.
//!
//! ## Error Cases
//! - `MissingResult`: the stream ended without a result for some requested
//!   document. The whole call fails and partial results are discarded.
//! - `UnexpectedResponse`: a response carried neither a document nor a
//!   missing-document name.

use crate::{
    client::{executor::Executor, rpc::RpcClient},
    database::snapshot::DocumentSnapshot,
};
use ferrodoc_core::{Error, Result, path::DocumentPath, types::Method};
use futures::TryStreamExt;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};

pub(crate) async fn get_all<C: RpcClient>(
    executor: &Executor<C>,
    paths: &[DocumentPath],
    transaction: Option<&str>,
) -> Result<Vec<DocumentSnapshot>> {
    if paths.is_empty() {
        return Ok(Vec::new());
    }

    let root = executor.root_hint();
    let mut seen = HashSet::with_capacity(paths.len());
    let documents: Vec<Value> = paths
        .iter()
        .filter(|path| seen.insert(path.canonical_key()))
        .map(|path| Value::String(path.formatted_name(&root)))
        .collect();

    let mut payload = json!({
        "database": root.formatted_name(),
        "documents": documents,
    });
    if let Some(transaction) = transaction {
        payload["transaction"] = Value::String(transaction.to_string());
    }

    let mut stream = executor
        .read_stream(Method::BatchGetDocuments, payload, true)
        .await?;

    let mut results = HashMap::with_capacity(seen.len());
    while let Some(response) = stream.try_next().await? {
        let snapshot = DocumentSnapshot::from_batch_get_response(&response)?;
        results.insert(snapshot.path().canonical_key(), snapshot);
    }

    reorder(paths, &results)
}

/// Rebuilds results in request order, repeating a snapshot for every
/// duplicate request of the same document.
fn reorder(
    paths: &[DocumentPath],
    results: &HashMap<String, DocumentSnapshot>,
) -> Result<Vec<DocumentSnapshot>> {
    paths
        .iter()
        .map(|path| {
            let key = path.canonical_key();
            results
                .get(&key)
                .cloned()
                .ok_or(Error::MissingResult { path: key })
        })
        .collect()
}
