use crate::{
    client::{executor::Executor, rpc::RpcClient, stream::StreamSession},
    database::snapshot::DocumentSnapshot,
};
use ferrodoc_core::{Result, path::{DatabaseRoot, DocumentPath}, types::Method};
use futures::{TryStreamExt, stream::BoxStream};
use serde_json::{Value, json};

/// Query results in the order the backend sends them.
pub type DocumentStream = BoxStream<'static, Result<DocumentSnapshot>>;

/// `RunQuery` payload. Without a `parent` the query runs against the
/// database's root collections.
pub(crate) fn payload(
    root: &DatabaseRoot,
    parent: Option<&DocumentPath>,
    structured_query: Value,
    transaction: Option<&str>,
) -> Value {
    let parent = match parent {
        Some(parent) => parent.formatted_name(root),
        None => root.documents_name(),
    };
    let mut payload = json!({
        "parent": parent,
        "structuredQuery": structured_query,
    });
    if let Some(transaction) = transaction {
        payload["transaction"] = Value::String(transaction.to_string());
    }
    payload
}

pub(crate) async fn open<C: RpcClient>(
    executor: &Executor<C>,
    parent: Option<&DocumentPath>,
    structured_query: Value,
    transaction: Option<&str>,
) -> Result<StreamSession> {
    let payload = payload(&executor.root_hint(), parent, structured_query, transaction);
    executor.read_stream(Method::RunQuery, payload, true).await
}

/// Maps raw responses to snapshots. Responses without a document only report
/// progress and are skipped.
pub(crate) fn documents(session: StreamSession) -> DocumentStream {
    Box::pin(session.try_filter_map(|response| async move {
        let read_time = response.get("readTime").and_then(Value::as_str);
        response
            .get("document")
            .map(|document| DocumentSnapshot::from_document(document, read_time))
            .transpose()
    }))
}
