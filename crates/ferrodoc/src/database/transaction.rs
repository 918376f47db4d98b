//! Transactions with optimistic-conflict retries.
//!
//! [`run`] drives one logical transaction through
//! `Begin -> Run(user function) -> Commit | Rollback` and repeats the whole
//! cycle when the commit fails, as long as attempts remain. Each retry begins
//! a new transaction that references the failed one so the backend can
//! resolve the conflict in its favour.
//!
//! ## Error Cases
//! - The user function fails: the transaction is rolled back (failures of
//!   the rollback itself are logged and dropped) and the user's error is
//!   returned without retrying.
//! - Commit fails on the last attempt: the commit error is returned.
//! - A read is issued after a write: [`Error::InvalidArgument`].

use crate::{
    client::{executor::Executor, rpc::RpcClient, transport::GrpcClient},
    config::TransactionOptions,
    database::{
        batch_get, query,
        snapshot::DocumentSnapshot,
        write_batch::{CommitResponse, Writes, commit_writes},
    },
    logger::request_tag,
};
use core::future::Future;
use ferrodoc_core::{
    Error, Result,
    path::{DatabaseRoot, DocumentPath},
    types::Method,
};
use futures::TryStreamExt;
use parking_lot::Mutex;
use serde_json::{Map, Value, json};
use std::sync::Arc;

struct State<C> {
    executor: Arc<Executor<C>>,
    root: Arc<DatabaseRoot>,
    id: String,
    writes: Mutex<Writes>,
}

/// Handle to one attempt of a transaction.
///
/// Clones share the same pending writes. Reads must come before writes.
pub struct Transaction<C = GrpcClient> {
    state: Arc<State<C>>,
}

impl<C> Clone for Transaction<C> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<C: RpcClient> Transaction<C> {
    /// Starts a read-write transaction, optionally retrying `previous`.
    pub(crate) async fn begin(executor: Arc<Executor<C>>, previous: Option<&str>) -> Result<Self> {
        let root = executor.root_hint();
        let mut payload = json!({ "database": root.formatted_name() });
        if let Some(previous) = previous {
            payload["options"] = json!({ "readWrite": { "retryTransaction": previous } });
        }

        let response = executor
            .request(Method::BeginTransaction, payload, true)
            .await?;
        let id = response
            .get("transaction")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::unexpected("Begin transaction response without an id"))?
            .to_string();

        Ok(Self {
            state: Arc::new(State {
                executor,
                root,
                id,
                writes: Mutex::new(Writes::default()),
            }),
        })
    }

    /// Backend identifier of this attempt.
    pub fn id(&self) -> &str {
        &self.state.id
    }

    fn ensure_no_writes(&self) -> Result<()> {
        if self.state.writes.lock().is_empty() {
            Ok(())
        } else {
            Err(Error::invalid_argument(
                "Transactions require all reads to be executed before all writes",
            ))
        }
    }

    /// Reads one document inside the transaction.
    pub async fn get(&self, path: &DocumentPath) -> Result<DocumentSnapshot> {
        let mut snapshots = self.get_all(core::slice::from_ref(path)).await?;
        snapshots.pop().ok_or_else(|| Error::MissingResult {
            path: path.canonical_key(),
        })
    }

    /// Reads several documents inside the transaction, in request order.
    pub async fn get_all(&self, paths: &[DocumentPath]) -> Result<Vec<DocumentSnapshot>> {
        self.ensure_no_writes()?;
        batch_get::get_all(&self.state.executor, paths, Some(&self.state.id)).await
    }

    /// Runs a query inside the transaction and collects its documents.
    pub async fn query(
        &self,
        parent: Option<&DocumentPath>,
        structured_query: Value,
    ) -> Result<Vec<DocumentSnapshot>> {
        self.ensure_no_writes()?;
        let session = query::open(
            &self.state.executor,
            parent,
            structured_query,
            Some(&self.state.id),
        )
        .await?;
        query::documents(session).try_collect().await
    }

    pub fn create(&self, path: &DocumentPath, fields: Map<String, Value>) -> &Self {
        self.state.writes.lock().create(&self.state.root, path, fields);
        self
    }

    pub fn set(&self, path: &DocumentPath, fields: Map<String, Value>) -> &Self {
        self.state.writes.lock().set(&self.state.root, path, fields);
        self
    }

    pub fn update(&self, path: &DocumentPath, fields: Map<String, Value>) -> &Self {
        self.state.writes.lock().update(&self.state.root, path, fields);
        self
    }

    pub fn delete(&self, path: &DocumentPath) -> &Self {
        self.state.writes.lock().delete(&self.state.root, path);
        self
    }

    async fn commit(&self) -> Result<CommitResponse> {
        let writes = self.state.writes.lock().take();
        commit_writes(&self.state.executor, writes, Some(&self.state.id)).await
    }

    async fn rollback(&self) -> Result<()> {
        let payload = json!({
            "database": self.state.root.formatted_name(),
            "transaction": self.state.id,
        });
        self.state
            .executor
            .request(Method::Rollback, payload, false)
            .await
            .map(|_| ())
    }
}

/// Runs `f` transactionally, retrying the whole cycle when the commit fails.
///
/// `f` is called once per attempt with a fresh [`Transaction`].
pub(crate) async fn run<C, F, Fut, T, E>(
    executor: &Arc<Executor<C>>,
    options: TransactionOptions,
    mut f: F,
) -> core::result::Result<T, E>
where
    C: RpcClient,
    F: FnMut(Transaction<C>) -> Fut,
    Fut: Future<Output = core::result::Result<T, E>>,
    E: From<Error>,
{
    if options.max_attempts == 0 {
        return Err(Error::invalid_argument("max_attempts must be greater than 0").into());
    }

    let tag = request_tag();
    let logger = executor.logger();
    let mut attempts_remaining = options.max_attempts;
    let mut previous: Option<String> = None;

    loop {
        attempts_remaining -= 1;
        let transaction = Transaction::begin(Arc::clone(executor), previous.as_deref()).await?;

        let result = match f(transaction.clone()).await {
            Ok(result) => result,
            Err(err) => {
                if let Err(rollback_err) = transaction.rollback().await {
                    logger.log(
                        "Transaction::run",
                        &tag,
                        format_args!("Failed to roll back transaction: {rollback_err}"),
                    );
                }
                return Err(err);
            }
        };

        match transaction.commit().await {
            Ok(_) => return Ok(result),
            Err(err) if attempts_remaining > 0 => {
                logger.log(
                    "Transaction::run",
                    &tag,
                    format_args!("Retrying transaction after commit error: {err}"),
                );
                previous = Some(transaction.id().to_string());
            }
            Err(err) => return Err(err.into()),
        }
    }
}
