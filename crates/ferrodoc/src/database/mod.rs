//! Database entry point.
//!
//! [`Database`] is a cheap, cloneable handle over one shared [`Executor`].
//! Every operation here is built from the executor's three call shapes:
//! batched reads and queries are read streams, `listen` is a read-write
//! stream, and everything else is a unary request.

mod batch_get;
mod query;
mod snapshot;
mod transaction;
mod write_batch;

pub use query::DocumentStream;
pub use snapshot::DocumentSnapshot;
pub use transaction::Transaction;
pub use write_batch::{CommitResponse, WriteBatch, WriteResult};

use crate::{
    client::{
        executor::Executor,
        rpc::RpcClient,
        stream::{DuplexStream, StreamSession},
        transport::GrpcClient,
    },
    config::{Settings, TransactionOptions},
};
use core::future::Future;
use ferrodoc_core::{
    Error, Result,
    path::{DatabaseRoot, DocumentPath},
    types::Method,
};
use serde_json::{Value, json};
use std::{sync::Arc, time::SystemTime};

/// Handle to one database.
pub struct Database<C = GrpcClient> {
    executor: Arc<Executor<C>>,
}

impl<C> Clone for Database<C> {
    fn clone(&self) -> Self {
        Self {
            executor: Arc::clone(&self.executor),
        }
    }
}

impl Database<GrpcClient> {
    /// Creates a database handle over gRPC channels to `settings.endpoint`.
    ///
    /// Channels connect lazily on first use; each pooled handle owns its own
    /// channel. Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for invalid settings or a malformed
    /// endpoint.
    pub fn connect(settings: Settings) -> Result<Self> {
        let endpoint = GrpcClient::endpoint(&settings)?;
        let project_id = settings.project_id.clone();
        Self::with_factory(settings, move || {
            GrpcClient::new(endpoint.connect_lazy(), project_id.clone())
        })
    }
}

impl<C: RpcClient> Database<C> {
    /// Creates a database handle whose pool builds handles with `factory`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for invalid settings.
    pub fn with_factory<F>(settings: Settings, factory: F) -> Result<Self>
    where
        F: Fn() -> C + Send + Sync + 'static,
    {
        Ok(Self {
            executor: Arc::new(Executor::new(settings, factory)?),
        })
    }

    /// Resolves (once) and returns the database root.
    pub async fn database_root(&self) -> Result<Arc<DatabaseRoot>> {
        self.executor.database_root().await
    }

    /// Reads one document.
    pub async fn get(&self, path: &DocumentPath) -> Result<DocumentSnapshot> {
        let mut snapshots = self.get_all(core::slice::from_ref(path)).await?;
        snapshots.pop().ok_or_else(|| Error::MissingResult {
            path: path.canonical_key(),
        })
    }

    /// Reads several documents with one call. Results follow the order of
    /// `paths`; duplicates are fetched once and repeated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingResult`] if the backend did not report on
    /// every requested document.
    pub async fn get_all(&self, paths: &[DocumentPath]) -> Result<Vec<DocumentSnapshot>> {
        batch_get::get_all(&self.executor, paths, None).await
    }

    pub fn batch(&self) -> WriteBatch<C> {
        WriteBatch::new(Arc::clone(&self.executor))
    }

    /// Runs `f` in a transaction with default options.
    pub async fn run_transaction<F, Fut, T, E>(&self, f: F) -> core::result::Result<T, E>
    where
        F: FnMut(Transaction<C>) -> Fut,
        Fut: Future<Output = core::result::Result<T, E>>,
        E: From<Error>,
    {
        self.run_transaction_with(TransactionOptions::default(), f)
            .await
    }

    /// Runs `f` in a transaction, committing its writes when it succeeds.
    ///
    /// A failed commit restarts the transaction, calling `f` again, until
    /// `options.max_attempts` cycles have run. An error from `f` rolls the
    /// transaction back and is returned as is.
    pub async fn run_transaction_with<F, Fut, T, E>(
        &self,
        options: TransactionOptions,
        f: F,
    ) -> core::result::Result<T, E>
    where
        F: FnMut(Transaction<C>) -> Fut,
        Fut: Future<Output = core::result::Result<T, E>>,
        E: From<Error>,
    {
        transaction::run(&self.executor, options, f).await
    }

    /// Runs a structured query and streams the matching documents.
    pub async fn run_query(
        &self,
        parent: Option<&DocumentPath>,
        structured_query: Value,
    ) -> Result<DocumentStream> {
        let session = self.query_stream(parent, structured_query).await?;
        Ok(query::documents(session))
    }

    /// Runs a structured query and returns the raw response stream.
    pub async fn query_stream(
        &self,
        parent: Option<&DocumentPath>,
        structured_query: Value,
    ) -> Result<StreamSession> {
        query::open(&self.executor, parent, structured_query, None).await
    }

    /// Opens a `Listen` stream for `target` (a listen target message without
    /// the database name). Further requests, e.g. additional targets, go
    /// through the returned stream's sink.
    pub async fn listen(&self, target: Value) -> Result<DuplexStream> {
        let initial = json!({
            "database": self.executor.root_hint().formatted_name(),
            "addTarget": target,
        });
        self.executor
            .read_write_stream(Method::Listen, initial, true)
            .await
    }

    /// Time of the most recent successful call, for diagnostics.
    pub fn last_successful_request(&self) -> Option<SystemTime> {
        self.executor.last_successful_request()
    }

    pub fn executor(&self) -> &Arc<Executor<C>> {
        &self.executor
    }
}
