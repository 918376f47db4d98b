//! Request execution.
//!
//! [`Executor`] is the single funnel every RPC goes through. It resolves the
//! database root once, decorates payloads (placeholder project id and the
//! routing header), borrows a handle from the [`ClientPool`], and drives the
//! call through the retry policy in [`retry`](crate::client::retry).
//!
//! ## Variants
//!
//! - [`Executor::request`] - unary call; retried on the handle it borrowed.
//! - [`Executor::read_stream`] - server-streaming call, released once its
//!   first event arrives.
//! - [`Executor::read_write_stream`] - bidirectional call, released once it
//!   accepts its initial request; every written message is decorated.
//!
//! Each attempt of a streaming call opens a fresh stream. A stream that
//! failed before release is discarded and never reaches the caller.

use crate::{
    client::{
        pool::ClientPool,
        retry::{RetryBudget, retry},
        rpc::RpcClient,
        stream::{Confirmation, DecoratedOutbound, DuplexStream, RequestSink, StreamSession},
    },
    config::Settings,
    logger::{Logger, request_tag},
};
use ferrodoc_core::{
    Error, Result,
    path::DatabaseRoot,
    types::{MAX_REQUEST_RETRIES, Method, PROJECT_ID_PLACEHOLDER, RESOURCE_PREFIX_HEADER},
};
use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::Value;
use std::{sync::Arc, time::SystemTime};
use tokio::sync::{OnceCell, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, metadata::AsciiMetadataValue};

/// Buffered outbound messages of a bidirectional call.
const OUTBOUND_BUFFER: usize = 16;

/// Replaces every occurrence of the project id placeholder in string values
/// of `value`, at any depth.
pub fn substitute_project_id(value: &mut Value, project_id: &str) {
    match value {
        Value::String(s) if s.contains(PROJECT_ID_PLACEHOLDER) => {
            *s = s.replace(PROJECT_ID_PLACEHOLDER, project_id);
        }
        Value::Array(items) => {
            for item in items {
                substitute_project_id(item, project_id);
            }
        }
        Value::Object(fields) => {
            for field in fields.values_mut() {
                substitute_project_id(field, project_id);
            }
        }
        _ => {}
    }
}

/// A payload ready to be sent, plus the routing header for its database.
struct Decorated {
    payload: Value,
    resource_prefix: AsciiMetadataValue,
}

impl Decorated {
    fn new(mut payload: Value, root: &DatabaseRoot) -> Result<Self> {
        substitute_project_id(&mut payload, root.project_id());
        Ok(Self {
            payload,
            resource_prefix: routing_header(root)?,
        })
    }

    /// A fresh request for one attempt.
    fn unary(&self) -> Request<Value> {
        self.wrap(self.payload.clone())
    }

    fn wrap<T>(&self, body: T) -> Request<T> {
        let mut request = Request::new(body);
        request
            .metadata_mut()
            .insert(RESOURCE_PREFIX_HEADER, self.resource_prefix.clone());
        request
    }
}

fn routing_header(root: &DatabaseRoot) -> Result<AsciiMetadataValue> {
    root.formatted_name()
        .parse()
        .map_err(|_| Error::invalid_argument(format!("Invalid database path: {}", root.formatted_name())))
}

/// Funnels calls through pooled handles with retries.
pub struct Executor<C> {
    pool: ClientPool<C>,
    settings: Settings,
    root: OnceCell<Arc<DatabaseRoot>>,
    last_success: Mutex<Option<SystemTime>>,
}

impl<C: RpcClient> Executor<C> {
    /// Builds an executor whose pool creates handles with `factory`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `settings` do not validate.
    pub fn new<F>(settings: Settings, factory: F) -> Result<Self>
    where
        F: Fn() -> C + Send + Sync + 'static,
    {
        settings.validate()?;
        let root = match &settings.project_id {
            Some(project_id) => OnceCell::new_with(Some(Arc::new(DatabaseRoot::new(
                project_id.as_str(),
                settings.database_id.as_str(),
            )?))),
            None => OnceCell::new(),
        };
        Ok(Self {
            pool: ClientPool::new(settings.max_concurrency, factory),
            settings,
            root,
            last_success: Mutex::new(None),
        })
    }

    /// The resolved database root.
    ///
    /// Without a configured project id the first caller detects it through a
    /// pooled handle; concurrent callers wait for that single detection.
    ///
    /// # Errors
    ///
    /// Propagates the detection failure. A later call tries again.
    pub async fn database_root(&self) -> Result<Arc<DatabaseRoot>> {
        let root = self
            .root
            .get_or_try_init(|| async {
                let project_id = self
                    .pool
                    .run(|client| async move { client.detect_project_id().await })
                    .await?;
                self.settings.logger.log(
                    "Executor::database_root",
                    "",
                    format_args!("Detected project id: {project_id}"),
                );
                DatabaseRoot::new(project_id, self.settings.database_id.as_str()).map(Arc::new)
            })
            .await?;
        Ok(Arc::clone(root))
    }

    /// The resolved root if known, otherwise one carrying the project id
    /// placeholder. Payloads built from it are fixed up before sending.
    pub fn root_hint(&self) -> Arc<DatabaseRoot> {
        self.root.get().cloned().unwrap_or_else(|| {
            Arc::new(DatabaseRoot::unresolved(self.settings.database_id.as_str()))
        })
    }

    /// Issues a unary call.
    ///
    /// With `allow_retries` the call gets [`MAX_REQUEST_RETRIES`] attempts;
    /// without it, exactly one.
    ///
    /// # Errors
    ///
    /// Returns the first terminal error, or the last transient one once the
    /// budget is spent.
    pub async fn request(&self, method: Method, payload: Value, allow_retries: bool) -> Result<Value> {
        self.request_tagged(method, payload, &request_tag(), allow_retries)
            .await
    }

    /// [`request`](Self::request) with a caller-supplied tag, so the call's
    /// log records correlate with the caller's own.
    pub async fn request_tagged(
        &self,
        method: Method,
        payload: Value,
        tag: &str,
        allow_retries: bool,
    ) -> Result<Value> {
        let root = self.database_root().await?;
        let decorated = Decorated::new(payload, &root)?;
        let logger = self.logger();
        logger.log(
            method.name(),
            tag,
            format_args!("Sending request: {}", decorated.payload),
        );

        let decorated = &decorated;
        let response = self
            .pool
            .run(|client| {
                retry(self.budget(allow_retries), logger, method.name(), tag, move || {
                    let client = Arc::clone(&client);
                    async move { client.unary(method, decorated.unary()).await }
                })
            })
            .await?;

        logger.log(
            method.name(),
            tag,
            format_args!("Received response: {response}"),
        );
        self.mark_success();
        Ok(response)
    }

    /// Opens a server-streaming call and returns it once its first event
    /// has arrived.
    ///
    /// The handle's pool slot stays occupied until the returned session is
    /// dropped or finishes.
    ///
    /// # Errors
    ///
    /// Same classification as [`request`](Self::request), applied to
    /// failures before release.
    pub async fn read_stream(
        &self,
        method: Method,
        payload: Value,
        allow_retries: bool,
    ) -> Result<StreamSession> {
        let tag = request_tag();
        let root = self.database_root().await?;
        let decorated = Decorated::new(payload, &root)?;
        let logger = self.logger();
        logger.log(
            method.name(),
            &tag,
            format_args!("Sending request: {}", decorated.payload),
        );

        let lease = self.pool.acquire();
        let client = Arc::clone(lease.client());
        let decorated = &decorated;
        let mut session = retry(self.budget(allow_retries), logger, method.name(), &tag, move || {
            let client = Arc::clone(&client);
            async move {
                let stream = client.server_streaming(method, decorated.unary()).await?;
                StreamSession::initialize(stream, Confirmation::FirstEvent).await
            }
        })
        .await?;
        session.hold(lease.into_guard());

        logger.log(method.name(), &tag, format_args!("Received stream"));
        self.mark_success();
        Ok(session)
    }

    /// Opens a bidirectional call with `initial` as its first request.
    ///
    /// Every message written through the returned sink, `initial` included,
    /// gets the resolved project id substituted.
    ///
    /// # Errors
    ///
    /// Same classification as [`request`](Self::request), applied to
    /// failures before release.
    pub async fn read_write_stream(
        &self,
        method: Method,
        initial: Value,
        allow_retries: bool,
    ) -> Result<DuplexStream> {
        let tag = request_tag();
        let root = self.database_root().await?;
        let decorated = Decorated::new(initial, &root)?;
        let logger = self.logger();
        logger.log(
            method.name(),
            &tag,
            format_args!("Sending request: {}", decorated.payload),
        );

        let lease = self.pool.acquire();
        let client = Arc::clone(lease.client());
        let (decorated, root_ref) = (&decorated, &root);
        let (sink, mut session) =
            retry(self.budget(allow_retries), logger, method.name(), &tag, move || {
                let client = Arc::clone(&client);
                async move {
                    let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
                    tx.try_send(decorated.payload.clone()).map_err(|_| Error::Transport {
                        context: "Unable to queue initial request".to_string(),
                    })?;
                    let outbound =
                        DecoratedOutbound::new(ReceiverStream::new(rx), Arc::clone(root_ref))
                            .boxed();
                    let stream = client.streaming(method, decorated.wrap(outbound)).await?;
                    let session =
                        StreamSession::initialize(stream, Confirmation::InitialRequest).await?;
                    Ok((RequestSink::new(tx), session))
                }
            })
            .await?;
        session.hold(lease.into_guard());

        logger.log(method.name(), &tag, format_args!("Opened stream"));
        self.mark_success();
        Ok(DuplexStream::new(sink, session))
    }

    fn budget(&self, allow_retries: bool) -> RetryBudget {
        let attempts = if allow_retries { MAX_REQUEST_RETRIES } else { 1 };
        RetryBudget::new(attempts, self.settings.retry_delay)
    }
}

impl<C> Executor<C> {
    fn mark_success(&self) {
        *self.last_success.lock() = Some(SystemTime::now());
    }

    /// Time of the most recent successful call. Diagnostics only.
    pub fn last_successful_request(&self) -> Option<SystemTime> {
        *self.last_success.lock()
    }

    pub fn logger(&self) -> &Logger {
        &self.settings.logger
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn pool(&self) -> &ClientPool<C> {
        &self.pool
    }
}
