//! Stream health gating.
//!
//! A freshly opened streaming call is not handed to its consumer until it is
//! confirmed live: a read stream must deliver its first event (data or end),
//! a bidirectional stream must have been accepted with its initial request.
//! A call that fails before that point is rejected as a whole, so the
//! executor can transparently retry it. A call that succeeds is handed over
//! without losing anything observed during the check.
//!
//! ## States
//!
//! - Pending - nothing observed yet. This is the [`StreamSession::initialize`]
//!   future itself; no session exists until it resolves.
//! - `Released` - owned by the consumer. Holds at most one replayed event:
//!   the first message, or the end of the stream if it ended before release.
//! - `Ended` - terminal. The end has been delivered.
//! - `Errored` - terminal. Holds the error until it is delivered once.

use crate::client::{pool::LoadGuard, rpc::MessageStream};
use core::{
    pin::Pin,
    task::{Context, Poll},
};
use ferrodoc_core::{Error, Result, path::DatabaseRoot};
use futures::{
    Stream, StreamExt,
    stream::FusedStream,
};
use pin_project_lite::pin_project;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

/// What confirms that a freshly opened call is alive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Confirmation {
    /// The first event (message or end) has been observed.
    FirstEvent,
    /// The call was accepted together with its initial request.
    InitialRequest,
}

/// Consumer-facing view of the session state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    Released,
    Ended,
    Errored,
}

#[derive(Debug)]
enum Replay {
    Message(Value),
    End,
}

#[derive(Debug)]
enum SessionState {
    Released { replay: Option<Replay> },
    Ended,
    Errored { pending: Option<Error> },
}

/// A streaming call that has passed the health check.
///
/// Yields the call's messages in arrival order. After an error it yields that
/// error exactly once and then ends.
pub struct StreamSession<S = MessageStream> {
    inner: S,
    state: SessionState,
    lease: Option<LoadGuard>,
}

impl<S> StreamSession<S>
where
    S: Stream<Item = Result<Value>> + Unpin,
{
    /// Waits until `inner` is confirmed live and releases it.
    ///
    /// # Errors
    ///
    /// Returns the call's own error if it fails before confirmation; no
    /// session is produced in that case.
    pub async fn initialize(mut inner: S, confirmation: Confirmation) -> Result<Self> {
        let replay = match confirmation {
            Confirmation::InitialRequest => None,
            Confirmation::FirstEvent => match inner.next().await {
                Some(Ok(message)) => Some(Replay::Message(message)),
                Some(Err(err)) => return Err(err),
                None => Some(Replay::End),
            },
        };

        Ok(Self {
            inner,
            state: SessionState::Released { replay },
            lease: None,
        })
    }

    /// Ties the pool slot of the handle that opened this call to the
    /// session's lifetime. The slot is freed at end, error or drop.
    pub fn hold(&mut self, lease: LoadGuard) {
        self.lease = Some(lease);
    }

    pub fn status(&self) -> SessionStatus {
        match self.state {
            SessionState::Released { .. } => SessionStatus::Released,
            SessionState::Ended => SessionStatus::Ended,
            SessionState::Errored { .. } => SessionStatus::Errored,
        }
    }
}

impl<S> Stream for StreamSession<S>
where
    S: Stream<Item = Result<Value>> + Unpin,
{
    type Item = Result<Value>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match &mut this.state {
                SessionState::Released { replay } => {
                    let end = match replay.take() {
                        Some(Replay::Message(message)) => return Poll::Ready(Some(Ok(message))),
                        Some(Replay::End) => true,
                        None => match Pin::new(&mut this.inner).poll_next(cx) {
                            Poll::Pending => return Poll::Pending,
                            Poll::Ready(Some(Ok(message))) => {
                                return Poll::Ready(Some(Ok(message)));
                            }
                            Poll::Ready(Some(Err(err))) => {
                                this.state = SessionState::Errored { pending: Some(err) };
                                false
                            }
                            Poll::Ready(None) => true,
                        },
                    };
                    if end {
                        this.state = SessionState::Ended;
                        this.lease = None;
                        return Poll::Ready(None);
                    }
                }
                SessionState::Ended => return Poll::Ready(None),
                SessionState::Errored { pending } => {
                    this.lease = None;
                    return Poll::Ready(pending.take().map(Err));
                }
            }
        }
    }
}

impl<S> FusedStream for StreamSession<S>
where
    S: Stream<Item = Result<Value>> + Unpin,
{
    fn is_terminated(&self) -> bool {
        matches!(
            self.state,
            SessionState::Ended | SessionState::Errored { pending: None }
        )
    }
}

pin_project! {
    /// Substitutes the project id placeholder in every outbound message.
    pub struct DecoratedOutbound<S> {
        #[pin]
        inner: S,
        root: Arc<DatabaseRoot>,
    }
}

impl<S> DecoratedOutbound<S> {
    pub fn new(inner: S, root: Arc<DatabaseRoot>) -> Self {
        Self { inner, root }
    }
}

impl<S> Stream for DecoratedOutbound<S>
where
    S: Stream<Item = Value>,
{
    type Item = Value;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        this.inner.poll_next(cx).map(|message| {
            message.map(|mut message| {
                crate::client::executor::substitute_project_id(&mut message, this.root.project_id());
                message
            })
        })
    }
}

/// Write half of a bidirectional call.
///
/// Messages are decorated with the resolved project id on their way out.
/// Dropping every sink half-closes the call.
#[derive(Clone, Debug)]
pub struct RequestSink {
    tx: mpsc::Sender<Value>,
}

impl RequestSink {
    pub(crate) fn new(tx: mpsc::Sender<Value>) -> Self {
        Self { tx }
    }

    /// Queues `message` for the call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the call has already shut down.
    pub async fn send(&self, message: Value) -> Result<()> {
        self.tx.send(message).await.map_err(|_| Error::Transport {
            context: "Request stream is closed".to_string(),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A released bidirectional call.
pub struct DuplexStream {
    sink: RequestSink,
    responses: StreamSession,
}

impl DuplexStream {
    pub(crate) fn new(sink: RequestSink, responses: StreamSession) -> Self {
        Self { sink, responses }
    }

    pub fn sink(&self) -> &RequestSink {
        &self.sink
    }

    /// Shorthand for `self.sink().send(message)`.
    ///
    /// # Errors
    ///
    /// See [`RequestSink::send`].
    pub async fn send(&self, message: Value) -> Result<()> {
        self.sink.send(message).await
    }

    pub fn split(self) -> (RequestSink, StreamSession) {
        (self.sink, self.responses)
    }
}

impl Stream for DuplexStream {
    type Item = Result<Value>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().responses.poll_next_unpin(cx)
    }
}
