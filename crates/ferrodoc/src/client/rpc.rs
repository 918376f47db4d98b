use core::future::Future;
use ferrodoc_core::{Error, Result, types::Method};
use futures::stream::BoxStream;
use serde_json::Value;
use tonic::Request;

/// Responses of a streaming call, in arrival order.
pub type MessageStream = BoxStream<'static, Result<Value>>;

/// Requests written into a bidirectional call.
pub type OutboundStream = BoxStream<'static, Value>;

/// One RPC client handle.
///
/// The pool creates handles through a factory and lends them to one
/// operation at a time per slot; implementations are expected to multiplex
/// concurrent calls (a gRPC channel does). Requests arrive already decorated
/// with the resolved project id and the routing header.
pub trait RpcClient: Send + Sync + 'static {
    /// Issues a unary call.
    fn unary(
        &self,
        method: Method,
        request: Request<Value>,
    ) -> impl Future<Output = Result<Value>> + Send;

    /// Opens a server-streaming call.
    fn server_streaming(
        &self,
        method: Method,
        request: Request<Value>,
    ) -> impl Future<Output = Result<MessageStream>> + Send;

    /// Opens a bidirectional call fed by `request`'s body.
    fn streaming(
        &self,
        method: Method,
        request: Request<OutboundStream>,
    ) -> impl Future<Output = Result<MessageStream>> + Send;

    /// Detects the project this handle is authorized for.
    fn detect_project_id(&self) -> impl Future<Output = Result<String>> + Send {
        async { Err(Error::ProjectIdUnavailable) }
    }
}
