//! gRPC transport.
//!
//! [`GrpcClient`] issues calls over a tonic [`Channel`] using the JSON codec
//! from [`ferrodoc_core::codec`]. Channels connect lazily, so building a
//! handle never blocks and a dead endpoint surfaces as a code-less
//! [`Error::Transport`] on the first call, which the executor retries.

use crate::{
    client::rpc::{MessageStream, OutboundStream, RpcClient},
    config::Settings,
};
use ferrodoc_core::{Error, Result, codec::JsonCodec, types::Method};
use futures::{StreamExt, TryStreamExt};
use serde_json::Value;
use tonic::{
    Request,
    client::Grpc,
    codegen::http::uri::PathAndQuery,
    transport::{Channel, Endpoint},
};

/// One client handle bound to a single channel.
#[derive(Clone, Debug)]
pub struct GrpcClient {
    inner: Grpc<Channel>,
    project_id: Option<String>,
}

impl GrpcClient {
    pub fn new(channel: Channel, project_id: Option<String>) -> Self {
        Self {
            inner: Grpc::new(channel),
            project_id,
        }
    }

    /// Endpoint described by `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for a malformed URI.
    pub fn endpoint(settings: &Settings) -> Result<Endpoint> {
        Endpoint::from_shared(settings.endpoint.clone()).map_err(|e| {
            Error::invalid_argument(format!("Invalid endpoint \"{}\": {e}", settings.endpoint))
        })
    }

    async fn ready(&self) -> Result<Grpc<Channel>> {
        let mut grpc = self.inner.clone();
        grpc.ready().await.map_err(|e| Error::Transport {
            context: format!("Service was not ready: {e}"),
        })?;
        Ok(grpc)
    }
}

impl RpcClient for GrpcClient {
    async fn unary(&self, method: Method, request: Request<Value>) -> Result<Value> {
        let mut grpc = self.ready().await?;
        let response = grpc
            .unary(request, PathAndQuery::from_static(method.path()), JsonCodec)
            .await?;
        Ok(response.into_inner())
    }

    async fn server_streaming(&self, method: Method, request: Request<Value>) -> Result<MessageStream> {
        let mut grpc = self.ready().await?;
        let response = grpc
            .server_streaming(request, PathAndQuery::from_static(method.path()), JsonCodec)
            .await?;
        Ok(response.into_inner().map_err(Error::from).boxed())
    }

    async fn streaming(
        &self,
        method: Method,
        request: Request<OutboundStream>,
    ) -> Result<MessageStream> {
        let mut grpc = self.ready().await?;
        let response = grpc
            .streaming(request, PathAndQuery::from_static(method.path()), JsonCodec)
            .await?;
        Ok(response.into_inner().map_err(Error::from).boxed())
    }

    async fn detect_project_id(&self) -> Result<String> {
        self.project_id.clone().ok_or(Error::ProjectIdUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_endpoint() {
        let settings = Settings::default().with_endpoint("not a uri");
        assert!(matches!(
            GrpcClient::endpoint(&settings),
            Err(Error::InvalidArgument { .. })
        ));
    }

    #[tokio::test]
    async fn detects_configured_project_only() {
        let channel = GrpcClient::endpoint(&Settings::default())
            .unwrap()
            .connect_lazy();
        let configured = GrpcClient::new(channel.clone(), Some("demo".to_string()));
        assert_eq!(configured.detect_project_id().await.unwrap(), "demo");

        let anonymous = GrpcClient::new(channel, None);
        assert!(matches!(
            anonymous.detect_project_id().await,
            Err(Error::ProjectIdUnavailable)
        ));
    }
}
