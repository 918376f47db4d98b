//! # Wire Constants and Method Identifiers
//!
//! Fixed configuration consumed by the execution layer and the set of RPC
//! methods it knows how to issue.
//!
//! ## Constants
//!
//! - [`MAX_REQUEST_RETRIES`] - attempt budget for idempotent calls
//! - [`MAX_CONCURRENT_REQUESTS_PER_CLIENT`] - per-handle multiplexing ceiling
//! - [`DEFAULT_RETRY_DELAY`] - fixed delay between retried attempts
//! - [`PROJECT_ID_PLACEHOLDER`] - substituted with the resolved project id
//!   before a request leaves the process

use core::fmt;
use core::time::Duration;

/// Number of attempts an idempotent request gets before its last error is
/// surfaced.
pub const MAX_REQUEST_RETRIES: usize = 5;

/// Maximum number of operations multiplexed over one client handle.
///
/// Mirrors the backend's limit on concurrent streams per connection.
pub const MAX_CONCURRENT_REQUESTS_PER_CLIENT: usize = 100;

/// Delay applied before every attempt after the first. The first attempt
/// always runs immediately.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Number of begin/commit cycles a transaction gets by default.
pub const DEFAULT_MAX_TRANSACTION_ATTEMPTS: usize = 5;

/// Stands in for the project id in payloads built before it was resolved.
pub const PROJECT_ID_PLACEHOLDER: &str = "{{projectId}}";

/// Database id used when none is configured.
pub const DEFAULT_DATABASE_ID: &str = "(default)";

/// Metadata key carrying the fully-qualified database path for routing.
pub const RESOURCE_PREFIX_HEADER: &str = "google-cloud-resource-prefix";

/// gRPC service all methods belong to.
pub const SERVICE_NAME: &str = "google.firestore.v1.Firestore";

/// RPC methods issued by the execution layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    BatchGetDocuments,
    BeginTransaction,
    Commit,
    Rollback,
    RunQuery,
    Listen,
    Write,
}

impl Method {
    /// Method name as used in request logs.
    pub const fn name(self) -> &'static str {
        match self {
            Self::BatchGetDocuments => "batchGetDocuments",
            Self::BeginTransaction => "beginTransaction",
            Self::Commit => "commit",
            Self::Rollback => "rollback",
            Self::RunQuery => "runQuery",
            Self::Listen => "listen",
            Self::Write => "write",
        }
    }

    /// HTTP/2 path of the method.
    pub const fn path(self) -> &'static str {
        match self {
            Self::BatchGetDocuments => "/google.firestore.v1.Firestore/BatchGetDocuments",
            Self::BeginTransaction => "/google.firestore.v1.Firestore/BeginTransaction",
            Self::Commit => "/google.firestore.v1.Firestore/Commit",
            Self::Rollback => "/google.firestore.v1.Firestore/Rollback",
            Self::RunQuery => "/google.firestore.v1.Firestore/RunQuery",
            Self::Listen => "/google.firestore.v1.Firestore/Listen",
            Self::Write => "/google.firestore.v1.Firestore/Write",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
