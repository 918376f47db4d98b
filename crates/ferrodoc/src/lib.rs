#![doc = include_str!("../README.md")]

pub mod client;
mod config;
mod database;
mod logger;

pub use crate::client::{
    executor::Executor,
    pool::{ClientPool, Lease, LoadGuard},
    retry::RetryBudget,
    rpc::{MessageStream, OutboundStream, RpcClient},
    stream::{Confirmation, DuplexStream, RequestSink, SessionStatus, StreamSession},
    transport::GrpcClient,
};
pub use crate::config::*;
pub use crate::database::*;
pub use crate::logger::*;
// Public re-export so downstream crates can reach the shared types via
// `ferrodoc::ferrodoc_core`
pub use ferrodoc_core;
pub use ferrodoc_core::{Error, Result};
