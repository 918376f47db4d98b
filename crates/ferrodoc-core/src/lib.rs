//! # `ferrodoc-core`
//!
//! Shared vocabulary for the `ferrodoc` client crates:
//!
//! - [`Error`] / [`Result`] - the unified error type and its transient vs.
//!   terminal classification.
//! - [`path`] - database roots and document paths, including the canonical
//!   document key used to reassemble batched reads.
//! - [`types`] - RPC method identifiers and wire constants.
//! - [`codec`] - the JSON [`tonic::codec::Codec`] used on the wire.

pub mod codec;
mod common;

pub use common::*;
