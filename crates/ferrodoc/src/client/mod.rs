pub mod executor;
pub mod pool;
pub mod retry;
pub mod rpc;
pub mod stream;
pub mod transport;
