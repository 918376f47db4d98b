mod error;
pub mod path;
pub mod types;

pub use error::*;
