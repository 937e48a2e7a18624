//! Infrastructure adapters and runtime bootstrap.

pub mod content;
pub mod error;
pub mod http;
pub mod process;
pub mod scratch;
pub mod telemetry;
