//! Application services layer.

pub mod conversion;
pub mod error;
pub mod repos;
