//! Folio: content server that converts documents to downloadable formats on request.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
