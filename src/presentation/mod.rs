//! Askama views and response helpers.

pub mod views;
