//! Core types and trait definitions for the moot forum backend.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Every other crate in the workspace depends on it.

pub mod cache;
pub mod comment;
pub mod error;
pub mod ledger;
pub mod notify;
pub mod post;
pub mod store;
pub mod user;

pub use error::{Error, Result};
