//! Core of the Telegram channel facade.
//!
//! This crate is intentionally client-agnostic. The MTProto client lives behind
//! ports (traits) implemented in adapter crates; the session pool, failure
//! classification and retry loop only ever see those ports.

pub mod config;
pub mod cursor;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod ports;
pub mod service;
pub mod session;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use errors::{Error, Result};
