//! NSE market data for calendar-spread research.
//!
//! This crate provides:
//! - An explicit cookie session shared by all requests
//! - A rate-limited REST client with retries
//! - A per-symbol JSON cache of raw contract bars
//! - `NseDataSource`, the live implementation of the core data traits

pub mod cache;
pub mod client;
pub mod error;
pub mod session;
pub mod source;

pub use cache::ContractCache;
pub use client::NseClient;
pub use error::NseError;
pub use session::SessionManager;
pub use source::NseDataSource;
