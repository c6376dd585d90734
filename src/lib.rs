//! Linkvault - the link registry core of a URL shortener
//!
//! This library maps long URLs to short, unique codes and resolves codes
//! back to URLs. It is consumed by an HTTP layer that supplies owner
//! identity and rendering of full short links; nothing here speaks HTTP.
//!
//! # Architecture
//! - `utils`: short-code generation and URL validation
//! - `repository`: storage contract and backends (sea-orm, file, memory)
//! - `services`: link business rules and the concurrent deletion pipeline
//! - `config`: configuration management
//! - `errors`: crate-wide error taxonomy

pub mod config;
pub mod errors;
pub mod logging;
pub mod repository;
pub mod services;
pub mod structs;
pub mod utils;

pub use errors::{LinkvaultError, Result};
pub use repository::{CreateOutcome, Repository, RepositoryFactory};
pub use services::{LinkService, ShortenOutcome, ShortenRequest};
pub use structs::Link;
