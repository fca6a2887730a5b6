//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest` (range requests, streaming bodies,
//!   15 second connect/read timeouts)
//! - `FileSystemAccess` using `tokio::fs`
//! - `StorageTelemetry` using `sysinfo` disk enumeration
//!
//! The media engine and system signals have no desktop default; hosts supply
//! their own player and forward OS notifications.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, SysinfoStorageTelemetry, TokioFileSystem};
//!
//! #[tokio::main]
//! async fn main() -> bridge_traits::error::Result<()> {
//!     let http_client = ReqwestHttpClient::new()?;
//!     let fs = TokioFileSystem::new();
//!     let telemetry = SysinfoStorageTelemetry::new(fs.get_cache_directory().await?);
//!     Ok(())
//! }
//! ```

mod filesystem;
mod http;
mod telemetry;

pub use filesystem::TokioFileSystem;
pub use http::{ReqwestHttpClient, DEFAULT_TIMEOUT};
pub use telemetry::SysinfoStorageTelemetry;
