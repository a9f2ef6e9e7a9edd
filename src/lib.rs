//! Bolacha - an HTTP client that keeps its session and uploads files
//!
//! A [`Client`] wraps a pluggable [`Transport`] and shapes every request on
//! the way out:
//!
//! - **Form bodies** given as [`Fields`] are URL-encoded, or sent as
//!   `multipart/form-data` as soon as any field is a [`FileField`]
//! - **Session cookies** from one response are replayed in the next request
//! - **Non-persistent clients** echo the server's `connection` header instead
//! - **Validation** of URL and method happens before anything is sent
//!
//! The bundled [`HttpTransport`] runs on reqwest; tests and embedders can
//! supply their own transport through [`ClientBuilder::transport`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bolacha::{Client, Fields, FieldValue, FileField};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::new()?;
//!
//!     let mut upload = Fields::new();
//!     upload.insert("title".into(), FieldValue::from("licence"));
//!     upload.insert("file".into(), FileField::open("gpl-2.0.tex")?.into());
//!
//!     let response = client.post("http://localhost:5050/upload", upload, None).await?;
//!     println!("Status: {}", response.status());
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod request;
pub mod response;
pub mod error;
pub mod transport;
pub mod session;
pub mod multipart;

// Re-export main types for convenience
pub use client::{Client, ClientBuilder};
pub use request::{Body, Headers, Method};
pub use response::Response;
pub use error::{Error, Result};
pub use multipart::{FieldValue, Fields, FileField};
pub use session::Session;
pub use transport::{HttpTransport, Transport, TransportBuilder, TransportConfig};

// Re-export common traits
pub use async_trait::async_trait;
