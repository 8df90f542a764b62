//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → assembler.rs (state machine for one relay request)
//!         → request.rs (query → ProxyRequest)
//!         → origin fetch / transcode
//!         → response.rs (redirect, decoy, transcoded, bypass)
//!     → Send to client
//! ```

pub mod assembler;
pub mod request;
pub mod response;
pub mod server;

pub use request::{ProxyRequest, X_REQUEST_ID};
pub use server::{AppState, RelayServer};
