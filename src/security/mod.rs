//! Header-level privacy and exposure controls.
//!
//! # Data Flow
//! ```text
//! Inbound request headers
//!     → identity.rs (passthrough subset + spoofed forwarded-for / UA / via)
//!     → outbound origin request
//!
//! Origin response headers
//!     → headers.rs (allow-list projection, cross-origin headers)
//!     → client response
//! ```

pub mod headers;
pub mod identity;

pub use identity::IdentityMasker;
