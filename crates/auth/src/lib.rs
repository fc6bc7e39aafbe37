//! # Lumara Auth
//!
//! Credential primitives consumed by the Lumara API client layer.
//!
//! This crate contains:
//! - Token types (`TokenPair`) with expiry metadata
//! - The `CredentialStore` capability trait plus an in-memory
//!   implementation
//! - The `TokenRefresher` seam the client invokes to exchange a refresh
//!   token for a fresh access/refresh pair
//!
//! ## Architecture
//! - Defines the seams; the client crate coordinates them
//! - Holds no HTTP code: refresh transport is the application's concern
//! - Token material is owned by the store, never cached elsewhere

#![forbid(unsafe_code)]

pub mod refresher;
pub mod store;
pub mod types;

// Re-export commonly used items
pub use refresher::TokenRefresher;
pub use store::{CredentialStore, MemoryCredentialStore};
pub use types::{RefreshError, TokenPair};
