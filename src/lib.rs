//! Landmark-based audio fingerprinting and recognition.
//!
//! Audio is decoded to mono samples, cut into Hann-windowed frames and
//! transformed; the dominant peaks of each frame are packed into 64-bit
//! landmark hashes. A song's hash set is kept in a [`persistance::SetStore`]
//! and queries are scored by how many of their hashes a stored song shares.

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod matcher;
pub mod persistance;
pub mod routes;
pub mod server;

pub use error::{DecodeError, Error, Result, StoreError};
pub use fingerprint::{fingerprint_pipeline, fingerprint_samples, Fingerprint};
pub use matcher::{Match, Matcher};
