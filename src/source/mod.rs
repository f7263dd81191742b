//! Remote social graph source.
//!
//! This module isolates everything that touches the platform API:
//!
//! - [`dto`]: serde structs matching the wire format exactly
//! - [`domain`]: clean internal types the rest of the crate consumes
//! - [`adapter`]: conversion from raw JSON pages into domain records
//! - [`client`]: the HTTP client with auth, retry, and status mapping
//! - [`traits`]: the [`GraphSource`] seam the harvest engine depends on
//!
//! Nothing outside this module deserializes API JSON directly.

pub mod adapter;
pub mod client;
pub mod domain;
pub mod dto;
pub mod traits;

pub use client::ApiClient;
pub use domain::{PlaylistData, ResolvedEntity, SourceError, TrackData, UserData};
pub use traits::GraphSource;
