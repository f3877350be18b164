//! # Snaplist Common Library
//!
//! Shared code for the Snaplist service, free of HTTP framework dependencies:
//! - Song candidate, match result and playlist report types
//! - Bearer credential types and the token validity model
//! - Bootstrap configuration loading
//! - Common error type

pub mod auth;
pub mod config;
pub mod error;
pub mod songs;

pub use auth::{AuthContext, TokenGrant, TokenValidity};
pub use error::{Error, Result};
pub use songs::{MatchResult, MatchedSong, PlaylistReport, SongCandidate, UnmatchReason, UnmatchedSong};
