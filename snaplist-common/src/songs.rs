//! Song recognition and playlist reconciliation types
//!
//! A [`SongCandidate`] is what the vision model claimed to see. Every candidate
//! handed to the reconciler comes back exactly once, either as a
//! [`MatchedSong`] or as an [`UnmatchedSong`], and the two lists are collected
//! into a [`PlaylistReport`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Artist/title pair recognized in an image
///
/// No uniqueness constraint: duplicates recognized by the model are kept.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SongCandidate {
    pub artist: String,
    pub title: String,
}

impl SongCandidate {
    pub fn new(artist: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            artist: artist.into(),
            title: title.into(),
        }
    }
}

impl fmt::Display for SongCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.artist, self.title)
    }
}

/// Candidate found in the catalog
///
/// Carries both what was recognized and what the catalog calls the track;
/// they may differ in capitalization or suffixes such as "Remastered".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedSong {
    /// Artist as recognized
    pub artist: String,
    /// Title as recognized
    pub title: String,
    /// Canonical track name from the catalog
    pub catalog_title: String,
    /// First credited artist from the catalog
    pub catalog_artist: String,
    /// Catalog track identifier
    pub catalog_track_id: String,
}

/// Why a candidate did not make it into the playlist
///
/// Serialized as a `reason` code plus an optional `detail` so that error
/// messages are never mistaken for catalog content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnmatchReason {
    /// Catalog search returned no results
    NotFound,
    /// Catalog search call failed; carries the underlying message
    SearchError(String),
}

impl fmt::Display for UnmatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnmatchReason::NotFound => write!(f, "not found in catalog"),
            UnmatchReason::SearchError(detail) => write!(f, "search failed: {}", detail),
        }
    }
}

/// Candidate that was not added to the playlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmatchedSong {
    pub artist: String,
    pub title: String,
    #[serde(flatten)]
    pub reason: UnmatchReason,
}

/// Outcome of reconciling one candidate against the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    Matched(MatchedSong),
    Unmatched(UnmatchedSong),
}

impl MatchResult {
    /// Build a match from the recognized candidate and the catalog's descriptor fields
    pub fn matched(
        candidate: &SongCandidate,
        catalog_track_id: impl Into<String>,
        catalog_title: impl Into<String>,
        catalog_artist: impl Into<String>,
    ) -> Self {
        MatchResult::Matched(MatchedSong {
            artist: candidate.artist.clone(),
            title: candidate.title.clone(),
            catalog_title: catalog_title.into(),
            catalog_artist: catalog_artist.into(),
            catalog_track_id: catalog_track_id.into(),
        })
    }

    pub fn not_found(candidate: &SongCandidate) -> Self {
        MatchResult::Unmatched(UnmatchedSong {
            artist: candidate.artist.clone(),
            title: candidate.title.clone(),
            reason: UnmatchReason::NotFound,
        })
    }

    pub fn search_error(candidate: &SongCandidate, detail: impl Into<String>) -> Self {
        MatchResult::Unmatched(UnmatchedSong {
            artist: candidate.artist.clone(),
            title: candidate.title.clone(),
            reason: UnmatchReason::SearchError(detail.into()),
        })
    }
}

/// Reconciled outcome of one playlist creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistReport {
    pub playlist_id: String,
    /// Always equal to `matched.len()`
    pub tracks_added: usize,
    pub total_songs: usize,
    pub matched: Vec<MatchedSong>,
    pub unmatched: Vec<UnmatchedSong>,
}

impl PlaylistReport {
    /// Partition per-song results (in input order) into a report
    pub fn from_results(playlist_id: impl Into<String>, results: Vec<MatchResult>) -> Self {
        let total_songs = results.len();
        let mut matched = Vec::new();
        let mut unmatched = Vec::new();

        for result in results {
            match result {
                MatchResult::Matched(song) => matched.push(song),
                MatchResult::Unmatched(song) => unmatched.push(song),
            }
        }

        Self {
            playlist_id: playlist_id.into(),
            tracks_added: matched.len(),
            total_songs,
            matched,
            unmatched,
        }
    }

    /// Catalog track ids in match order
    pub fn track_ids(&self) -> Vec<String> {
        self.matched
            .iter()
            .map(|song| song.catalog_track_id.clone())
            .collect()
    }
}
