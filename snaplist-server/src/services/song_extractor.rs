//! Song recognition from images
//!
//! The vision model is asked for a bare JSON array, but what comes back may be
//! wrapped in prose, truncated or only loosely JSON-shaped. [`parse_song_list`]
//! runs an ordered chain of parsers from strictest to most lenient over the
//! raw text and keeps the first non-empty result.

use once_cell::sync::Lazy;
use regex::Regex;
use snaplist_common::SongCandidate;
use std::sync::Arc;

use super::vision_client::{RecognitionError, VisionBackend};

/// Instruction sent alongside every image
pub const RECOGNITION_PROMPT: &str = r#"Analyze this image and extract song information. Return ONLY a JSON array with 'artist' and 'title' for each song, in this exact format:
[
  {"artist": "Artist Name", "title": "Song Title"},
  {"artist": "Artist Name", "title": "Song Title"}
]
Each entry must contain exactly the string fields "artist" and "title". Only include songs that are clearly identifiable in the image. Do not include any other text or explanation."#;

static PAIR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""artist"\s*:\s*"([^"]*)"\s*,\s*"title"\s*:\s*"([^"]*)""#)
        .expect("pair pattern is valid")
});

static ARTIST_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""artist"\s*:\s*"([^"]*)""#).expect("artist pattern is valid"));

static TITLE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""title"\s*:\s*"([^"]*)""#).expect("title pattern is valid"));

type Stage = fn(&str) -> Option<Vec<SongCandidate>>;

/// Parsers in the order they are tried
const STAGES: &[(&str, Stage)] = &[
    ("json", parse_whole_json),
    ("bracketed_json", parse_bracketed_json),
    ("key_value_pairs", scan_key_value_pairs),
    ("line_scan", scan_lines),
];

/// Whole response is a JSON array of `{artist, title}`
fn parse_whole_json(text: &str) -> Option<Vec<SongCandidate>> {
    serde_json::from_str(text.trim()).ok()
}

/// Substring from the first `[` to the last `]` is a JSON array
fn parse_bracketed_json(text: &str) -> Option<Vec<SongCandidate>> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

/// Adjacent `"artist": "..", "title": ".."` pairs anywhere in the text
fn scan_key_value_pairs(text: &str) -> Option<Vec<SongCandidate>> {
    let songs: Vec<SongCandidate> = PAIR_PATTERN
        .captures_iter(text)
        .map(|caps| SongCandidate::new(&caps[1], &caps[2]))
        .collect();
    Some(songs)
}

/// Lines holding both an artist and a title field
fn scan_lines(text: &str) -> Option<Vec<SongCandidate>> {
    let songs: Vec<SongCandidate> = text
        .lines()
        .filter_map(|line| {
            let artist = ARTIST_PATTERN.captures(line)?;
            let title = TITLE_PATTERN.captures(line)?;
            Some(SongCandidate::new(&artist[1], &title[1]))
        })
        .collect();
    Some(songs)
}

/// Extract song candidates from free-form model output
///
/// Returns an empty list when no stage finds anything.
pub fn parse_song_list(text: &str) -> Vec<SongCandidate> {
    for (name, stage) in STAGES {
        if let Some(songs) = stage(text).filter(|songs| !songs.is_empty()) {
            tracing::debug!(stage = name, count = songs.len(), "Parsed song list");
            return songs;
        }
    }

    tracing::debug!(response_chars = text.len(), "No song data found in response");
    Vec::new()
}

/// Recognizes songs in an image through a vision backend
pub struct RecognitionExtractor {
    backend: Arc<dyn VisionBackend>,
}

impl RecognitionExtractor {
    pub fn new(backend: Arc<dyn VisionBackend>) -> Self {
        Self { backend }
    }

    /// Recognize songs in an image
    ///
    /// Fails only when the backend call fails. Unparseable output yields an
    /// empty list; whether that is an error is the caller's call.
    pub async fn extract(
        &self,
        image: &[u8],
        mime_type: &str,
    ) -> Result<Vec<SongCandidate>, RecognitionError> {
        let text = self
            .backend
            .generate(image, mime_type, RECOGNITION_PROMPT)
            .await?;

        tracing::debug!(backend = self.backend.backend_id(), response = %text, "Vision response");

        let songs = parse_song_list(&text);

        tracing::info!(
            backend = self.backend.backend_id(),
            songs = songs.len(),
            "Songs recognized in image"
        );

        Ok(songs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn song(artist: &str, title: &str) -> SongCandidate {
        SongCandidate::new(artist, title)
    }

    #[test]
    fn test_well_formed_array_is_returned_verbatim() {
        let text = r#"[{"artist": "  Queen ", "title": "Bohemian Rhapsody"}, {"artist": "ABBA", "title": "waterloo"}]"#;
        assert_eq!(
            parse_song_list(text),
            vec![song("  Queen ", "Bohemian Rhapsody"), song("ABBA", "waterloo")]
        );
        assert!(parse_whole_json(text).is_some());
    }

    #[test]
    fn test_duplicates_pass_through() {
        let text = r#"[{"artist": "A", "title": "X"}, {"artist": "A", "title": "X"}]"#;
        assert_eq!(parse_song_list(text).len(), 2);
    }

    #[test]
    fn test_array_wrapped_in_prose() {
        let text = "Sure! Here is what I found:\n```json\n[\n  {\"artist\": \"Daft Punk\", \"title\": \"One More Time\"}\n]\n```\nLet me know if you need more.";
        assert!(parse_whole_json(text).is_none());
        assert_eq!(parse_song_list(text), vec![song("Daft Punk", "One More Time")]);
    }

    #[test]
    fn test_truncated_array_falls_back_to_pairs() {
        let text = r#"[{"artist": "Queen", "title": "Under Pressure"}, {"artist": "Blur", "title": "Song 2"}, {"artist": "Oasis", "ti"#;
        assert_eq!(
            parse_song_list(text),
            vec![song("Queen", "Under Pressure"), song("Blur", "Song 2")]
        );
    }

    #[test]
    fn test_line_scan_example() {
        let text = "Here are the songs:\n\"artist\": \"Queen\", \"title\": \"Bohemian Rhapsody\"\nsome junk\n\"artist\": \"ABBA\", \"title\": \"Waterloo\"";
        assert_eq!(
            parse_song_list(text),
            vec![song("Queen", "Bohemian Rhapsody"), song("ABBA", "Waterloo")]
        );
    }

    #[test]
    fn test_line_scan_handles_reversed_field_order() {
        // title before artist defeats the adjacent-pair pattern
        let text = "1. \"title\": \"Waterloo\" by \"artist\": \"ABBA\"\n2. \"artist\": \"Nobody\"\n3. \"title\": \"Heroes\", \"artist\": \"David Bowie\"";
        assert_eq!(scan_key_value_pairs(text), Some(Vec::new()));
        assert_eq!(
            parse_song_list(text),
            vec![song("ABBA", "Waterloo"), song("David Bowie", "Heroes")]
        );
    }

    #[test]
    fn test_nothing_extractable_is_empty() {
        assert!(parse_song_list("I could not identify any songs in this image.").is_empty());
        assert!(parse_song_list("").is_empty());
        assert!(parse_song_list("[]").is_empty());
    }

    #[test]
    fn test_wrong_field_types_fall_through_to_lenient_stages() {
        let text = r#"[{"artist": "Queen", "title": "Bohemian Rhapsody"}, {"artist": 7, "title": null}]"#;
        assert!(parse_whole_json(text).is_none());
        assert_eq!(parse_song_list(text), vec![song("Queen", "Bohemian Rhapsody")]);
    }

    #[test]
    fn test_bracket_order_guard() {
        assert_eq!(parse_bracketed_json("] nothing ["), None);
    }

    struct FakeVision {
        response: Result<String, ()>,
        seen: Mutex<Vec<(usize, String, String)>>,
    }

    #[async_trait]
    impl VisionBackend for FakeVision {
        fn backend_id(&self) -> &'static str {
            "Fake"
        }

        async fn generate(
            &self,
            image: &[u8],
            mime_type: &str,
            prompt: &str,
        ) -> Result<String, RecognitionError> {
            self.seen
                .lock()
                .unwrap()
                .push((image.len(), mime_type.to_string(), prompt.to_string()));
            self.response
                .clone()
                .map_err(|_| RecognitionError::QuotaExceeded)
        }
    }

    #[tokio::test]
    async fn test_extract_sends_prompt_and_parses() {
        let backend = Arc::new(FakeVision {
            response: Ok(r#"[{"artist": "Queen", "title": "Bohemian Rhapsody"}]"#.to_string()),
            seen: Mutex::new(Vec::new()),
        });
        let extractor = RecognitionExtractor::new(backend.clone());

        let songs = extractor.extract(b"jpegbytes", "image/jpeg").await.unwrap();
        assert_eq!(songs, vec![song("Queen", "Bohemian Rhapsody")]);

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, 9);
        assert_eq!(seen[0].1, "image/jpeg");
        assert_eq!(seen[0].2, RECOGNITION_PROMPT);
    }

    #[tokio::test]
    async fn test_extract_propagates_backend_failure() {
        let extractor = RecognitionExtractor::new(Arc::new(FakeVision {
            response: Err(()),
            seen: Mutex::new(Vec::new()),
        }));

        let err = extractor.extract(b"x", "image/png").await.unwrap_err();
        assert!(matches!(err, RecognitionError::QuotaExceeded));
    }

    #[tokio::test]
    async fn test_extract_unparseable_is_empty_not_error() {
        let extractor = RecognitionExtractor::new(Arc::new(FakeVision {
            response: Ok("No music here, just a cat.".to_string()),
            seen: Mutex::new(Vec::new()),
        }));

        assert!(extractor.extract(b"x", "image/png").await.unwrap().is_empty());
    }
}
