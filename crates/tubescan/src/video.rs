//! YouTube URL parsing.
//!
//! Derives the canonical 11-character video id from the URL forms users
//! paste: watch, youtu.be short links, embed and shorts paths, or a bare id.

use std::sync::OnceLock;

use regex::Regex;

const PATTERNS: &[&str] = &[
    r"(?:youtube\.com/watch\?(?:[^&\s]*&)*v=)([A-Za-z0-9_-]{11})",
    r"(?:youtu\.be/)([A-Za-z0-9_-]{11})",
    r"(?:youtube\.com/embed/)([A-Za-z0-9_-]{11})",
    r"(?:youtube\.com/shorts/)([A-Za-z0-9_-]{11})",
    r"(?:youtube\.com/live/)([A-Za-z0-9_-]{11})",
];

fn compiled_patterns() -> &'static Vec<Regex> {
    static COMPILED: OnceLock<Vec<Regex>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        PATTERNS
            .iter()
            .map(|p| Regex::new(p).unwrap_or_else(|e| panic!("invalid pattern {p}: {e}")))
            .collect()
    })
}

fn bare_id_pattern() -> &'static Regex {
    static BARE: OnceLock<Regex> = OnceLock::new();
    BARE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap_or_else(|e| panic!("{e}")))
}

/// Extracts the video id from a YouTube URL, or `None` if no id can be
/// derived from any known URL form.
pub fn extract_video_id(url: &str) -> Option<String> {
    let url = url.trim();

    for re in compiled_patterns() {
        if let Some(caps) = re.captures(url) {
            if let Some(m) = caps.get(1) {
                return Some(m.as_str().to_string());
            }
        }
    }

    // A bare 11-character id is accepted as-is.
    if bare_id_pattern().is_match(url) {
        return Some(url.to_string());
    }

    None
}

/// Builds the canonical watch URL for a video id.
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}
