use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

const ID_LEN: usize = 22;

/// A base-62 Spotify track id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

fn is_id(s: &str) -> bool {
    s.len() == ID_LEN && s.bytes().all(|b| b.is_ascii_alphanumeric())
}

impl TrackId {
    /// Accepts a bare id, a `spotify:track:` URI or an `open.spotify.com`
    /// track link (scheme, locale segment and query string optional).
    pub fn parse(input: &str) -> Result<Self, AppError> {
        let s = input.trim();
        if is_id(s) {
            return Ok(Self(s.to_string()));
        }

        if let Some(rest) = s.strip_prefix("spotify:track:") {
            if is_id(rest) {
                return Ok(Self(rest.to_string()));
            }
        }

        if let Some(pos) = s.find("open.spotify.com/") {
            let path = &s[pos + "open.spotify.com/".len()..];
            let path = path.split(['?', '#']).next().unwrap_or_default();
            let mut segments = path.split('/');
            while let Some(segment) = segments.next() {
                if segment == "track" {
                    if let Some(id) = segments.next().filter(|id| is_id(id)) {
                        return Ok(Self(id.to_string()));
                    }
                    break;
                }
            }
        }

        Err(AppError::InvalidTrackId(input.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
