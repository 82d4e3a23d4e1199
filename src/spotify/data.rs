use chrono::{Datelike, NaiveDate};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::spotify::ids::TrackId;
use crate::spotify::{ApiError, SpotifyClient};

/// Batch limits of the several-items endpoints.
pub const TRACKS_BATCH: usize = 50;
pub const AUDIO_FEATURES_BATCH: usize = 100;
pub const ARTISTS_BATCH: usize = 50;

#[derive(Deserialize, Debug, Clone)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub artists: Vec<ArtistRef>,
    pub album: Album,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ArtistRef {
    pub id: Option<String>,
    pub name: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Album {
    pub name: String,
    pub release_date: Option<String>,
    pub release_date_precision: Option<String>,
}

impl Album {
    /// Year of release when the date is precise enough to trust.
    pub fn release_year(&self) -> Option<i32> {
        let date = self.release_date.as_deref()?;
        match self.release_date_precision.as_deref() {
            Some("day") | None => NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .map(|d| d.year())
                .ok()
                .or_else(|| date.get(..4)?.parse().ok()),
            Some("month") | Some("year") => date.get(..4)?.parse().ok(),
            Some(_) => None,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct Artist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
}

impl Artist {
    /// Genres are artist-level on Spotify; the first one stands for the track.
    pub fn primary_genre(&self) -> &str {
        self.genres
            .first()
            .map(String::as_str)
            .unwrap_or("Unknown Genre")
    }
}

fn default_loudness() -> f64 {
    -60.0
}

fn default_time_signature() -> i32 {
    4
}

fn default_mode() -> i32 {
    1
}

/// Audio analysis summary of a track. Missing fields take neutral defaults.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct AudioFeatures {
    #[serde(default)]
    pub id: Option<String>,
    /// Beats per minute.
    #[serde(default)]
    pub tempo: f64,
    #[serde(default)]
    pub danceability: f64,
    #[serde(default)]
    pub energy: f64,
    #[serde(default)]
    pub valence: f64,
    /// Decibels, typically within [-60, 0].
    #[serde(default = "default_loudness")]
    pub loudness: f64,
    /// Beats per bar.
    #[serde(default = "default_time_signature")]
    pub time_signature: i32,
    /// Pitch class 0-11, or -1 when no key was detected.
    #[serde(default)]
    pub key: i32,
    /// 0 = minor, 1 = major.
    #[serde(default = "default_mode")]
    pub mode: i32,
    #[serde(default)]
    pub acousticness: f64,
    #[serde(default)]
    pub instrumentalness: f64,
}

impl Default for AudioFeatures {
    fn default() -> Self {
        Self {
            id: None,
            tempo: 0.0,
            danceability: 0.0,
            energy: 0.0,
            valence: 0.0,
            loudness: default_loudness(),
            time_signature: default_time_signature(),
            key: 0,
            mode: default_mode(),
            acousticness: 0.0,
            instrumentalness: 0.0,
        }
    }
}

#[derive(Deserialize, Debug)]
struct TracksResponse {
    tracks: Vec<Option<Track>>,
}

#[derive(Deserialize, Debug)]
struct AudioFeaturesResponse {
    audio_features: Vec<Option<AudioFeatures>>,
}

#[derive(Deserialize, Debug)]
struct ArtistsResponse {
    artists: Vec<Option<Artist>>,
}

fn joined<'a>(ids: impl IntoIterator<Item = &'a str>) -> String {
    ids.into_iter().collect::<Vec<_>>().join(",")
}

/// Fetches tracks in request order. Unavailable tracks come back as `None`.
pub async fn fetch_tracks(
    client: &SpotifyClient,
    ids: &[TrackId],
) -> Result<Vec<Option<Track>>, ApiError> {
    let mut tracks = Vec::with_capacity(ids.len());
    for chunk in ids.chunks(TRACKS_BATCH) {
        debug!("fetching {} tracks", chunk.len());
        let response: TracksResponse = client
            .get_json("/tracks", &[("ids", joined(chunk.iter().map(TrackId::as_str)))])
            .await?;
        tracks.extend(response.tracks);
    }
    Ok(tracks)
}

/// Fetches audio features in request order. Tracks without analysis come back as `None`.
pub async fn fetch_audio_features(
    client: &SpotifyClient,
    ids: &[TrackId],
) -> Result<Vec<Option<AudioFeatures>>, ApiError> {
    let mut features = Vec::with_capacity(ids.len());
    for chunk in ids.chunks(AUDIO_FEATURES_BATCH) {
        debug!("fetching audio features for {} tracks", chunk.len());
        let response: AudioFeaturesResponse = client
            .get_json(
                "/audio-features",
                &[("ids", joined(chunk.iter().map(TrackId::as_str)))],
            )
            .await?;
        features.extend(response.audio_features);
    }
    Ok(features)
}

/// Fetches each distinct artist once. Unknown artists are left out.
pub async fn fetch_artists(
    client: &SpotifyClient,
    ids: &[String],
) -> Result<Vec<Artist>, ApiError> {
    let mut seen = HashSet::new();
    let unique: Vec<&str> = ids
        .iter()
        .map(String::as_str)
        .filter(|id| seen.insert(*id))
        .collect();

    let mut artists = Vec::with_capacity(unique.len());
    for chunk in unique.chunks(ARTISTS_BATCH) {
        debug!("fetching {} artists", chunk.len());
        let response: ArtistsResponse = client
            .get_json("/artists", &[("ids", joined(chunk.iter().copied()))])
            .await?;
        artists.extend(response.artists.into_iter().flatten());
    }
    Ok(artists)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthFlow;
    use crate::spotify::auth::Token;
    use crate::spotify::test_server::{spawn, Canned};

    fn client(base: &str) -> SpotifyClient {
        SpotifyClient::new(
            base,
            &Token {
                access_token: "token".to_string(),
                refresh_token: None,
                expires_in: None,
                scopes: Vec::new(),
                flow: AuthFlow::ClientCredentials,
            },
        )
    }

    fn album(date: Option<&str>, precision: Option<&str>) -> Album {
        Album {
            name: "Album".to_string(),
            release_date: date.map(str::to_string),
            release_date_precision: precision.map(str::to_string),
        }
    }

    #[test]
    fn test_release_year_by_precision() {
        assert_eq!(album(Some("2013-09-09"), Some("day")).release_year(), Some(2013));
        assert_eq!(album(Some("1998-05"), Some("month")).release_year(), Some(1998));
        assert_eq!(album(Some("2007"), Some("year")).release_year(), Some(2007));
        assert_eq!(album(Some("2007"), None).release_year(), Some(2007));
        assert_eq!(album(None, Some("day")).release_year(), None);
        assert_eq!(album(Some("soon"), Some("day")).release_year(), None);
    }

    #[test]
    fn test_primary_genre_falls_back() {
        let mut artist = Artist {
            id: "a".to_string(),
            name: "Tame Impala".to_string(),
            genres: vec![],
        };
        assert_eq!(artist.primary_genre(), "Unknown Genre");
        artist.genres = vec!["psychedelic rock".to_string(), "indie".to_string()];
        assert_eq!(artist.primary_genre(), "psychedelic rock");
    }

    #[test]
    fn test_audio_features_defaults_for_missing_fields() {
        let features: AudioFeatures = serde_json::from_str(r#"{"energy":0.5}"#).unwrap();
        assert_eq!(features.energy, 0.5);
        assert_eq!(features.loudness, -60.0);
        assert_eq!(features.time_signature, 4);
        assert_eq!(features.mode, 1);
        assert_eq!(features.key, 0);
        assert_eq!(features, AudioFeatures { energy: 0.5, ..AudioFeatures::default() });
    }

    #[tokio::test]
    async fn test_fetch_tracks_keeps_nulls_in_order() {
        let body = r#"{"tracks":[
            {"id":"5XeFesFbtLpXzIVDNQP22n","name":"I Wanna Be Yours",
             "artists":[{"id":"7Ln80lUS6He07XvHI8qqHH","name":"Arctic Monkeys"}],
             "album":{"name":"AM","release_date":"2013-09-09","release_date_precision":"day"}},
            null]}"#;
        let (base, mut requests) = spawn(vec![Canned::new(200, body)]).await;
        let ids = vec![
            TrackId::parse("5XeFesFbtLpXzIVDNQP22n").unwrap(),
            TrackId::parse("39BYU2nLFR8Q1RcPdVvUMn").unwrap(),
        ];

        let tracks = fetch_tracks(&client(&base), &ids).await.unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].as_ref().unwrap().artists[0].name, "Arctic Monkeys");
        assert!(tracks[1].is_none());

        let request = requests.recv().await.unwrap();
        assert!(request.starts_with(
            "GET /tracks?ids=5XeFesFbtLpXzIVDNQP22n%2C39BYU2nLFR8Q1RcPdVvUMn"
        ));
    }

    #[tokio::test]
    async fn test_fetch_artists_deduplicates_ids() {
        let body = r#"{"artists":[{"id":"a1","name":"Billie Eilish","genres":["art pop"]}]}"#;
        let (base, mut requests) = spawn(vec![Canned::new(200, body)]).await;

        let ids = vec!["a1".to_string(), "a1".to_string()];
        let artists = fetch_artists(&client(&base), &ids).await.unwrap();
        assert_eq!(artists.len(), 1);
        assert_eq!(artists[0].primary_genre(), "art pop");

        let request = requests.recv().await.unwrap();
        assert_eq!(request.lines().next(), Some("GET /artists?ids=a1"));
    }

    #[tokio::test]
    async fn test_audio_features_403_propagates() {
        let (base, _requests) = spawn(vec![Canned::new(403, "")]).await;
        let ids = vec![TrackId::parse("5XeFesFbtLpXzIVDNQP22n").unwrap()];
        let err = fetch_audio_features(&client(&base), &ids)
            .await
            .unwrap_err();
        match err {
            ApiError::Forbidden { endpoint, .. } => assert_eq!(endpoint, "/audio-features"),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
