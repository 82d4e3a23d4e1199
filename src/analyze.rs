use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashMap;

use crate::error::AppError;
use crate::fingerprint::{self, Fingerprint};
use crate::spotify::data::{fetch_artists, fetch_audio_features, fetch_tracks, AudioFeatures, Track};
use crate::spotify::ids::TrackId;
use crate::spotify::SpotifyClient;

/// Tracks analysed when none are given on the command line.
pub const SAMPLE_TRACKS: [(&str, &str, &str); 10] = [
    ("I Wanna Be Yours", "Arctic Monkeys", "https://open.spotify.com/track/5XeFesFbtLpXzIVDNQP22n"),
    ("Nice To Know You", "PinkPantheress", "https://open.spotify.com/track/39BYU2nLFR8Q1RcPdVvUMn"),
    ("PONTE NASTY", "Rauw", "https://open.spotify.com/track/1cNJ9ODOJF8b6AjhzoYdkv"),
    ("CHIHIRO", "Billie Eilish", "https://open.spotify.com/track/7BRD7x5pt8Lqa1eGYC4dzj"),
    ("Gimme More", "Britney Spears", "https://open.spotify.com/track/6ic8OlLUNEATToEFU3xmaH"),
    ("The Less I Know The Better", "Tame Impala", "https://open.spotify.com/track/6K4t31amVTZDgR3sKmwUJJ"),
    ("The Fate of Ophelia", "Taylor Swift", "https://open.spotify.com/track/53iuhJlwXhSER5J2IYYv1W"),
    ("Gabriela", "KATSEYE", "https://open.spotify.com/track/1xOqGUkyxGQRdCvGpvWKmL"),
    ("NOT CUTE ANYMORE", "ILLIT", "https://open.spotify.com/track/1k0JAiH11gHL9dc5dfQjQr"),
    ("Apocalypse", "Cigarettes After Sex", "https://open.spotify.com/track/1oAwsWBovWRIp7qLMGPIet"),
];

pub fn sample_track_ids() -> Result<Vec<TrackId>, AppError> {
    SAMPLE_TRACKS
        .iter()
        .map(|(_, _, url)| TrackId::parse(url))
        .collect()
}

/// Parses user-supplied track references, falling back to the sample list.
pub fn resolve_track_ids(inputs: &[String]) -> Result<Vec<TrackId>, AppError> {
    if inputs.is_empty() {
        return sample_track_ids();
    }
    inputs.iter().map(|s| TrackId::parse(s)).collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct FingerprintRow {
    pub track_id: String,
    pub song: String,
    pub artist: String,
    pub album: String,
    pub genre: String,
    pub release_date: String,
    pub release_year: Option<i32>,
    pub fingerprint: Fingerprint,
}

/// Joins tracks, their features and artist genres into report rows.
/// Pairs with a missing track or missing features are skipped.
pub fn build_rows(
    tracks: Vec<Option<Track>>,
    features: Vec<Option<AudioFeatures>>,
    genres: &HashMap<String, String>,
) -> Vec<FingerprintRow> {
    let mut rows = Vec::new();

    for (track, features) in tracks.into_iter().zip(features) {
        let (track, features) = match (track, features) {
            (Some(track), Some(features)) => (track, features),
            (Some(track), None) => {
                warn!("No audio features for '{}', skipping", track.name);
                continue;
            }
            (None, _) => {
                warn!("Track unavailable on Spotify, skipping");
                continue;
            }
        };

        let lead = track.artists.first();
        let artist = lead
            .map(|a| a.name.clone())
            .unwrap_or_else(|| "Unknown Artist".to_string());
        let genre = lead
            .and_then(|a| a.id.as_ref())
            .and_then(|id| genres.get(id))
            .cloned()
            .unwrap_or_else(|| "Unknown Genre".to_string());

        rows.push(FingerprintRow {
            track_id: track.id.clone(),
            release_year: track.album.release_year(),
            release_date: track
                .album
                .release_date
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
            album: track.album.name,
            song: track.name,
            artist,
            genre,
            fingerprint: fingerprint::compute(&features),
        });
    }

    rows
}

pub async fn analyze(
    client: &SpotifyClient,
    ids: &[TrackId],
) -> Result<Vec<FingerprintRow>, AppError> {
    let tracks = fetch_tracks(client, ids).await?;
    info!(
        "Fetched {} of {} tracks",
        tracks.iter().flatten().count(),
        ids.len()
    );

    let features = fetch_audio_features(client, ids).await?;

    let artist_ids: Vec<String> = tracks
        .iter()
        .flatten()
        .filter_map(|t| t.artists.first().and_then(|a| a.id.clone()))
        .collect();
    let genres: HashMap<String, String> = fetch_artists(client, &artist_ids)
        .await?
        .into_iter()
        .map(|artist| {
            let genre = artist.primary_genre().to_string();
            debug!("{} plays {}", artist.name, genre);
            (artist.id, genre)
        })
        .collect();

    let rows = build_rows(tracks, features, &genres);
    info!("Computed {} fingerprints", rows.len());
    Ok(rows)
}
