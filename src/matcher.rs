//! Storing fingerprints and scoring queries against the corpus.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::fingerprint::Fingerprint;
use crate::persistance::SetStore;

/// Fraction of a query's hashes a song must share to count as a match.
pub const SIMILARITY_THRESHOLD: f64 = 0.6;

const SONGS_KEY: &str = "songs";

fn song_key(song_name: &str) -> String {
    format!("song:{song_name}:hashes")
}

/// Outcome of a corpus scan. An empty name means nothing cleared the threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Match {
    pub song_name: String,
    pub similarity: f64,
}

impl Match {
    pub fn none() -> Self {
        Self {
            song_name: String::new(),
            similarity: 0.0,
        }
    }

    pub fn is_found(&self) -> bool {
        !self.song_name.is_empty()
    }
}

#[derive(Clone)]
pub struct Matcher {
    store: Arc<dyn SetStore>,
}

impl Matcher {
    pub fn new(store: Arc<dyn SetStore>) -> Self {
        Self { store }
    }

    /// Add `fingerprint` to the hashes stored for `song_name` and register the
    /// song in the corpus. Returns the number of hashes in the fingerprint.
    ///
    /// Writes are not rolled back if a later one fails; re-running the same
    /// call is harmless.
    pub async fn store_fingerprint(
        &self,
        song_name: &str,
        fingerprint: &Fingerprint,
    ) -> Result<usize, StoreError> {
        let members: Vec<String> = fingerprint.hashes().iter().map(u64::to_string).collect();

        if !members.is_empty() {
            self.store.add_members(&song_key(song_name), &members).await?;
        }
        self.store
            .add_members(SONGS_KEY, &[song_name.to_owned()])
            .await?;

        info!(song_name, hashes = members.len(), "stored fingerprint");
        Ok(members.len())
    }

    /// Score every stored song against `fingerprint` and return the best one
    /// at or above [`SIMILARITY_THRESHOLD`].
    pub async fn find_match(&self, fingerprint: &Fingerprint) -> Result<Match, StoreError> {
        let query_count = fingerprint.len();
        if query_count == 0 {
            return Ok(Match::none());
        }

        let songs = self.store.members(SONGS_KEY).await?;
        let mut best = Match::none();

        for song in songs {
            let stored = match self.store.members(&song_key(&song)).await {
                Ok(stored) => stored,
                Err(error) => {
                    warn!(song = %song, %error, "skipping song whose hashes could not be read");
                    continue;
                }
            };

            let matching = stored
                .iter()
                .filter_map(|member| parse_hash(&song, member))
                .filter(|&hash| fingerprint.contains(hash))
                .count();
            let similarity = matching as f64 / query_count as f64;
            debug!(song = %song, matching, similarity, "scored song");

            if similarity >= SIMILARITY_THRESHOLD && similarity > best.similarity {
                best = Match {
                    song_name: song,
                    similarity,
                };
            }
        }

        info!(
            song_name = %best.song_name,
            similarity = best.similarity,
            query_hashes = query_count,
            "recognition finished"
        );
        Ok(best)
    }

    /// Forget `song_name`. Unknown names are not an error.
    pub async fn delete_song(&self, song_name: &str) -> Result<(), StoreError> {
        self.store.delete(&song_key(song_name)).await?;
        self.store.remove_member(SONGS_KEY, song_name).await?;

        info!(song_name, "deleted song");
        Ok(())
    }

    pub async fn list_songs(&self) -> Result<Vec<String>, StoreError> {
        self.store.members(SONGS_KEY).await
    }
}

fn parse_hash(song: &str, member: &str) -> Option<u64> {
    match member.parse() {
        Ok(hash) => Some(hash),
        Err(_) => {
            warn!(song, member, "ignoring malformed stored hash");
            None
        }
    }
}
