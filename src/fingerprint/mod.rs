//! Fingerprint pipeline glue.
//!
//! Wires decoding, framing, spectral analysis, peak picking and hashing
//! together to produce a [`Fingerprint`].

use rayon::prelude::*;
use tracing::debug;

use crate::error::{Error, Result};
use crate::fingerprint::{
    decode::ingest,
    extraction::spectrogram,
    hashing::generate_hashes,
    peaks::find_peaks,
};

pub mod decode;
pub mod extraction;
pub mod fft;
pub mod hashing;
pub mod peaks;

pub use hashing::Fingerprint;

/// Rate all frequency math assumes; decoded audio is never resampled to it.
pub const SAMPLE_RATE: u32 = 44_100;
pub const WINDOW_SIZE: usize = 2048;
pub const HOP_SIZE: usize = 512;
pub const TOP_PEAKS: usize = 8;
pub const MIN_FREQ: u32 = 300;
pub const MAX_FREQ: u32 = 12_000;
pub const MAX_DURATION_SECS: usize = 10;
pub const MAX_SAMPLES: usize = SAMPLE_RATE as usize * MAX_DURATION_SECS;

/// Run the end-to-end fingerprint pipeline on raw audio bytes.
pub fn fingerprint_pipeline(audio_bytes: &[u8]) -> Result<Fingerprint> {
    let pcm_buffer = ingest(audio_bytes)?;
    fingerprint_samples(&pcm_buffer)
}

/// Fingerprint already-decoded mono samples.
pub fn fingerprint_samples(pcm_buffer: &[f32]) -> Result<Fingerprint> {
    if pcm_buffer.len() < WINDOW_SIZE {
        return Err(Error::TooShort {
            samples: pcm_buffer.len(),
            required: WINDOW_SIZE,
        });
    }

    let magnitudes = spectrogram(pcm_buffer);
    let peaks: Vec<Vec<u32>> = magnitudes
        .par_iter()
        .map(|spectrum| find_peaks(spectrum, SAMPLE_RATE))
        .collect();

    let fingerprint = generate_hashes(&peaks);
    debug!(
        frames = peaks.len(),
        hashes = fingerprint.len(),
        "generated fingerprint"
    );

    Ok(fingerprint)
}
