//! Spectral extraction helpers.
//!
//! Provides framing, windowing and FFT magnitude computation used by the
//! fingerprinting pipeline.

use std::f32::consts::PI;

use rayon::prelude::*;

use crate::fingerprint::fft::Radix2;
use crate::fingerprint::{HOP_SIZE, WINDOW_SIZE};

/// Number of complete analysis frames in a buffer of `len` samples.
///
/// Zero when the buffer cannot hold a single window.
pub fn frame_count(len: usize) -> usize {
    if len < WINDOW_SIZE {
        return 0;
    }
    ((len - WINDOW_SIZE) / HOP_SIZE).max(1)
}

/// Compute the Hann-windowed magnitude spectrum of every frame in `pcm_buffer`.
///
/// Frames are transformed in parallel; the result is in frame order and each
/// spectrum holds `WINDOW_SIZE / 2` bins.
pub fn spectrogram(pcm_buffer: &[f32]) -> Vec<Vec<f32>> {
    let fft = Radix2::new(WINDOW_SIZE);
    let window = hann_window(WINDOW_SIZE);

    (0..frame_count(pcm_buffer.len()))
        .into_par_iter()
        .map(|frame| {
            let start = frame * HOP_SIZE;
            let windowed = apply_hann_window(&pcm_buffer[start..start + WINDOW_SIZE], &window);
            fft.magnitudes(&windowed)
        })
        .collect()
}

fn apply_hann_window(frame: &[f32], window: &[f32]) -> Vec<f32> {
    frame.iter().zip(window).map(|(sample, w)| sample * w).collect()
}

pub fn hann_window(size: usize) -> Vec<f32> {
    let n = size as f32;
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / (n - 1.0)).cos()))
        .collect()
}
