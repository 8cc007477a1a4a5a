//! Peak picking over a single magnitude spectrum.

use crate::fingerprint::{MAX_FREQ, MIN_FREQ, TOP_PEAKS};

const MAGNITUDE_FLOOR: f32 = 0.001;
const NEIGHBOURHOOD: usize = 3;
/// A neighbour within this fraction of a candidate's magnitude suppresses it.
const DOMINANCE_RATIO: f32 = 0.95;

/// Return the strongest in-band peak frequencies of `spectrum`, loudest first.
///
/// At most [`TOP_PEAKS`] frequencies are returned, each in
/// `[MIN_FREQ, MAX_FREQ)` Hz.
pub fn find_peaks(spectrum: &[f32], sample_rate: u32) -> Vec<u32> {
    let len = spectrum.len();

    let mut peaks: Vec<(u32, f32)> = spectrum
        .iter()
        .enumerate()
        .filter_map(|(bin, &magnitude)| {
            let frequency = bin_frequency(bin, sample_rate, len);
            let qualifies = (MIN_FREQ..MAX_FREQ).contains(&frequency)
                && magnitude > MAGNITUDE_FLOOR
                && dominates_neighbours(spectrum, bin);

            qualifies.then_some((frequency, magnitude))
        })
        .collect();

    peaks.sort_by(|a, b| b.1.total_cmp(&a.1));
    peaks.truncate(TOP_PEAKS);

    peaks.into_iter().map(|(frequency, _)| frequency).collect()
}

pub fn bin_frequency(bin: usize, sample_rate: u32, spectrum_len: usize) -> u32 {
    (bin as u64 * sample_rate as u64 / spectrum_len as u64) as u32
}

fn dominates_neighbours(spectrum: &[f32], bin: usize) -> bool {
    let threshold = spectrum[bin] * DOMINANCE_RATIO;
    let lo = bin.saturating_sub(NEIGHBOURHOOD);
    let hi = (bin + NEIGHBOURHOOD).min(spectrum.len() - 1);

    (lo..=hi)
        .filter(|&j| j != bin)
        .all(|j| spectrum[j] < threshold)
}
