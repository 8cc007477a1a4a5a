//! WAV fixtures shared by the integration tests.

#![allow(dead_code)]

use std::f32::consts::PI;
use std::io::Cursor;

use tunetrace::fingerprint::{SAMPLE_RATE, WINDOW_SIZE};

/// A sequence of two-tone chords, each held for `seconds`.
///
/// Tones sit on analysis bin centres so every frame has clean, stable peaks.
pub fn chords(bins: &[(usize, usize)], seconds: f32) -> Vec<i16> {
    let bin_hz = SAMPLE_RATE as f32 / WINDOW_SIZE as f32;
    let per_chord = (SAMPLE_RATE as f32 * seconds) as usize;

    bins.iter()
        .flat_map(|&(loud, quiet)| {
            (0..per_chord).map(move |i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                let sample = 0.5 * (2.0 * PI * loud as f32 * bin_hz * t).sin()
                    + 0.25 * (2.0 * PI * quiet as f32 * bin_hz * t).sin();
                (sample * i16::MAX as f32) as i16
            })
        })
        .collect()
}

pub fn wav(samples: &[i16]) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
    for &sample in samples {
        writer.write_sample(sample).unwrap();
    }
    writer.finalize().unwrap();

    cursor.into_inner()
}

pub fn song_a() -> Vec<u8> {
    wav(&chords(&[(30, 80), (45, 120), (60, 150)], 0.75))
}

pub fn song_b() -> Vec<u8> {
    wav(&chords(&[(200, 35), (170, 90), (140, 250)], 0.75))
}

pub fn unrelated() -> Vec<u8> {
    wav(&chords(&[(110, 55), (95, 210)], 1.0))
}
