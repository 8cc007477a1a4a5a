//! Audio decoding.
//!
//! RIFF/WAVE payloads are parsed directly; everything else is handed to
//! symphonia. Both paths produce mono `f32` samples at whatever rate the
//! source used, capped at [`MAX_SAMPLES`].

use std::io::{Cursor, Read};

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use symphonia::core::{
    audio::SampleBuffer,
    codecs::{Decoder, DecoderOptions},
    errors::Error as SymphoniaError,
    formats::{FormatOptions, FormatReader, Track},
    io::MediaSourceStream,
    meta::MetadataOptions,
    probe::Hint,
};
use tracing::{debug, warn};

use crate::error::{DecodeError, Error, Result};
use crate::fingerprint::{MAX_SAMPLES, SAMPLE_RATE, WINDOW_SIZE};

const RIFF_CHUNK_ID: &[u8; 4] = b"RIFF";
const WAVE_FORMAT_ID: &[u8; 4] = b"WAVE";
const FMT_CHUNK_ID: &[u8; 4] = b"fmt ";
const DATA_CHUNK_ID: &[u8; 4] = b"data";

const RIFF_HEADER_SIZE: usize = 12;
const MIN_FMT_CHUNK_SIZE: usize = 16;

const FORMAT_PCM: u16 = 1;
const FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// Decode `bytes` into normalized mono samples.
///
/// Fails with [`Error::TooShort`] when fewer than one analysis window of
/// samples survives decoding.
pub fn ingest(bytes: &[u8]) -> Result<Vec<f32>> {
    let samples = if bytes.starts_with(RIFF_CHUNK_ID) {
        decode_wav(bytes)?
    } else {
        decode_compressed(bytes)?
    };

    debug!(bytes = bytes.len(), samples = samples.len(), "decoded audio");

    if samples.len() < WINDOW_SIZE {
        return Err(Error::TooShort {
            samples: samples.len(),
            required: WINDOW_SIZE,
        });
    }

    Ok(samples)
}

#[derive(Debug, Clone, Copy)]
struct WavFormat {
    format_tag: u16,
    channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
}

fn decode_wav(bytes: &[u8]) -> Result<Vec<f32>, DecodeError> {
    if bytes.len() < RIFF_HEADER_SIZE {
        return Err(DecodeError::MalformedHeader("truncated RIFF header"));
    }
    if &bytes[8..12] != WAVE_FORMAT_ID {
        return Err(DecodeError::MissingWaveSignature);
    }

    let (format, data) = read_chunks(bytes)?;

    if format.format_tag != FORMAT_PCM {
        return Err(DecodeError::UnsupportedFormat(format.format_tag));
    }
    if format.channels == 0 {
        return Err(DecodeError::MalformedHeader("zero channels"));
    }
    if format.sample_rate != SAMPLE_RATE {
        debug!(
            declared = format.sample_rate,
            assumed = SAMPLE_RATE,
            "WAV sample rate ignored"
        );
    }

    let channels = format.channels as usize;
    let samples = match format.bits_per_sample {
        8 => data
            .chunks_exact(channels)
            .take(MAX_SAMPLES)
            .map(|frame| {
                frame.iter().map(|&raw| (raw as f32 - 128.0) / 128.0).sum::<f32>() / channels as f32
            })
            .collect(),
        16 => data
            .chunks_exact(channels * 2)
            .take(MAX_SAMPLES)
            .map(|frame| {
                frame
                    .chunks_exact(2)
                    .map(|raw| LittleEndian::read_i16(raw) as f32 / 32768.0)
                    .sum::<f32>()
                    / channels as f32
            })
            .collect(),
        bits => return Err(DecodeError::UnsupportedBitDepth(bits)),
    };

    Ok(samples)
}

/// Walk the RIFF chunk list and return the format plus the sample bytes.
///
/// A `data` chunk that claims more bytes than the payload holds is clipped to
/// what is present.
fn read_chunks(bytes: &[u8]) -> Result<(WavFormat, &[u8]), DecodeError> {
    let mut cursor = Cursor::new(bytes);
    cursor.set_position(RIFF_HEADER_SIZE as u64);

    let mut format = None;
    let mut chunk_id = [0u8; 4];

    while cursor.read_exact(&mut chunk_id).is_ok() {
        let chunk_size = cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| DecodeError::MalformedHeader("truncated chunk header"))?
            as usize;
        let start = cursor.position() as usize;
        let end = start.saturating_add(chunk_size).min(bytes.len());

        match &chunk_id {
            FMT_CHUNK_ID => format = Some(parse_fmt(&bytes[start..end])?),
            DATA_CHUNK_ID => {
                let format =
                    format.ok_or(DecodeError::MalformedHeader("data chunk before fmt chunk"))?;
                return Ok((format, &bytes[start..end]));
            }
            _ => {}
        }

        // chunk bodies are padded to an even length
        cursor.set_position((end + (chunk_size & 1)) as u64);
    }

    Err(match format {
        None => DecodeError::MalformedHeader("missing fmt chunk"),
        Some(_) => DecodeError::MalformedHeader("missing data chunk"),
    })
}

fn parse_fmt(body: &[u8]) -> Result<WavFormat, DecodeError> {
    if body.len() < MIN_FMT_CHUNK_SIZE {
        return Err(DecodeError::MalformedHeader("fmt chunk too small"));
    }

    let mut format_tag = LittleEndian::read_u16(&body[0..2]);
    // WAVEFORMATEXTENSIBLE keeps the real format code at the head of its sub-format GUID
    if format_tag == FORMAT_EXTENSIBLE && body.len() >= 26 {
        format_tag = LittleEndian::read_u16(&body[24..26]);
    }

    Ok(WavFormat {
        format_tag,
        channels: LittleEndian::read_u16(&body[2..4]),
        sample_rate: LittleEndian::read_u32(&body[4..8]),
        bits_per_sample: LittleEndian::read_u16(&body[14..16]),
    })
}

fn decode_compressed(bytes: &[u8]) -> Result<Vec<f32>, DecodeError> {
    let cursor = Cursor::new(bytes.to_vec());
    let media_source_stream = MediaSourceStream::new(Box::new(cursor), Default::default());

    let mut format = get_format(media_source_stream)?;
    let track = format.default_track().ok_or(DecodeError::NoAudioTrack)?;

    let mut decoder = get_decoder(track)?;
    let track_id = track.id;

    if let Some(rate) = track.codec_params.sample_rate {
        if rate != SAMPLE_RATE {
            debug!(declared = rate, assumed = SAMPLE_RATE, "stream sample rate ignored");
        }
    }

    let mut samples = Vec::new();

    while samples.len() < MAX_SAMPLES {
        // end of stream surfaces as an error from the reader
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(_) => break,
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(reason)) => {
                warn!(reason, "skipping undecodable packet");
                continue;
            }
            Err(error) => return Err(error.into()),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count();
        if channels == 0 {
            return Err(DecodeError::NoAudioTrack);
        }

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        samples.extend(to_mono(buffer.samples(), channels));
    }

    samples.truncate(MAX_SAMPLES);
    Ok(samples)
}

fn to_mono(input: &[f32], channels: usize) -> impl Iterator<Item = f32> + '_ {
    input
        .chunks_exact(channels)
        .map(move |frame| frame.iter().sum::<f32>() / channels as f32)
}

fn get_format(
    media_source_stream: MediaSourceStream,
) -> Result<Box<dyn FormatReader>, DecodeError> {
    let hint = Hint::new();
    let probed = symphonia::default::get_probe().format(
        &hint,
        media_source_stream,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    Ok(probed.format)
}

fn get_decoder(track: &Track) -> Result<Box<dyn Decoder>, DecodeError> {
    Ok(symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes<S: hound::Sample + Copy>(channels: u16, bits: u16, samples: &[S]) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: bits,
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

    /// Hand-built RIFF payload, optionally with a chunk ahead of `fmt `.
    fn riff(
        format_tag: u16,
        channels: u16,
        bits: u16,
        leading: Option<&[u8]>,
        data: &[u8],
    ) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(b"WAVE");

        if let Some(body) = leading {
            bytes.extend_from_slice(b"LIST");
            bytes.extend_from_slice(&(body.len() as u32).to_le_bytes());
            bytes.extend_from_slice(body);
            if body.len() % 2 == 1 {
                bytes.push(0);
            }
        }

        let block_align = channels * bits / 8;
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&format_tag.to_le_bytes());
        bytes.extend_from_slice(&channels.to_le_bytes());
        bytes.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
        bytes.extend_from_slice(&(SAMPLE_RATE * block_align as u32).to_le_bytes());
        bytes.extend_from_slice(&block_align.to_le_bytes());
        bytes.extend_from_slice(&bits.to_le_bytes());

        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(data);

        let riff_size = (bytes.len() - 8) as u32;
        bytes[4..8].copy_from_slice(&riff_size.to_le_bytes());
        bytes
    }

    /// Minimal FLAC stream: STREAMINFO plus fixed-size frames of verbatim
    /// 16-bit subframes, one per channel.
    fn flac_bytes(block_size: usize, channels: &[Vec<i16>]) -> Vec<u8> {
        let total = channels[0].len();
        assert!(total % block_size == 0 && (256..=32768).contains(&block_size));
        assert!(block_size.is_power_of_two());
        let block_code = 8 + (block_size / 256).trailing_zeros() as u8;

        let mut bytes = b"fLaC".to_vec();
        // last metadata block, STREAMINFO, 34 bytes
        bytes.extend_from_slice(&[0x80, 0x00, 0x00, 0x22]);
        bytes.extend_from_slice(&(block_size as u16).to_be_bytes());
        bytes.extend_from_slice(&(block_size as u16).to_be_bytes());
        bytes.extend_from_slice(&[0; 6]);
        let packed = (SAMPLE_RATE as u64) << 44
            | (channels.len() as u64 - 1) << 41
            | 15 << 36
            | total as u64;
        bytes.extend_from_slice(&packed.to_be_bytes());
        bytes.extend_from_slice(&[0; 16]);

        for frame in 0..total / block_size {
            assert!(frame < 128);
            let mut header = vec![
                0xFF,
                0xF8,
                block_code << 4 | 0b1001,
                (channels.len() as u8 - 1) << 4 | 0b100 << 1,
                frame as u8,
            ];
            header.push(crc8(&header));

            let mut body = header;
            for channel in channels {
                body.push(0x02);
                for &sample in &channel[frame * block_size..(frame + 1) * block_size] {
                    body.extend_from_slice(&sample.to_be_bytes());
                }
            }
            let crc = crc16(&body);
            body.extend_from_slice(&crc.to_be_bytes());

            bytes.extend_from_slice(&body);
        }

        bytes
    }

    fn crc8(data: &[u8]) -> u8 {
        data.iter().fold(0u8, |mut crc, &byte| {
            crc ^= byte;
            for _ in 0..8 {
                crc = if crc & 0x80 != 0 { crc << 1 ^ 0x07 } else { crc << 1 };
            }
            crc
        })
    }

    fn crc16(data: &[u8]) -> u16 {
        data.iter().fold(0u16, |mut crc, &byte| {
            crc ^= (byte as u16) << 8;
            for _ in 0..8 {
                crc = if crc & 0x8000 != 0 { crc << 1 ^ 0x8005 } else { crc << 1 };
            }
            crc
        })
    }

    #[test]
    fn flac_helper_crcs_match_check_values() {
        assert_eq!(crc8(b"123456789"), 0xF4);
        assert_eq!(crc16(b"123456789"), 0xFEE8);
    }

    #[test]
    fn decodes_flac_and_averages_channels() {
        let left = vec![16384i16; 2 * 4096];
        let right = vec![-8192i16; 2 * 4096];

        let samples = ingest(&flac_bytes(4096, &[left, right])).unwrap();

        assert_eq!(samples.len(), 2 * 4096);
        assert!(samples.iter().all(|&s| (s - 0.125).abs() < 1e-6));
    }

    #[test]
    fn flac_samples_stay_normalized() {
        let left: Vec<i16> = (0..4096)
            .map(|i| ((i as f32 * 0.05).sin() * i16::MAX as f32) as i16)
            .collect();
        let right: Vec<i16> = (0..4096)
            .map(|i| if i % 2 == 0 { i16::MIN } else { i16::MAX })
            .collect();

        let samples = ingest(&flac_bytes(4096, &[left, right])).unwrap();

        assert_eq!(samples.len(), 4096);
        assert!(samples.iter().all(|s| (-1.0..=1.0).contains(s)));
        assert!(samples.iter().any(|&s| s != 0.0));
    }

    #[test]
    fn truncates_flac_to_sample_budget() {
        let mono = vec![1000i16; 120 * 4096];

        let samples = ingest(&flac_bytes(4096, &[mono])).unwrap();

        assert_eq!(samples.len(), MAX_SAMPLES);
    }

    #[test]
    fn rejects_short_flac() {
        let mono = vec![0i16; 1024];

        match ingest(&flac_bytes(1024, &[mono])) {
            Err(Error::TooShort { samples, required }) => {
                assert_eq!(samples, 1024);
                assert_eq!(required, WINDOW_SIZE);
            }
            other => panic!("expected TooShort, got {other:?}"),
        }
    }

    #[test]
    fn normalizes_16_bit_samples() {
        let mut pcm = vec![0i16; WINDOW_SIZE];
        pcm[0] = 16384;
        pcm[1] = -32768;
        pcm[2] = 32767;

        let samples = ingest(&wav_bytes(1, 16, &pcm)).unwrap();

        assert_eq!(samples.len(), WINDOW_SIZE);
        assert_eq!(samples[0], 0.5);
        assert_eq!(samples[1], -1.0);
        assert!((samples[2] - 32767.0 / 32768.0).abs() < f32::EPSILON);
    }

    #[test]
    fn normalizes_8_bit_samples() {
        let mut pcm = vec![0u8; WINDOW_SIZE];
        pcm[0] = 128;
        pcm[1] = 64;
        pcm[2] = 255;

        let samples = ingest(&riff(FORMAT_PCM, 1, 8, None, &pcm)).unwrap();

        assert_eq!(samples[0], 0.0);
        assert_eq!(samples[1], -0.5);
        assert_eq!(samples[2], 127.0 / 128.0);
        assert_eq!(samples[3], -1.0);
    }

    #[test]
    fn reads_8_bit_files_written_by_hound() {
        let pcm = vec![-64i8; WINDOW_SIZE];
        let samples = ingest(&wav_bytes(1, 8, &pcm)).unwrap();

        assert!(samples.iter().all(|&s| s == -0.5));
    }

    #[test]
    fn averages_stereo_channels() {
        let pcm: Vec<i16> = (0..WINDOW_SIZE).flat_map(|_| [16384i16, 0]).collect();

        let samples = ingest(&wav_bytes(2, 16, &pcm)).unwrap();

        assert_eq!(samples.len(), WINDOW_SIZE);
        assert!(samples.iter().all(|&s| s == 0.25));
    }

    #[test]
    fn truncates_to_sample_budget() {
        let pcm = vec![1000i16; MAX_SAMPLES + SAMPLE_RATE as usize];

        let samples = ingest(&wav_bytes(1, 16, &pcm)).unwrap();

        assert_eq!(samples.len(), MAX_SAMPLES);
    }

    #[test]
    fn skips_chunks_before_fmt() {
        let data: Vec<u8> = (0..WINDOW_SIZE).flat_map(|_| 8192i16.to_le_bytes()).collect();

        let samples = ingest(&riff(FORMAT_PCM, 1, 16, Some(b"INFOISFT"), &data)).unwrap();

        assert_eq!(samples.len(), WINDOW_SIZE);
        assert!(samples.iter().all(|&s| s == 0.25));
    }

    #[test]
    fn drops_trailing_partial_frame() {
        let mut data: Vec<u8> = (0..WINDOW_SIZE).flat_map(|_| 0i16.to_le_bytes()).collect();
        data.push(0x7f);

        let samples = ingest(&riff(FORMAT_PCM, 1, 16, None, &data)).unwrap();

        assert_eq!(samples.len(), WINDOW_SIZE);
    }

    #[test]
    fn rejects_short_audio() {
        // roughly 23 ms at the target rate
        let pcm = vec![0i16; 1000];

        match ingest(&wav_bytes(1, 16, &pcm)) {
            Err(Error::TooShort { samples, required }) => {
                assert_eq!(samples, 1000);
                assert_eq!(required, WINDOW_SIZE);
            }
            other => panic!("expected TooShort, got {other:?}"),
        }
    }

    #[test]
    fn rejects_riff_without_wave_signature() {
        let mut bytes = wav_bytes(1, 16, &vec![0i16; WINDOW_SIZE]);
        bytes[8..12].copy_from_slice(b"AVI ");

        assert!(matches!(
            ingest(&bytes),
            Err(Error::Decode(DecodeError::MissingWaveSignature))
        ));
    }

    #[test]
    fn rejects_truncated_riff_header() {
        assert!(matches!(
            ingest(b"RIFF\0\0"),
            Err(Error::Decode(DecodeError::MalformedHeader(_)))
        ));
    }

    #[test]
    fn rejects_missing_fmt_chunk() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF\x0c\0\0\0WAVE");
        bytes.extend_from_slice(b"data\x04\0\0\0\0\0\0\0");

        assert!(matches!(
            ingest(&bytes),
            Err(Error::Decode(DecodeError::MalformedHeader(_)))
        ));
    }

    #[test]
    fn rejects_unsupported_bit_depth() {
        let data = vec![0u8; WINDOW_SIZE * 3];

        assert!(matches!(
            ingest(&riff(FORMAT_PCM, 1, 24, None, &data)),
            Err(Error::Decode(DecodeError::UnsupportedBitDepth(24)))
        ));
    }

    #[test]
    fn rejects_float_format() {
        let data = vec![0u8; WINDOW_SIZE * 4];

        assert!(matches!(
            ingest(&riff(3, 1, 32, None, &data)),
            Err(Error::Decode(DecodeError::UnsupportedFormat(3)))
        ));
    }

    #[test]
    fn rejects_zero_channels() {
        let data = vec![0u8; WINDOW_SIZE * 2];

        assert!(matches!(
            ingest(&riff(FORMAT_PCM, 0, 16, None, &data)),
            Err(Error::Decode(DecodeError::MalformedHeader(_)))
        ));
    }

    #[test]
    fn rejects_unrecognized_signature() {
        let garbage: Vec<u8> = (0..4096u32).map(|i| (i * 31 % 251) as u8).collect();

        assert!(matches!(ingest(&garbage), Err(Error::Decode(_))));
    }
}
