//! Error types shared by the fingerprint pipeline and the store.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("audio too short: {samples} samples decoded, at least {required} required")]
    TooShort { samples: usize, required: usize },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Why a byte stream could not be turned into samples.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid WAV format: missing WAVE signature")]
    MissingWaveSignature,

    #[error("invalid WAV format: {0}")]
    MalformedHeader(&'static str),

    #[error("unsupported WAV format tag {0:#06x}")]
    UnsupportedFormat(u16),

    #[error("unsupported bit depth: {0} bits per sample")]
    UnsupportedBitDepth(u16),

    #[error("compressed stream has no decodable audio track")]
    NoAudioTrack,

    #[error("compressed stream: {0}")]
    Compressed(#[from] symphonia::core::errors::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
