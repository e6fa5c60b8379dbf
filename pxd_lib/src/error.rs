use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
#[error("error reading {path:?}")]
pub struct ReadFileError {
    pub path: PathBuf,
    #[source]
    pub source: binrw::Error,
}

#[derive(Debug, Error)]
pub enum OffsetTableError {
    #[error("offset table entry at byte {position} is truncated")]
    Truncated { position: usize },
}

#[derive(Debug, Error)]
pub enum CompressionError {
    #[error("track compressor returned no data for {input_size} input bytes")]
    EmptyOutput { input_size: usize },

    #[error("error writing track data: {0}")]
    Binrw(#[from] binrw::Error),
}

#[derive(Debug, Error)]
pub enum DecompressTracksError {
    #[error("track compressor returned no data for {input_size} input bytes")]
    EmptyOutput { input_size: usize },

    #[error("decompressed track data has {size} bytes but the header requires at least 16 bytes")]
    Truncated { size: usize },

    #[error("error reading track data: {0}")]
    Binrw(#[from] binrw::Error),
}
