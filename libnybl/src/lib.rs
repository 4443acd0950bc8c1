#![allow(clippy::needless_range_loop)]

//! libnybl — encoder for the nybl perceptual audio format
//!
//! The codec transforms blocks of PCM into a compact variable-length
//! stream of quantized MDCT coefficients: a transient detector picks the
//! window layout, a masking model ranks every bin, rate control keeps the
//! survivors inside a bit budget (CBR) or a quality target (VBR), and a
//! nybble coder packs quantizers, coefficients, and zero runs.

pub mod core;
pub mod encoder;
pub mod mdct;

mod reader;
mod writer;

pub use core::{
    compute_crc32, max_block_bits, max_coding_kbps, NybbleReader, NybbleWriter, NyblMetadata,
    COEF_EPS, MAGIC, MAX_QBANDS, QUANTIZER_UNUSED, VERSION_MAJOR, VERSION_MINOR,
};
pub use encoder::{EncodedBlock, Encoder, QualityPreset};
pub use mdct::{LapBuffer, Mdct};
pub use reader::{CodedBlock, NyblFile, NyblHeader, Reader};
pub use writer::{Writer, FLAG_CBR, HEADER_SIZE};

/// Result type used across the library
pub type NyblResult<T> = Result<T, String>;

/// get lib version
pub fn version() -> String {
    format!("{}.{}", VERSION_MAJOR, VERSION_MINOR)
}

/// Cut an interleaved stream into channel-major blocks, zero-padding the
/// final one
fn frame_blocks(samples: &[f32], channels: usize, block_size: usize) -> Vec<Vec<f32>> {
    let per_channel = samples.len() / channels;
    let n_blocks = per_channel.div_ceil(block_size).max(1);

    let mut blocks = Vec::with_capacity(n_blocks);
    for b in 0..n_blocks {
        let mut block = vec![0.0f32; channels * block_size];
        for ch in 0..channels {
            for n in 0..block_size {
                let src = (b * block_size + n) * channels + ch;
                if src < samples.len() {
                    block[ch * block_size + n] = samples[src];
                }
            }
        }
        blocks.push(block);
    }
    blocks
}

/// encode an interleaved f32 stream to a `.nybl` file at a fixed bitrate
///
/// # Arguments
/// * `samples` - Interleaved audio samples (f32, -1.0 to 1.0)
/// * `sample_rate` - Sample rate in Hz (e.g., 44100)
/// * `channels` - Number of channels
/// * `block_size` - Transform block size (power of two, 64..=8192)
/// * `rate_kbps` - Target bitrate in kbps
/// * `metadata` - Optional JSON metadata
pub fn encode_stream_cbr(
    samples: &[f32],
    sample_rate: u32,
    channels: u8,
    block_size: usize,
    rate_kbps: f32,
    metadata: Option<&NyblMetadata>,
) -> NyblResult<Vec<u8>> {
    encode_stream(
        samples,
        sample_rate,
        channels,
        block_size,
        Mode::Cbr(rate_kbps),
        metadata,
    )
}

/// encode an interleaved f32 stream to a `.nybl` file at a quality target
///
/// `quality` runs 0.0 (smallest) to 1.0 (best); see `QualityPreset` for
/// named points on that scale.
pub fn encode_stream_vbr(
    samples: &[f32],
    sample_rate: u32,
    channels: u8,
    block_size: usize,
    quality: f32,
    metadata: Option<&NyblMetadata>,
) -> NyblResult<Vec<u8>> {
    encode_stream(
        samples,
        sample_rate,
        channels,
        block_size,
        Mode::Vbr(quality),
        metadata,
    )
}

enum Mode {
    Cbr(f32),
    Vbr(f32),
}

fn encode_stream(
    samples: &[f32],
    sample_rate: u32,
    channels: u8,
    block_size: usize,
    mode: Mode,
    metadata: Option<&NyblMetadata>,
) -> NyblResult<Vec<u8>> {
    if channels == 0 {
        return Err("Channel count must be at least 1".to_string());
    }
    let mut enc = Encoder::new(sample_rate, channels as usize, block_size)?;

    let mut blocks = Vec::new();
    for block in frame_blocks(samples, channels as usize, block_size) {
        let coded = match mode {
            Mode::Cbr(kbps) => enc.encode_block_cbr(&block, kbps)?,
            Mode::Vbr(q) => enc.encode_block_vbr(&block, q)?,
        };
        blocks.push(coded);
    }

    let meta_bytes = match metadata {
        Some(m) if !m.is_empty() => m.to_json()?,
        _ => Vec::new(),
    };
    let flags = match mode {
        Mode::Cbr(_) => FLAG_CBR,
        Mode::Vbr(_) => 0,
    };

    let writer = Writer::new();
    writer.write(
        sample_rate,
        channels,
        block_size as u16,
        (samples.len() / channels as usize) as u64,
        flags,
        &blocks,
        &meta_bytes,
    )
}
