//! `.nybl` container writer
//!
//! Layout:
//! ```text
//! magic "NYB!" (4)
//! version_major u8, version_minor u8
//! flags u16         bit 0: stream was encoded with a bitrate target
//! sample_rate u32
//! channels u8, reserved u8
//! block_size u16
//! total_samples u64 (per channel, before block padding)
//! n_blocks u32
//! data_size u32     total size of the block region in bytes
//! data_crc32 u32    CRC-32 of the block region
//! meta_size u32
//! [metadata: JSON]
//! [blocks: n_blocks x { bit_size u32, payload ceil(bit_size/8) bytes }]
//! ```
//! All integers little-endian.

use crate::core::{compute_crc32, MAGIC, VERSION_MAJOR, VERSION_MINOR};
use crate::encoder::EncodedBlock;
use crate::NyblResult;

/// Fixed header size in bytes, including the magic
pub const HEADER_SIZE: usize = 4 + 2 + 2 + 4 + 2 + 2 + 8 + 4 + 4 + 4 + 4;

/// Stream was encoded against a bitrate target rather than a quality one
pub const FLAG_CBR: u16 = 0x0001;

/// Serializes encoded blocks into a `.nybl` file
#[derive(Debug, Default)]
pub struct Writer;

impl Writer {
    pub fn new() -> Self {
        Self
    }

    /// Assemble a complete file from encoded blocks
    pub fn write(
        &self,
        sample_rate: u32,
        channels: u8,
        block_size: u16,
        total_samples: u64,
        flags: u16,
        blocks: &[EncodedBlock],
        metadata: &[u8],
    ) -> NyblResult<Vec<u8>> {
        if blocks.len() > u32::MAX as usize {
            return Err("Too many blocks".to_string());
        }

        // block region first so the header can carry its CRC
        let mut data = Vec::new();
        for block in blocks {
            let n_bytes = block.bit_size.div_ceil(8);
            if block.data.len() != n_bytes {
                return Err(format!(
                    "Block payload is {} bytes but bit size {} needs {}",
                    block.data.len(),
                    block.bit_size,
                    n_bytes
                ));
            }
            data.extend_from_slice(&(block.bit_size as u32).to_le_bytes());
            data.extend_from_slice(&block.data);
        }
        let data_size =
            u32::try_from(data.len()).map_err(|_| "Block region too large".to_string())?;
        let meta_size =
            u32::try_from(metadata.len()).map_err(|_| "Metadata too large".to_string())?;

        let mut out = Vec::with_capacity(HEADER_SIZE + metadata.len() + data.len());
        out.extend_from_slice(&MAGIC);
        out.push(VERSION_MAJOR);
        out.push(VERSION_MINOR);
        out.extend_from_slice(&flags.to_le_bytes());
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.push(channels);
        out.push(0); // reserved
        out.extend_from_slice(&block_size.to_le_bytes());
        out.extend_from_slice(&total_samples.to_le_bytes());
        out.extend_from_slice(&(blocks.len() as u32).to_le_bytes());
        out.extend_from_slice(&data_size.to_le_bytes());
        out.extend_from_slice(&compute_crc32(&data).to_le_bytes());
        out.extend_from_slice(&meta_size.to_le_bytes());
        out.extend_from_slice(metadata);
        out.extend_from_slice(&data);
        Ok(out)
    }
}
