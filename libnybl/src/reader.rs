//! `.nybl` container reader; see `writer` for the layout

use crate::core::{compute_crc32, MAGIC};
use crate::writer::HEADER_SIZE;
use crate::NyblResult;

/// Parsed file header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NyblHeader {
    pub version_major: u8,
    pub version_minor: u8,
    pub flags: u16,
    pub sample_rate: u32,
    pub channels: u8,
    pub block_size: u16,
    pub total_samples: u64,
    pub n_blocks: u32,
    pub data_size: u32,
    pub data_crc32: u32,
    pub meta_size: u32,
}

/// One coded block as stored in the container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodedBlock {
    pub bit_size: usize,
    pub data: Vec<u8>,
}

/// Parsed file: header, raw metadata bytes, coded blocks
#[derive(Debug, Clone)]
pub struct NyblFile {
    pub header: NyblHeader,
    pub metadata: Vec<u8>,
    pub blocks: Vec<CodedBlock>,
    crc_computed: u32,
}

impl NyblFile {
    /// Does the stored CRC match the block region?
    pub fn crc_valid(&self) -> bool {
        self.crc_computed == self.header.data_crc32
    }
}

/// Parses `.nybl` files
#[derive(Debug, Default)]
pub struct Reader;

impl Reader {
    pub fn new() -> Self {
        Self
    }

    /// Parse a complete file from bytes
    pub fn read(&self, data: &[u8]) -> NyblResult<NyblFile> {
        if data.len() < HEADER_SIZE {
            return Err("File too small to be a nybl file".to_string());
        }
        if data[0..4] != MAGIC {
            return Err("Invalid nybl file: bad magic".to_string());
        }

        let u16_at = |o: usize| u16::from_le_bytes([data[o], data[o + 1]]);
        let u32_at = |o: usize| u32::from_le_bytes([data[o], data[o + 1], data[o + 2], data[o + 3]]);
        let u64_at = |o: usize| {
            let mut b = [0u8; 8];
            b.copy_from_slice(&data[o..o + 8]);
            u64::from_le_bytes(b)
        };

        let header = NyblHeader {
            version_major: data[4],
            version_minor: data[5],
            flags: u16_at(6),
            sample_rate: u32_at(8),
            channels: data[12],
            block_size: u16_at(14),
            total_samples: u64_at(16),
            n_blocks: u32_at(24),
            data_size: u32_at(28),
            data_crc32: u32_at(32),
            meta_size: u32_at(36),
        };

        let meta_start = HEADER_SIZE;
        let meta_end = meta_start + header.meta_size as usize;
        let data_end = meta_end + header.data_size as usize;
        if data.len() < data_end {
            return Err("Truncated nybl file".to_string());
        }
        let metadata = data[meta_start..meta_end].to_vec();
        let region = &data[meta_end..data_end];
        let crc_computed = compute_crc32(region);

        // walk the block region
        let mut blocks = Vec::with_capacity(header.n_blocks as usize);
        let mut cursor = 0usize;
        for _ in 0..header.n_blocks {
            if cursor + 4 > region.len() {
                return Err("Truncated block region".to_string());
            }
            let bit_size = u32::from_le_bytes([
                region[cursor],
                region[cursor + 1],
                region[cursor + 2],
                region[cursor + 3],
            ]) as usize;
            cursor += 4;
            let n_bytes = bit_size.div_ceil(8);
            if cursor + n_bytes > region.len() {
                return Err("Truncated block payload".to_string());
            }
            blocks.push(CodedBlock {
                bit_size,
                data: region[cursor..cursor + n_bytes].to_vec(),
            });
            cursor += n_bytes;
        }

        Ok(NyblFile {
            header,
            metadata,
            blocks,
            crc_computed,
        })
    }
}
