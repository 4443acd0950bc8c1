//! common types and constants for the nybl codec

use serde::{Deserialize, Serialize};

// container constants

/// Magic number "NYB!"
pub const MAGIC: [u8; 4] = [0x4e, 0x59, 0x42, 0x21];

/// format version
pub const VERSION_MAJOR: u8 = 1;
pub const VERSION_MINOR: u8 = 0;

// codec constants

/// Lowest possible coefficient value (2^-31)
pub const COEF_EPS: f32 = 4.656_612_873_077_393e-10;

/// Sentinel for log-domain coefficients below `COEF_EPS / 2`.
///
/// Out-of-range coefficients only ever enter weighted geometric means,
/// where a zero contribution is the intended behaviour, so the sentinel
/// can share a representable value.
pub const COEF_NEPER_OUT_OF_RANGE: f32 = 0.0;

/// Maximum number of quantizer zones per channel
pub const MAX_QBANDS: usize = 48;

/// Largest codeable `log2(step)`; `0xF` in the header marks an unused zone
pub const MAX_LOG2_QUANT: u8 = 14;

/// Quantizer header nybble marking a skipped zone
pub const QUANTIZER_UNUSED: u8 = 0xF;

/// Input samples are ±1.0 floats; the quantizer range `0..14` presumes
/// 16-bit PCM scale, so the transform applies this gain up front.
pub const PCM_SCALE: f32 = 32768.0;

/// Maximum coded size of one block, in bits
pub fn max_block_bits(n_chan: usize, block_size: usize) -> usize {
    8 + n_chan * (12 + 20 * (block_size - 1))
}

/// Highest bitrate the format can express for a given configuration, in kbps.
///
/// Derived from `max_block_bits` and the block duration; the rate controller
/// uses it to relate a requested bitrate to the codeable ceiling.
pub fn max_coding_kbps(n_chan: usize, block_size: usize, rate_hz: u32) -> f32 {
    max_block_bits(n_chan, block_size) as f32 * rate_hz as f32 / block_size as f32 / 1000.0
}

/// Descriptive metadata embedded in a `.nybl` file (JSON-encoded)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NyblMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl NyblMetadata {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.artist.is_none() && self.album.is_none() && self.comment.is_none()
    }

    pub fn to_json(&self) -> crate::NyblResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| format!("Metadata serialization error: {}", e))
    }

    pub fn from_json(data: &[u8]) -> crate::NyblResult<Self> {
        serde_json::from_slice(data).map_err(|e| format!("Invalid metadata: {}", e))
    }
}
