pub mod crc32;
pub mod nybbles;
pub mod quantize;
pub mod types;

pub use crc32::compute as compute_crc32;
pub use nybbles::{NybbleReader, NybbleWriter};
pub use quantize::{
    companded_quantize, companded_quantize_coef, companded_quantize_coef_unsigned,
    companded_quantize_unsigned,
};
pub use types::*;
