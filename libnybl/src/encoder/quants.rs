//! Quantizer selection for the surviving keys of a block

use super::transform::AnalysisKey;
use crate::core::{MAX_LOG2_QUANT, MAX_QBANDS, QUANTIZER_UNUSED};

/// 1/ln(2) for converting nepers to log2
const INV_LN_2: f32 = 1.442_695_021_629_333_5;

/// Fill `quants[chan * MAX_QBANDS + q]` with the chosen `log2(step)` per
/// (channel, zone), computed as the weighted geometric mean of the
/// surviving coefficients in that zone, snapped to a power of two in
/// `0..=14`. Zones with no survivors are marked `QUANTIZER_UNUSED`.
///
/// `survivors` is the top of the weight-sorted key list; `nepers` holds
/// `ln|coef|` per channel laid out channel-major.
pub fn build_quants(
    quants: &mut [u8],
    survivors: &[AnalysisKey],
    nepers: &[f32],
    block_size: usize,
    n_chan: usize,
    n_qbands: usize,
) {
    debug_assert!(quants.len() >= n_chan * MAX_QBANDS);

    let mut sum = vec![0.0f32; n_chan * MAX_QBANDS];
    let mut sum_w = vec![0.0f32; n_chan * MAX_QBANDS];
    for key in survivors {
        let idx = key.chan as usize * MAX_QBANDS + key.qband as usize;
        let np = nepers[key.chan as usize * block_size + key.band as usize];
        sum[idx] += key.weight * np;
        sum_w[idx] += key.weight;
    }

    for chan in 0..n_chan {
        for q in 0..n_qbands {
            let idx = chan * MAX_QBANDS + q;
            quants[idx] = if sum_w[idx] > 0.0 {
                let step_np = sum[idx] / sum_w[idx];
                let log2_step = (step_np * INV_LN_2).round();
                log2_step.clamp(0.0, MAX_LOG2_QUANT as f32) as u8
            } else {
                QUANTIZER_UNUSED
            };
        }
    }
}
