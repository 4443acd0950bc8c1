// Full disclosure, the DCT-IV/FFT factorization here follows the same
// technique as FFmpeg's MDCT and ejmahler's rust_dct.

use rustfft::{num_complex::Complex, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

/// DCT-IV of an even length via a half-length complex FFT
///
/// X[k] = sum u[n] * cos(pi/M * (n + 0.5) * (k + 0.5))
struct DctIv {
    m: usize,
    fft: Arc<dyn rustfft::Fft<f32>>,
    /// Pre-twiddles e^(-i*pi*n/M)
    pre: Vec<Complex<f32>>,
    /// Post-twiddles e^(-i*pi*(m + 1/4)/M)
    post: Vec<Complex<f32>>,
}

impl DctIv {
    fn new(m: usize) -> Self {
        assert!(m % 2 == 0, "DCT-IV length must be even");
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(m / 2);

        let pre: Vec<Complex<f32>> = (0..m / 2)
            .map(|n| {
                let theta = -PI * n as f32 / m as f32;
                Complex::new(theta.cos(), theta.sin())
            })
            .collect();
        let post: Vec<Complex<f32>> = (0..m / 2)
            .map(|k| {
                let theta = -PI * (k as f32 + 0.25) / m as f32;
                Complex::new(theta.cos(), theta.sin())
            })
            .collect();

        Self { m, fft, pre, post }
    }

    /// Compute the DCT-IV of `input` into `output` (both of length `m`)
    fn process(&self, input: &[f32], output: &mut [f32]) {
        let m = self.m;
        let half = m / 2;

        // Even samples ascending paired with odd samples descending
        let mut z: Vec<Complex<f32>> = (0..half)
            .map(|i| Complex::new(input[2 * i], input[m - 1 - 2 * i]) * self.pre[i])
            .collect();

        self.fft.process(&mut z);

        // E_k = post[k] * Z[k]; even outputs take the real part,
        // mirrored odd outputs the negated imaginary part
        for k in 0..half {
            let e = z[k] * self.post[k];
            output[2 * k] = e.re;
            output[m - 1 - 2 * k] = -e.im;
        }
    }
}

/// Folded overlap state carried between consecutive (sub-)blocks.
///
/// Holds up to `block_size / 2` samples; `len` tracks how much of it the
/// previous fold produced, since decimated sub-blocks shrink the carry.
#[derive(Debug, Clone)]
pub struct LapBuffer {
    data: Vec<f32>,
    len: usize,
}

impl LapBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0.0; capacity],
            len: capacity,
        }
    }

    /// Forget all carried state (used at stream start / reset)
    pub fn clear(&mut self) {
        self.data.fill(0.0);
        self.len = self.data.len();
    }
}

/// Lapped MDCT with per-block transition control.
///
/// Each (sub-)block's sine transition is centered on the middle of that
/// block and shared, via the lap buffer, with the following transform call,
/// so both halves of a transition always use the same overlap length. FFT
/// plans are prepared for every decimated size at construction.
pub struct Mdct {
    block_size: usize,
    // plans for block_size >> shift, shift = 0..=3
    transforms: Vec<DctIv>,
}

impl Mdct {
    /// Plan transforms for `block_size` and its decimated sub-sizes
    pub fn new(block_size: usize) -> Self {
        let transforms = (0..4)
            .filter(|shift| (block_size >> shift) >= 16)
            .map(|shift| DctIv::new(block_size >> shift))
            .collect();
        Self {
            block_size,
            transforms,
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    fn transform_for(&self, n: usize) -> &DctIv {
        self.transforms
            .iter()
            .find(|t| t.m == n)
            .expect("no transform planned for this sub-block size")
    }

    /// Rising half-window value at position `m` of an `n`-sample block
    /// whose transition region has length `overlap`
    pub fn transition_window(n: usize, overlap: usize, m: usize) -> f32 {
        let t0 = (n - overlap) / 2;
        if m < t0 {
            0.0
        } else if m >= t0 + overlap {
            1.0
        } else {
            (PI / 2.0 * ((m - t0) as f32 + 0.5) / overlap as f32).sin()
        }
    }

    /// Forward transform of one (sub-)block.
    ///
    /// `input` has `n` samples, `out` receives `n` coefficients; `overlap`
    /// is the transition length in samples (0..=n). The previous call's
    /// fold is consumed from `lap` and this block's fold replaces it.
    pub fn forward_sub_block(
        &self,
        input: &[f32],
        lap: &mut LapBuffer,
        overlap: usize,
        out: &mut [f32],
    ) {
        let n = input.len();
        let h = n / 2;
        debug_assert!(out.len() == n);
        debug_assert!(overlap <= n);

        let mut u = vec![0.0f32; n];

        // Current block folded around its middle with the fall transition
        for j in 0..h {
            let wf_hi = Self::transition_window(n, overlap, h - 1 - j);
            let wf_lo = Self::transition_window(n, overlap, h + j);
            u[j] = -input[h + j] * wf_hi - input[h - 1 - j] * wf_lo;
        }

        // Previous fold; decimation switches truncate or zero-extend it
        let carry = lap.len.min(h);
        u[h..h + carry].copy_from_slice(&lap.data[..carry]);

        // Store this block's rise-windowed fold for the next call
        for j in 0..h {
            lap.data[j] = input[j] * Self::transition_window(n, overlap, j)
                - input[n - 1 - j] * Self::transition_window(n, overlap, n - 1 - j);
        }
        lap.len = h;

        self.transform_for(n).process(&u, out);
    }

    /// Inverse of the DCT-IV stage (scaled so forward->inverse is identity
    /// up to the fold). The caller unfolds and overlap-adds.
    pub fn inverse_sub_block(&self, spectrum: &[f32], out: &mut [f32]) {
        let n = spectrum.len();
        self.transform_for(n).process(spectrum, out);
        let scale = 2.0 / n as f32;
        for v in out.iter_mut() {
            *v *= scale;
        }
    }
}
