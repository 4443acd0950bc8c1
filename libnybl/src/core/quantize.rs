// Companded quantization shared by the coefficient and noise coders

/// Quantize a non-negative value under quadratic companding.
///
/// The decision levels sit at `sqrt(x - 0.25) + 0.5`, which is the
/// closed-form solution to minimizing the squared error against both
/// `xq^2` and `(xq + 1)^2`; the smallest input that quantizes above
/// zero is 0.5.
pub fn companded_quantize_unsigned(v: f32) -> i32 {
    if v >= 0.5 {
        (v - 0.25).sqrt().round() as i32
    } else {
        0
    }
}

/// Signed variant: quantizes the magnitude, then restores the sign
pub fn companded_quantize(v: f32) -> i32 {
    let vq = companded_quantize_unsigned(v.abs());
    if v < 0.0 {
        -vq
    } else {
        vq
    }
}

/// Quantize a coefficient, clamping to `0..=limit`
pub fn companded_quantize_coef_unsigned(v: f32, limit: i32) -> i32 {
    companded_quantize_unsigned(v).min(limit)
}

/// Signed, clamped coefficient quantizer
pub fn companded_quantize_coef(v: f32, limit: i32) -> i32 {
    let vq = companded_quantize_coef_unsigned(v.abs(), limit);
    if v < 0.0 {
        -vq
    } else {
        vq
    }
}
