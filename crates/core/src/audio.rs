//! Sample-level post-processing applied to generated audio.
//!
//! Buffers are interleaved `f32` PCM in the range `[-1.0, 1.0]`.

/// Gains smaller than this (in dB) are treated as unity.
pub const UNITY_GAIN_EPSILON_DB: f64 = 1e-6;

/// Convert a gain in decibels to a linear amplitude multiplier.
pub fn db_to_linear(gain_db: f64) -> f64 {
    10f64.powf(gain_db / 20.0)
}

/// Scale every sample by `gain_db` and clamp to the valid sample range.
///
/// A (near) zero gain leaves the buffer untouched.
pub fn apply_gain(samples: &mut [f32], gain_db: f64) {
    if gain_db.abs() < UNITY_GAIN_EPSILON_DB {
        return;
    }
    let gain = db_to_linear(gain_db) as f32;
    for sample in samples.iter_mut() {
        *sample = (*sample * gain).clamp(-1.0, 1.0);
    }
}

/// Number of frames that make up exactly `duration_ms` at `sample_rate`.
pub fn exact_frame_count(duration_ms: u64, sample_rate: u32) -> usize {
    (duration_ms as f64 * f64::from(sample_rate) / 1000.0).round() as usize
}

/// Cut an interleaved buffer down to at most `frames` frames.
///
/// Shorter buffers are left as they are.
pub fn trim_to_frames(samples: &mut Vec<f32>, channels: u16, frames: usize) {
    let max_len = frames.saturating_mul(usize::from(channels.max(1)));
    samples.truncate(max_len);
}
