//! Numeric helpers shared by the senders

pub mod window;

pub use window::WindowKind;

/// Input sample types accepted by `process_block`
pub trait Sample: Copy + Send + 'static {
    fn to_f32(self) -> f32;
}

impl Sample for f32 {
    #[inline]
    fn to_f32(self) -> f32 {
        self
    }
}

impl Sample for f64 {
    #[inline]
    fn to_f32(self) -> f32 {
        self as f32
    }
}

/// Below this magnitude envelope state is forced to exact zero
pub const DENORMAL_FLOOR: f32 = 1.0e-15;

/// Flush denormal and near-denormal values to zero
#[inline]
pub fn flush_denormal(x: f32) -> f32 {
    if x.abs() < DENORMAL_FLOOR {
        0.0
    } else {
        x
    }
}

/// Linear amplitude to dBFS, clamped to `floor_db`
#[inline]
pub fn amp_to_db(amp: f32, floor_db: f32) -> f32 {
    if amp <= 0.0 {
        return floor_db;
    }
    (20.0 * amp.log10()).max(floor_db)
}

/// dBFS to linear amplitude
#[inline]
pub fn db_to_amp(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

/// Milliseconds to the nearest whole number of samples
pub fn ms_to_samples(ms: f32, sample_rate: f32) -> usize {
    (ms * 0.001 * sample_rate).round() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_flush_denormal() {
        assert_eq!(flush_denormal(f32::MIN_POSITIVE / 4.0), 0.0);
        assert_eq!(flush_denormal(-1.0e-20), 0.0);
        assert_eq!(flush_denormal(0.25), 0.25);
    }

    #[test]
    fn test_db_conversions() {
        assert_relative_eq!(amp_to_db(1.0, -120.0), 0.0);
        assert_relative_eq!(amp_to_db(0.5, -120.0), -6.0206, epsilon = 1e-3);
        assert_eq!(amp_to_db(0.0, -90.0), -90.0);
        assert_relative_eq!(db_to_amp(-20.0), 0.1, epsilon = 1e-6);
    }

    #[test]
    fn test_ms_to_samples() {
        assert_eq!(ms_to_samples(5.0, 48000.0), 240);
        assert_eq!(ms_to_samples(0.01, 48000.0), 0);
        assert_eq!(ms_to_samples(0.0, 48000.0), 0);
    }

    #[test]
    fn test_sample_conversion() {
        assert_eq!(0.5f64.to_f32(), 0.5f32);
    }
}
