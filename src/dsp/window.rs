//! Analysis window functions for the STFT
//!
//! All windows use the periodic form over `n` points, so Hann peaks at
//! exactly 1.0 at `n / 2` and is exactly 0.0 at index 0.

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Selectable analysis window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    #[default]
    Hann,
    BlackmanHarris,
    Hamming,
    FlatTop,
    Rectangular,
}

impl WindowKind {
    /// Coefficient at index `i` of an `n`-point window
    pub fn value(self, i: usize, n: usize) -> f32 {
        let phase = 2.0 * PI * i as f32 / n as f32;
        match self {
            WindowKind::Hann => 0.5 - 0.5 * phase.cos(),
            WindowKind::Hamming => 0.54 - 0.46 * phase.cos(),
            WindowKind::BlackmanHarris => {
                0.35875 - 0.48829 * phase.cos() + 0.14128 * (2.0 * phase).cos()
                    - 0.01168 * (3.0 * phase).cos()
            }
            WindowKind::FlatTop => {
                0.215_578_95 - 0.416_631_58 * phase.cos() + 0.277_263_16 * (2.0 * phase).cos()
                    - 0.083_578_95 * (3.0 * phase).cos()
                    + 0.006_947_368 * (4.0 * phase).cos()
            }
            WindowKind::Rectangular => 1.0,
        }
    }

    /// Fill `out` with the window over `out.len()` points
    ///
    /// Returns the sum of squared coefficients, the magnitude scaling factor.
    pub fn fill(self, out: &mut [f32]) -> f32 {
        let n = out.len();
        let mut sum_sq = 0.0;
        for (i, w) in out.iter_mut().enumerate() {
            *w = self.value(i, n);
            sum_sq += *w * *w;
        }
        sum_sq
    }
}
