//! Requested decode bounds and subsample factor selection.

/// Bounds a decoded image should meet or exceed.
///
/// A zero bound leaves that axis unconstrained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecodeTarget {
    /// Requested width in pixels.
    pub requested_width: u32,
    /// Requested height in pixels.
    pub requested_height: u32,
}

impl DecodeTarget {
    /// Creates a target with the given bounds.
    #[must_use]
    pub const fn new(requested_width: u32, requested_height: u32) -> Self {
        Self {
            requested_width,
            requested_height,
        }
    }

    /// Target that keeps the source resolution.
    #[must_use]
    pub const fn original() -> Self {
        Self::new(0, 0)
    }

    /// Largest integer factor `k >= 1` for which `width / k` and `height / k`
    /// still meet the requested bounds. Never upsamples.
    #[must_use]
    pub fn sample_factor(&self, width: u32, height: u32) -> u32 {
        let by_width = ratio(width, self.requested_width);
        let by_height = ratio(height, self.requested_height);
        let factor = match (by_width, by_height) {
            (Some(w), Some(h)) => w.min(h),
            (Some(k), None) | (None, Some(k)) => k,
            (None, None) => 1,
        };
        factor.max(1)
    }

    /// Dimensions produced by decoding at `factor`.
    #[must_use]
    pub fn sampled_dimensions(width: u32, height: u32, factor: u32) -> (u32, u32) {
        let factor = factor.max(1);
        ((width / factor).max(1), (height / factor).max(1))
    }
}

fn ratio(source: u32, requested: u32) -> Option<u32> {
    (requested > 0).then(|| source / requested)
}
