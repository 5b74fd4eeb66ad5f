//! 256-bin histograms and the threshold selectors built on them.

/// Per-value counts of an 8-bit channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram {
    pub bins: [u64; 256],
    pub total: u64,
}

impl Histogram {
    pub fn from_values(values: &[u8]) -> Self {
        let mut bins = [0u64; 256];
        for &v in values {
            bins[v as usize] += 1;
        }
        Self {
            bins,
            total: values.len() as u64,
        }
    }

    /// Smallest and largest populated bins, or `None` when empty.
    pub fn range(&self) -> Option<(u8, u8)> {
        let lo = self.bins.iter().position(|&c| c > 0)?;
        let hi = self.bins.iter().rposition(|&c| c > 0)?;
        Some((lo as u8, hi as u8))
    }

    /// Otsu's threshold: maximizes the between-class variance.
    ///
    /// Pixels strictly greater than the returned value form the foreground.
    pub fn otsu(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let total = self.total as f64;
        let sum_all: f64 = self
            .bins
            .iter()
            .enumerate()
            .map(|(i, &c)| i as f64 * c as f64)
            .sum();

        let mut best = 0u8;
        let mut best_var = -1.0f64;
        let mut weight_bg = 0.0f64;
        let mut sum_bg = 0.0f64;

        for t in 0..256 {
            weight_bg += self.bins[t] as f64;
            if weight_bg == 0.0 {
                continue;
            }
            let weight_fg = total - weight_bg;
            if weight_fg == 0.0 {
                break;
            }
            sum_bg += t as f64 * self.bins[t] as f64;
            let mean_bg = sum_bg / weight_bg;
            let mean_fg = (sum_all - sum_bg) / weight_fg;
            let between = weight_bg * weight_fg * (mean_bg - mean_fg).powi(2);
            if between > best_var {
                best_var = between;
                best = t as u8;
            }
        }
        best
    }

    /// Triangle threshold: the bin farthest from the line joining the peak
    /// to the far end of the histogram.
    pub fn triangle(&self) -> u8 {
        let Some((lo, hi)) = self.range() else {
            return 0;
        };
        if lo == hi {
            return lo;
        }

        let (peak, &peak_count) = self
            .bins
            .iter()
            .enumerate()
            .max_by_key(|&(i, c)| (*c, std::cmp::Reverse(i)))
            .unwrap_or((0, &0));

        // Walk toward the longer tail.
        let (lo, hi) = (lo as usize, hi as usize);
        let flip = peak - lo > hi - peak;
        let end = if flip { lo } else { hi };

        let (x0, y0) = (peak as f64, peak_count as f64);
        let (x1, y1) = (end as f64, self.bins[end] as f64);
        let (dx, dy) = (x1 - x0, y1 - y0);
        let norm = (dx * dx + dy * dy).sqrt();

        let range: Box<dyn Iterator<Item = usize>> = if flip {
            Box::new(end..=peak)
        } else {
            Box::new(peak..=end)
        };

        let mut best = peak;
        let mut best_dist = -1.0f64;
        for i in range {
            let (x, y) = (i as f64, self.bins[i] as f64);
            let dist = ((dy * x - dx * y + x1 * y0 - y1 * x0) / norm).abs();
            if dist > best_dist {
                best_dist = dist;
                best = i;
            }
        }
        best as u8
    }

    /// Lookup table mapping each value through the normalized CDF.
    pub fn equalization_lut(&self) -> [u8; 256] {
        let mut lut = [0u8; 256];
        let Some((lo, _)) = self.range() else {
            return lut;
        };
        let cdf_min = self.bins[lo as usize];
        let denom = self.total.saturating_sub(cdf_min);
        let mut cdf = 0u64;
        for (v, slot) in lut.iter_mut().enumerate() {
            cdf += self.bins[v];
            *slot = if denom == 0 {
                v as u8
            } else {
                let scaled = cdf.saturating_sub(cdf_min) as f64 / denom as f64 * 255.0;
                scaled.round().clamp(0.0, 255.0) as u8
            };
        }
        lut
    }
}
