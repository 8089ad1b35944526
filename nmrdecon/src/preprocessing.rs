//! Signal smoothing and noise scoring.
//!
//! Smoothing is a centered moving average applied a configurable number of times. The noise
//! level is a robust estimate of the standard deviation of the raw intensities' high frequency
//! component, and every sample is scored by how many noise levels its smoothed intensity sits
//! above zero.

use crate::error::DeconvolutionError;
use crate::interval::SimpleInterval;
use crate::spectrum::Spectrum;

/// Scales a median absolute deviation to a normal standard deviation
const MAD_SCALE: f64 = 1.4826;

/// Map a possibly out-of-bounds index onto `0..n` by mirror reflection about the
/// first and last samples, without repeating them.
fn reflect(j: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let period = 2 * (n as isize - 1);
    let k = j.rem_euclid(period);
    if k >= n as isize {
        (period - k) as usize
    } else {
        k as usize
    }
}

/// A centered moving average
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovingAverageSmoother {
    /// How many times to apply the filter. Zero disables smoothing.
    pub iterations: usize,
    /// The number of samples in the window. Must be odd.
    pub window_size: usize,
}

impl Default for MovingAverageSmoother {
    fn default() -> Self {
        Self {
            iterations: 2,
            window_size: 5,
        }
    }
}

impl MovingAverageSmoother {
    pub fn new(iterations: usize, window_size: usize) -> Self {
        Self {
            iterations,
            window_size,
        }
    }

    fn smooth_once(&self, values: &[f64]) -> Vec<f64> {
        let n = values.len();
        let half = (self.window_size / 2) as isize;
        let mut prefix = Vec::with_capacity(n + self.window_size);
        prefix.push(0.0);
        let mut acc = 0.0;
        for j in -half..(n as isize + half) {
            acc += values[reflect(j, n)];
            prefix.push(acc);
        }
        let w = self.window_size;
        (0..n)
            .map(|i| (prefix[i + w] - prefix[i]) / w as f64)
            .collect()
    }

    /// Smooth `values`, returning a new array of the same length
    pub fn smooth(&self, values: &[f64]) -> Vec<f64> {
        let mut current = values.to_vec();
        if values.is_empty() || self.window_size <= 1 {
            return current;
        }
        for _ in 0..self.iterations {
            current = self.smooth_once(&current);
        }
        current
    }
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();
    if n == 0 {
        0.0
    } else if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

/// Estimate the standard deviation of the noise in `intensities` from the second
/// difference residual `y[i] - (y[i - 1] + y[i + 1]) / 2`, considering only positions
/// where `usable` holds for the sample and both its neighbors.
///
/// For white noise with standard deviation `σ` the residual has standard deviation
/// `σ * sqrt(1.5)`, which is divided back out.
pub fn estimate_noise_level(intensities: &[f64], usable: &[bool]) -> f64 {
    let n = intensities.len();
    if n < 3 {
        return 0.0;
    }
    let mut residuals: Vec<f64> = (1..n - 1)
        .filter(|i| usable[i - 1] && usable[*i] && usable[i + 1])
        .map(|i| intensities[i] - (intensities[i - 1] + intensities[i + 1]) / 2.0)
        .collect();
    if residuals.is_empty() {
        return 0.0;
    }
    let center = median(&mut residuals);
    let mut deviations: Vec<f64> = residuals.iter().map(|r| (r - center).abs()).collect();
    MAD_SCALE * median(&mut deviations) / 1.5f64.sqrt()
}

/// The output of [`Preprocessor::process`]
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessedSignal {
    /// The smoothed intensities, the same length as the input
    pub smoothed: Vec<f64>,
    /// The noise score of each sample, zero outside of the usable samples
    pub scores: Vec<f64>,
    /// Whether each sample is inside the signal boundaries and outside every ignore region
    pub usable: Vec<bool>,
    /// The estimated noise standard deviation
    pub noise_level: f64,
    /// The score a sample must exceed to count as signal
    pub threshold: f64,
}

impl PreprocessedSignal {
    pub fn len(&self) -> usize {
        self.smoothed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.smoothed.is_empty()
    }

    #[inline]
    pub fn is_signal(&self, index: usize) -> bool {
        self.usable[index] && self.scores[index] > self.threshold
    }

    /// The smoothed intensity difference a feature must exceed to stand out from noise
    pub fn prominence_tolerance(&self) -> f64 {
        self.threshold * self.noise_level
    }

    pub fn usable_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.usable
            .iter()
            .enumerate()
            .filter_map(|(i, u)| u.then_some(i))
    }

    pub fn usable_count(&self) -> usize {
        self.usable.iter().filter(|u| **u).count()
    }

    /// The population variance of the smoothed intensities over the usable samples
    pub fn usable_variance(&self) -> f64 {
        let n = self.usable_count();
        if n == 0 {
            return 0.0;
        }
        let mean = self.usable_indices().map(|i| self.smoothed[i]).sum::<f64>() / n as f64;
        self.usable_indices()
            .map(|i| (self.smoothed[i] - mean).powi(2))
            .sum::<f64>()
            / n as f64
    }
}

/// Smooths a spectrum and scores each sample against the noise level
#[derive(Debug, Clone, PartialEq)]
pub struct Preprocessor {
    pub smoother: MovingAverageSmoother,
    pub noise_threshold: f64,
}

impl Preprocessor {
    pub fn new(smoother: MovingAverageSmoother, noise_threshold: f64) -> Self {
        Self {
            smoother,
            noise_threshold,
        }
    }

    /// Which samples are inside the signal boundaries and outside of every ignore region
    pub fn usable_mask(spectrum: &Spectrum, ignore_regions: &[SimpleInterval<f64>]) -> Vec<bool> {
        let region = spectrum.signal_region();
        let mut usable: Vec<bool> = (0..spectrum.len()).map(|i| region.contains(&i)).collect();
        for iv in ignore_regions {
            for i in spectrum.indices_within(iv) {
                usable[i] = false;
            }
        }
        usable
    }

    /// Smooth the intensities of `spectrum` and score every usable sample.
    ///
    /// Fails with [`DeconvolutionError::EmptyRegion`] when no sample lies inside
    /// the signal boundaries and outside of every ignore region.
    #[tracing::instrument(skip_all, level = "debug")]
    pub fn process(
        &self,
        spectrum: &Spectrum,
        ignore_regions: &[SimpleInterval<f64>],
    ) -> Result<PreprocessedSignal, DeconvolutionError> {
        let usable = Self::usable_mask(spectrum, ignore_regions);
        if !usable.iter().any(|u| *u) {
            let bounds = spectrum.signal_boundaries();
            return Err(DeconvolutionError::EmptyRegion {
                start: bounds.start,
                end: bounds.end,
            });
        }

        let smoothed = self.smoother.smooth(spectrum.intensities());
        let noise_level = estimate_noise_level(spectrum.intensities(), &usable);
        let scores: Vec<f64> = smoothed
            .iter()
            .zip(usable.iter())
            .map(|(s, u)| {
                if !*u {
                    0.0
                } else if noise_level > 0.0 {
                    s / noise_level
                } else if *s > 0.0 {
                    f64::INFINITY
                } else {
                    0.0
                }
            })
            .collect();

        tracing::debug!(
            noise_level,
            usable = usable.iter().filter(|u| **u).count(),
            "Preprocessed {} samples",
            smoothed.len()
        );

        Ok(PreprocessedSignal {
            smoothed,
            scores,
            usable,
            noise_level,
            threshold: self.noise_threshold,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_reflect() {
        assert_eq!(reflect(-1, 5), 1);
        assert_eq!(reflect(-2, 5), 2);
        assert_eq!(reflect(5, 5), 3);
        assert_eq!(reflect(6, 5), 2);
        assert_eq!(reflect(3, 5), 3);
        assert_eq!(reflect(-3, 1), 0);
    }

    #[test]
    fn test_smooth_preserves_length() {
        let values: Vec<f64> = (0..17).map(|i| ((i * 7) % 5) as f64).collect();
        for window_size in [1, 3, 5, 9, 21] {
            let smoother = MovingAverageSmoother::new(3, window_size);
            assert_eq!(smoother.smooth(&values).len(), values.len());
        }
        let constant = vec![2.5; 11];
        let smoothed = MovingAverageSmoother::new(2, 5).smooth(&constant);
        for v in smoothed {
            assert!((v - 2.5).abs() < 1e-12);
        }
        assert_eq!(MovingAverageSmoother::new(0, 5).smooth(&values), values);
    }

    #[test]
    fn test_smooth_once() {
        let values = vec![0.0, 3.0, 0.0, 0.0, 0.0];
        let smoothed = MovingAverageSmoother::new(1, 3).smooth(&values);
        // The first sample sees [3.0, 0.0, 3.0] through the mirror
        assert!((smoothed[0] - 2.0).abs() < 1e-12);
        assert!((smoothed[1] - 1.0).abs() < 1e-12);
        assert!((smoothed[2] - 1.0).abs() < 1e-12);
        assert!((smoothed[3] - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_noise_level() {
        let usable = vec![true; 6];
        let flat = vec![1.0; 6];
        assert_eq!(estimate_noise_level(&flat, &usable), 0.0);

        let zigzag = vec![1.0, -1.0, 1.0, -1.0, 1.0, -1.0];
        let level = estimate_noise_level(&zigzag, &usable);
        // Every residual is ±2, so the deviation from the median is 2 everywhere
        let expected = MAD_SCALE * 2.0 / 1.5f64.sqrt();
        assert!((level - expected).abs() < 1e-12, "{level} != {expected}");
    }

    #[test]
    fn test_threshold_monotonic() {
        let x: Vec<f64> = (0..200).map(|i| i as f64 * 0.05).collect();
        let y: Vec<f64> = x
            .iter()
            .enumerate()
            .map(|(i, x)| 1.0 / (1.0 + ((x - 5.0) / 0.3).powi(2)) + 0.01 * ((i * 37 % 11) as f64 - 5.0))
            .collect();
        let spectrum = Spectrum::from_arrays(x, y).unwrap();
        let mut last = usize::MAX;
        for threshold in [0.5, 1.0, 2.0, 5.0, 10.0, 50.0] {
            let signal = Preprocessor::new(MovingAverageSmoother::default(), threshold)
                .process(&spectrum, &[])
                .unwrap();
            let n = (0..signal.len()).filter(|i| signal.is_signal(*i)).count();
            assert!(n <= last, "{n} > {last} at threshold {threshold}");
            last = n;
        }
    }

    #[test]
    fn test_empty_region() {
        let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let spectrum = Spectrum::new(x, vec![1.0; 10], (2.2, 2.8)).unwrap();
        let err = Preprocessor::new(MovingAverageSmoother::default(), 5.0)
            .process(&spectrum, &[])
            .unwrap_err();
        assert_eq!(err, DeconvolutionError::EmptyRegion { start: 2.2, end: 2.8 });

        let spectrum = Spectrum::new((0..10).map(|i| i as f64).collect(), vec![1.0; 10], (2.0, 4.0)).unwrap();
        let err = Preprocessor::new(MovingAverageSmoother::default(), 5.0)
            .process(&spectrum, &[SimpleInterval::new(1.5, 4.5)])
            .unwrap_err();
        assert!(matches!(err, DeconvolutionError::EmptyRegion { .. }));
    }
}
