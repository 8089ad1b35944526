//! Configuration for each stage of the deconvolution pipeline
use crate::error::DeconvolutionError;
use crate::fitting::AnalyticalFitter;
use crate::interval::{merge_overlapping, SimpleInterval};
use crate::peak_detection::PeakDetector;
use crate::preprocessing::{MovingAverageSmoother, Preprocessor};

/// Moving average smoothing settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SmoothingParams {
    /// How many times the moving average is applied, zero disables smoothing
    pub iterations: usize,
    /// The width of the moving average window in samples, must be odd
    pub window_size: usize,
}

impl Default for SmoothingParams {
    fn default() -> Self {
        Self {
            iterations: 2,
            window_size: 5,
        }
    }
}

impl SmoothingParams {
    pub fn new(iterations: usize, window_size: usize) -> Self {
        Self {
            iterations,
            window_size,
        }
    }

    pub fn disabled() -> Self {
        Self::new(0, 1)
    }
}

/// Peak detection settings
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DetectionParams {
    /// The noise score a sample must exceed to be considered signal
    pub noise_threshold: f64,
    /// Signal runs separated by fewer than this many samples are merged
    pub min_separation: usize,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            noise_threshold: 5.0,
            min_separation: 3,
        }
    }
}

/// Peak fitting settings
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FittingParams {
    /// The maximum number of refinement passes
    pub iterations: usize,
    /// The relative parameter change below which refinement stops early
    pub convergence: f64,
}

impl Default for FittingParams {
    fn default() -> Self {
        Self {
            iterations: 10,
            convergence: 1e-12,
        }
    }
}

/// The complete configuration of a [`Deconvoluter`](crate::Deconvoluter).
///
/// Values are checked together by [`DeconvolutionParams::validate`] before any
/// spectrum is processed.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeconvolutionParams {
    pub smoothing: SmoothingParams,
    pub detection: DetectionParams,
    pub fitting: FittingParams,
    /// Chemical shift ranges excluded from detection and fitting
    pub ignore_regions: Vec<SimpleInterval<f64>>,
}

impl DeconvolutionParams {
    pub fn new(
        smoothing: SmoothingParams,
        detection: DetectionParams,
        fitting: FittingParams,
        ignore_regions: Vec<SimpleInterval<f64>>,
    ) -> Self {
        Self {
            smoothing,
            detection,
            fitting,
            ignore_regions,
        }
    }

    /// Check every parameter against its domain, returning the first violation found
    pub fn validate(&self) -> Result<(), DeconvolutionError> {
        if self.smoothing.window_size == 0 || self.smoothing.window_size % 2 == 0 {
            return Err(DeconvolutionError::invalid_configuration(
                "smoothing.window_size",
                format!("must be a positive odd number, got {}", self.smoothing.window_size),
            ));
        }
        let threshold = self.detection.noise_threshold;
        if !(threshold.is_finite() && threshold > 0.0) {
            return Err(DeconvolutionError::invalid_configuration(
                "detection.noise_threshold",
                format!("must be finite and positive, got {threshold}"),
            ));
        }
        if self.detection.min_separation == 0 {
            return Err(DeconvolutionError::invalid_configuration(
                "detection.min_separation",
                "must be at least 1",
            ));
        }
        if self.fitting.iterations == 0 {
            return Err(DeconvolutionError::invalid_configuration(
                "fitting.iterations",
                "must be at least 1",
            ));
        }
        let convergence = self.fitting.convergence;
        if !(convergence.is_finite() && convergence >= 0.0) {
            return Err(DeconvolutionError::invalid_configuration(
                "fitting.convergence",
                format!("must be finite and non-negative, got {convergence}"),
            ));
        }
        for region in self.ignore_regions.iter() {
            if !region.is_finite() || region.width() <= 0.0 {
                return Err(DeconvolutionError::invalid_configuration(
                    "ignore_regions",
                    format!(
                        "must be finite with a non-zero width, got ({}, {})",
                        region.start, region.end
                    ),
                ));
            }
        }
        Ok(())
    }

    /// The ignore regions sorted by position, with overlapping or touching regions merged
    pub fn normalized_ignore_regions(&self) -> Vec<SimpleInterval<f64>> {
        merge_overlapping(&self.ignore_regions)
    }

    pub fn preprocessor(&self) -> Preprocessor {
        Preprocessor::new(
            MovingAverageSmoother::new(self.smoothing.iterations, self.smoothing.window_size),
            self.detection.noise_threshold,
        )
    }

    pub fn detector(&self) -> PeakDetector {
        PeakDetector::new(self.detection.min_separation)
    }

    pub fn fitter(&self) -> AnalyticalFitter {
        AnalyticalFitter::default()
            .iterations(self.fitting.iterations)
            .convergence(self.fitting.convergence)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn assert_invalid(params: DeconvolutionParams, expected: &str) {
        match params.validate() {
            Err(DeconvolutionError::InvalidConfiguration { parameter, .. }) => {
                assert_eq!(parameter, expected)
            }
            other => panic!("Expected {expected} to be rejected, got {other:?}"),
        }
    }

    #[test]
    fn test_validate() {
        assert!(DeconvolutionParams::default().validate().is_ok());

        let mut params = DeconvolutionParams::default();
        params.smoothing.window_size = 4;
        assert_invalid(params, "smoothing.window_size");

        let mut params = DeconvolutionParams::default();
        params.detection.noise_threshold = 0.0;
        assert_invalid(params, "detection.noise_threshold");

        let mut params = DeconvolutionParams::default();
        params.detection.noise_threshold = f64::NAN;
        assert_invalid(params, "detection.noise_threshold");

        let mut params = DeconvolutionParams::default();
        params.fitting.iterations = 0;
        assert_invalid(params, "fitting.iterations");

        let mut params = DeconvolutionParams::default();
        params.ignore_regions.push(SimpleInterval::new(4.0, 4.0));
        assert_invalid(params, "ignore_regions");

        let mut params = DeconvolutionParams::default();
        params.ignore_regions.push(SimpleInterval::new(4.0, f64::INFINITY));
        assert_invalid(params, "ignore_regions");
    }

    #[test]
    fn test_normalized_ignore_regions() {
        let params = DeconvolutionParams {
            ignore_regions: vec![
                SimpleInterval::new(4.7, 4.9),
                SimpleInterval::new(1.0, 1.5),
                SimpleInterval::new(4.8, 5.1),
            ],
            ..Default::default()
        };
        assert_eq!(
            params.normalized_ignore_regions(),
            vec![SimpleInterval::new(1.0, 1.5), SimpleInterval::new(4.7, 5.1)]
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde() {
        let params = DeconvolutionParams {
            ignore_regions: vec![SimpleInterval::new(4.7, 4.9)],
            ..Default::default()
        };
        let text = serde_json::to_string(&params).unwrap();
        let dup: DeconvolutionParams = serde_json::from_str(&text).unwrap();
        assert_eq!(params, dup);
    }
}
