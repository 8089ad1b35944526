//! The deconvolution pipeline: preprocess, detect, then fit.
use rayon::prelude::*;

use crate::deconvolution::Deconvolution;
use crate::error::{BatchError, DeconvolutionError};
use crate::interval::{SimpleInterval, Span1D};
use crate::lorentzian::Lorentzian;
use crate::params::{DeconvolutionParams, DetectionParams, FittingParams, SmoothingParams};
use crate::preprocessing::PreprocessedSignal;
use crate::spectrum::Spectrum;

/// Fluently assemble the configuration of a [`Deconvoluter`].
///
/// No validation happens here. The assembled parameters are checked as a whole each
/// time the [`Deconvoluter`] is run.
#[derive(Debug, Clone, Default)]
pub struct DeconvoluterBuilder {
    params: DeconvolutionParams,
}

impl DeconvoluterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn smoothing(mut self, iterations: usize, window_size: usize) -> Self {
        self.params.smoothing = SmoothingParams::new(iterations, window_size);
        self
    }

    pub fn disable_smoothing(mut self) -> Self {
        self.params.smoothing = SmoothingParams::disabled();
        self
    }

    pub fn noise_threshold(mut self, value: f64) -> Self {
        self.params.detection.noise_threshold = value;
        self
    }

    pub fn min_separation(mut self, value: usize) -> Self {
        self.params.detection.min_separation = value;
        self
    }

    pub fn detection(mut self, value: DetectionParams) -> Self {
        self.params.detection = value;
        self
    }

    pub fn fitting_iterations(mut self, value: usize) -> Self {
        self.params.fitting.iterations = value;
        self
    }

    pub fn convergence(mut self, value: f64) -> Self {
        self.params.fitting.convergence = value;
        self
    }

    pub fn fitting(mut self, value: FittingParams) -> Self {
        self.params.fitting = value;
        self
    }

    pub fn ignore_region(mut self, start: f64, end: f64) -> Self {
        self.params
            .ignore_regions
            .push(SimpleInterval::ordered(start, end));
        self
    }

    pub fn params(mut self, value: DeconvolutionParams) -> Self {
        self.params = value;
        self
    }

    pub fn create(self) -> Deconvoluter {
        Deconvoluter::new(self.params)
    }
}

/// Decomposes spectra into sums of Lorentzian peaks.
///
/// A [`Deconvoluter`] holds only its configuration, so it may be shared between threads
/// and reused for any number of spectra.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Deconvoluter {
    params: DeconvolutionParams,
}

impl Deconvoluter {
    pub fn new(params: DeconvolutionParams) -> Self {
        Self { params }
    }

    pub fn builder() -> DeconvoluterBuilder {
        DeconvoluterBuilder::new()
    }

    pub fn params(&self) -> &DeconvolutionParams {
        &self.params
    }

    pub fn ignore_regions(&self) -> &[SimpleInterval<f64>] {
        &self.params.ignore_regions
    }

    /// Exclude a chemical shift range from analysis. The range is merged with any
    /// existing ignore region it overlaps or touches.
    pub fn add_ignore_region(&mut self, start: f64, end: f64) -> Result<(), DeconvolutionError> {
        let region = SimpleInterval::ordered(start, end);
        if !region.is_finite() || region.width() <= 0.0 {
            return Err(DeconvolutionError::invalid_configuration(
                "ignore_regions",
                format!("must be finite with a non-zero width, got ({start}, {end})"),
            ));
        }
        self.params.ignore_regions.push(region);
        self.params.ignore_regions = self.params.normalized_ignore_regions();
        Ok(())
    }

    pub fn clear_ignore_regions(&mut self) {
        self.params.ignore_regions.clear();
    }

    fn reconstruction_error(
        &self,
        chemical_shifts: &[f64],
        signal: &PreprocessedSignal,
        peaks: &[Lorentzian],
        parallel: bool,
    ) -> f64 {
        if peaks.is_empty() {
            return signal.usable_variance();
        }
        let indices: Vec<usize> = signal.usable_indices().collect();
        let xs: Vec<f64> = indices.iter().map(|i| chemical_shifts[*i]).collect();
        let reconstructed = if parallel {
            Lorentzian::par_superposition_vec(&xs, peaks)
        } else {
            Lorentzian::superposition_vec(&xs, peaks)
        };
        indices
            .iter()
            .zip(reconstructed)
            .map(|(i, r)| (signal.smoothed[*i] - r).powi(2))
            .sum::<f64>()
            / indices.len() as f64
    }

    fn deconvolute_impl(
        &self,
        spectrum: &Spectrum,
        parallel: bool,
    ) -> Result<Deconvolution, DeconvolutionError> {
        self.params.validate()?;
        let ignore_regions = self.params.normalized_ignore_regions();
        let range = spectrum.range();
        for region in ignore_regions.iter() {
            if !region.overlaps(&range) {
                tracing::warn!(
                    "Ignore region ({}, {}) lies outside of the spectrum range ({}, {})",
                    region.start,
                    region.end,
                    range.start,
                    range.end
                );
            }
        }

        let signal = self
            .params
            .preprocessor()
            .process(spectrum, &ignore_regions)?;
        let chemical_shifts = spectrum.chemical_shifts();
        let candidates = self.params.detector().detect(chemical_shifts, &signal);

        let fitter = self.params.fitter();
        let fit = if parallel {
            fitter.par_fit(chemical_shifts, &signal.smoothed, &candidates)
        } else {
            fitter.fit(chemical_shifts, &signal.smoothed, &candidates)
        };

        let mut peaks = fit.peaks;
        peaks.sort_by(|a, b| a.maxp.total_cmp(&b.maxp));
        let mse = self.reconstruction_error(chemical_shifts, &signal, &peaks, parallel);

        tracing::debug!(
            candidates = candidates.len(),
            peaks = peaks.len(),
            iterations = fit.iterations,
            degeneracies = fit.degeneracies,
            mse,
            "Deconvoluted spectrum with {} samples",
            spectrum.len()
        );
        let params = DeconvolutionParams {
            ignore_regions,
            ..self.params.clone()
        };
        Ok(Deconvolution::new(peaks, mse).with_params(params))
    }

    /// Deconvolute a single spectrum on the current thread.
    ///
    /// # Errors
    /// - [`DeconvolutionError::InvalidConfiguration`] if any parameter is out of its domain,
    ///   before any numeric work is done
    /// - [`DeconvolutionError::EmptyRegion`] if no samples are left once the signal boundaries
    ///   and ignore regions are applied
    #[tracing::instrument(skip_all, level = "debug")]
    pub fn deconvolute(&self, spectrum: &Spectrum) -> Result<Deconvolution, DeconvolutionError> {
        self.deconvolute_impl(spectrum, false)
    }

    /// As [`Deconvoluter::deconvolute`], refining candidate peaks and evaluating the
    /// reconstruction in parallel. The result is identical to the sequential one.
    #[tracing::instrument(skip_all, level = "debug")]
    pub fn par_deconvolute(
        &self,
        spectrum: &Spectrum,
    ) -> Result<Deconvolution, DeconvolutionError> {
        self.deconvolute_impl(spectrum, true)
    }

    /// Deconvolute many spectra in parallel.
    ///
    /// The output has one entry per input, in input order. A failure on one spectrum is
    /// reported at its position, tagged with its index, and does not affect the others.
    #[tracing::instrument(skip_all, level = "debug")]
    pub fn deconvolute_batch<S: AsRef<Spectrum> + Sync>(
        &self,
        spectra: &[S],
    ) -> Vec<Result<Deconvolution, BatchError>> {
        let results: Vec<Result<Deconvolution, BatchError>> = spectra
            .par_iter()
            .enumerate()
            .map(|(index, spectrum)| {
                self.deconvolute(spectrum.as_ref())
                    .map_err(|e| BatchError::new(index, e))
            })
            .collect();
        let failures = results.iter().filter(|r| r.is_err()).count();
        if failures > 0 {
            tracing::warn!("{failures} of {} spectra failed to deconvolute", spectra.len());
        }
        results
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn make_spectrum() -> Spectrum {
        let peaks = [
            Lorentzian::new(1.0, 0.05, 2.0),
            Lorentzian::new(0.6, 0.04, 2.4),
            Lorentzian::new(0.8, 0.06, 7.0),
        ];
        let x: Vec<f64> = (0..5000).map(|i| i as f64 * 0.002).collect();
        let y = Lorentzian::superposition_vec(&x, &peaks);
        Spectrum::from_arrays(x, y).unwrap()
    }

    #[test]
    fn test_builder() {
        let deconvoluter = DeconvoluterBuilder::new()
            .smoothing(3, 7)
            .noise_threshold(4.0)
            .min_separation(5)
            .fitting_iterations(25)
            .convergence(1e-9)
            .ignore_region(5.0, 4.5)
            .create();
        let params = deconvoluter.params();
        assert_eq!(params.smoothing, SmoothingParams::new(3, 7));
        assert_eq!(params.detection.noise_threshold, 4.0);
        assert_eq!(params.detection.min_separation, 5);
        assert_eq!(params.fitting.iterations, 25);
        assert_eq!(params.fitting.convergence, 1e-9);
        assert_eq!(params.ignore_regions, vec![SimpleInterval::new(4.5, 5.0)]);
    }

    #[test]
    fn test_add_ignore_region() {
        let mut deconvoluter = Deconvoluter::default();
        deconvoluter.add_ignore_region(1.0, 2.0).unwrap();
        deconvoluter.add_ignore_region(2.0, 3.0).unwrap();
        deconvoluter.add_ignore_region(5.0, 6.0).unwrap();
        assert_eq!(
            deconvoluter.ignore_regions(),
            &[SimpleInterval::new(1.0, 3.0), SimpleInterval::new(5.0, 6.0)]
        );
        assert!(deconvoluter.add_ignore_region(4.0, 4.0).is_err());
        assert!(deconvoluter.add_ignore_region(f64::NAN, 4.0).is_err());
        assert_eq!(deconvoluter.ignore_regions().len(), 2);
        deconvoluter.clear_ignore_regions();
        assert!(deconvoluter.ignore_regions().is_empty());
    }

    #[test_log::test]
    fn test_sequential_parallel_agree() {
        let spectrum = make_spectrum();
        let deconvoluter = DeconvoluterBuilder::new()
            .disable_smoothing()
            .fitting_iterations(50)
            .create();
        let a = deconvoluter.deconvolute(&spectrum).unwrap();
        let b = deconvoluter.par_deconvolute(&spectrum).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
    }

    #[test_log::test]
    fn test_ignore_region_excludes_peak() {
        let spectrum = make_spectrum();
        let deconvoluter = DeconvoluterBuilder::new()
            .disable_smoothing()
            .fitting_iterations(50)
            .ignore_region(6.0, 8.0)
            .create();
        let result = deconvoluter.deconvolute(&spectrum).unwrap();
        assert_eq!(result.len(), 2, "{result:?}");
        assert!(result.iter().all(|p| p.maxp < 6.0));
    }

    #[test]
    fn test_result_records_params() {
        let spectrum = make_spectrum();
        let deconvoluter = DeconvoluterBuilder::new()
            .disable_smoothing()
            .noise_threshold(4.0)
            .fitting_iterations(50)
            .ignore_region(7.5, 8.0)
            .ignore_region(6.0, 7.5)
            .create();
        let result = deconvoluter.deconvolute(&spectrum).unwrap();
        let params = result.params().unwrap();
        assert_eq!(params.smoothing, SmoothingParams::disabled());
        assert_eq!(params.detection.noise_threshold, 4.0);
        assert_eq!(params.fitting.iterations, 50);
        assert_eq!(params.ignore_regions, vec![SimpleInterval::new(6.0, 8.0)]);
        assert!(Deconvolution::new(result.lorentzians().to_vec(), result.mse())
            .params()
            .is_none());
    }

    #[test]
    fn test_invalid_configuration_first() {
        let spectrum = make_spectrum();
        let deconvoluter = DeconvoluterBuilder::new().smoothing(1, 2).create();
        let err = deconvoluter.deconvolute(&spectrum).unwrap_err();
        assert!(matches!(
            err,
            DeconvolutionError::InvalidConfiguration {
                parameter: "smoothing.window_size",
                ..
            }
        ));
    }
}
