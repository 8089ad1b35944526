//! High level APIs for running single-shot deconvolution operations
use crate::deconvolution::Deconvolution;
use crate::deconvoluter::Deconvoluter;
use crate::error::{BatchError, DeconvolutionError};
use crate::params::DeconvolutionParams;
use crate::spectrum::Spectrum;

/// A single-shot deconvolution of one spectrum.
///
/// # Arguments
/// - `spectrum`: The spectrum to decompose
/// - `params`: The smoothing, detection, fitting and ignore region settings to use
///
/// # See also
/// [`Deconvoluter::deconvolute`]
pub fn deconvolute_spectrum(
    spectrum: &Spectrum,
    params: DeconvolutionParams,
) -> Result<Deconvolution, DeconvolutionError> {
    Deconvoluter::new(params).deconvolute(spectrum)
}

/// A single-shot parallel deconvolution of many spectra. The output is in input order.
///
/// # Arguments
/// - `spectra`: The spectra to decompose
/// - `params`: The smoothing, detection, fitting and ignore region settings to use
///
/// # See also
/// [`Deconvoluter::deconvolute_batch`]
pub fn deconvolute_spectra<S: AsRef<Spectrum> + Sync>(
    spectra: &[S],
    params: DeconvolutionParams,
) -> Vec<Result<Deconvolution, BatchError>> {
    Deconvoluter::new(params).deconvolute_batch(spectra)
}
