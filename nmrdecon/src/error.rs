//! Error types produced while deconvolving spectra
use thiserror::Error;

use crate::spectrum::SpectrumError;

/// An error that might occur during deconvolution
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeconvolutionError {
    /// A parameter was outside of its valid domain. Raised before any numeric work is done.
    #[error("Invalid configuration for {parameter}: {reason}")]
    InvalidConfiguration {
        parameter: &'static str,
        reason: String,
    },
    /// No samples remain to analyze after applying the signal boundaries and ignore regions
    #[error("No usable samples between {start} and {end} after applying ignore regions")]
    EmptyRegion { start: f64, end: f64 },
    /// A local fit could not be solved. This is recovered from inside the fitter and only
    /// surfaces through the diagnostic counters and log events.
    #[error("Numerically degenerate local fit near {position}")]
    NumericDegeneracy { position: f64 },
    /// A Lorentzian was requested with parameters outside of its domain
    #[error("Invalid Lorentzian parameters sf={sf}, hw={hw}, maxp={maxp}")]
    InvalidPeak { sf: f64, hw: f64, maxp: f64 },
    #[error("Invalid spectrum: {0}")]
    InvalidSpectrum(#[from] SpectrumError),
}

impl DeconvolutionError {
    pub(crate) fn invalid_configuration(parameter: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            parameter,
            reason: reason.into(),
        }
    }
}

/// A failure of a single spectrum within a batch, tagged with the index of the spectrum
/// it came from.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Spectrum {index} failed to deconvolve: {source}")]
pub struct BatchError {
    pub index: usize,
    #[source]
    pub source: DeconvolutionError,
}

impl BatchError {
    pub fn new(index: usize, source: DeconvolutionError) -> Self {
        Self { index, source }
    }
}
