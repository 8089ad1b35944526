//! `nmrdecon` decomposes one dimensional NMR spectra into sums of Lorentzian peaks.
//!
//! A [`Spectrum`] is smoothed and scored against its own noise level, regions of signal are
//! split into candidate peaks, and each candidate is refined against the signal until the sum of
//! the peaks reconstructs it. The result is a [`Deconvolution`]: the peaks and the mean squared
//! error of the reconstruction.
//!
//! ```no_run
//! use nmrdecon::{DeconvoluterBuilder, Spectrum};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let x: Vec<f64> = (0..10000).map(|i| i as f64 * 0.001).collect();
//! let y: Vec<f64> = x.iter().map(|x| 1.0 / (1.0 + ((x - 5.0) / 0.1).powi(2))).collect();
//! let spectrum = Spectrum::new(x, y, (1.0, 9.0))?;
//!
//! let deconvoluter = DeconvoluterBuilder::new()
//!     .smoothing(2, 5)
//!     .noise_threshold(5.0)
//!     .ignore_region(4.7, 4.8)
//!     .create();
//! let result = deconvoluter.deconvolute(&spectrum)?;
//! for peak in result.iter() {
//!     println!("{} {} {}", peak.maxp, peak.hw, peak.sf);
//! }
//! # Ok(())
//! # }
//! ```
pub mod api;
pub mod deconvolution;
pub mod deconvoluter;
pub mod error;
pub mod fitting;
pub mod interval;
pub mod lorentzian;
pub mod params;
pub mod peak_detection;
pub mod preprocessing;
pub mod spectrum;

pub use crate::api::{deconvolute_spectra, deconvolute_spectrum};
pub use crate::deconvolution::Deconvolution;
pub use crate::deconvoluter::{Deconvoluter, DeconvoluterBuilder};
pub use crate::error::{BatchError, DeconvolutionError};
pub use crate::interval::{SimpleInterval, Span1D};
pub use crate::lorentzian::Lorentzian;
pub use crate::params::{DeconvolutionParams, DetectionParams, FittingParams, SmoothingParams};
pub use crate::spectrum::{Monotonicity, Spectrum, SpectrumError};
