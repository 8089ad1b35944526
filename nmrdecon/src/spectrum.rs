//! A validated one-dimensional spectrum
use std::ops::Range;

use itertools::Itertools;
use thiserror::Error;

use crate::interval::{SimpleInterval, Span1D};

/// The direction the chemical shift axis runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Monotonicity {
    Increasing,
    Decreasing,
}

/// An error that might occur when constructing a [`Spectrum`]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpectrumError {
    #[error("Spectrum contains no samples")]
    EmptyData,
    #[error("Chemical shift array has {x} samples but the intensity array has {y}")]
    LengthMismatch { x: usize, y: usize },
    #[error("Chemical shifts are not strictly monotonic at index {position}")]
    NotStrictlyMonotonic { position: usize },
    #[error("Non-finite value at index {position}")]
    NonFiniteValue { position: usize },
    #[error("Signal boundaries ({start}, {end}) lie outside of the spectrum range ({min}, {max})")]
    BoundaryOutOfRange {
        start: f64,
        end: f64,
        min: f64,
        max: f64,
    },
}

/// A 1D spectrum: chemical shifts, intensities, and the sub-range of chemical shifts
/// which holds signal worth analyzing.
///
/// The chemical shifts may run in either direction but must be strictly monotonic.
/// A [`Spectrum`] is never modified by the deconvolution process.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawSpectrum"))]
pub struct Spectrum {
    chemical_shifts: Vec<f64>,
    intensities: Vec<f64>,
    signal_boundaries: SimpleInterval<f64>,
    monotonicity: Monotonicity,
}

impl Spectrum {
    /// Create a new spectrum.
    ///
    /// # Arguments
    /// - `chemical_shifts`: The x-coordinates, strictly increasing or strictly decreasing
    /// - `intensities`: The signal intensity at each chemical shift
    /// - `signal_boundaries`: The inclusive chemical shift range to analyze, given in either order
    pub fn new(
        chemical_shifts: Vec<f64>,
        intensities: Vec<f64>,
        signal_boundaries: impl Into<SimpleInterval<f64>>,
    ) -> Result<Self, SpectrumError> {
        let monotonicity = Self::validate_arrays(&chemical_shifts, &intensities)?;
        let mut this = Self {
            chemical_shifts,
            intensities,
            signal_boundaries: SimpleInterval::default(),
            monotonicity,
        };
        this.set_signal_boundaries(signal_boundaries)?;
        Ok(this)
    }

    /// Create a new spectrum whose signal boundaries cover every sample
    pub fn from_arrays(
        chemical_shifts: Vec<f64>,
        intensities: Vec<f64>,
    ) -> Result<Self, SpectrumError> {
        let monotonicity = Self::validate_arrays(&chemical_shifts, &intensities)?;
        let first = chemical_shifts[0];
        let last = chemical_shifts[chemical_shifts.len() - 1];
        Ok(Self {
            chemical_shifts,
            intensities,
            signal_boundaries: SimpleInterval::ordered(first, last),
            monotonicity,
        })
    }

    fn validate_arrays(x: &[f64], y: &[f64]) -> Result<Monotonicity, SpectrumError> {
        if x.is_empty() || y.is_empty() {
            return Err(SpectrumError::EmptyData);
        }
        if x.len() != y.len() {
            return Err(SpectrumError::LengthMismatch {
                x: x.len(),
                y: y.len(),
            });
        }
        if let Some(position) = x
            .iter()
            .zip(y.iter())
            .position(|(a, b)| !a.is_finite() || !b.is_finite())
        {
            return Err(SpectrumError::NonFiniteValue { position });
        }
        if x.len() == 1 {
            return Ok(Monotonicity::Increasing);
        }
        let monotonicity = if x[1] > x[0] {
            Monotonicity::Increasing
        } else {
            Monotonicity::Decreasing
        };
        let violation = x.iter().tuple_windows().position(|(a, b)| match monotonicity {
            Monotonicity::Increasing => b <= a,
            Monotonicity::Decreasing => b >= a,
        });
        match violation {
            Some(i) => Err(SpectrumError::NotStrictlyMonotonic { position: i + 1 }),
            None => Ok(monotonicity),
        }
    }

    /// Replace the signal boundaries, which must lie inside the chemical shift range
    pub fn set_signal_boundaries(
        &mut self,
        signal_boundaries: impl Into<SimpleInterval<f64>>,
    ) -> Result<(), SpectrumError> {
        let boundaries: SimpleInterval<f64> = signal_boundaries.into();
        let range = self.range();
        if !boundaries.is_finite() || !boundaries.is_contained_in_interval(&range) {
            return Err(SpectrumError::BoundaryOutOfRange {
                start: boundaries.start,
                end: boundaries.end,
                min: range.start,
                max: range.end,
            });
        }
        self.signal_boundaries = boundaries;
        Ok(())
    }

    pub fn chemical_shifts(&self) -> &[f64] {
        &self.chemical_shifts
    }

    pub fn intensities(&self) -> &[f64] {
        &self.intensities
    }

    pub fn signal_boundaries(&self) -> SimpleInterval<f64> {
        self.signal_boundaries
    }

    pub fn monotonicity(&self) -> Monotonicity {
        self.monotonicity
    }

    pub fn len(&self) -> usize {
        self.chemical_shifts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chemical_shifts.is_empty()
    }

    /// The smallest and largest chemical shift
    pub fn range(&self) -> SimpleInterval<f64> {
        let first = self.chemical_shifts[0];
        let last = self.chemical_shifts[self.len() - 1];
        SimpleInterval::ordered(first, last)
    }

    /// The contiguous range of sample indices whose chemical shift lies inside `interval`
    pub fn indices_within(&self, interval: &SimpleInterval<f64>) -> Range<usize> {
        let x = &self.chemical_shifts;
        let (lo, hi) = match self.monotonicity {
            Monotonicity::Increasing => (
                x.partition_point(|v| *v < interval.start),
                x.partition_point(|v| *v <= interval.end),
            ),
            Monotonicity::Decreasing => (
                x.partition_point(|v| *v > interval.end),
                x.partition_point(|v| *v >= interval.start),
            ),
        };
        lo..hi.max(lo)
    }

    /// The sample indices inside the signal boundaries
    pub fn signal_region(&self) -> Range<usize> {
        self.indices_within(&self.signal_boundaries)
    }
}

/// The unchecked wire form of a [`Spectrum`], re-validated on deserialization
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct RawSpectrum {
    chemical_shifts: Vec<f64>,
    intensities: Vec<f64>,
    signal_boundaries: SimpleInterval<f64>,
}

#[cfg(feature = "serde")]
impl TryFrom<RawSpectrum> for Spectrum {
    type Error = SpectrumError;

    fn try_from(value: RawSpectrum) -> Result<Self, Self::Error> {
        Spectrum::new(
            value.chemical_shifts,
            value.intensities,
            value.signal_boundaries,
        )
    }
}

impl AsRef<Spectrum> for Spectrum {
    fn as_ref(&self) -> &Spectrum {
        self
    }
}
