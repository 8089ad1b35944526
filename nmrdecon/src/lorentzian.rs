//! The Lorentzian peak shape model and its superposition.
//!
//! A Lorentzian is parameterized by a scale factor `sf`, a half width at half maximum `hw`
//! and a center `maxp`:
//!
//! ```math
//! L(x) = \frac{sf}{1 + \left(\frac{x - maxp}{hw}\right)^2}
//! ```
//!
//! so `sf` is the height of the peak at `maxp`.
use std::f64::consts::PI;

use rayon::prelude::*;

use crate::error::DeconvolutionError;

/// A single Lorentzian peak
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Lorentzian {
    /// The scale factor, the height of the peak at its center
    pub sf: f64,
    /// The half width at half maximum
    pub hw: f64,
    /// The center position in chemical shift units
    pub maxp: f64,
}

impl Lorentzian {
    /// Create a new peak without checking its parameters.
    ///
    /// Callers are responsible for `sf >= 0` and `hw > 0`. Use [`Lorentzian::try_new`]
    /// for values coming from outside the crate.
    pub fn new(sf: f64, hw: f64, maxp: f64) -> Self {
        debug_assert!(hw > 0.0, "Lorentzian half width must be positive, got {hw}");
        Self { sf, hw, maxp }
    }

    pub fn try_new(sf: f64, hw: f64, maxp: f64) -> Result<Self, DeconvolutionError> {
        if sf.is_finite() && hw.is_finite() && maxp.is_finite() && sf >= 0.0 && hw > 0.0 {
            Ok(Self { sf, hw, maxp })
        } else {
            Err(DeconvolutionError::InvalidPeak { sf, hw, maxp })
        }
    }

    #[inline]
    pub fn evaluate(&self, x: f64) -> f64 {
        let z = (x - self.maxp) / self.hw;
        self.sf / (1.0 + z * z)
    }

    pub fn evaluate_vec(&self, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|x| self.evaluate(*x)).collect()
    }

    /// The area under the curve over the whole real line
    pub fn integral(&self) -> f64 {
        PI * self.sf * self.hw
    }

    /// The full width at half maximum
    pub fn fwhm(&self) -> f64 {
        2.0 * self.hw
    }

    /// Set the scale factor, clamping negative values to zero
    pub fn set_sf(&mut self, sf: f64) {
        self.sf = sf.max(0.0);
    }

    pub fn parameters(&self) -> (f64, f64, f64) {
        (self.sf, self.hw, self.maxp)
    }

    /// Sum the contributions of every peak in `peaks` at `x`.
    #[inline]
    pub fn superposition(x: f64, peaks: &[Lorentzian]) -> f64 {
        peaks.iter().map(|p| p.evaluate(x)).sum()
    }

    pub fn superposition_vec(xs: &[f64], peaks: &[Lorentzian]) -> Vec<f64> {
        xs.iter()
            .map(|x| Self::superposition(*x, peaks))
            .collect()
    }

    /// As [`Lorentzian::superposition_vec`], splitting the x-coordinates across the
    /// rayon thread pool. Each point is summed in the same order, so the result is identical.
    pub fn par_superposition_vec(xs: &[f64], peaks: &[Lorentzian]) -> Vec<f64> {
        xs.par_iter()
            .map(|x| Self::superposition(*x, peaks))
            .collect()
    }
}

impl TryFrom<(f64, f64, f64)> for Lorentzian {
    type Error = DeconvolutionError;

    fn try_from(value: (f64, f64, f64)) -> Result<Self, Self::Error> {
        Self::try_new(value.0, value.1, value.2)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_evaluate() {
        let peak = Lorentzian::new(2.0, 0.5, 3.0);
        assert_eq!(peak.evaluate(3.0), 2.0);
        assert!((peak.evaluate(3.5) - 1.0).abs() < 1e-12);
        for d in [0.01, 0.3, 1.7, 25.0] {
            let a = peak.evaluate(3.0 - d);
            let b = peak.evaluate(3.0 + d);
            assert!((a - b).abs() < 1e-12, "{a} != {b} at {d}");
        }
        assert!((peak.integral() - PI).abs() < 1e-12);
        assert_eq!(peak.fwhm(), 1.0);
    }

    #[test]
    fn test_try_new() {
        assert!(Lorentzian::try_new(1.0, 0.1, 5.0).is_ok());
        assert!(Lorentzian::try_new(0.0, 0.1, 5.0).is_ok());
        assert_eq!(
            Lorentzian::try_new(-1.0, 0.1, 5.0),
            Err(DeconvolutionError::InvalidPeak {
                sf: -1.0,
                hw: 0.1,
                maxp: 5.0
            })
        );
        assert!(Lorentzian::try_new(1.0, 0.0, 5.0).is_err());
        assert!(Lorentzian::try_new(1.0, 0.1, f64::NAN).is_err());
        assert!(Lorentzian::try_from((1.0, f64::INFINITY, 2.0)).is_err());
    }

    #[test]
    fn test_set_sf() {
        let mut peak = Lorentzian::new(2.0, 0.5, 3.0);
        peak.set_sf(-4.0);
        assert_eq!(peak.sf, 0.0);
        peak.set_sf(4.0);
        assert_eq!(peak.parameters(), (4.0, 0.5, 3.0));
    }

    #[test]
    fn test_superposition() {
        let peaks = vec![
            Lorentzian::new(1.0, 0.1, 4.5),
            Lorentzian::new(2.0, 0.15, 5.0),
            Lorentzian::new(1.0, 0.1, 5.5),
        ];
        let mut reversed = peaks.clone();
        reversed.reverse();
        let xs: Vec<f64> = (0..1000).map(|i| i as f64 / 100.0).collect();

        let a = Lorentzian::superposition_vec(&xs, &peaks);
        let b = Lorentzian::superposition_vec(&xs, &reversed);
        let c = Lorentzian::par_superposition_vec(&xs, &peaks);
        assert_eq!(a.len(), xs.len());
        for ((x, y), z) in a.iter().zip(b.iter()).zip(c.iter()) {
            assert!((x - y).abs() < 1e-12);
            assert_eq!(x, z);
        }
        let at_center = Lorentzian::superposition(5.0, &peaks);
        let expected: f64 = peaks.iter().map(|p| p.evaluate(5.0)).sum();
        assert_eq!(at_center, expected);
        assert_eq!(Lorentzian::superposition(5.0, &[]), 0.0);
    }
}
