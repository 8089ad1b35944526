//! Iterative local refinement of candidate peaks.
//!
//! The reciprocal of a Lorentzian is a parabola in `x`:
//!
//! ```math
//! \frac{1}{L(x)} = \frac{(x - maxp)^2}{sf \cdot hw^2} + \frac{1}{sf}
//! ```
//!
//! so the unique Lorentzian through three points can be solved for in closed form. Each
//! candidate owns a three sample stencil around its apex. On every iteration the contribution
//! of every *other* peak is subtracted from the signal at the stencil samples and the candidate
//! is re-solved from what remains. Candidates read only the previous iteration's estimates, so
//! they can be refined in any order, or in parallel, with the same outcome.
use rayon::prelude::*;

use crate::error::DeconvolutionError;
use crate::lorentzian::Lorentzian;
use crate::peak_detection::{local_step, CandidateRegion, PeakCandidate};

/// The smallest value a fitted `sf` or `hw` is clamped to
pub const PARAMETER_FLOOR: f64 = f64::EPSILON;

/// Fitted peaks with `sf` or `hw` at or below this are discarded
pub const DISCARD_THRESHOLD: f64 = 100.0 * f64::EPSILON;

/// Three sample indices used to solve for a single peak
pub type Stencil = [usize; 3];

/// Choose the stencil for a candidate: the apex and a sample on either side roughly half
/// the initial half width away. When the apex sits on the edge of its region, both
/// remaining samples are taken from the side that has room.
pub fn build_stencil(chemical_shifts: &[f64], region: &CandidateRegion, hw: f64) -> Stencil {
    let apex = region.apex;
    let step = local_step(chemical_shifts, apex).max(f64::MIN_POSITIVE);
    let offset = ((hw / (2.0 * step)).round() as usize).max(1);
    let left_room = apex - region.left;
    let right_room = region.right - apex;
    let kl = offset.min(left_room);
    let kr = offset.min(right_room);
    if kl > 0 && kr > 0 {
        [apex - kl, apex, apex + kr]
    } else if kl == 0 {
        let stride = (offset / 2).clamp(1, (right_room / 2).max(1));
        [apex, apex + stride, apex + 2 * stride]
    } else {
        let stride = (offset / 2).clamp(1, (left_room / 2).max(1));
        [apex - 2 * stride, apex - stride, apex]
    }
}

/// Solve for the Lorentzian passing through three points.
///
/// Fails with [`DeconvolutionError::NumericDegeneracy`] when any intensity is not positive,
/// or the reciprocal intensities do not open upwards. Solutions whose width or height would
/// not be positive are clamped to [`PARAMETER_FLOOR`].
pub fn solve_stencil(xs: [f64; 3], ys: [f64; 3]) -> Result<Lorentzian, DeconvolutionError> {
    let position = xs[1];
    if ys.iter().any(|y| !(y.is_finite() && *y > 0.0)) {
        return Err(DeconvolutionError::NumericDegeneracy { position });
    }
    let [w1, w2, w3] = [1.0 / ys[0], 1.0 / ys[1], 1.0 / ys[2]];
    let u1 = xs[0] - xs[1];
    let u3 = xs[2] - xs[1];

    let d1 = (w2 - w1) / -u1;
    let d2 = (w3 - w2) / u3;
    let a = (d2 - d1) / (u3 - u1);
    let b = d1 - a * u1;
    let c = w2;
    if !a.is_finite() || a <= 0.0 {
        return Err(DeconvolutionError::NumericDegeneracy { position });
    }

    let shift = -b / (2.0 * a);
    let hw2 = c / a - shift * shift;
    let (sf, hw) = if hw2 > 0.0 {
        ((1.0 / (a * hw2)).max(PARAMETER_FLOOR), hw2.sqrt().max(PARAMETER_FLOOR))
    } else {
        (PARAMETER_FLOOR, PARAMETER_FLOOR)
    };
    let maxp = xs[1] + shift;
    if !(sf.is_finite() && hw.is_finite() && maxp.is_finite()) {
        return Err(DeconvolutionError::NumericDegeneracy { position });
    }
    Ok(Lorentzian::new(sf, hw, maxp))
}

/// The outcome of [`AnalyticalFitter::fit`]
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    /// The refined peaks, excluding those which collapsed to the parameter floor
    pub peaks: Vec<Lorentzian>,
    pub iterations: usize,
    pub converged: bool,
    /// How many local solves were degenerate and kept their previous estimate
    pub degeneracies: usize,
}

/// Refines candidate peaks against a signal by repeated closed form stencil solves
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyticalFitter {
    /// The maximum number of refinement passes
    pub iterations: usize,
    /// Stop once no parameter changes by more than this fraction of its value
    pub convergence: f64,
}

impl Default for AnalyticalFitter {
    fn default() -> Self {
        Self {
            iterations: 10,
            convergence: 1e-12,
        }
    }
}

struct StencilTarget {
    xs: [f64; 3],
    ys: [f64; 3],
}

impl AnalyticalFitter {
    pub fn new(iterations: usize, convergence: f64) -> Self {
        Self {
            iterations,
            convergence,
        }
    }

    pub fn iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn convergence(mut self, convergence: f64) -> Self {
        self.convergence = convergence;
        self
    }

    /// Re-solve peak `index` from its stencil with every other peak's contribution removed.
    /// Returns the new estimate and whether the solve was degenerate.
    fn refine(index: usize, target: &StencilTarget, current: &[Lorentzian]) -> (Lorentzian, bool) {
        let previous = current[index];
        let mut ys = target.ys;
        for (k, x) in target.xs.iter().enumerate() {
            for (j, peak) in current.iter().enumerate() {
                if j != index {
                    ys[k] -= peak.evaluate(*x);
                }
            }
        }
        match solve_stencil(target.xs, ys) {
            Ok(peak) => (peak, false),
            Err(e) => {
                tracing::trace!("Keeping previous estimate for peak {index}: {e}");
                (previous, true)
            }
        }
    }

    fn has_converged(&self, previous: &[Lorentzian], current: &[Lorentzian]) -> bool {
        previous.iter().zip(current.iter()).all(|(a, b)| {
            let (a, b) = (a.parameters(), b.parameters());
            [(a.0, b.0), (a.1, b.1), (a.2, b.2)]
                .into_iter()
                .all(|(old, new)| (new - old).abs() <= self.convergence * old.abs())
        })
    }

    fn fit_impl(
        &self,
        chemical_shifts: &[f64],
        signal: &[f64],
        candidates: &[PeakCandidate],
        parallel: bool,
    ) -> FitResult {
        let targets: Vec<StencilTarget> = candidates
            .iter()
            .map(|c| {
                let stencil = build_stencil(chemical_shifts, &c.region, c.guess.hw);
                StencilTarget {
                    xs: stencil.map(|i| chemical_shifts[i]),
                    ys: stencil.map(|i| signal[i]),
                }
            })
            .collect();

        let mut current: Vec<Lorentzian> = candidates.iter().map(|c| c.guess).collect();
        let mut degeneracies = 0;
        let mut converged = false;
        let mut iterations = 0;

        while iterations < self.iterations && !current.is_empty() {
            iterations += 1;
            let step: Vec<(Lorentzian, bool)> = if parallel {
                targets
                    .par_iter()
                    .enumerate()
                    .map(|(i, t)| Self::refine(i, t, &current))
                    .collect()
            } else {
                targets
                    .iter()
                    .enumerate()
                    .map(|(i, t)| Self::refine(i, t, &current))
                    .collect()
            };
            degeneracies += step.iter().filter(|(_, degenerate)| *degenerate).count();
            let next: Vec<Lorentzian> = step.into_iter().map(|(p, _)| p).collect();
            converged = self.has_converged(&current, &next);
            current = next;
            if converged {
                break;
            }
        }

        let n_before = current.len();
        let peaks: Vec<Lorentzian> = current
            .into_iter()
            .filter(|p| p.sf > DISCARD_THRESHOLD && p.hw > DISCARD_THRESHOLD)
            .collect();

        tracing::debug!(
            iterations,
            converged,
            degeneracies,
            discarded = n_before - peaks.len(),
            "Refined {} peaks",
            peaks.len()
        );

        FitResult {
            peaks,
            iterations,
            converged,
            degeneracies,
        }
    }

    /// Refine `candidates` against `signal`, sampled at `chemical_shifts`.
    ///
    /// # Arguments
    /// - `chemical_shifts`: The x-coordinate of each sample
    /// - `signal`: The preprocessed intensity of each sample
    /// - `candidates`: The candidate regions and their initial guesses
    #[tracing::instrument(skip_all, level = "debug")]
    pub fn fit(
        &self,
        chemical_shifts: &[f64],
        signal: &[f64],
        candidates: &[PeakCandidate],
    ) -> FitResult {
        self.fit_impl(chemical_shifts, signal, candidates, false)
    }

    /// As [`AnalyticalFitter::fit`], refining the candidates of each pass in parallel
    #[tracing::instrument(skip_all, level = "debug")]
    pub fn par_fit(
        &self,
        chemical_shifts: &[f64],
        signal: &[f64],
        candidates: &[PeakCandidate],
    ) -> FitResult {
        self.fit_impl(chemical_shifts, signal, candidates, true)
    }
}
