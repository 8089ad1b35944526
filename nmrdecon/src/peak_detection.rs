//! Find regions of a preprocessed signal that hold a peak, and make an initial guess of
//! each peak's shape.
use std::ops::Range;

use crate::lorentzian::Lorentzian;
use crate::preprocessing::PreprocessedSignal;

/// An inclusive range of samples holding a single peak
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CandidateRegion {
    pub left: usize,
    pub apex: usize,
    pub right: usize,
}

impl CandidateRegion {
    pub fn new(left: usize, apex: usize, right: usize) -> Self {
        Self { left, apex, right }
    }

    /// The number of samples in the region
    pub fn sample_count(&self) -> usize {
        self.right - self.left + 1
    }

    pub fn indices(&self) -> std::ops::RangeInclusive<usize> {
        self.left..=self.right
    }
}

/// A candidate region paired with the first guess at the peak it holds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakCandidate {
    pub region: CandidateRegion,
    pub guess: Lorentzian,
}

fn interpolate_crossing(x0: f64, y0: f64, x1: f64, y1: f64, level: f64) -> f64 {
    if y1 == y0 {
        x0
    } else {
        x0 + (level - y0) * (x1 - x0) / (y1 - y0)
    }
}

/// The spacing between `index` and its neighbor, to the right when there is one
pub(crate) fn local_step(x: &[f64], index: usize) -> f64 {
    if index + 1 < x.len() {
        (x[index + 1] - x[index]).abs()
    } else if index > 0 {
        (x[index] - x[index - 1]).abs()
    } else {
        0.0
    }
}

fn argmin(values: &[f64], range: Range<usize>) -> usize {
    let mut best = range.start;
    for i in range {
        if values[i] < values[best] {
            best = i;
        }
    }
    best
}

fn argmax(values: &[f64], range: Range<usize>) -> usize {
    let mut best = range.start;
    for i in range {
        if values[i] > values[best] {
            best = i;
        }
    }
    best
}

/// Splits above-threshold runs of samples into candidate peak regions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeakDetector {
    /// Runs separated by fewer than this many non-signal samples are merged
    pub min_separation: usize,
}

impl Default for PeakDetector {
    fn default() -> Self {
        Self { min_separation: 3 }
    }
}

impl PeakDetector {
    pub fn new(min_separation: usize) -> Self {
        Self { min_separation }
    }

    /// Find the maximal contiguous runs of signal samples, merging runs separated by
    /// a short gap of usable samples.
    pub fn find_runs(&self, signal: &PreprocessedSignal) -> Vec<Range<usize>> {
        let mut runs: Vec<Range<usize>> = Vec::new();
        let mut start: Option<usize> = None;
        for i in 0..signal.len() {
            match (signal.is_signal(i), start) {
                (true, None) => start = Some(i),
                (false, Some(s)) => {
                    runs.push(s..i);
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            runs.push(s..signal.len());
        }

        let mut merged: Vec<Range<usize>> = Vec::with_capacity(runs.len());
        for run in runs {
            match merged.last_mut() {
                Some(prev)
                    if run.start - prev.end < self.min_separation
                        && (prev.end..run.start).all(|i| signal.usable[i]) =>
                {
                    prev.end = run.end;
                }
                _ => merged.push(run),
            }
        }
        merged
    }

    /// Split a run at the valleys between local maxima that are separated by more than the
    /// noise tolerance. Maxima without a deep enough valley between them are merged,
    /// keeping the taller one as the apex.
    pub fn split_run(&self, run: Range<usize>, signal: &PreprocessedSignal) -> Vec<CandidateRegion> {
        let s = &signal.smoothed;
        let tolerance = signal.prominence_tolerance();
        let mut maxima: Vec<usize> = (run.start + 1..run.end.saturating_sub(1))
            .filter(|i| s[*i] > s[i - 1] && s[*i] >= s[i + 1])
            .collect();
        if maxima.is_empty() {
            maxima.push(argmax(s, run.clone()));
        }

        let mut regions = Vec::new();
        let mut left = run.start;
        let mut current = maxima[0];
        for next in maxima.into_iter().skip(1) {
            let valley = argmin(s, current..next + 1);
            if s[current].min(s[next]) - s[valley] > tolerance {
                regions.push(CandidateRegion::new(left, current, valley));
                left = valley;
                current = next;
            } else if s[next] > s[current] {
                current = next;
            }
        }
        regions.push(CandidateRegion::new(left, current, run.end - 1));
        regions
    }

    fn keep_region(&self, region: &CandidateRegion, signal: &PreprocessedSignal) -> bool {
        let s = &signal.smoothed;
        if region.sample_count() < 3 {
            return false;
        }
        // Monotonic tails running into a boundary or ignore region have no apex of their own
        if s[region.apex] - s[region.left].max(s[region.right]) <= signal.prominence_tolerance() {
            return false;
        }
        region.indices().any(|i| signal.usable[i])
    }

    /// Estimate the Lorentzian held by `region` from the height of its apex and
    /// its width at half of that height.
    pub fn initial_guess(
        &self,
        chemical_shifts: &[f64],
        signal: &PreprocessedSignal,
        region: &CandidateRegion,
    ) -> Lorentzian {
        let x = chemical_shifts;
        let s = &signal.smoothed;
        let apex = region.apex;
        let height = s[apex];
        let half = height / 2.0;

        let left_crossing = (region.left + 1..=apex)
            .rev()
            .find(|i| s[i - 1] <= half)
            .map(|i| interpolate_crossing(x[i - 1], s[i - 1], x[i], s[i], half));
        let right_crossing = (apex..region.right)
            .find(|i| s[i + 1] <= half)
            .map(|i| interpolate_crossing(x[i], s[i], x[i + 1], s[i + 1], half));

        let hw = match (left_crossing, right_crossing) {
            (Some(l), Some(r)) => (r - l).abs() / 2.0,
            (Some(c), None) | (None, Some(c)) => (x[apex] - c).abs(),
            (None, None) => (x[region.right] - x[region.left]).abs() / 2.0,
        };
        let hw = hw.max(local_step(x, apex));

        Lorentzian::new(height.max(0.0), hw, x[apex])
    }

    /// Find all candidate peaks in `signal`, in sample order
    #[tracing::instrument(skip_all, level = "debug")]
    pub fn detect(&self, chemical_shifts: &[f64], signal: &PreprocessedSignal) -> Vec<PeakCandidate> {
        let runs = self.find_runs(signal);
        let candidates: Vec<PeakCandidate> = runs
            .into_iter()
            .flat_map(|run| self.split_run(run, signal))
            .filter(|region| self.keep_region(region, signal))
            .map(|region| {
                let guess = self.initial_guess(chemical_shifts, signal, &region);
                tracing::trace!(
                    "Candidate {}..={} with apex {} initial guess {:?}",
                    region.left,
                    region.right,
                    region.apex,
                    guess
                );
                PeakCandidate { region, guess }
            })
            .collect();
        tracing::debug!("Detected {} candidate peaks", candidates.len());
        candidates
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::interval::SimpleInterval;
    use crate::preprocessing::{MovingAverageSmoother, Preprocessor};
    use crate::spectrum::Spectrum;

    fn make_signal(
        peaks: &[Lorentzian],
        ignore: &[SimpleInterval<f64>],
    ) -> (Vec<f64>, PreprocessedSignal) {
        let mut state: u64 = 42;
        let x: Vec<f64> = (0..2000).map(|i| i as f64 * 0.005).collect();
        let y: Vec<f64> = x
            .iter()
            .map(|x| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                let u = (state >> 11) as f64 / (1u64 << 53) as f64;
                Lorentzian::superposition(*x, peaks) + 2e-3 * (u - 0.5)
            })
            .collect();
        let spectrum = Spectrum::from_arrays(x.clone(), y).unwrap();
        let signal = Preprocessor::new(MovingAverageSmoother::default(), 5.0)
            .process(&spectrum, ignore)
            .unwrap();
        (x, signal)
    }

    #[test]
    fn test_detect_separated() {
        let peaks = [
            Lorentzian::new(1.0, 0.05, 3.0),
            Lorentzian::new(0.5, 0.08, 6.0),
        ];
        let (x, signal) = make_signal(&peaks, &[]);
        let detector = PeakDetector::default();
        let candidates = detector.detect(&x, &signal);
        assert_eq!(candidates.len(), 2, "{candidates:?}");
        for (c, p) in candidates.iter().zip(peaks.iter()) {
            assert!((c.guess.maxp - p.maxp).abs() < 0.011, "{c:?} vs {p:?}");
            assert!((c.guess.hw - p.hw).abs() / p.hw < 0.25, "{c:?} vs {p:?}");
            assert!((c.guess.sf - p.sf).abs() / p.sf < 0.1, "{c:?} vs {p:?}");
            assert!(c.region.left <= c.region.apex && c.region.apex <= c.region.right);
        }
    }

    #[test]
    fn test_ignore_region_drops_peak() {
        let peaks = [
            Lorentzian::new(1.0, 0.05, 3.0),
            Lorentzian::new(0.5, 0.08, 6.0),
        ];
        let (x, signal) = make_signal(&peaks, &[SimpleInterval::new(5.0, 7.0)]);
        let candidates = PeakDetector::default().detect(&x, &signal);
        assert_eq!(candidates.len(), 1);
        assert!((candidates[0].guess.maxp - 3.0).abs() < 0.011);
    }

    #[test]
    fn test_flat_signal_has_no_candidates() {
        let (x, signal) = make_signal(&[], &[]);
        assert!(PeakDetector::default().detect(&x, &signal).is_empty());
    }

    #[test]
    fn test_merge_runs() {
        let signal = PreprocessedSignal {
            smoothed: vec![0.0, 5.0, 6.0, 0.0, 5.0, 4.0, 0.0, 0.0, 0.0, 3.0, 0.0],
            scores: vec![0.0, 5.0, 6.0, 0.0, 5.0, 4.0, 0.0, 0.0, 0.0, 3.0, 0.0],
            usable: vec![true; 11],
            noise_level: 1.0,
            threshold: 1.0,
        };
        let runs = PeakDetector::new(2).find_runs(&signal);
        assert_eq!(runs, vec![1..6, 9..10]);
        let runs = PeakDetector::new(1).find_runs(&signal);
        assert_eq!(runs, vec![1..3, 4..6, 9..10]);
        let runs = PeakDetector::new(4).find_runs(&signal);
        assert_eq!(runs, vec![1..10]);
    }
}
