//! Cross-spectrum peak correspondence
use nmrdecon::{Deconvolution, Lorentzian};

use crate::alignment::{AlignedDeconvolution, Alignment, AlignmentSlot};
use crate::cluster::{sweep_clusters, PeakRef, SlotMembers};
use crate::error::AlignmentError;
use crate::tolerance::WidthTolerance;

#[derive(Debug, Clone, Default)]
pub struct AlignerBuilder {
    position_tolerance: Option<f64>,
    width_tolerance: Option<WidthTolerance>,
    min_presence: Option<usize>,
}

impl AlignerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position_tolerance(mut self, value: f64) -> Self {
        self.position_tolerance = Some(value);
        self
    }

    pub fn width_tolerance(mut self, value: WidthTolerance) -> Self {
        self.width_tolerance = Some(value);
        self
    }

    pub fn min_presence(mut self, value: usize) -> Self {
        self.min_presence = Some(value);
        self
    }

    pub fn create(self) -> Aligner {
        let defaults = Aligner::default();
        Aligner {
            position_tolerance: self
                .position_tolerance
                .unwrap_or(defaults.position_tolerance),
            width_tolerance: self.width_tolerance.unwrap_or(defaults.width_tolerance),
            min_presence: self.min_presence.unwrap_or(defaults.min_presence),
        }
    }
}

/// Groups the peaks of many deconvolutions into slots of peaks that describe the same
/// entity.
///
/// Peaks from different inputs share a slot when their positions are within
/// `position_tolerance` of the slot's seed peak and their half widths pass `width_tolerance`
/// against it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Aligner {
    /// The largest position difference, in chemical shift units
    pub position_tolerance: f64,
    pub width_tolerance: WidthTolerance,
    /// Slots with peaks from fewer inputs than this are dropped
    pub min_presence: usize,
}

impl Default for Aligner {
    fn default() -> Self {
        Self {
            position_tolerance: 0.025,
            width_tolerance: WidthTolerance::default(),
            min_presence: 1,
        }
    }
}

impl Aligner {
    pub fn new(position_tolerance: f64, width_tolerance: WidthTolerance) -> Self {
        Self {
            position_tolerance,
            width_tolerance,
            ..Default::default()
        }
    }

    pub fn builder() -> AlignerBuilder {
        AlignerBuilder::new()
    }

    pub fn validate(&self) -> Result<(), AlignmentError> {
        if !(self.position_tolerance.is_finite() && self.position_tolerance >= 0.0) {
            return Err(AlignmentError::InvalidConfiguration {
                parameter: "position_tolerance",
                reason: format!(
                    "must be finite and non-negative, got {}",
                    self.position_tolerance
                ),
            });
        }
        if !self.width_tolerance.is_valid() {
            return Err(AlignmentError::InvalidConfiguration {
                parameter: "width_tolerance",
                reason: format!(
                    "must be finite and non-negative, got {:?}",
                    self.width_tolerance
                ),
            });
        }
        if self.min_presence == 0 {
            return Err(AlignmentError::InvalidConfiguration {
                parameter: "min_presence",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    fn representative(members: &SlotMembers) -> Lorentzian {
        let (n, sf, hw, maxp) = members.iter().flatten().fold(
            (0usize, 0.0, 0.0, 0.0),
            |(n, sf, hw, maxp), p| {
                (
                    n + 1,
                    sf + p.lorentzian.sf,
                    hw + p.lorentzian.hw,
                    maxp + p.lorentzian.maxp,
                )
            },
        );
        let n = n as f64;
        Lorentzian {
            sf: sf / n,
            hw: hw / n,
            maxp: maxp / n,
        }
    }

    /// Align the peaks of `deconvolutions`.
    ///
    /// # Errors
    /// - [`AlignmentError::InvalidConfiguration`] if a tolerance is out of its domain
    /// - [`AlignmentError::EmptyInput`] if `deconvolutions` is empty
    #[tracing::instrument(skip_all, level = "debug")]
    pub fn align<D: AsRef<Deconvolution>>(
        &self,
        deconvolutions: &[D],
    ) -> Result<Alignment, AlignmentError> {
        self.validate()?;
        if deconvolutions.is_empty() {
            return Err(AlignmentError::EmptyInput);
        }
        let n_layers = deconvolutions.len();

        let peaks: Vec<PeakRef> = deconvolutions
            .iter()
            .enumerate()
            .flat_map(|(layer, d)| {
                d.as_ref()
                    .iter()
                    .enumerate()
                    .map(move |(i, p)| PeakRef::new(layer, i, *p))
            })
            .collect();
        let n_peaks = peaks.len();

        let clusters = sweep_clusters(peaks, self.position_tolerance);
        let n_clusters = clusters.len();
        let mut slots: Vec<(AlignmentSlot, usize)> = clusters
            .iter()
            .flat_map(|c| c.partition(self.position_tolerance, &self.width_tolerance, n_layers))
            .map(|members| {
                let representative = Self::representative(&members);
                let members: Vec<Option<usize>> =
                    members.iter().map(|m| m.map(|p| p.peak)).collect();
                AlignmentSlot::new(members, representative)
            })
            .enumerate()
            .map(|(i, slot)| (slot, i))
            .collect();
        slots.sort_by(|(a, i), (b, j)| {
            a.representative
                .maxp
                .total_cmp(&b.representative.maxp)
                .then(i.cmp(j))
        });

        let mut dropped: Vec<Vec<usize>> = vec![Vec::new(); n_layers];
        let slots: Vec<AlignmentSlot> = slots
            .into_iter()
            .map(|(slot, _)| slot)
            .filter(|slot| {
                if slot.presence() >= self.min_presence {
                    true
                } else {
                    for (layer, member) in slot.members.iter().enumerate() {
                        if let Some(peak) = member {
                            dropped[layer].push(*peak);
                        }
                    }
                    false
                }
            })
            .collect();
        dropped.iter_mut().for_each(|d| d.sort_unstable());

        let aligned: Vec<AlignedDeconvolution> = deconvolutions
            .iter()
            .enumerate()
            .map(|(layer, d)| {
                let d = d.as_ref();
                let peaks = slots
                    .iter()
                    .map(|slot| slot.members[layer].map(|i| d[i]))
                    .collect();
                AlignedDeconvolution::new(peaks, d.mse(), d.params().cloned())
            })
            .collect();

        tracing::debug!(
            inputs = n_layers,
            peaks = n_peaks,
            clusters = n_clusters,
            dropped = dropped.iter().map(|d| d.len()).sum::<usize>(),
            "Aligned peaks into {} slots",
            slots.len()
        );

        Ok(Alignment::new(aligned, slots, dropped))
    }
}
