//! One dimensional clustering of peak positions across deconvolutions
use itertools::Itertools;

use nmrdecon::Lorentzian;

use crate::tolerance::WidthTolerance;

/// A reference to a peak in one of the deconvolutions being aligned
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakRef {
    /// The index of the deconvolution the peak came from
    pub layer: usize,
    /// The index of the peak within its deconvolution
    pub peak: usize,
    pub lorentzian: Lorentzian,
}

impl PeakRef {
    pub fn new(layer: usize, peak: usize, lorentzian: Lorentzian) -> Self {
        Self {
            layer,
            peak,
            lorentzian,
        }
    }

    #[inline]
    pub fn maxp(&self) -> f64 {
        self.lorentzian.maxp
    }
}

/// One aligned entity: at most one peak from each layer
pub type SlotMembers = Vec<Option<PeakRef>>;

/// A collection of peaks whose sorted positions are chained together by gaps no wider
/// than the position tolerance
#[derive(Debug, Clone)]
pub struct PositionCluster {
    /// The member peaks, ordered by position, then layer, then peak index
    pub members: Vec<PeakRef>,
}

impl PositionCluster {
    pub fn new(members: Vec<PeakRef>) -> PositionCluster {
        let mut cluster = PositionCluster { members };
        cluster.reset();
        cluster
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    fn reset(&mut self) {
        self.members.sort_by(|a, b| {
            a.maxp()
                .total_cmp(&b.maxp())
                .then(a.layer.cmp(&b.layer))
                .then(a.peak.cmp(&b.peak))
        });
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PeakRef> {
        self.members.iter()
    }

    /// Split the cluster into slots.
    ///
    /// The lowest positioned unassigned peak seeds each new slot. From every other layer, the
    /// unassigned peak closest to the seed that lies within `position_tolerance` of it and whose
    /// half width passes `width_tolerance` against the seed's joins the slot, preferring the
    /// lower peak index on ties. Peaks left over seed later slots.
    ///
    /// Each layer's members are kept in position order, so the peaks within tolerance of
    /// a seed are found by binary search.
    pub fn partition(
        &self,
        position_tolerance: f64,
        width_tolerance: &WidthTolerance,
        n_layers: usize,
    ) -> Vec<SlotMembers> {
        let mut layers: Vec<Vec<PeakRef>> = vec![Vec::new(); n_layers];
        let mut offsets = Vec::with_capacity(self.len());
        for p in self.iter() {
            offsets.push(layers[p.layer].len());
            layers[p.layer].push(*p);
        }
        let mut assigned: Vec<Vec<bool>> = layers.iter().map(|l| vec![false; l.len()]).collect();

        let mut slots = Vec::new();
        for (seed, offset) in self.iter().zip(offsets) {
            if assigned[seed.layer][offset] {
                continue;
            }
            assigned[seed.layer][offset] = true;
            let mut slot: SlotMembers = vec![None; n_layers];
            slot[seed.layer] = Some(*seed);

            for (layer, peaks) in layers.iter().enumerate() {
                if layer == seed.layer {
                    continue;
                }
                let lo = peaks.partition_point(|p| seed.maxp() - p.maxp() > position_tolerance);
                let hi = peaks.partition_point(|p| p.maxp() - seed.maxp() <= position_tolerance);
                let taken = &assigned[layer];
                let best = (lo..hi.max(lo))
                    .filter(|i| {
                        !taken[*i]
                            && width_tolerance.test(peaks[*i].lorentzian.hw, seed.lorentzian.hw)
                    })
                    .min_by(|i, j| {
                        let (a, b) = (&peaks[*i], &peaks[*j]);
                        (a.maxp() - seed.maxp())
                            .abs()
                            .total_cmp(&(b.maxp() - seed.maxp()).abs())
                            .then(a.peak.cmp(&b.peak))
                    });
                if let Some(i) = best {
                    assigned[layer][i] = true;
                    slot[layer] = Some(peaks[i]);
                }
            }
            slots.push(slot);
        }
        slots
    }
}

/// Sort `peaks` by position and sweep over them, starting a new cluster whenever the gap
/// to the previous position exceeds `position_tolerance`.
pub fn sweep_clusters(peaks: Vec<PeakRef>, position_tolerance: f64) -> Vec<PositionCluster> {
    let mut clusters: Vec<PositionCluster> = Vec::new();
    let mut current: Vec<PeakRef> = Vec::new();
    let sorted = peaks.into_iter().sorted_by(|a, b| {
        a.maxp()
            .total_cmp(&b.maxp())
            .then(a.layer.cmp(&b.layer))
            .then(a.peak.cmp(&b.peak))
    });
    for peak in sorted {
        if let Some(last) = current.last() {
            if peak.maxp() - last.maxp() > position_tolerance {
                clusters.push(PositionCluster::new(std::mem::take(&mut current)));
            }
        }
        current.push(peak);
    }
    if !current.is_empty() {
        clusters.push(PositionCluster::new(current));
    }
    clusters
}
