use nmrdecon::{Deconvolution, DeconvolutionParams, Lorentzian};

/// One aligned entity across every input deconvolution
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AlignmentSlot {
    /// For each input, the index of the peak in its original deconvolution, if any
    pub members: Vec<Option<usize>>,
    /// The member-wise mean of the participating peaks
    pub representative: Lorentzian,
}

impl AlignmentSlot {
    pub fn new(members: Vec<Option<usize>>, representative: Lorentzian) -> Self {
        Self {
            members,
            representative,
        }
    }

    /// The number of inputs with a peak in this slot
    pub fn presence(&self) -> usize {
        self.members.iter().filter(|m| m.is_some()).count()
    }

    pub fn is_present(&self, layer: usize) -> bool {
        self.members.get(layer).is_some_and(|m| m.is_some())
    }
}

/// The peaks of one input deconvolution, arranged in slot order.
///
/// An input with no peak in a slot holds `None` there, which is distinct from a fitted
/// peak of zero height.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AlignedDeconvolution {
    peaks: Vec<Option<Lorentzian>>,
    mse: f64,
    params: Option<DeconvolutionParams>,
}

impl AlignedDeconvolution {
    pub fn new(
        peaks: Vec<Option<Lorentzian>>,
        mse: f64,
        params: Option<DeconvolutionParams>,
    ) -> Self {
        Self { peaks, mse, params }
    }

    /// The parameters the source deconvolution was fitted with
    pub fn params(&self) -> Option<&DeconvolutionParams> {
        self.params.as_ref()
    }

    fn rebuild(&self, peaks: Vec<Lorentzian>) -> Deconvolution {
        let deconvolution = Deconvolution::new(peaks, self.mse);
        match &self.params {
            Some(params) => deconvolution.with_params(params.clone()),
            None => deconvolution,
        }
    }

    pub fn peaks(&self) -> &[Option<Lorentzian>] {
        &self.peaks
    }

    /// The reconstruction error of the source deconvolution
    pub fn mse(&self) -> f64 {
        self.mse
    }

    /// The number of slots, present or not
    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    pub fn get(&self, slot: usize) -> Option<&Lorentzian> {
        self.peaks.get(slot).and_then(|p| p.as_ref())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Option<Lorentzian>> {
        self.peaks.iter()
    }

    pub fn present_count(&self) -> usize {
        self.peaks.iter().filter(|p| p.is_some()).count()
    }

    /// The present peaks in slot order as a plain [`Deconvolution`]
    pub fn to_deconvolution(&self) -> Deconvolution {
        self.rebuild(self.peaks.iter().flatten().copied().collect())
    }
}

/// The correspondence of peaks across a collection of deconvolutions
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Alignment {
    deconvolutions: Vec<AlignedDeconvolution>,
    slots: Vec<AlignmentSlot>,
    dropped: Vec<Vec<usize>>,
}

impl Alignment {
    pub fn new(
        deconvolutions: Vec<AlignedDeconvolution>,
        slots: Vec<AlignmentSlot>,
        dropped: Vec<Vec<usize>>,
    ) -> Self {
        Self {
            deconvolutions,
            slots,
            dropped,
        }
    }

    /// One aligned deconvolution per input, in input order
    pub fn deconvolutions(&self) -> &[AlignedDeconvolution] {
        &self.deconvolutions
    }

    /// The slots, sorted by representative position
    pub fn slots(&self) -> &[AlignmentSlot] {
        &self.slots
    }

    /// For each input, the indices of its peaks which were not placed in any slot
    pub fn dropped(&self) -> &[Vec<usize>] {
        &self.dropped
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn num_inputs(&self) -> usize {
        self.deconvolutions.len()
    }

    pub fn peak(&self, layer: usize, slot: usize) -> Option<&Lorentzian> {
        self.deconvolutions.get(layer).and_then(|d| d.get(slot))
    }

    /// The present peaks of each input with their positions moved onto the representative
    /// position of their slot, so that the same entity sits at the same chemical shift in
    /// every output.
    pub fn shifted_deconvolutions(&self) -> Vec<Deconvolution> {
        self.deconvolutions
            .iter()
            .map(|d| {
                let peaks = d
                    .iter()
                    .zip(self.slots.iter())
                    .filter_map(|(p, slot)| {
                        p.map(|p| Lorentzian {
                            maxp: slot.representative.maxp,
                            ..p
                        })
                    })
                    .collect();
                d.rebuild(peaks)
            })
            .collect()
    }
}
