//! High level APIs for single-shot alignment
use nmrdecon::Deconvolution;

use crate::aligner::Aligner;
use crate::alignment::Alignment;
use crate::error::AlignmentError;

/// A single-shot alignment of the peaks of `deconvolutions`.
///
/// # Arguments
/// - `deconvolutions`: The deconvolutions to align, one per spectrum
/// - `aligner`: The tolerances and presence filter to align with
///
/// # See also
/// [`Aligner::align`]
pub fn align_deconvolutions<D: AsRef<Deconvolution>>(
    deconvolutions: &[D],
    aligner: &Aligner,
) -> Result<Alignment, AlignmentError> {
    aligner.align(deconvolutions)
}
