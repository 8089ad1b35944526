//! `nmrdecon-align` tracks the same peak across many deconvolved spectra.
//!
//! The peaks of every [`Deconvolution`](nmrdecon::Deconvolution) are pooled and sorted by
//! position, swept into clusters of nearby positions, and each cluster is split into slots
//! holding at most one peak per input. The resulting [`Alignment`] lists, for every input,
//! its peak in each slot or `None` where it has no counterpart.
pub mod aligner;
pub mod alignment;
pub mod api;
pub mod cluster;
pub mod error;
pub mod tolerance;

pub use crate::aligner::{Aligner, AlignerBuilder};
pub use crate::alignment::{AlignedDeconvolution, Alignment, AlignmentSlot};
pub use crate::api::align_deconvolutions;
pub use crate::error::AlignmentError;
pub use crate::tolerance::WidthTolerance;
