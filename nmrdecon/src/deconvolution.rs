use std::ops::Index;

use crate::lorentzian::Lorentzian;
use crate::params::DeconvolutionParams;

/// The result of deconvolving a single spectrum: the fitted peaks, how well their sum
/// reconstructs the preprocessed signal, and the parameters that produced them.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Deconvolution {
    lorentzians: Vec<Lorentzian>,
    mse: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    params: Option<DeconvolutionParams>,
}

impl Deconvolution {
    pub fn new(lorentzians: Vec<Lorentzian>, mse: f64) -> Self {
        Self {
            lorentzians,
            mse,
            params: None,
        }
    }

    /// Record the parameters these peaks were fitted with
    pub fn with_params(mut self, params: DeconvolutionParams) -> Self {
        self.params = Some(params);
        self
    }

    /// The parameters these peaks were fitted with, if they came from a
    /// [`Deconvoluter`](crate::Deconvoluter)
    pub fn params(&self) -> Option<&DeconvolutionParams> {
        self.params.as_ref()
    }

    pub fn lorentzians(&self) -> &[Lorentzian] {
        &self.lorentzians
    }

    /// The mean squared error of the reconstruction over the samples that were analyzed
    pub fn mse(&self) -> f64 {
        self.mse
    }

    pub fn len(&self) -> usize {
        self.lorentzians.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lorentzians.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Lorentzian> {
        self.lorentzians.iter()
    }

    pub fn superposition(&self, x: f64) -> f64 {
        Lorentzian::superposition(x, &self.lorentzians)
    }

    pub fn superposition_vec(&self, xs: &[f64]) -> Vec<f64> {
        Lorentzian::superposition_vec(xs, &self.lorentzians)
    }

    pub fn par_superposition_vec(&self, xs: &[f64]) -> Vec<f64> {
        Lorentzian::par_superposition_vec(xs, &self.lorentzians)
    }

    /// The area under each peak, in peak order
    pub fn integrals(&self) -> Vec<f64> {
        self.lorentzians.iter().map(|l| l.integral()).collect()
    }

    pub fn into_lorentzians(self) -> Vec<Lorentzian> {
        self.lorentzians
    }
}

impl AsRef<Deconvolution> for Deconvolution {
    fn as_ref(&self) -> &Deconvolution {
        self
    }
}

impl Index<usize> for Deconvolution {
    type Output = Lorentzian;

    fn index(&self, index: usize) -> &Self::Output {
        &self.lorentzians[index]
    }
}

impl<'a> IntoIterator for &'a Deconvolution {
    type Item = &'a Lorentzian;

    type IntoIter = std::slice::Iter<'a, Lorentzian>;

    fn into_iter(self) -> Self::IntoIter {
        self.lorentzians.iter()
    }
}
