/// How far apart two half widths may be and still describe the same peak
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WidthTolerance {
    /// The half widths may differ by at most this much, in chemical shift units
    Absolute(f64),
    /// The half widths may differ by at most this fraction of the wider of the two
    Relative(f64),
}

impl WidthTolerance {
    pub fn tol(&self) -> f64 {
        match self {
            Self::Absolute(v) => *v,
            Self::Relative(v) => *v,
        }
    }

    /// The largest permitted difference between `a` and `b`
    pub fn bound(&self, a: f64, b: f64) -> f64 {
        match self {
            Self::Absolute(v) => *v,
            Self::Relative(v) => a.abs().max(b.abs()) * v,
        }
    }

    /// Whether `a` and `b` are within tolerance of each other. The test is symmetric.
    pub fn test(&self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.bound(a, b)
    }

    pub fn is_valid(&self) -> bool {
        let v = self.tol();
        v.is_finite() && v >= 0.0
    }
}

impl Default for WidthTolerance {
    fn default() -> Self {
        Self::Relative(0.5)
    }
}
