use num_traits::Float;

/** An inclusive interval over a single dimension
*/
pub trait Span1D {
    type DimType: PartialOrd;

    fn start(&self) -> &Self::DimType;
    fn end(&self) -> &Self::DimType;

    fn contains(&self, i: &Self::DimType) -> bool {
        self.start() <= i && i <= self.end()
    }

    /// Whether the two intervals share at least one point. Touching intervals overlap.
    fn overlaps<T: Span1D<DimType = Self::DimType>>(&self, interval: &T) -> bool {
        self.start() <= interval.end() && interval.start() <= self.end()
    }

    fn is_contained_in_interval<T: Span1D<DimType = Self::DimType>>(&self, interval: &T) -> bool {
        self.start() >= interval.start() && self.end() <= interval.end()
    }

    fn contains_interval<T: Span1D<DimType = Self::DimType>>(&self, interval: &T) -> bool {
        self.start() <= interval.start() && self.end() >= interval.end()
    }
}

impl<T> Span1D for &T
where
    T: Span1D,
{
    type DimType = T::DimType;

    fn start(&self) -> &Self::DimType {
        (*self).start()
    }

    fn end(&self) -> &Self::DimType {
        (*self).end()
    }
}

/// A closed interval over chemical shift, used for signal boundaries and ignore regions.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimpleInterval<V: PartialOrd> {
    pub start: V,
    pub end: V,
}

impl<V: PartialOrd> SimpleInterval<V> {
    pub fn new(start: V, end: V) -> SimpleInterval<V> {
        SimpleInterval { start, end }
    }
}

impl<V: PartialOrd + Copy> SimpleInterval<V> {
    /// Build an interval from two end points given in either order
    pub fn ordered(a: V, b: V) -> SimpleInterval<V> {
        if a <= b {
            SimpleInterval::new(a, b)
        } else {
            SimpleInterval::new(b, a)
        }
    }
}

impl<V: Float> SimpleInterval<V> {
    pub fn width(&self) -> V {
        self.end - self.start
    }

    pub fn is_finite(&self) -> bool {
        self.start.is_finite() && self.end.is_finite()
    }

    /// The smallest interval covering both `self` and `other`
    pub fn union(&self, other: &Self) -> Self {
        SimpleInterval::new(self.start.min(other.start), self.end.max(other.end))
    }
}

impl<V: PartialOrd> Span1D for SimpleInterval<V> {
    type DimType = V;

    fn start(&self) -> &Self::DimType {
        &self.start
    }

    fn end(&self) -> &Self::DimType {
        &self.end
    }
}

impl<V: PartialOrd + Copy> From<(V, V)> for SimpleInterval<V> {
    fn from(value: (V, V)) -> Self {
        SimpleInterval::ordered(value.0, value.1)
    }
}

/// Sort `intervals` by their start and merge every run of overlapping or touching
/// intervals into a single interval.
pub fn merge_overlapping<V: Float>(intervals: &[SimpleInterval<V>]) -> Vec<SimpleInterval<V>> {
    let mut sorted: Vec<SimpleInterval<V>> = intervals.to_vec();
    sorted.sort_by(|a, b| {
        a.start
            .partial_cmp(&b.start)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut merged: Vec<SimpleInterval<V>> = Vec::with_capacity(sorted.len());
    for iv in sorted {
        match merged.last_mut() {
            Some(last) if last.overlaps(&iv) => {
                *last = last.union(&iv);
            }
            _ => merged.push(iv),
        }
    }
    merged
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_overlaps() {
        let a = SimpleInterval::new(1.0, 2.0);
        let b = SimpleInterval::new(2.0, 3.0);
        let c = SimpleInterval::new(2.5, 2.7);
        let d = SimpleInterval::new(3.5, 4.0);
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(b.overlaps(&c));
        assert!(c.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert!(!d.overlaps(&b));
        assert!(c.is_contained_in_interval(&b));
        assert!(b.contains_interval(&c));
    }

    #[test]
    fn test_merge() {
        let ivs = vec![
            SimpleInterval::new(4.0, 5.0),
            SimpleInterval::new(1.0, 2.0),
            SimpleInterval::new(2.0, 2.5),
            SimpleInterval::new(4.5, 4.6),
        ];
        let merged = merge_overlapping(&ivs);
        assert_eq!(
            merged,
            vec![SimpleInterval::new(1.0, 2.5), SimpleInterval::new(4.0, 5.0)]
        );
        assert_eq!(merged.iter().filter(|iv| iv.contains(&4.2)).count(), 1);
    }

    #[test]
    fn test_ordered() {
        let iv: SimpleInterval<f64> = (3.0, 1.0).into();
        assert_eq!(iv.start, 1.0);
        assert_eq!(iv.end, 3.0);
        assert_eq!(iv.width(), 2.0);
    }
}
