use std::cmp::Ordering;
use std::ops::BitXorAssign;

use crate::rips_complex::{FiltrationValue, RipsComplex};
use crate::simplex::SimplexKey;

/// Chain of simplices over Z/2, kept sorted ascending by (filtration value,
/// lex key). Addition is symmetric difference; the "low" of a column is its
/// greatest element under the filtration order, which pivot reduction keys on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Column {
    elems: Vec<(FiltrationValue, SimplexKey)>,
}

impl Column {
    pub fn new() -> Self {
        Self::default()
    }

    /// Column holding a single simplex.
    pub fn singleton(value: FiltrationValue, simplex: SimplexKey) -> Self {
        Self { elems: vec![(value, simplex)] }
    }

    /// Build from an already-sorted, duplicate-free element list.
    pub fn from_sorted(elems: Vec<(FiltrationValue, SimplexKey)>) -> Self {
        debug_assert!(elems.windows(2).all(|w| w[0] < w[1]), "column elements not sorted");
        Self { elems }
    }

    pub fn is_zero(&self) -> bool {
        self.elems.is_empty()
    }

    pub fn len(&self) -> usize {
        self.elems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    /// Greatest element under the filtration order; the reduction pivot.
    pub fn low(&self) -> Option<&(FiltrationValue, SimplexKey)> {
        self.elems.last()
    }

    pub fn contains(&self, simplex: &SimplexKey) -> bool {
        self.elems.iter().any(|(_, s)| s == simplex)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, (FiltrationValue, SimplexKey)> {
        self.elems.iter()
    }

    /// Symmetric difference in a single merge pass: elements present in both
    /// columns cancel, all others are kept in order.
    pub fn xor_assign(&mut self, other: &Column) {
        if other.elems.is_empty() {
            return;
        }
        let a = &self.elems;
        let b = &other.elems;
        let mut merged = Vec::with_capacity(a.len() + b.len());
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            match a[i].cmp(&b[j]) {
                Ordering::Less => {
                    merged.push(a[i]);
                    i += 1;
                }
                Ordering::Greater => {
                    merged.push(b[j]);
                    j += 1;
                }
                Ordering::Equal => {
                    i += 1;
                    j += 1;
                }
            }
        }
        merged.extend_from_slice(&a[i..]);
        merged.extend_from_slice(&b[j..]);
        self.elems = merged;
    }
}

impl BitXorAssign<&Column> for Column {
    fn bitxor_assign(&mut self, other: &Column) {
        self.xor_assign(other);
    }
}

impl RipsComplex {
    /// Boundary column of a simplex: the sum of its codimension-1 faces,
    /// each carrying the filtration value recorded in the expansion cache
    /// (vertices carry 0). Faces of any cached simplex are themselves cached.
    pub fn boundary(&self, s: &SimplexKey) -> Column {
        debug_assert!(s.count() >= 2, "boundary of a vertex or empty key");
        let mut elems = Vec::with_capacity(s.count());
        for p in s.vertices() {
            let face = *s ^ SimplexKey::vertex(p);
            let value = self
                .filtration_value(&face)
                .expect("face missing from expansion cache");
            elems.push((value, face));
        }
        elems.sort_unstable();
        Column::from_sorted(elems)
    }
}
