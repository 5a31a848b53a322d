use std::collections::HashMap;

use log::debug;
use thiserror::Error;

use crate::reduction::{reduce, Basis, LabeledColumn, ReductionError};
use crate::rips_complex::RipsComplex;
use crate::simplex::SimplexKey;

/// Error types for homology extraction
#[derive(Error, Debug)]
pub enum HomologyError {
    #[error(transparent)]
    Reduction(#[from] ReductionError),
    #[error("cycle column created by {creator:?} reduced to zero")]
    ZeroCycle { creator: SimplexKey },
    #[error("no cycle column with low {low:?}")]
    MissingPivot { low: SimplexKey },
}

/// Reduce a cycle basis against a boundary basis of the same complex,
/// leaving a basis of the quotient H = Z/B.
///
/// The cycle columns are swept into a pivot map keyed by their lows; every
/// boundary column then claims (and deletes) the entry sharing its low. A
/// cycle column reducing to zero, or a boundary low with no cycle entry,
/// means the two bases do not belong to the same complex.
pub fn homology_basis(z_basis: Basis, b_basis: &Basis) -> Result<Basis, HomologyError> {
    let mut reduced = sweep_cycles(z_basis)?;

    for b in b_basis {
        let low = b.column.low().expect("zero column in boundary basis").1;
        if reduced.remove(&low).is_none() {
            return Err(HomologyError::MissingPivot { low });
        }
    }

    let mut basis: Basis = reduced.into_values().collect();
    basis.sort_by(|a, b| a.column.low().cmp(&b.column.low()));
    Ok(basis)
}

/// Sweep a cycle basis into a pivot map keyed by column lows, XOR-reducing
/// until every low is distinct. A column vanishing along the way is a basis
/// inconsistency.
pub(crate) fn sweep_cycles(
    z_basis: Basis,
) -> Result<HashMap<SimplexKey, LabeledColumn>, HomologyError> {
    let mut reduced: HashMap<SimplexKey, LabeledColumn> = HashMap::new();
    for mut lc in z_basis {
        let low = loop {
            let low = match lc.column.low() {
                None => return Err(HomologyError::ZeroCycle { creator: lc.creator }),
                Some(&(_, key)) => key,
            };
            match reduced.get(&low) {
                Some(other) => lc.column ^= &other.column,
                None => break low,
            }
        };
        reduced.insert(low, lc);
    }
    Ok(reduced)
}

/// Basis of the k-th homology group of the Rips complex at scale `epsilon`,
/// one labeled cycle representative per class.
pub fn find_homology(
    complex: &mut RipsComplex,
    k: usize,
    epsilon: f64,
) -> Result<Basis, HomologyError> {
    let (_, z_basis) = reduce(complex, k as i32 - 1, epsilon)?;
    let (b_basis, _) = reduce(complex, k as i32, epsilon)?;
    debug!("H{} at epsilon {}: |Z|={} |B|={}", k, epsilon, z_basis.len(), b_basis.len());
    homology_basis(z_basis, &b_basis)
}

/// k-th Betti number at scale `epsilon`.
pub fn betti(complex: &mut RipsComplex, k: usize, epsilon: f64) -> Result<usize, HomologyError> {
    Ok(find_homology(complex, k, epsilon)?.len())
}

/// Flat vertex-index list of every simplex supporting the current H-basis at
/// dimension k, plus the basis cardinality (dim H_k). Vertices of each
/// simplex arrive in ascending order.
pub fn homology_draw_indices(
    complex: &mut RipsComplex,
    k: usize,
    epsilon: f64,
) -> Result<(Vec<i32>, usize), HomologyError> {
    let basis = find_homology(complex, k, epsilon)?;
    let rank = basis.len();
    let mut indices = Vec::new();
    for lc in &basis {
        for (_, s) in lc.column.iter() {
            for p in s.vertices() {
                indices.push(p as i32);
            }
        }
    }
    Ok((indices, rank))
}
