use std::collections::HashMap;
use std::sync::atomic::Ordering;

use log::debug;
use thiserror::Error;

use crate::column::Column;
use crate::rips_complex::RipsComplex;
use crate::simplex::SimplexKey;
use crate::MAX_DIM;

/// Error types for reduction
#[derive(Error, Debug)]
pub enum ReductionError {
    #[error("homology dimension {k} needs {dim}-simplices, above the cached maximum {max}")]
    DimensionTooLarge { k: i32, dim: usize, max: usize },
}

/// Basis column labeled by the simplex whose insertion created it.
#[derive(Debug, Clone)]
pub struct LabeledColumn {
    pub creator: SimplexKey,
    pub column: Column,
}

pub type Basis = Vec<LabeledColumn>;

/// Twin-matrix pivot reduction at homology dimension `k`.
///
/// Streams the (k+1)-simplices present at `epsilon` in filtration order and
/// returns simultaneous labeled bases of the boundaries B_k (nonzero reduced
/// boundary columns over k-simplices) and the cycles Z_{k+1} ((k+1)-chains
/// with zero boundary). Each boundary column is paired with a companion
/// cycle column updated in lockstep, so a cycle representative is on hand
/// the moment a pivot is claimed.
///
/// `k = -1` is virtual: no boundaries, one trivial cycle per vertex.
pub fn reduce(
    complex: &mut RipsComplex,
    k: i32,
    epsilon: f64,
) -> Result<(Basis, Basis), ReductionError> {
    if k < -1 || k + 1 > MAX_DIM as i32 {
        return Err(ReductionError::DimensionTooLarge { k, dim: (k + 1).max(0) as usize, max: MAX_DIM });
    }
    let dim = (k + 1) as usize;
    let (b_basis, z_basis) = match k {
        -1 => reduce_virtual(complex),
        0 => reduce_edges(complex, epsilon),
        _ => reduce_general(complex, dim, epsilon),
    };
    debug!(
        "Reduced k={} at epsilon {}: |B|={}, |Z|={}",
        k,
        epsilon,
        b_basis.len(),
        z_basis.len()
    );
    Ok((b_basis, z_basis))
}

fn reduce_virtual(complex: &mut RipsComplex) -> (Basis, Basis) {
    let mut z_basis = Vec::with_capacity(complex.n_points());
    complex.for_each_simplex(0, 0.0, true, |v, s| {
        z_basis.push(LabeledColumn { creator: s, column: Column::singleton(v, s) });
    });
    (Vec::new(), z_basis)
}

/// Dimension-0 pass: pivots are single vertices, so the pivot map is a dense
/// array over point indices rather than a hash map.
fn reduce_edges(complex: &mut RipsComplex, epsilon: f64) -> (Basis, Basis) {
    let mut slots: Vec<Option<(SimplexKey, Column)>> = vec![None; complex.n_points()];
    let mut z_map: HashMap<SimplexKey, Column> = HashMap::new();
    let mut b_basis = Basis::new();
    let mut z_basis = Basis::new();

    let progress = complex.progress_counter();
    progress.store(0, Ordering::Relaxed);

    for (v, s) in complex.simplices_sorted(1, epsilon) {
        progress.fetch_add(1, Ordering::Relaxed);
        let mut b = complex.boundary(&s);
        let mut z = Column::singleton(v, s);

        loop {
            let pivot = match b.low() {
                None => break,
                Some((_, key)) => key.lowest_vertex().expect("empty pivot key"),
            };
            match &slots[pivot] {
                Some((creator, column)) => {
                    b ^= column;
                    z ^= z_map.get(creator).expect("pivot owner missing from Z");
                }
                None => break,
            }
        }

        match b.low().copied() {
            Some((_, low_key)) => {
                // Stored basis columns start as the raw edge boundary; the
                // post-pass below makes their pivots unique.
                b_basis.push(LabeledColumn { creator: s, column: complex.boundary(&s) });
                let pivot = low_key.lowest_vertex().expect("empty pivot key");
                slots[pivot] = Some((s, b));
                z_map.insert(s, z);
            }
            None => z_basis.push(LabeledColumn { creator: s, column: z }),
        }
    }

    post_reduce(&mut b_basis);
    (b_basis, z_basis)
}

fn reduce_general(complex: &mut RipsComplex, dim: usize, epsilon: f64) -> (Basis, Basis) {
    // low key -> (creator, reduced boundary column)
    let mut pivots: HashMap<SimplexKey, (SimplexKey, Column)> = HashMap::new();
    // creator -> companion cycle column
    let mut z_map: HashMap<SimplexKey, Column> = HashMap::new();
    let mut b_basis = Basis::new();
    let mut z_basis = Basis::new();

    let progress = complex.progress_counter();
    progress.store(0, Ordering::Relaxed);

    for (v, s) in complex.simplices_sorted(dim, epsilon) {
        progress.fetch_add(1, Ordering::Relaxed);
        let mut b = complex.boundary(&s);
        let mut z = Column::singleton(v, s);

        loop {
            let low_key = match b.low() {
                None => break,
                Some((_, key)) => *key,
            };
            match pivots.get(&low_key) {
                Some((creator, column)) => {
                    b ^= column;
                    z ^= z_map.get(creator).expect("pivot owner missing from Z");
                }
                None => break,
            }
        }

        match b.low().copied() {
            Some((_, low_key)) => {
                // This column is never added to again and is nonzero
                b_basis.push(LabeledColumn { creator: s, column: b.clone() });
                pivots.insert(low_key, (s, b));
                z_map.insert(s, z);
            }
            // A zero boundary means s closed a cycle; its companion column
            // is never referenced by later reductions
            None => z_basis.push(LabeledColumn { creator: s, column: z }),
        }
    }

    (b_basis, z_basis)
}

/// Re-reduce a basis in place so every column keeps a distinct low.
fn post_reduce(basis: &mut Basis) {
    let mut by_low: HashMap<SimplexKey, usize> = HashMap::new();
    for ix in 0..basis.len() {
        loop {
            let low_key = match basis[ix].column.low() {
                None => break,
                Some((_, key)) => *key,
            };
            match by_low.get(&low_key) {
                Some(&jx) => {
                    // jx < ix: the claiming column was finalised earlier
                    let (head, tail) = basis.split_at_mut(ix);
                    tail[0].column ^= &head[jx].column;
                }
                None => {
                    by_low.insert(low_key, ix);
                    break;
                }
            }
        }
        debug_assert!(!basis[ix].column.is_zero(), "dependent column in boundary basis");
    }
}
