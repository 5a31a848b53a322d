use std::io::Write;

use log::debug;
use thiserror::Error;

use crate::homology::{sweep_cycles, HomologyError};
use crate::reduction::reduce;
use crate::rips_complex::{appearance_scale, RipsComplex};
use crate::simplex::SimplexKey;

/// Error types for barcode computation
#[derive(Error, Debug)]
pub enum BarcodeError {
    #[error(transparent)]
    Homology(#[from] HomologyError),
    #[error("boundary low {low:?} has no matching cycle")]
    UnmatchedBoundary { low: SimplexKey },
}

impl From<crate::reduction::ReductionError> for BarcodeError {
    fn from(err: crate::reduction::ReductionError) -> Self {
        BarcodeError::Homology(HomologyError::Reduction(err))
    }
}

/// Persistence interval: the scales between which one homology class lives
#[derive(Clone, Debug, PartialEq)]
pub struct BarcodeInterval {
    pub dim: usize,
    pub birth: f64,
    /// `f64::INFINITY` when the feature persists at the top of the filtration
    pub death: f64,
}

impl BarcodeInterval {
    pub fn persistence(&self) -> f64 {
        self.death - self.birth
    }

    pub fn is_infinite(&self) -> bool {
        self.death.is_infinite()
    }
}

/// Persistence barcode of the Rips filtration up to scale `eps_max`, for
/// homology dimensions 0..=`d_bar`.
///
/// One reducer pass per dimension: the cycle basis rolls forward from the
/// previous pass, each boundary column claims the cycle sharing its low
/// (closing an interval at the boundary creator's appearance scale), and
/// unclaimed cycles persist to infinity. Ties are broken by the lex order of
/// the simplex stream, so the output is deterministic for a given input.
pub fn barcode(
    complex: &mut RipsComplex,
    eps_max: f64,
    d_bar: usize,
) -> Result<Vec<BarcodeInterval>, BarcodeError> {
    let (_, mut rolling_z) = reduce(complex, -1, eps_max)?;
    let mut intervals = Vec::new();

    for k in 0..=d_bar {
        let (b_basis, z_next) = reduce(complex, k as i32, eps_max)?;
        let mut cycles = sweep_cycles(rolling_z)?;

        for b in &b_basis {
            let low = b.column.low().expect("zero column in boundary basis").1;
            let killed = cycles.remove(&low).ok_or(BarcodeError::UnmatchedBoundary { low })?;
            let birth = appearance_scale(killed.column.low().expect("empty cycle column").0);
            let death_value = complex
                .filtration_value(&b.creator)
                .expect("boundary creator missing from cache");
            intervals.push(BarcodeInterval {
                dim: k,
                birth,
                death: appearance_scale(death_value),
            });
        }

        let mut survivors: Vec<_> = cycles.into_values().collect();
        survivors.sort_by(|a, b| a.column.low().cmp(&b.column.low()));
        for survivor in survivors {
            let birth = appearance_scale(survivor.column.low().expect("empty cycle column").0);
            intervals.push(BarcodeInterval { dim: k, birth, death: f64::INFINITY });
        }

        debug!("Barcode dim {}: {} intervals so far", k, intervals.len());
        rolling_z = z_next;
    }

    Ok(intervals)
}

/// Write intervals as CSV: `homology dimension,start,end`, with a literal
/// `inf` for infinite persistence.
pub fn write_barcode_csv<W: Write>(
    writer: &mut W,
    intervals: &[BarcodeInterval],
) -> std::io::Result<()> {
    writeln!(writer, "homology dimension,start,end")?;
    for interval in intervals {
        if interval.is_infinite() {
            writeln!(writer, "{},{},inf", interval.dim, interval.birth)?;
        } else {
            writeln!(writer, "{},{},{}", interval.dim, interval.birth, interval.death)?;
        }
    }
    Ok(())
}
