use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::debug;
use ndarray::Array2;
use thiserror::Error;

use crate::{D_MAX, N_MAX};

/// Error types for point input
#[derive(Error, Debug)]
pub enum PointCloudError {
    #[error("failed to read points: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: malformed coordinate {token:?}")]
    MalformedCoordinate { line: usize, token: String },
    #[error("point count {n} exceeds capacity {max}")]
    TooManyPoints { n: usize, max: usize },
    #[error("point dimension {d} exceeds capacity {max}")]
    TooManyDimensions { d: usize, max: usize },
}

/// Represents a collection of points, one row per point
#[derive(Debug, Clone)]
pub struct PointCloud {
    pub points: Array2<f64>,
}

impl PointCloud {
    pub fn new(points: Array2<f64>) -> Result<Self, PointCloudError> {
        if points.nrows() > N_MAX {
            return Err(PointCloudError::TooManyPoints { n: points.nrows(), max: N_MAX });
        }
        if points.ncols() > D_MAX {
            return Err(PointCloudError::TooManyDimensions { d: points.ncols(), max: D_MAX });
        }
        Ok(Self { points })
    }

    /// Number of points in cloud
    pub fn n_points(&self) -> usize {
        self.points.nrows()
    }

    /// Dimensionality of cloud
    pub fn dim(&self) -> usize {
        self.points.ncols()
    }

    /// Squared Euclidean distance between points i and j
    pub fn distance2(&self, i: usize, j: usize) -> f64 {
        self.points
            .row(i)
            .iter()
            .zip(&self.points.row(j))
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }

    /// Parse a line-oriented ASCII point file.
    ///
    /// Each line holds up to `D_MAX` floats joined by `separator`; missing
    /// trailing coordinates are zero, extra ones are ignored. Blank lines are
    /// skipped. A token that does not parse as a float is a fatal error.
    pub fn from_reader<R: BufRead>(reader: R, separator: &str) -> Result<Self, PointCloudError> {
        let mut rows: Vec<[f64; D_MAX]> = Vec::new();

        for (ix, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let mut tokens: Vec<&str> = line.split(separator).collect();
            if tokens.last().map_or(false, |t| t.trim().is_empty()) {
                tokens.pop(); // allow a trailing separator
            }

            let mut coords = [0.0f64; D_MAX];
            for (c, token) in tokens.into_iter().enumerate() {
                if c >= D_MAX {
                    break;
                }
                coords[c] = token.trim().parse().map_err(|_| PointCloudError::MalformedCoordinate {
                    line: ix + 1,
                    token: token.to_string(),
                })?;
            }
            rows.push(coords);
        }

        if rows.len() > N_MAX {
            return Err(PointCloudError::TooManyPoints { n: rows.len(), max: N_MAX });
        }
        debug!("Read {} points", rows.len());

        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        let points = Array2::from_shape_vec((rows.len(), D_MAX), flat)
            .expect("shape mismatch building point matrix");
        Ok(Self { points })
    }

    pub fn from_file<P: AsRef<Path>>(path: P, separator: &str) -> Result<Self, PointCloudError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), separator)
    }
}
