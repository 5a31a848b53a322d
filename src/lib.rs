pub mod barcode;
pub mod column;
pub mod homology;
pub mod point_cloud;
pub mod reduction;
pub mod rips_complex;
pub mod simplex;
pub mod worker_pool;

/// Maximum number of points; sizes the simplex bitset.
pub const N_MAX: usize = 512;

/// Maximum point dimension; shorter input rows pad with zeros.
pub const D_MAX: usize = 8;

/// Maximum cached simplex dimension. Homology dimension k consumes
/// (k+1)-simplices, so barcodes cover k up to `MAX_DIM - 1`.
pub const MAX_DIM: usize = 3;
