use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use itertools::Itertools;
use log::debug;
use ordered_float::OrderedFloat;

use crate::point_cloud::PointCloud;
use crate::simplex::SimplexKey;
use crate::MAX_DIM;

/// Largest squared edge length within a simplex; the smallest `4ε²` at which
/// the simplex enters the Rips complex.
pub type FiltrationValue = OrderedFloat<f64>;

/// Scale at which a simplex with the given filtration value appears.
///
/// Presence at scale ε means `value ≤ (2ε)²`, so the appearance scale is
/// `√value / 2`. Barcode output reports ε, never 2ε.
pub fn appearance_scale(value: FiltrationValue) -> f64 {
    value.into_inner().sqrt() / 2.0
}

/// Vietoris-Rips expansion over a point cloud.
///
/// Holds one cache per simplex dimension mapping each simplex to its
/// filtration value, together with the largest ε the cache has been expanded
/// to. Caches only ever grow; queries at or below the watermark are served
/// from the cache without touching the points.
pub struct RipsComplex {
    cloud: Arc<PointCloud>,
    caches: Vec<HashMap<SimplexKey, FiltrationValue>>,
    eps_high: Vec<f64>,
    progress: Arc<AtomicUsize>,
}

impl RipsComplex {
    pub fn new(cloud: Arc<PointCloud>) -> Self {
        Self {
            cloud,
            caches: vec![HashMap::new(); MAX_DIM],
            eps_high: vec![-1.0; MAX_DIM],
            progress: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn cloud(&self) -> &Arc<PointCloud> {
        &self.cloud
    }

    pub fn n_points(&self) -> usize {
        self.cloud.n_points()
    }

    /// Simplices consumed by the most recent stream; readable from another
    /// thread while a computation runs. Monotone within a pass, may lag.
    pub fn progress_counter(&self) -> Arc<AtomicUsize> {
        self.progress.clone()
    }

    /// Grow the dimension-`dim` cache to scale `epsilon`. No-op at or below
    /// the current watermark.
    pub fn expand(&mut self, dim: usize, epsilon: f64) {
        debug_assert!((1..=MAX_DIM).contains(&dim), "dimension {} not cached", dim);
        if epsilon <= self.eps_high[dim - 1] {
            return;
        }
        if dim > 1 {
            self.expand(dim - 1, epsilon);
        }

        let threshold = 4.0 * epsilon * epsilon;
        let n = self.cloud.n_points();

        if dim == 1 {
            for (i, j) in (0..n).tuple_combinations() {
                let d2 = self.cloud.distance2(i, j);
                if d2 <= threshold {
                    self.caches[0]
                        .entry(SimplexKey::from_vertices(&[i, j]))
                        .or_insert(OrderedFloat(d2));
                }
            }
        } else {
            // Extend every (dim-1)-simplex by a vertex above its maximum, so
            // each dim-simplex is produced exactly once.
            let (lower, upper) = self.caches.split_at_mut(dim - 1);
            let lower = &lower[dim - 2];
            let upper = &mut upper[0];
            for (&s, &v) in lower.iter() {
                let top = s.highest_vertex().expect("empty simplex in cache");
                for q in top + 1..n {
                    let mut value = v;
                    for p in s.vertices() {
                        let d2 = OrderedFloat(self.cloud.distance2(p, q));
                        if d2 > value {
                            value = d2;
                        }
                        if value.into_inner() > threshold {
                            break;
                        }
                    }
                    if value.into_inner() <= threshold {
                        upper.entry(s | SimplexKey::vertex(q)).or_insert(value);
                    }
                }
            }
        }

        self.eps_high[dim - 1] = epsilon;
        debug!(
            "Expanded dim {} to epsilon {}: {} simplices cached",
            dim,
            epsilon,
            self.caches[dim - 1].len()
        );
    }

    /// Filtration value of a cached simplex; vertices are always present at 0.
    pub fn filtration_value(&self, s: &SimplexKey) -> Option<FiltrationValue> {
        match s.count() {
            0 => None,
            1 => Some(OrderedFloat(0.0)),
            c => self.caches.get(c - 2)?.get(s).copied(),
        }
    }

    /// Visit every dim-simplex present at scale `epsilon` as (value, key).
    ///
    /// Dimension 0 is virtual: vertices are yielded in index order with value
    /// 0. With `ordered` set, entries arrive sorted ascending by (value, lex
    /// key) — the filtration order the reducer consumes; unordered delivery
    /// skips the sort.
    pub fn for_each_simplex<F>(&mut self, dim: usize, epsilon: f64, ordered: bool, mut f: F)
    where
        F: FnMut(FiltrationValue, SimplexKey),
    {
        if dim == 0 {
            for i in 0..self.cloud.n_points() {
                f(OrderedFloat(0.0), SimplexKey::vertex(i));
            }
            return;
        }

        self.expand(dim, epsilon);
        let threshold = OrderedFloat(4.0 * epsilon * epsilon);

        if ordered {
            let mut entries: Vec<(FiltrationValue, SimplexKey)> = self.caches[dim - 1]
                .iter()
                .map(|(&s, &v)| (v, s))
                .filter(|&(v, _)| v <= threshold)
                .collect();
            entries.sort_unstable();
            for (v, s) in entries {
                f(v, s);
            }
        } else {
            for (&s, &v) in &self.caches[dim - 1] {
                if v <= threshold {
                    f(v, s);
                }
            }
        }
    }

    /// Materialised filtration-ordered stream of dim-simplices at `epsilon`.
    pub fn simplices_sorted(&mut self, dim: usize, epsilon: f64) -> Vec<(FiltrationValue, SimplexKey)> {
        let mut out = Vec::new();
        self.for_each_simplex(dim, epsilon, true, |v, s| out.push((v, s)));
        out
    }

    /// Flat vertex-index lists for drawing, one list per dimension 0..=`dim`
    /// (points, segment pairs, triangle triples). Each simplex contributes
    /// its vertices in ascending order.
    pub fn simplex_draw_indices(&mut self, epsilon: f64, dim: usize) -> Vec<Vec<i32>> {
        (0..=dim.min(2)).map(|d| self.draw_indices_for(d, epsilon)).collect()
    }

    fn draw_indices_for(&mut self, dim: usize, epsilon: f64) -> Vec<i32> {
        let mut indices = Vec::with_capacity((dim + 1) * self.cloud.n_points());
        self.progress.store(0, Ordering::Relaxed);
        let progress = self.progress.clone();
        self.for_each_simplex(dim, epsilon, false, |_, s| {
            progress.fetch_add(1, Ordering::Relaxed);
            for p in s.vertices() {
                indices.push(p as i32);
            }
        });
        indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashSet;

    fn triangle_cloud() -> Arc<PointCloud> {
        // Squared distances 1, 4, 5
        Arc::new(
            PointCloud::new(array![
                [0.0, 0.0],
                [1.0, 0.0],
                [1.0, 2.0],
            ])
            .unwrap(),
        )
    }

    fn random_cloud(rng: &mut StdRng, n: usize) -> Arc<PointCloud> {
        let points = ndarray::Array2::from_shape_fn((n, 3), |_| rng.gen_range(-1.0..1.0));
        Arc::new(PointCloud::new(points).unwrap())
    }

    /// All k-simplices by direct enumeration of vertex subsets.
    fn brute_force(
        cloud: &PointCloud,
        dim: usize,
        epsilon: f64,
    ) -> Vec<(FiltrationValue, SimplexKey)> {
        let threshold = 4.0 * epsilon * epsilon;
        let mut out = Vec::new();
        for subset in (0..cloud.n_points()).combinations(dim + 1) {
            let value = subset
                .iter()
                .tuple_combinations()
                .map(|(&i, &j)| OrderedFloat(cloud.distance2(i, j)))
                .max()
                .unwrap();
            if value.into_inner() <= threshold {
                out.push((value, SimplexKey::from_vertices(&subset)));
            }
        }
        out.sort_unstable();
        out
    }

    #[test]
    fn test_edges() {
        let _ = env_logger::try_init();

        let mut complex = RipsComplex::new(triangle_cloud());

        // 4 epsilon^2 = 4: edges with squared length 1 and 4 only
        let edges = complex.simplices_sorted(1, 1.0);
        let expected = vec![
            (OrderedFloat(1.0), SimplexKey::from_vertices(&[0, 1])),
            (OrderedFloat(4.0), SimplexKey::from_vertices(&[1, 2])),
        ];
        assert_eq!(edges, expected);

        // Large scale: all three edges and the filled triangle
        let edges = complex.simplices_sorted(1, 10.0);
        assert_eq!(edges.len(), 3);
        let triangles = complex.simplices_sorted(2, 10.0);
        assert_eq!(
            triangles,
            vec![(OrderedFloat(5.0), SimplexKey::from_vertices(&[0, 1, 2]))]
        );
    }

    #[test]
    fn test_virtual_vertices() {
        let _ = env_logger::try_init();

        let mut complex = RipsComplex::new(triangle_cloud());
        let vertices = complex.simplices_sorted(0, 0.0);
        assert_eq!(vertices.len(), 3);
        for (i, (v, s)) in vertices.iter().enumerate() {
            assert_eq!(*v, OrderedFloat(0.0));
            assert_eq!(*s, SimplexKey::vertex(i));
        }
    }

    #[test]
    fn test_filtration_value_lookup() {
        let _ = env_logger::try_init();

        let mut complex = RipsComplex::new(triangle_cloud());
        complex.expand(2, 10.0);

        assert_eq!(complex.filtration_value(&SimplexKey::vertex(2)), Some(OrderedFloat(0.0)));
        assert_eq!(
            complex.filtration_value(&SimplexKey::from_vertices(&[0, 1])),
            Some(OrderedFloat(1.0))
        );
        assert_eq!(
            complex.filtration_value(&SimplexKey::from_vertices(&[0, 1, 2])),
            Some(OrderedFloat(5.0))
        );
        assert_eq!(complex.filtration_value(&SimplexKey::new()), None);
    }

    #[test]
    fn test_completeness_matches_brute_force() {
        let _ = env_logger::try_init();

        let mut rng = StdRng::seed_from_u64(7);
        let cloud = random_cloud(&mut rng, 12);
        let mut complex = RipsComplex::new(cloud.clone());

        for &epsilon in &[0.3, 0.5, 0.8] {
            for dim in 1..=MAX_DIM {
                let cached = complex.simplices_sorted(dim, epsilon);
                let expected = brute_force(&cloud, dim, epsilon);
                debug!("dim {} eps {}: {} simplices", dim, epsilon, expected.len());
                assert_eq!(cached, expected);
            }
        }
    }

    #[test]
    fn test_cache_monotone_growth() {
        let _ = env_logger::try_init();

        let mut rng = StdRng::seed_from_u64(11);
        let cloud = random_cloud(&mut rng, 10);

        // Growing in steps must agree with a single one-shot expansion
        let mut stepped = RipsComplex::new(cloud.clone());
        for &epsilon in &[0.1, 0.25, 0.4, 0.7] {
            stepped.expand(MAX_DIM, epsilon);
        }
        let mut oneshot = RipsComplex::new(cloud);
        oneshot.expand(MAX_DIM, 0.7);

        for dim in 1..=MAX_DIM {
            assert_eq!(stepped.simplices_sorted(dim, 0.7), oneshot.simplices_sorted(dim, 0.7));
        }
    }

    #[test]
    fn test_face_monotonicity() {
        let _ = env_logger::try_init();

        let mut rng = StdRng::seed_from_u64(13);
        let cloud = random_cloud(&mut rng, 10);
        let mut complex = RipsComplex::new(cloud);
        complex.expand(MAX_DIM, 0.8);

        for dim in 2..=MAX_DIM {
            for (v, s) in complex.simplices_sorted(dim, 0.8) {
                for p in s.vertices() {
                    let face = s ^ SimplexKey::vertex(p);
                    let face_value = complex
                        .filtration_value(&face)
                        .expect("face missing from lower cache");
                    assert!(face_value <= v, "face {:?} above coface {:?}", face, s);
                }
            }
        }
    }

    #[test]
    fn test_ordered_stream_strictly_increasing() {
        let _ = env_logger::try_init();

        let mut rng = StdRng::seed_from_u64(17);
        let cloud = random_cloud(&mut rng, 10);
        let mut complex = RipsComplex::new(cloud);

        let stream = complex.simplices_sorted(2, 0.8);
        for window in stream.windows(2) {
            assert!(window[0] < window[1]);
        }
    }

    #[test]
    fn test_draw_indices() {
        let _ = env_logger::try_init();

        let mut complex = RipsComplex::new(triangle_cloud());
        let lists = complex.simplex_draw_indices(10.0, 2);
        assert_eq!(lists.len(), 3);
        assert_eq!(lists[0], vec![0, 1, 2]);

        // Unordered delivery: compare edge pairs as a set
        let pairs: HashSet<(i32, i32)> = lists[1].chunks(2).map(|c| (c[0], c[1])).collect();
        assert_eq!(pairs, HashSet::from([(0, 1), (0, 2), (1, 2)]));
        assert_eq!(lists[2], vec![0, 1, 2]);

        assert_eq!(complex.progress_counter().load(Ordering::Relaxed), 1);
    }
}
