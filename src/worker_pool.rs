use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{bounded, unbounded, Receiver, Sender};
use log::debug;

use crate::barcode::{BarcodeError, BarcodeInterval};
use crate::homology::{find_homology, HomologyError};
use crate::point_cloud::PointCloud;
use crate::rips_complex::RipsComplex;
use crate::simplex::SimplexKey;

type Job<W> = Box<dyn FnOnce(&mut W) + Send>;

/// Fixed pool of worker threads, each owning private state built once at
/// spawn. Jobs receive exclusive access to their worker's state, so engines
/// and their caches never cross threads.
pub struct WorkerPool<W> {
    tx: Option<Sender<Job<W>>>,
    threads: Vec<thread::JoinHandle<()>>,
}

impl<W: Send + 'static> WorkerPool<W> {
    /// Half the available hardware parallelism, at least one.
    pub fn default_size() -> usize {
        thread::available_parallelism().map(|p| p.get() / 2).unwrap_or(1).max(1)
    }

    pub fn new<F>(size: usize, mut init: F) -> Self
    where
        F: FnMut(usize) -> W,
    {
        let (tx, rx) = unbounded::<Job<W>>();
        let mut threads = Vec::with_capacity(size);
        for ix in 0..size {
            let rx = rx.clone();
            let mut state = init(ix);
            threads.push(thread::spawn(move || {
                while let Ok(job) = rx.recv() {
                    job(&mut state);
                }
            }));
        }
        Self { tx: Some(tx), threads }
    }

    pub fn size(&self) -> usize {
        self.threads.len()
    }

    /// Hand a job to the next idle worker; the result arrives through the
    /// returned handle.
    pub fn submit<T, F>(&self, job: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut W) -> T + Send + 'static,
    {
        let (tx, rx) = bounded(1);
        self.tx
            .as_ref()
            .expect("pool already shut down")
            .send(Box::new(move |state: &mut W| {
                // The caller may have dropped its handle; that is not an error
                let _ = tx.send(job(state));
            }))
            .expect("worker channel closed");
        TaskHandle { rx, taken: false }
    }
}

impl<W> Drop for WorkerPool<W> {
    fn drop(&mut self) {
        self.tx.take(); // closing the channel lets workers drain and exit
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }
}

/// Completion handle for a submitted job. `ready` polls without blocking,
/// `get` blocks; once the result is taken the handle is no longer valid.
pub struct TaskHandle<T> {
    rx: Receiver<T>,
    taken: bool,
}

impl<T> TaskHandle<T> {
    /// False once the result has been taken out.
    pub fn valid(&self) -> bool {
        !self.taken
    }

    /// True when the result is available to take without blocking.
    pub fn ready(&self) -> bool {
        !self.taken && !self.rx.is_empty()
    }

    pub fn try_get(&mut self) -> Option<T> {
        if self.taken {
            return None;
        }
        let value = self.rx.try_recv().ok();
        self.taken = value.is_some();
        value
    }

    pub fn get(mut self) -> T {
        self.taken = true;
        self.rx.recv().expect("worker dropped before completing task")
    }
}

/// Per-scale H-basis creators, one list per homology dimension.
type ScaleReport = Result<Vec<Vec<SimplexKey>>, HomologyError>;

/// Barcode over an explicit grid of scales, computed on a worker pool.
///
/// Every worker owns a private engine over the shared point store, reused
/// across the scales it is handed, so its caches keep growing monotonically.
/// The driver keeps a bounded number of scales in flight, polls completions
/// without blocking, and feeds the next scale to whichever worker frees up;
/// completion order does not matter because results are filed under the
/// scale they were submitted for.
///
/// A feature is identified across scales by the creator of its H-basis
/// column. Its interval runs from the first grid scale where it appears to
/// the grid scale after its last appearance, or to infinity if it survives
/// the final scale.
pub fn barcode_at_scales(
    cloud: Arc<PointCloud>,
    scales: &[f64],
    d_bar: usize,
    workers: Option<usize>,
) -> Result<Vec<BarcodeInterval>, BarcodeError> {
    let mut scales = scales.to_vec();
    scales.sort_by(|a, b| a.partial_cmp(b).expect("scale grid contains NaN"));
    scales.dedup();
    if scales.is_empty() {
        return Ok(Vec::new());
    }

    let size = workers.unwrap_or_else(WorkerPool::<RipsComplex>::default_size).max(1);
    let pool = WorkerPool::new(size, |_| RipsComplex::new(cloud.clone()));
    debug!("Scheduling {} scales over {} workers", scales.len(), size);

    // Per dimension: feature creator -> scale indices at which it appears
    let mut appearances: Vec<HashMap<SimplexKey, Vec<usize>>> = vec![HashMap::new(); d_bar + 1];

    let max_in_flight = 2 * size;
    let mut pending: Vec<(usize, TaskHandle<ScaleReport>)> = Vec::new();
    let mut next = 0;

    while next < scales.len() || !pending.is_empty() {
        while next < scales.len() && pending.len() < max_in_flight {
            let epsilon = scales[next];
            let handle = pool.submit(move |complex: &mut RipsComplex| {
                let mut per_dim = Vec::with_capacity(d_bar + 1);
                for k in 0..=d_bar {
                    let basis = find_homology(complex, k, epsilon)?;
                    per_dim.push(basis.into_iter().map(|lc| lc.creator).collect());
                }
                Ok(per_dim)
            });
            pending.push((next, handle));
            next += 1;
        }

        let mut ix = 0;
        let mut progressed = false;
        while ix < pending.len() {
            if pending[ix].1.ready() {
                let (scale_ix, mut handle) = pending.swap_remove(ix);
                let per_dim = handle.try_get().expect("ready task yielded no result")?;
                for (k, creators) in per_dim.into_iter().enumerate() {
                    for creator in creators {
                        appearances[k].entry(creator).or_default().push(scale_ix);
                    }
                }
                progressed = true;
            } else {
                ix += 1;
            }
        }
        if !progressed && !pending.is_empty() {
            thread::sleep(Duration::from_millis(1));
        }
    }

    let mut intervals = Vec::new();
    for (k, features) in appearances.into_iter().enumerate() {
        let mut features: Vec<(SimplexKey, Vec<usize>)> = features.into_iter().collect();
        for (_, seen) in features.iter_mut() {
            seen.sort_unstable();
        }
        features.sort_by_key(|(creator, seen)| (seen[0], *creator));
        for (_, seen) in features {
            let first = seen[0];
            let last = *seen.last().expect("empty appearance set");
            let death = if last + 1 < scales.len() { scales[last + 1] } else { f64::INFINITY };
            intervals.push(BarcodeInterval { dim: k, birth: scales[first], death });
        }
    }
    Ok(intervals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_pool_runs_jobs_on_private_state() {
        let _ = env_logger::try_init();

        let pool = WorkerPool::new(2, |ix| ix * 100);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                pool.submit(move |state: &mut usize| {
                    *state += 1;
                    (i, *state)
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            assert!(handle.valid());
            let (job, state) = handle.get();
            assert_eq!(job, i);
            // Worker-local counters only ever grow from their seed
            assert!(state % 100 > 0);
        }
    }

    #[test]
    fn test_handle_polling() {
        let _ = env_logger::try_init();

        let pool = WorkerPool::new(1, |_| ());
        let mut handle = pool.submit(|_| 7);
        while !handle.ready() {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(handle.valid());
        assert_eq!(handle.try_get(), Some(7));
        assert!(!handle.valid());
        assert!(!handle.ready());
        assert_eq!(handle.try_get(), None);
    }

    #[test]
    fn test_default_size_is_positive() {
        assert!(WorkerPool::<()>::default_size() >= 1);
    }

    #[test]
    fn test_square_across_scales() {
        let _ = env_logger::try_init();

        let cloud = Arc::new(
            PointCloud::new(array![
                [0.0, 0.0],
                [1.0, 0.0],
                [1.0, 1.0],
                [0.0, 1.0],
            ])
            .unwrap(),
        );

        let intervals = barcode_at_scales(cloud, &[0.3, 0.6, 0.8], 1, Some(2)).unwrap();
        debug!("Grid barcode {:?}", intervals);

        // Four components at 0.3; three die by 0.6, one lives forever
        let h0: Vec<_> = intervals.iter().filter(|i| i.dim == 0).collect();
        assert_eq!(h0.len(), 4);
        assert_eq!(h0.iter().filter(|i| i.death == 0.6).count(), 3);
        assert_eq!(h0.iter().filter(|i| i.is_infinite()).count(), 1);

        // The hole exists only at the middle scale
        let h1: Vec<_> = intervals.iter().filter(|i| i.dim == 1).collect();
        assert_eq!(h1.len(), 1);
        assert_eq!(h1[0].birth, 0.6);
        assert_eq!(h1[0].death, 0.8);
    }

    #[test]
    fn test_grid_matches_sequential_betti() {
        let _ = env_logger::try_init();

        let cloud = Arc::new(
            PointCloud::new(array![
                [0.0, 0.0],
                [10.0, 0.0],
            ])
            .unwrap(),
        );

        let intervals = barcode_at_scales(cloud, &[1.0, 6.0], 0, Some(1)).unwrap();
        let expected = vec![
            BarcodeInterval { dim: 0, birth: 1.0, death: f64::INFINITY },
            BarcodeInterval { dim: 0, birth: 1.0, death: 6.0 },
        ];
        assert_eq!(intervals, expected);
    }
}
