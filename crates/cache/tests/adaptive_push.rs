//! Adaptive staging scenario: per-step populations of varying size,
//! truncating push, and flush-time push of the common count.

use clio_cache::{AdaptivePFCache, CacheError};
use clio_store::{ANCESTOR, ArrayStore, LOG_WEIGHT, MemStore, TIME};
use ndarray::Array2;

/// A block of `count` particles for step `t`, numbered from `offset`:
/// particle `offset + i` holds state `[t * 1000 + offset + i]`.
fn block(t: usize, offset: usize, count: usize) -> Array2<f64> {
    Array2::from_shape_fn((count, 1), |(i, _)| (t * 1000 + offset + i) as f64)
}

fn weights(offset: usize, count: usize) -> Vec<f64> {
    (0..count).map(|i| -((offset + i) as f64)).collect()
}

fn ancestors(offset: usize, count: usize) -> Vec<usize> {
    (0..count).map(|i| (offset + i) % 3).collect()
}

/// Buffers the populations `[5, 8, 8, 3]` across four steps, the
/// 8-particle steps contributed in two blocks.
fn buffer_varying_populations(cache: &mut AdaptivePFCache<MemStore>) {
    let sizes = [5usize, 8, 8, 3];
    for (t, &size) in sizes.iter().enumerate() {
        cache.write_time(t, t as f64 * 0.1).unwrap();
        if size > 4 {
            cache.write_state(t, block(t, 0, 4).view(), &ancestors(0, 4)).unwrap();
            cache.write_log_weights(t, &weights(0, 4)).unwrap();
            cache
                .write_state(t, block(t, 4, size - 4).view(), &ancestors(4, size - 4))
                .unwrap();
            cache.write_log_weights(t, &weights(4, size - 4)).unwrap();
        } else {
            cache.write_state(t, block(t, 0, size).view(), &ancestors(0, size)).unwrap();
            cache.write_log_weights(t, &weights(0, size)).unwrap();
        }
    }
}

#[test]
fn push_delivers_first_three_particles_per_step() {
    let mut cache = AdaptivePFCache::new(MemStore::new());
    buffer_varying_populations(&mut cache);

    assert_eq!(cache.buffered_steps(), 4);
    assert_eq!(cache.particles(), 3);
    // Nothing downstream yet.
    assert_eq!(cache.inner().size(), 0);
    assert_eq!(cache.inner().ancestry().generations(), 0);

    cache.push(3).unwrap();

    // Adaptive buffers are empty afterwards.
    assert_eq!(cache.buffered_steps(), 0);
    assert_eq!(cache.particles(), 0);

    // The wrapped cache received exactly the first 3 particles of
    // every buffered step.
    let inner = cache.inner();
    assert_eq!(inner.size(), 4);
    assert_eq!(inner.ancestry().generations(), 4);
    assert_eq!(inner.ancestry().frontier_len(), 3);

    let store = inner.store();
    for t in 0..4 {
        let x = store.read_rows("x_0", t, 1).unwrap();
        let expected: Vec<f64> = (0..3).map(|i| (t * 1000 + i) as f64).collect();
        assert_eq!(x.row(0).to_vec(), expected, "states at step {t}");

        let w = store.read_rows(LOG_WEIGHT, t, 1).unwrap();
        assert_eq!(w.row(0).to_vec(), vec![0.0, -1.0, -2.0], "weights at step {t}");

        let a = store.read_rows(ANCESTOR, t, 1).unwrap();
        assert_eq!(a.row(0).to_vec(), vec![0.0, 1.0, 2.0], "ancestors at step {t}");
    }

    // Most recent pushed log-weights are retained downstream.
    assert_eq!(cache.log_weights(), &[0.0, -1.0, -2.0]);

    // Trajectories are reconstructible for the pushed population.
    let path = cache.read_trajectory(1).unwrap();
    assert_eq!(path.nrows(), 4);
    // Slot 1's ancestors are slot 1 at every step (ancestors(0, n)[1] = 1).
    for t in 0..4 {
        assert_eq!(path[[t, 0]], (t * 1000 + 1) as f64);
    }
}

#[test]
fn flush_pushes_common_particle_count() {
    let mut cache = AdaptivePFCache::new(MemStore::new());
    buffer_varying_populations(&mut cache);

    // flush() pushes at particles() = 3, then flushes the wrapped cache.
    cache.flush().unwrap();

    assert_eq!(cache.buffered_steps(), 0);
    let inner = cache.inner();
    assert_eq!(inner.ancestry().frontier_len(), 3);
    // Times were committed all the way to the store.
    let expected: Vec<f64> = (0..4).map(|t| t as f64 * 0.1).collect();
    assert_eq!(inner.store().read_range(TIME, 0, 4).unwrap(), expected);
}

#[test]
fn push_more_than_smallest_step_fails() {
    let mut cache = AdaptivePFCache::new(MemStore::new());
    buffer_varying_populations(&mut cache);

    let result = cache.push(5);
    assert!(matches!(
        result,
        Err(CacheError::InsufficientParticles {
            step: 3,
            have: 3,
            requested: 5
        })
    ));
    // The window survives a failed push.
    assert_eq!(cache.buffered_steps(), 4);
    cache.push(3).unwrap();
    assert_eq!(cache.inner().ancestry().generations(), 4);
}

#[test]
fn drop_pushes_and_flushes() {
    use std::cell::RefCell;
    use std::rc::Rc;
    use clio_store::StoreError;
    use ndarray::ArrayView2;

    #[derive(Debug, Clone, Default)]
    struct SharedStore(Rc<RefCell<MemStore>>);

    impl ArrayStore for SharedStore {
        fn write_range(
            &mut self,
            field: &str,
            start: usize,
            values: &[f64],
        ) -> Result<(), StoreError> {
            self.0.borrow_mut().write_range(field, start, values)
        }

        fn read_range(&self, field: &str, start: usize, len: usize) -> Result<Vec<f64>, StoreError> {
            self.0.borrow().read_range(field, start, len)
        }

        fn write_rows(
            &mut self,
            field: &str,
            start: usize,
            block: ArrayView2<'_, f64>,
        ) -> Result<(), StoreError> {
            self.0.borrow_mut().write_rows(field, start, block)
        }

        fn read_rows(
            &self,
            field: &str,
            start: usize,
            count: usize,
        ) -> Result<Array2<f64>, StoreError> {
            self.0.borrow().read_rows(field, start, count)
        }

        fn len(&self, field: &str) -> usize {
            self.0.borrow().len(field)
        }
    }

    let store = SharedStore::default();
    {
        let mut cache = AdaptivePFCache::new(store.clone());
        cache.write_time(0, 0.0).unwrap();
        cache.write_state(0, block(0, 0, 2).view(), &[0, 1]).unwrap();
        cache.write_log_weights(0, &weights(0, 2)).unwrap();
        // No explicit push or flush.
    }

    let inner = store.0.borrow();
    assert_eq!(inner.read_range(TIME, 0, 1).unwrap(), vec![0.0]);
    assert_eq!(inner.len("x_0"), 1);
    assert_eq!(inner.len(LOG_WEIGHT), 1);
}
