//! Randomized genealogy properties: soundness, bounded retention, and
//! no dangling references under arbitrary resampling patterns.

use clio_ancestry::AncestryStore;
use ndarray::Array2;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::Rng;

/// States where particle `i` at generation `g` holds `[g, i]`.
fn gen_states(g: usize, p: usize) -> Array2<f64> {
    Array2::from_shape_fn((p, 2), |(i, c)| if c == 0 { g as f64 } else { i as f64 })
}

/// Runs `k` generations of population `p` with ancestors drawn by `draw`,
/// returning the store plus the expected trajectory slots: for each
/// frontier slot, the slot index its lineage occupied at each generation.
fn run_filter(
    k: usize,
    p: usize,
    mut draw: impl FnMut(usize) -> Vec<usize>,
) -> (AncestryStore, Vec<Vec<usize>>) {
    let mut store = AncestryStore::new();
    // lineages[i] = slot history of the particle currently at slot i.
    let mut lineages: Vec<Vec<usize>> = Vec::new();

    for g in 0..k {
        let ancestors = draw(g);
        store
            .append_generation(gen_states(g, p).view(), &ancestors)
            .expect("valid generation");

        lineages = (0..p)
            .map(|i| {
                let mut history = if g == 0 {
                    Vec::new()
                } else {
                    lineages[ancestors[i]].clone()
                };
                history.push(i);
                history
            })
            .collect();
    }
    (store, lineages)
}

#[test]
fn genealogy_soundness_random_resampling() {
    let mut rng = StdRng::seed_from_u64(42);
    let (p, k) = (10, 25);
    let (store, lineages) = run_filter(k, p, |_| {
        (0..p).map(|_| rng.random_range(0..p)).collect()
    });

    for slot in 0..p {
        let path = store.trajectory(slot).expect("frontier slot readable");
        assert_eq!(path.nrows(), k, "trajectory spans every generation");
        for (g, &expected_slot) in lineages[slot].iter().enumerate() {
            assert_eq!(path[[g, 0]], g as f64);
            assert_eq!(
                path[[g, 1]],
                expected_slot as f64,
                "slot {slot} generation {g}"
            );
        }
    }
}

#[test]
fn bounded_retention_under_random_resampling() {
    let mut rng = StdRng::seed_from_u64(7);
    let (p, k) = (50, 400);
    let (store, _) = run_filter(k, p, |_| {
        (0..p).map(|_| rng.random_range(0..p)).collect()
    });

    // Uniform resampling coalesces lineages in O(population) expected
    // tree size; without pruning this would be p * k = 20_000 nodes.
    assert_eq!(store.generations(), k);
    assert!(
        store.live_nodes() <= 10 * p,
        "retained {} nodes for population {p}",
        store.live_nodes()
    );
}

#[test]
fn no_dangling_reference_over_many_seeds() {
    for seed in 0..20 {
        let mut rng = StdRng::seed_from_u64(seed);
        let (p, k) = (8, 30);
        let (store, lineages) = run_filter(k, p, |_| {
            (0..p).map(|_| rng.random_range(0..p)).collect()
        });

        for slot in 0..p {
            let path = store
                .trajectory(slot)
                .expect("every frontier trajectory remains reachable");
            assert_eq!(path.nrows(), k);
            let g = k - 1;
            assert_eq!(path[[g, 1]], lineages[slot][g] as f64);
        }
    }
}

#[test]
fn degenerate_resampling_collapses_to_single_lineage() {
    // Every generation descends from slot 0: the retained forest is a
    // single spine plus the current frontier.
    let (p, k) = (20, 50);
    let (store, _) = run_filter(k, p, |g| {
        if g == 0 {
            (0..p).collect()
        } else {
            vec![0; p]
        }
    });

    assert_eq!(store.live_nodes(), p + (k - 1));
    for slot in 0..p {
        let path = store.trajectory(slot).expect("readable");
        // All lineages share history through slot 0 until the last step.
        for g in 1..k - 1 {
            assert_eq!(path[[g, 1]], 0.0);
        }
        assert_eq!(path[[k - 1, 1]], slot as f64);
    }
}
