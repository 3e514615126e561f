//! Determinism of the shared random stream

use spqsp_abm_core::RngManager;

#[test]
fn test_same_seed_same_sequence() {
    let mut a = RngManager::new(12345);
    let mut b = RngManager::new(12345);
    for _ in 0..1000 {
        assert_eq!(a.next(), b.next());
    }
}

#[test]
fn test_different_seeds_diverge() {
    let mut a = RngManager::new(1);
    let mut b = RngManager::new(2);
    let same = (0..100).filter(|_| a.next() == b.next()).count();
    assert!(same < 5);
}

#[test]
fn test_resume_from_state() {
    let mut rng = RngManager::new(777);
    for _ in 0..50 {
        rng.next_f64();
    }
    let mut resumed = RngManager::new(rng.get_state());
    for _ in 0..50 {
        assert_eq!(rng.next_f64(), resumed.next_f64());
    }
}

#[test]
fn test_bernoulli_edges() {
    let mut rng = RngManager::new(9);
    for _ in 0..200 {
        assert!(!rng.bernoulli(0.0));
        assert!(rng.bernoulli(1.0));
    }
}

#[test]
fn test_shuffle_is_permutation() {
    let mut rng = RngManager::new(5);
    let mut items: Vec<u32> = (0..50).collect();
    rng.shuffle(&mut items);
    let mut sorted = items.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, (0..50).collect::<Vec<_>>());
}

#[test]
fn test_shuffle_first_k_keeps_elements() {
    let mut rng = RngManager::new(6);
    let mut items: Vec<u32> = (0..20).collect();
    rng.shuffle_first_k(&mut items, 5);
    let mut sorted = items.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, (0..20).collect::<Vec<_>>());
}

#[test]
fn test_sample_cdf_respects_mass() {
    let mut rng = RngManager::new(3);
    let cdf = [0.0, 1.0, 1.0];
    for _ in 0..100 {
        assert_eq!(rng.sample_cdf(&cdf), 1);
    }
}

#[test]
fn test_normal_mean_roughly_right() {
    let mut rng = RngManager::new(4);
    let n = 20_000;
    let mean: f64 = (0..n).map(|_| rng.normal(10.0, 2.0)).sum::<f64>() / n as f64;
    assert!((mean - 10.0).abs() < 0.1, "mean {}", mean);
}
