//! Concurrency Tests
//!
//! Shared nodes processed from several threads, trees holding the same
//! nodes in opposite orders, and edits racing with processing.

mod common;

use std::sync::Arc;
use std::thread;

use common::{noise, SAMPLE_RATE};
use pedalchain::{chain, Chain, Delay, Gain, Node, Plugin, Reverb};

#[test]
fn test_shared_node_gives_identical_results_across_threads() {
    let shared = Reverb::new().into_node();
    let input = Arc::new(noise());
    let expected = shared.process(&input, SAMPLE_RATE, Some(512), true).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let node = shared.clone();
            let input = Arc::clone(&input);
            let buffer_size = 64 * (i + 1);
            thread::spawn(move || node.process(&input, SAMPLE_RATE, Some(buffer_size), true))
        })
        .collect();

    for handle in handles {
        let output = handle.join().unwrap().unwrap();
        assert_eq!(output, expected);
    }
}

#[test]
fn test_opposite_order_trees_do_not_deadlock() {
    let a = Delay::new(32).into_node();
    let b = Reverb::new().into_node();
    let forward = chain![a.clone(), b.clone()];
    let backward = chain![b, a];
    let input = Arc::new(noise().slice(0, 8192));

    let spawn = |tree: Chain| {
        let input = Arc::clone(&input);
        thread::spawn(move || {
            for _ in 0..25 {
                let out = tree.process(&input, SAMPLE_RATE, Some(128), true).unwrap();
                assert_eq!(out.num_samples(), input.num_samples());
            }
        })
    };

    let first = spawn(forward);
    let second = spawn(backward);
    first.join().unwrap();
    second.join().unwrap();
}

#[test]
fn test_edits_during_processing() {
    let tree = Chain::new(vec![Gain::new(0.0).into_node()]);
    let input = Arc::new(noise());

    let worker = {
        let tree = tree.clone();
        let input = Arc::clone(&input);
        thread::spawn(move || {
            for _ in 0..10 {
                let out = tree.process(&input, SAMPLE_RATE, Some(64), true).unwrap();
                assert_eq!(out.num_samples(), input.num_samples());
                assert!(out.is_finite());
            }
        })
    };

    let extra: Vec<Node> = (0..4)
        .map(|i| Delay::new(16 * (i + 1)).into_node())
        .collect();
    for _ in 0..50 {
        for node in &extra {
            tree.append(node.clone()).unwrap();
        }
        while tree.len() > 1 {
            tree.remove(tree.len() - 1).unwrap();
        }
        thread::yield_now();
    }

    worker.join().unwrap();
    assert_eq!(tree.len(), 1);
}

#[test]
fn test_parameter_changes_from_another_thread() {
    let gain = Gain::new(0.0).into_node();
    let tree = chain![gain.clone(), Delay::new(8).into_node()];
    let input = Arc::new(noise());

    let worker = {
        let input = Arc::clone(&input);
        thread::spawn(move || {
            for _ in 0..10 {
                tree.process(&input, SAMPLE_RATE, Some(256), true).unwrap();
            }
        })
    };

    for step in 0..100 {
        gain.with_plugin(|g: &mut Gain| g.set_gain_db(-(step % 12) as f32))
            .unwrap();
        thread::yield_now();
    }
    worker.join().unwrap();
}
