//! End-to-end demo: estimate a bimodal 2-D density, pick the best
//! coarsening by minimum distance, and interrogate it.
//!
//! Run with: cargo run --example density_demo

use histree_density::{
    mde, partition, CountAndVolumeLimits, ExcessMass, Histogram, NodeLabel, SpatialTree,
    Truncation,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

fn main() {
    let mut rng = StdRng::seed_from_u64(2024);
    let lobe_a = Normal::new(-1.5, 0.5).unwrap();
    let lobe_b = Normal::new(1.5, 0.7).unwrap();
    let points: Vec<Vec<f64>> = (0..6000)
        .map(|_| {
            let lobe = if rng.gen_bool(0.6) { &lobe_a } else { &lobe_b };
            vec![lobe.sample(&mut rng), rng.gen_range(0.0..2.0)]
        })
        .collect();
    let (train, validation) = points.split_at(4000);

    // Frame the data and count it into an adaptively refined histogram.
    let root_box = partition::bounding_box(train).unwrap();
    let tree = SpatialTree::widest(root_box).unwrap();
    let start = Truncation::from_leaf_set(vec![NodeLabel::root()]).unwrap();
    let lims = CountAndVolumeLimits::new(train.len() as u64, tree.root_box().volume())
        .with_count_limit(100)
        .with_volume_fraction(0.005);
    let fine = Histogram::split_and_count_from(tree, &start, train, &lims).unwrap();
    println!("fine histogram: {} leaves, {} samples", fine.len(), fine.total_count());

    // Backtrack and keep a handful of candidates along the way.
    let prio = ExcessMass::for_histogram(&fine);
    let merges = fine.backtrack_verification(&prio).len();
    let checkpoints: Vec<usize> = (1..=6).map(|k| k * merges / 7).filter(|&k| k > 0).collect();
    let mut candidates = vec![fine.clone()];
    candidates.extend(fine.backtrack_trajectory(&prio, &checkpoints));
    let trajectory: Vec<_> = candidates.iter().map(|h| h.normalize()).collect();

    let validation: Vec<Vec<f64>> = validation.to_vec();
    let (winner, density) = mde::select_min_distance(&trajectory, &validation).unwrap();
    println!(
        "minimum-distance pick: candidate {} of {} ({} leaves)",
        winner + 1,
        trajectory.len(),
        density.len()
    );

    // Interrogate the estimate.
    println!("density at the left mode:  {:.4}", density.density_at(&[-1.5, 1.0]));
    println!("density at the right mode: {:.4}", density.density_at(&[1.5, 1.0]));
    println!("density in the valley:     {:.4}", density.density_at(&[0.0, 1.0]));

    let tails = density.tail_probabilities();
    for alpha in [0.5, 0.9, 0.99] {
        println!(
            "{:>4.0}% coverage region has probability {:.4}",
            100.0 * alpha,
            tails.confidence_region(alpha).unwrap()
        );
    }

    let draws = density.sample(&mut rng, 5);
    println!("five draws from the estimate:");
    for p in draws {
        println!("  [{:+.3}, {:+.3}]  density {:.4}", p[0], p[1], density.density_at(&p));
    }
}
