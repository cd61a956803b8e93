//! Conditional slices: fixed scenarios and agreement with a geometric oracle

use histree_density::{
    CountAndVolumeLimits, DensityHistogram, DensityValue, Histogram, LeafMap, NodeLabel,
    Rectangle, SpatialTree, Truncation,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn lab(x: u64) -> NodeLabel {
    NodeLabel::from_u64(x).unwrap()
}

/// Two unit cells of the [0,2]^3 cube under the widest-side rule, half the
/// mass in each.
fn half_cube() -> DensityHistogram {
    let tree = SpatialTree::widest(
        Rectangle::new(vec![0.0, 0.0, 0.0], vec![2.0, 2.0, 2.0]).unwrap(),
    )
    .unwrap();
    let truncation = Truncation::from_leaf_set(vec![lab(9), lab(15)]).unwrap();
    let vals = vec![
        DensityValue {
            density: 0.5,
            volume: 1.0,
        },
        DensityValue {
            density: 0.5,
            volume: 1.0,
        },
    ];
    DensityHistogram::new(tree, LeafMap::new(truncation, vals).unwrap()).unwrap()
}

fn assert_slice(
    sliced: &DensityHistogram,
    leaves: &[u64],
    vals: &[(f64, f64)],
) {
    let got: Vec<&NodeLabel> = sliced.densities().truncation().iter().collect();
    let want: Vec<NodeLabel> = leaves.iter().map(|&x| lab(x)).collect();
    assert_eq!(got, want.iter().collect::<Vec<_>>());
    for (v, &(density, volume)) in sliced.densities().vals().iter().zip(vals) {
        assert!((v.density - density).abs() < 1e-12, "density {v:?}");
        assert!((v.volume - volume).abs() < 1e-12, "volume {v:?}");
    }
}

#[test]
fn fixed_scenarios() {
    let d = half_cube();
    let order = d.tree().split_order_to_depth(3);

    let s = d.quick_slice(&[0, 1], &[0.5, 0.5], &order).unwrap().unwrap();
    assert_slice(&s, &[3], &[(0.5, 1.0)]);

    let s = d.quick_slice(&[0, 2], &[1.5, 1.5], &order).unwrap().unwrap();
    assert_slice(&s, &[3], &[(0.5, 1.0)]);

    let s = d.quick_slice(&[1, 2], &[0.5, 1.5], &order).unwrap().unwrap();
    assert_slice(&s, &[2], &[(0.5, 1.0)]);

    let s = d.quick_slice(&[2], &[1.5], &order).unwrap().unwrap();
    assert_slice(&s, &[4, 7], &[(0.5, 1.0), (0.5, 1.0)]);

    assert!(
        d.quick_slice(&[0, 1], &[0.5, 1.5], &order).unwrap().is_none(),
        "conditioning plane touches only unoccupied cells"
    );
}

/// Geometric slice oracle: select leaves whose cells contain the
/// conditioning point on the conditioned axes, project their boxes, and
/// locate each projected box in the sliced tree by descending to its
/// centre.
fn naive_slice(
    density: &DensityHistogram,
    axes: &[usize],
    point: &[f64],
    split_order: &[usize],
) -> Option<Vec<(NodeLabel, f64, f64)>> {
    let dim = density.tree().dimension();
    let free_axes: Vec<usize> = (0..dim).filter(|a| !axes.contains(a)).collect();
    let sliced_tree = SpatialTree::new(
        density.tree().root_box().project(&free_axes),
        density.tree().rule(),
    )
    .unwrap();

    let mut out: Vec<(NodeLabel, f64, f64)> = Vec::new();
    for (leaf, v) in density.densities().iter() {
        let cell = density.tree().cell_at(leaf);
        // Containment under the descent convention: [low, high) per axis.
        let inside = axes.iter().zip(point.iter()).all(|(&a, &x)| {
            cell.low()[a] <= x && x < cell.high()[a]
        });
        if !inside {
            continue;
        }
        let projected = cell.project(&free_axes);
        let free_depth = split_order[..leaf.depth()]
            .iter()
            .filter(|&&a| free_axes.contains(&a))
            .count();
        let label = sliced_tree
            .descend_box(&projected.centre())
            .nth(free_depth)
            .unwrap();
        out.push((label, v.density, projected.volume()));
    }
    out.sort_by(|a, b| a.0.cmp(&b.0));
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

#[test]
fn quick_slice_agrees_with_oracle() {
    let mut rng = StdRng::seed_from_u64(1234);

    // A non-trivial histogram over a lopsided box.
    let tree = SpatialTree::widest(
        Rectangle::new(vec![0.0, 0.0, 0.0], vec![4.0, 2.0, 1.0]).unwrap(),
    )
    .unwrap();
    let points: Vec<Vec<f64>> = (0..600)
        .map(|_| {
            vec![
                rng.gen_range(0.0..4.0f64).powf(1.3).min(3.999),
                rng.gen_range(0.0..2.0),
                rng.gen_range(0.0..1.0),
            ]
        })
        .collect();
    let start = Truncation::from_leaf_set(vec![NodeLabel::root()]).unwrap();
    let lims = CountAndVolumeLimits::new(points.len() as u64, 8.0)
        .with_count_limit(40)
        .with_volume_fraction(0.05);
    let fine = Histogram::split_and_count_from(tree, &start, &points, &lims).unwrap();
    let density = fine.normalize();
    let order = density.tree().split_order_to_depth(density.max_depth_for_test());

    for case in 0..40 {
        let axes: &[usize] = match case % 3 {
            0 => &[0],
            1 => &[2],
            _ => &[0, 1],
        };
        let point: Vec<f64> = axes
            .iter()
            .map(|&a| {
                let (lo, hi) = (
                    density.tree().root_box().low()[a],
                    density.tree().root_box().high()[a],
                );
                rng.gen_range(lo..hi)
            })
            .collect();

        let fast = density.quick_slice(axes, &point, &order).unwrap();
        let slow = naive_slice(&density, axes, &point, &order);
        match (fast, slow) {
            (None, None) => {}
            (Some(fast), Some(slow)) => {
                assert_eq!(fast.len(), slow.len(), "case {case}: leaf counts differ");
                for ((leaf, v), (want_leaf, want_density, want_volume)) in
                    fast.densities().iter().zip(slow.iter())
                {
                    assert_eq!(leaf, want_leaf, "case {case}");
                    assert!(
                        (v.density - want_density).abs() < 1e-9,
                        "case {case}: density {} vs {want_density}",
                        v.density
                    );
                    assert!(
                        (v.volume - want_volume).abs() < 1e-9,
                        "case {case}: volume {} vs {want_volume}",
                        v.volume
                    );
                }
            }
            (fast, slow) => panic!(
                "case {case}: fast and naive disagree on nullity: {} vs {}",
                fast.is_some(),
                slow.is_some()
            ),
        }
    }
}

// Small helper surface used by the oracle test.
trait MaxDepth {
    fn max_depth_for_test(&self) -> usize;
}

impl MaxDepth for DensityHistogram {
    fn max_depth_for_test(&self) -> usize {
        self.densities()
            .truncation()
            .iter()
            .map(|l| l.depth())
            .max()
            .unwrap_or(0)
    }
}
