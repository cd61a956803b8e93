//! Minimum-distance estimate selection over a backtrack trajectory
//!
//! A backtrack run yields candidate densities ordered from finest to
//! coarsest, each a coarsening of its predecessors. The minimum-distance
//! estimate picks the candidate `j` minimizing the Devroye–Lugosi
//! criterion
//!
//! ```text
//! delta_j = max_k | integral over A_jk of f_j  -  mu(A_jk) |
//! ```
//!
//! where `A_jk = { x : f_j(x) > f_k(x) }` is a Scheffé set and `mu` is the
//! empirical measure of a held-out validation sample. Because the
//! trajectory is totally ordered by refinement, each pairwise Scheffé
//! integral is computed exactly on the finer partition of the pair plus the
//! coarser leaves' uncovered remainders.

use tracing::debug;

use histree_core::{Error, Result};

use crate::density::DensityHistogram;

/// Integral of `f_a` over the Scheffé set `{f_a > f_b}` for a pair where
/// `fine` refines `coarse`; `a_is_fine` says which role `a` plays.
fn scheffe_mass(fine: &DensityHistogram, coarse: &DensityHistogram, a_is_fine: bool) -> f64 {
    let mut mass = 0.0;
    // Volume of the fine leaves under each coarse leaf, to expose the
    // remainders where the fine density vanishes.
    let mut covered = vec![0.0; coarse.len()];

    for (leaf, v) in fine.densities().iter() {
        let (coarse_density, slot) = match coarse.densities().truncation().covering_leaf(leaf) {
            Some(idx) => (coarse.densities().vals()[idx].density, Some(idx)),
            None => (0.0, None),
        };
        if let Some(idx) = slot {
            covered[idx] += v.volume;
        }
        let (a, b) = if a_is_fine {
            (v.density, coarse_density)
        } else {
            (coarse_density, v.density)
        };
        if a > b {
            mass += a * v.volume;
        }
    }

    // On a remainder the fine density is 0, so it belongs to the Scheffé
    // set exactly when the coarse density is positive.
    if !a_is_fine {
        for (idx, (_, v)) in coarse.densities().iter().enumerate() {
            let remainder = v.volume - covered[idx];
            if remainder > 1e-12 && v.density > 0.0 {
                mass += v.density * remainder;
            }
        }
    }
    mass
}

/// Empirical measure of `{f_a > f_b}` on the validation points.
fn empirical_measure(
    a: &DensityHistogram,
    b: &DensityHistogram,
    validation: &[Vec<f64>],
) -> f64 {
    let hits = validation
        .iter()
        .filter(|p| a.density_at(p) > b.density_at(p))
        .count();
    hits as f64 / validation.len() as f64
}

/// Select the minimum-distance estimate from a finest-to-coarsest
/// trajectory using a held-out validation sample.
///
/// Returns the winning index and candidate. The trajectory must be totally
/// ordered by refinement: every leaf of a candidate must be covered by a
/// leaf of every later (coarser) candidate.
pub fn select_min_distance<'a>(
    trajectory: &'a [DensityHistogram],
    validation: &[Vec<f64>],
) -> Result<(usize, &'a DensityHistogram)> {
    if trajectory.is_empty() {
        return Err(Error::empty_input("minimum-distance selection"));
    }
    if validation.is_empty() {
        return Err(Error::empty_input("validation sample"));
    }
    for w in trajectory.windows(2) {
        let (fine, coarse) = (&w[0], &w[1]);
        let nested = fine.densities().iter().all(|(leaf, _)| {
            coarse.densities().truncation().covering_leaf(leaf).is_some()
        });
        if !nested {
            return Err(Error::InvalidInput(
                "trajectory candidates must be ordered finest to coarsest".to_string(),
            ));
        }
    }

    let mut best = (0, f64::INFINITY);
    for j in 0..trajectory.len() {
        let mut delta: f64 = 0.0;
        for k in 0..trajectory.len() {
            if j == k {
                continue;
            }
            let (fine_idx, coarse_idx) = if j < k { (j, k) } else { (k, j) };
            let mass = scheffe_mass(
                &trajectory[fine_idx],
                &trajectory[coarse_idx],
                j == fine_idx,
            );
            let mu = empirical_measure(&trajectory[j], &trajectory[k], validation);
            delta = delta.max((mass - mu).abs());
        }
        debug!("candidate {} of {}: delta {delta:.6}", j + 1, trajectory.len());
        if delta < best.1 {
            best = (j, delta);
        }
    }
    Ok((best.0, &trajectory[best.0]))
}
