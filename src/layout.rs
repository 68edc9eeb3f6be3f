//! Geometric layout: PCA projects group centroids to 3D, then a
//! force-directed simulation (similarity-weighted attraction, universal
//! repulsion, center gravity) relaxes the positions until they settle.
//! Fully deterministic for a given input.

use tracing::{debug, info};

/// Largest absolute coordinate after the final rescale.
pub const TARGET_EXTENT: f64 = 10.0;

const ATTRACTION: f64 = 2.0;
const REPULSION: f64 = 10.0;
const GRAVITY: f64 = 0.1;
const DAMPING: f64 = 0.9;
const MAX_SPEED: f64 = 2.0;
const DIST_SQ_EPS: f64 = 0.01;
const TIMESTEP: f64 = 1.0;

const MAX_ITERATIONS: usize = 150;
const CONVERGENCE_DELTA: f64 = 1e-3;
const CONVERGENCE_STREAK: usize = 3;

const POWER_ITERATIONS: usize = 100;
const POWER_TOLERANCE: f64 = 1e-9;

/// Compute 3D positions for `centroids` (one high-dimensional vector per
/// group) using `similarity` (the unthresholded group matrix) for
/// attraction.
pub fn layout_positions(centroids: &[Vec<f64>], similarity: &[Vec<f64>]) -> Vec<[f64; 3]> {
    let g = centroids.len();
    if g == 0 {
        return Vec::new();
    }

    let mut positions = pca_project(centroids);
    let iterations = force_refine(&mut positions, similarity);
    rescale(&mut positions);
    info!("layout settled after {iterations} iterations for {g} groups");
    positions
}

// ---------------------------------------------------------------------------
// Step A: PCA initialization
// ---------------------------------------------------------------------------

/// Mean-center the centroids and project onto the top three principal
/// components, computed by power iteration with orthogonal deflation.
/// Eigenvector signs are fixed (largest-magnitude coordinate positive) so
/// the projection is fully deterministic.
fn pca_project(centroids: &[Vec<f64>]) -> Vec<[f64; 3]> {
    let g = centroids.len();
    let d = centroids[0].len();

    let mut mean = vec![0.0f64; d];
    for row in centroids {
        for (m, x) in mean.iter_mut().zip(row) {
            *m += x;
        }
    }
    for m in mean.iter_mut() {
        *m /= g as f64;
    }

    let centered: Vec<Vec<f64>> = centroids
        .iter()
        .map(|row| row.iter().zip(&mean).map(|(x, m)| x - m).collect())
        .collect();

    let mut components: Vec<Vec<f64>> = Vec::with_capacity(3);
    for k in 0..3 {
        let component = principal_component(&centered, &components, k);
        components.push(component);
    }

    centered
        .iter()
        .map(|row| {
            let mut p = [0.0f64; 3];
            for (axis, component) in components.iter().enumerate() {
                p[axis] = dot(row, component);
            }
            p
        })
        .collect()
}

/// One principal component of the centered data, orthogonal to `previous`.
/// Returns the zero vector when the residual variance is degenerate (fewer
/// points than axes); the corresponding projected coordinate is then 0.
fn principal_component(centered: &[Vec<f64>], previous: &[Vec<f64>], k: usize) -> Vec<f64> {
    let d = centered[0].len();
    let mut v = seeded_direction(d, k);
    orthogonalize(&mut v, previous);
    if normalize(&mut v) == 0.0 {
        return vec![0.0; d];
    }

    for _ in 0..POWER_ITERATIONS {
        // w = Covariance · v without materializing the D×D matrix:
        // w = Σ_rows row · (row ⋅ v)
        let mut w = vec![0.0f64; d];
        for row in centered {
            let proj = dot(row, &v);
            for (wi, xi) in w.iter_mut().zip(row) {
                *wi += proj * xi;
            }
        }
        orthogonalize(&mut w, previous);
        if normalize(&mut w) == 0.0 {
            return vec![0.0; d];
        }
        let convergence = dot(&w, &v).abs();
        v = w;
        if 1.0 - convergence < POWER_TOLERANCE {
            break;
        }
    }

    fix_sign(&mut v);
    v
}

/// Deterministic pseudo-random start direction (splitmix64 stream), distinct
/// per component so deflation does not start from a parallel vector.
fn seeded_direction(d: usize, k: usize) -> Vec<f64> {
    let mut state = 0x9E37_79B9_7F4A_7C15u64.wrapping_mul(k as u64 + 1);
    (0..d)
        .map(|_| {
            state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
            let mut z = state;
            z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
            z ^= z >> 31;
            (z as f64 / u64::MAX as f64) - 0.5
        })
        .collect()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn orthogonalize(v: &mut [f64], basis: &[Vec<f64>]) {
    for u in basis {
        let proj = dot(v, u);
        for (vi, ui) in v.iter_mut().zip(u) {
            *vi -= proj * ui;
        }
    }
}

/// Normalize in place; returns the original magnitude.
fn normalize(v: &mut [f64]) -> f64 {
    let mag = dot(v, v).sqrt();
    if mag > 1e-12 {
        for x in v.iter_mut() {
            *x /= mag;
        }
        mag
    } else {
        0.0
    }
}

/// Flip the eigenvector so its largest-magnitude coordinate is positive.
fn fix_sign(v: &mut [f64]) {
    let dominant = v
        .iter()
        .enumerate()
        .max_by(|a, b| {
            a.1.abs()
                .partial_cmp(&b.1.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(i, _)| i);
    if let Some(i) = dominant {
        if v[i] < 0.0 {
            for x in v.iter_mut() {
                *x = -*x;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Step B: force-directed refinement
// ---------------------------------------------------------------------------

/// Relax positions with semi-implicit Euler integration. Returns the number
/// of iterations run (early exit after three consecutive settled steps).
fn force_refine(positions: &mut [[f64; 3]], similarity: &[Vec<f64>]) -> usize {
    let g = positions.len();
    if g < 2 {
        return 0;
    }

    let mut velocities = vec![[0.0f64; 3]; g];
    let mut settled_streak = 0usize;

    for iteration in 0..MAX_ITERATIONS {
        let mut max_delta = 0.0f64;

        for i in 0..g {
            let mut force = [0.0f64; 3];

            for j in 0..g {
                if j == i {
                    continue;
                }
                let delta = sub(positions[j], positions[i]);
                let dist_sq = norm_sq(delta);
                let dist = dist_sq.sqrt();

                // Attraction k_a·sim·d toward j collapses to a plain scaled
                // difference vector.
                let pull = ATTRACTION * similarity[i][j];
                force[0] += pull * delta[0];
                force[1] += pull * delta[1];
                force[2] += pull * delta[2];

                // Universal repulsion away from j.
                let push = REPULSION / dist_sq.max(DIST_SQ_EPS);
                let away = if dist > 1e-9 {
                    [-delta[0] / dist, -delta[1] / dist, -delta[2] / dist]
                } else {
                    // Coincident nodes: push along x, lower index first.
                    [if i < j { -1.0 } else { 1.0 }, 0.0, 0.0]
                };
                force[0] += push * away[0];
                force[1] += push * away[1];
                force[2] += push * away[2];
            }

            // Center gravity k_c·|p| toward the origin.
            force[0] -= GRAVITY * positions[i][0];
            force[1] -= GRAVITY * positions[i][1];
            force[2] -= GRAVITY * positions[i][2];

            let v = &mut velocities[i];
            v[0] = (v[0] + force[0] * TIMESTEP) * DAMPING;
            v[1] = (v[1] + force[1] * TIMESTEP) * DAMPING;
            v[2] = (v[2] + force[2] * TIMESTEP) * DAMPING;

            let speed = norm_sq(*v).sqrt();
            if speed > MAX_SPEED {
                let scale = MAX_SPEED / speed;
                v[0] *= scale;
                v[1] *= scale;
                v[2] *= scale;
            }
        }

        for i in 0..g {
            let step = [
                velocities[i][0] * TIMESTEP,
                velocities[i][1] * TIMESTEP,
                velocities[i][2] * TIMESTEP,
            ];
            positions[i][0] += step[0];
            positions[i][1] += step[1];
            positions[i][2] += step[2];
            max_delta = max_delta.max(norm_sq(step).sqrt());
        }

        if max_delta < CONVERGENCE_DELTA {
            settled_streak += 1;
            if settled_streak >= CONVERGENCE_STREAK {
                debug!("force layout converged at iteration {iteration}");
                return iteration + 1;
            }
        } else {
            settled_streak = 0;
        }
    }
    MAX_ITERATIONS
}

fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn norm_sq(v: [f64; 3]) -> f64 {
    v[0] * v[0] + v[1] * v[1] + v[2] * v[2]
}

/// Rescale so the largest absolute coordinate equals [`TARGET_EXTENT`],
/// preserving aspect ratio. Degenerate all-zero layouts stay at the origin.
fn rescale(positions: &mut [[f64; 3]]) {
    let max_abs = positions
        .iter()
        .flat_map(|p| p.iter())
        .fold(0.0f64, |acc, &x| acc.max(x.abs()));
    if max_abs <= 1e-12 {
        return;
    }
    let scale = TARGET_EXTENT / max_abs;
    for p in positions.iter_mut() {
        p[0] *= scale;
        p[1] *= scale;
        p[2] *= scale;
    }
}
