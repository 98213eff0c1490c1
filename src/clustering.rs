use crate::mechanics;
use crate::model::{BoundaryConditions, CodeElement, FiniteElement};
use anyhow::{bail, Result};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct ClusterSettings {
    pub max_clusters: usize,
    pub seed: u64,
}

/// Group embedded elements into finite elements via spectral clustering.
///
/// With fewer than two elements clustering is skipped and no clusters are
/// produced. A fully degenerate embedding (every element at the same
/// position) collapses into one universal cluster instead of being forced
/// through the eigensolver. The random seed is fixed, so output is
/// reproducible for a fixed input.
pub fn cluster_elements(
    elements: &BTreeMap<String, CodeElement>,
    settings: ClusterSettings,
) -> Result<Vec<FiniteElement>> {
    let ids: Vec<&String> = elements.keys().collect();
    let n = ids.len();
    if n < 2 {
        debug!(n, "too few elements, skipping clustering");
        return Ok(Vec::new());
    }

    let mut positions = Vec::with_capacity(n);
    for id in &ids {
        let Some(position) = elements[id.as_str()].position else {
            bail!("element {id} has no embedding; clustering must run after the embedding step");
        };
        positions.push(position.as_vector());
    }

    let max_distance = positions
        .iter()
        .flat_map(|a| positions.iter().map(move |b| distance(a, b)))
        .fold(0.0, f64::max);
    if max_distance < 1e-9 {
        debug!("degenerate embedding, producing one universal cluster");
        let member_ids: Vec<String> = ids.iter().map(|id| (*id).clone()).collect();
        return Ok(vec![finalize_cluster(0, member_ids, elements)]);
    }

    let k = settings.max_clusters.min(n);
    let labels = spectral_labels(&positions, k, settings.seed)?;

    let mut clusters = Vec::new();
    for label in 0..k {
        let member_ids: Vec<String> = ids
            .iter()
            .zip(&labels)
            .filter(|(_, &l)| l == label)
            .map(|(id, _)| (*id).clone())
            .collect();
        if member_ids.is_empty() {
            continue;
        }
        clusters.push(finalize_cluster(clusters.len(), member_ids, elements));
    }

    Ok(clusters)
}

/// Finalize cluster geometry and mechanics. Stress and strain are computed
/// exactly once here; only the validator touches the cluster afterwards.
fn finalize_cluster(
    id: usize,
    member_ids: Vec<String>,
    elements: &BTreeMap<String, CodeElement>,
) -> FiniteElement {
    let members: Vec<&CodeElement> = member_ids.iter().map(|id| &elements[id]).collect();
    let positions: Vec<[f64; 3]> = members
        .iter()
        .map(|m| m.position.map(|p| p.as_vector()).unwrap_or([0.0; 3]))
        .collect();

    let count = positions.len() as f64;
    let mut center = [0.0f64; 3];
    for position in &positions {
        for axis in 0..3 {
            center[axis] += position[axis] / count;
        }
    }
    let radius = positions
        .iter()
        .map(|p| distance(p, &center))
        .fold(0.0, f64::max);

    FiniteElement {
        id,
        center,
        radius,
        stress: mechanics::stress(&members),
        strain: mechanics::strain(&members),
        members: member_ids,
        boundary_conditions: BoundaryConditions::default(),
    }
}

fn distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)).sqrt()
}

/// Spectral clustering: RBF affinity over pairwise distance, symmetric
/// normalized Laplacian, k smallest eigenvectors, seeded k-means on the
/// row-normalized spectral embedding.
fn spectral_labels(positions: &[[f64; 3]], k: usize, seed: u64) -> Result<Vec<usize>> {
    let n = positions.len();

    let mut affinity = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..n {
            if i != j {
                let d = distance(&positions[i], &positions[j]);
                // Floored so a distant outlier stays weakly connected and
                // cannot zero out its own degree.
                affinity[[i, j]] = (-d * d).exp().max(1e-10);
            }
        }
    }

    let mut inv_sqrt_degree = Array1::<f64>::zeros(n);
    for i in 0..n {
        let degree: f64 = affinity.row(i).sum();
        if !degree.is_finite() {
            bail!("non-finite degree in affinity graph");
        }
        inv_sqrt_degree[i] = 1.0 / degree.sqrt();
    }

    let mut laplacian = Array2::<f64>::eye(n);
    for i in 0..n {
        for j in 0..n {
            laplacian[[i, j]] -= inv_sqrt_degree[i] * affinity[[i, j]] * inv_sqrt_degree[j];
        }
    }

    let (eigenvalues, eigenvectors) = jacobi_eigen(laplacian);
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| eigenvalues[a].total_cmp(&eigenvalues[b]));

    let mut embedding = Array2::<f64>::zeros((n, k));
    for (column, &eigen_index) in order.iter().take(k).enumerate() {
        for row in 0..n {
            embedding[[row, column]] = eigenvectors[[row, eigen_index]];
        }
    }
    for mut row in embedding.rows_mut() {
        let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 1e-12 {
            row.mapv_inplace(|v| v / norm);
        }
    }

    Ok(kmeans(&embedding, k, seed))
}

/// Cyclic Jacobi eigendecomposition of a symmetric matrix. Returns the
/// eigenvalues and the matrix whose columns are the eigenvectors.
fn jacobi_eigen(mut a: Array2<f64>) -> (Vec<f64>, Array2<f64>) {
    let n = a.nrows();
    let mut v = Array2::<f64>::eye(n);

    for _sweep in 0..100 {
        let mut off_diagonal = 0.0;
        for p in 0..n {
            for q in (p + 1)..n {
                off_diagonal += a[[p, q]] * a[[p, q]];
            }
        }
        if off_diagonal < 1e-18 {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[[p, q]];
                if apq.abs() < 1e-15 {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for i in 0..n {
                    let aip = a[[i, p]];
                    let aiq = a[[i, q]];
                    a[[i, p]] = c * aip - s * aiq;
                    a[[i, q]] = s * aip + c * aiq;
                }
                for i in 0..n {
                    let api = a[[p, i]];
                    let aqi = a[[q, i]];
                    a[[p, i]] = c * api - s * aqi;
                    a[[q, i]] = s * api + c * aqi;
                }
                for i in 0..n {
                    let vip = v[[i, p]];
                    let viq = v[[i, q]];
                    v[[i, p]] = c * vip - s * viq;
                    v[[i, q]] = s * vip + c * viq;
                }
            }
        }
    }

    let eigenvalues = (0..n).map(|i| a[[i, i]]).collect();
    (eigenvalues, v)
}

/// Lloyd's k-means. The first centroid comes from a seeded RNG; the rest use
/// deterministic farthest-point seeding so well-separated groups always get
/// their own centroid. Assignment ties go to the lowest centroid index.
fn kmeans(data: &Array2<f64>, k: usize, seed: u64) -> Vec<usize> {
    let n = data.nrows();
    let mut rng = StdRng::seed_from_u64(seed);

    let square_distance = |i: usize, j: usize| -> f64 {
        data.row(i)
            .iter()
            .zip(data.row(j).iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    };

    let mut initial: Vec<usize> = vec![rng.random_range(0..n)];
    while initial.len() < k {
        let mut farthest = 0;
        let mut farthest_distance = -1.0;
        for i in 0..n {
            if initial.contains(&i) {
                continue;
            }
            let nearest = initial
                .iter()
                .map(|&c| square_distance(i, c))
                .fold(f64::INFINITY, f64::min);
            if nearest > farthest_distance {
                farthest_distance = nearest;
                farthest = i;
            }
        }
        initial.push(farthest);
    }
    let mut centroids: Vec<Array1<f64>> = initial.iter().map(|&i| data.row(i).to_owned()).collect();

    let mut labels = vec![0usize; n];
    for _iteration in 0..100 {
        let mut changed = false;
        for i in 0..n {
            let row = data.row(i);
            let mut best = 0;
            let mut best_distance = f64::INFINITY;
            for (j, centroid) in centroids.iter().enumerate() {
                let d: f64 = row
                    .iter()
                    .zip(centroid.iter())
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum();
                if d < best_distance {
                    best_distance = d;
                    best = j;
                }
            }
            if labels[i] != best {
                labels[i] = best;
                changed = true;
            }
        }

        for (j, centroid) in centroids.iter_mut().enumerate() {
            let assigned: Vec<usize> = (0..n).filter(|&i| labels[i] == j).collect();
            if assigned.is_empty() {
                continue; // empty bucket keeps its centroid
            }
            let mut sum = Array1::<f64>::zeros(data.ncols());
            for &i in &assigned {
                sum += &data.row(i);
            }
            *centroid = sum / assigned.len() as f64;
        }

        if !changed {
            break;
        }
    }

    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ElementKind, SourceFile, SphericalPosition};

    fn element_at(path: &str, r: f64, theta: f64, phi: f64) -> (String, CodeElement) {
        let file = SourceFile {
            path: path.to_string(),
            content: String::new(),
            kind: ElementKind::Python,
            size: 0,
        };
        let mut element = CodeElement::from_source(&file);
        element.position = Some(SphericalPosition { r, theta, phi });
        element.stability = 0.5;
        (path.to_string(), element)
    }

    fn settings() -> ClusterSettings {
        ClusterSettings {
            max_clusters: 10,
            seed: 42,
        }
    }

    #[test]
    fn single_element_skips_clustering() {
        let elements: BTreeMap<_, _> = [element_at("a.py", 1.0, 0.0, 0.0)].into_iter().collect();
        let clusters = cluster_elements(&elements, settings()).unwrap();
        assert!(clusters.is_empty());
    }

    #[test]
    fn identical_positions_collapse_into_one_cluster() {
        let elements: BTreeMap<_, _> = [
            element_at("a.py", 1.0, 0.0, 0.0),
            element_at("b.py", 1.0, 0.0, 0.0),
            element_at("c.py", 1.0, 0.0, 0.0),
        ]
        .into_iter()
        .collect();
        let clusters = cluster_elements(&elements, settings()).unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members.len(), 3);
        assert_eq!(clusters[0].radius, 0.0);
    }

    #[test]
    fn membership_partitions_the_element_set() {
        let elements: BTreeMap<_, _> = (0..12)
            .map(|i| {
                element_at(
                    &format!("f{i:02}.py"),
                    0.1 * i as f64,
                    0.5 * i as f64,
                    0.2 * i as f64,
                )
            })
            .collect();
        let clusters = cluster_elements(
            &elements,
            ClusterSettings {
                max_clusters: 4,
                seed: 42,
            },
        )
        .unwrap();

        let mut seen: Vec<&String> = clusters.iter().flat_map(|c| c.members.iter()).collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), elements.len());
        assert!(clusters.len() <= 4);
    }

    #[test]
    fn two_separated_groups_are_split_apart() {
        let mut elements = BTreeMap::new();
        for i in 0..4 {
            let (id, e) = element_at(&format!("near{i}.py"), 0.01 * i as f64, 0.0, 0.0);
            elements.insert(id, e);
        }
        for i in 0..4 {
            let (id, e) = element_at(&format!("far{i}.py"), 5.0 + 0.01 * i as f64, 3.0, 2.0);
            elements.insert(id, e);
        }
        let clusters = cluster_elements(
            &elements,
            ClusterSettings {
                max_clusters: 2,
                seed: 42,
            },
        )
        .unwrap();
        assert_eq!(clusters.len(), 2);

        for cluster in &clusters {
            let all_near = cluster.members.iter().all(|m| m.starts_with("near"));
            let all_far = cluster.members.iter().all(|m| m.starts_with("far"));
            assert!(all_near || all_far, "mixed cluster: {:?}", cluster.members);
        }
    }

    #[test]
    fn distant_outlier_does_not_abort_clustering() {
        let mut elements = BTreeMap::new();
        for i in 0..4 {
            let (id, e) = element_at(&format!("core{i}.py"), 0.1 * i as f64, 0.0, 0.0);
            elements.insert(id, e);
        }
        // Far enough that its raw RBF affinity to every other point
        // underflows toward zero.
        let (id, e) = element_at("outlier.py", 8.0, 0.0, 0.0);
        elements.insert(id, e);

        let clusters = cluster_elements(
            &elements,
            ClusterSettings {
                max_clusters: 2,
                seed: 42,
            },
        )
        .unwrap();

        let total: usize = clusters.iter().map(|c| c.members.len()).sum();
        assert_eq!(total, 5);
    }

    #[test]
    fn clustering_is_reproducible_for_fixed_input() {
        let elements: BTreeMap<_, _> = (0..9)
            .map(|i| {
                element_at(
                    &format!("f{i}.py"),
                    0.3 * i as f64,
                    (i as f64).sin().abs(),
                    0.1 * i as f64,
                )
            })
            .collect();
        let a = cluster_elements(&elements, settings()).unwrap();
        let b = cluster_elements(&elements, settings()).unwrap();
        let members_a: Vec<_> = a.iter().map(|c| c.members.clone()).collect();
        let members_b: Vec<_> = b.iter().map(|c| c.members.clone()).collect();
        assert_eq!(members_a, members_b);
    }

    #[test]
    fn cluster_geometry_covers_members() {
        let elements: BTreeMap<_, _> = [
            element_at("a.py", 0.0, 0.0, 0.0),
            element_at("b.py", 1.0, 0.0, 0.0),
        ]
        .into_iter()
        .collect();
        let clusters = cluster_elements(
            &elements,
            ClusterSettings {
                max_clusters: 1,
                seed: 42,
            },
        )
        .unwrap();
        assert_eq!(clusters.len(), 1);
        let cluster = &clusters[0];
        assert!((cluster.center[0] - 0.5).abs() < 1e-9);
        assert!((cluster.radius - 0.5).abs() < 1e-9);
    }
}
