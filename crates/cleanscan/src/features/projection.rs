//! Two-dimensional principal component projection of a standardized matrix.
//!
//! Used only by the visualization consumer; detectors never see it.

use serde::Serialize;

use super::projector::StandardizedMatrix;

const MAX_ITERATIONS: usize = 500;
const TOLERANCE: f64 = 1e-10;

/// Coordinates of every matrix row on the first two principal components.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Projection {
    /// `[pc1, pc2]` per matrix row, in matrix order.
    pub coordinates: Vec<[f64; 2]>,
    /// Unit loading vectors of the two components (zero when degenerate).
    pub components: [Vec<f64>; 2],
    /// Variance captured by each component.
    pub explained_variance: [f64; 2],
}

impl Projection {
    /// Get the number of projected rows.
    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    /// Whether no rows were projected.
    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    /// Coordinates of one matrix row.
    pub fn get(&self, row: usize) -> Option<[f64; 2]> {
        self.coordinates.get(row).copied()
    }
}

/// Project the matrix onto its top two principal components.
///
/// Components come from power iteration with deflation on the sample
/// covariance. Each component is signed so its largest loading is positive,
/// which keeps the output identical across runs.
pub fn project_2d(matrix: &StandardizedMatrix) -> Projection {
    let n = matrix.row_count();
    let d = matrix.column_count();
    if n == 0 || d == 0 {
        return Projection {
            coordinates: vec![[0.0, 0.0]; n],
            components: [vec![0.0; d], vec![0.0; d]],
            explained_variance: [0.0, 0.0],
        };
    }

    let means: Vec<f64> = (0..d)
        .map(|j| matrix.rows.iter().map(|r| r[j]).sum::<f64>() / n as f64)
        .collect();
    let mut cov = covariance(&matrix.rows, &means);

    let (first, var1) = leading_eigenvector(&cov);
    deflate(&mut cov, &first, var1);
    let (second, var2) = if d > 1 {
        leading_eigenvector(&cov)
    } else {
        (vec![0.0; d], 0.0)
    };

    let coordinates = matrix
        .rows
        .iter()
        .map(|row| {
            let centered: Vec<f64> = row.iter().zip(&means).map(|(v, m)| v - m).collect();
            [dot(&centered, &first), dot(&centered, &second)]
        })
        .collect();

    Projection {
        coordinates,
        components: [first, second],
        explained_variance: [var1, var2],
    }
}

fn covariance(rows: &[Vec<f64>], means: &[f64]) -> Vec<Vec<f64>> {
    let d = means.len();
    let denom = if rows.len() > 1 { (rows.len() - 1) as f64 } else { 1.0 };
    let mut cov = vec![vec![0.0; d]; d];
    for row in rows {
        for i in 0..d {
            let di = row[i] - means[i];
            for j in i..d {
                cov[i][j] += di * (row[j] - means[j]);
            }
        }
    }
    for i in 0..d {
        for j in i..d {
            cov[i][j] /= denom;
            cov[j][i] = cov[i][j];
        }
    }
    cov
}

/// Dominant eigenpair of a symmetric positive semi-definite matrix.
fn leading_eigenvector(matrix: &[Vec<f64>]) -> (Vec<f64>, f64) {
    let d = matrix.len();
    // Uneven start so no axis-aligned eigenvector is orthogonal to it.
    let mut v: Vec<f64> = (0..d).map(|i| 1.0 + i as f64 / d as f64).collect();
    normalize(&mut v);

    let mut eigenvalue = 0.0;
    for _ in 0..MAX_ITERATIONS {
        let mut next = mat_vec(matrix, &v);
        let magnitude = norm(&next);
        if magnitude < TOLERANCE {
            return (vec![0.0; d], 0.0);
        }
        next.iter_mut().for_each(|x| *x /= magnitude);

        let delta: f64 = next.iter().zip(&v).map(|(a, b)| (a - b).abs()).sum();
        v = next;
        eigenvalue = magnitude;
        if delta < TOLERANCE {
            break;
        }
    }

    orient(&mut v);
    (v, eigenvalue)
}

fn deflate(matrix: &mut [Vec<f64>], vector: &[f64], eigenvalue: f64) {
    for (i, row) in matrix.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell -= eigenvalue * vector[i] * vector[j];
        }
    }
}

fn orient(v: &mut [f64]) {
    let pivot = v
        .iter()
        .copied()
        .fold(0.0f64, |best, x| if x.abs() > best.abs() { x } else { best });
    if pivot < 0.0 {
        v.iter_mut().for_each(|x| *x = -*x);
    }
}

fn mat_vec(matrix: &[Vec<f64>], v: &[f64]) -> Vec<f64> {
    matrix.iter().map(|row| dot(row, v)).collect()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm(v: &[f64]) -> f64 {
    dot(v, v).sqrt()
}

fn normalize(v: &mut [f64]) {
    let n = norm(v);
    if n > 0.0 {
        v.iter_mut().for_each(|x| *x /= n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::Scaler;

    fn matrix(rows: Vec<Vec<f64>>) -> StandardizedMatrix {
        let width = rows.first().map_or(0, Vec::len);
        StandardizedMatrix {
            columns: (0..width).map(|i| format!("f{i}")).collect(),
            row_indices: (0..rows.len()).collect(),
            scaler: Scaler::fit(&rows, width),
            rows,
        }
    }

    #[test]
    fn test_first_component_follows_dominant_axis() {
        let rows = (0..20)
            .map(|i| {
                let t = i as f64 - 10.0;
                vec![t, 0.1 * ((i % 3) as f64 - 1.0)]
            })
            .collect();
        let p = project_2d(&matrix(rows));

        assert_eq!(p.len(), 20);
        assert!(p.components[0][0] > 0.99);
        assert!(p.explained_variance[0] > p.explained_variance[1]);
        // Largest loading is positive.
        assert!(p.coordinates[19][0] > 0.0);
    }

    #[test]
    fn test_components_are_orthonormal() {
        let rows = vec![
            vec![1.0, 2.0, 0.5],
            vec![-0.3, 0.4, 1.2],
            vec![0.8, -1.1, 0.0],
            vec![-1.5, 0.2, -0.7],
            vec![0.0, -1.5, -1.0],
        ];
        let p = project_2d(&matrix(rows));
        let [a, b] = &p.components;
        assert!((dot(a, a) - 1.0).abs() < 1e-4);
        assert!((dot(b, b) - 1.0).abs() < 1e-4);
        assert!(dot(a, b).abs() < 1e-4);
    }

    #[test]
    fn test_deterministic() {
        let rows: Vec<Vec<f64>> = (0..30)
            .map(|i| vec![(i as f64).sin(), (i as f64 * 0.7).cos(), i as f64 / 30.0])
            .collect();
        assert_eq!(project_2d(&matrix(rows.clone())), project_2d(&matrix(rows)));
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(project_2d(&StandardizedMatrix::empty(vec!["a".into()])).is_empty());

        let single_column = project_2d(&matrix(vec![vec![-1.0], vec![1.0]]));
        assert_eq!(single_column.coordinates[1][1], 0.0);

        let constant = project_2d(&matrix(vec![vec![0.0, 0.0], vec![0.0, 0.0]]));
        assert_eq!(constant.coordinates, vec![[0.0, 0.0], [0.0, 0.0]]);
    }
}
