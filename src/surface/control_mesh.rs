use nalgebra::{Point3, Point4};

use crate::misc::{as_f64, FloatingPoint, SurfaceError};

/// Rectangular grid of control points with one weight per point.
///
/// The grid is indexed `[u][v]`: each row is a column of points along the v direction.
/// A weight of 1 everywhere describes a non-rational (polynomial) surface.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ControlMesh<T: FloatingPoint> {
    points: Vec<Vec<Point3<T>>>,
    weights: Vec<Vec<T>>,
}

impl<T: FloatingPoint> ControlMesh<T> {
    /// Create a control mesh
    /// # Failures
    /// - if the grid is empty or not rectangular
    /// - if a weight grid is given that does not match the point grid
    /// - if any weight is not positive and finite
    ///
    /// # Example
    /// ```
    /// use nalgebra::Point3;
    /// use parasurf::prelude::*;
    ///
    /// let points = vec![
    ///     vec![Point3::new(0., 0., 0.), Point3::new(0., 1., 0.)],
    ///     vec![Point3::new(1., 0., 0.), Point3::new(1., 1., 0.)],
    /// ];
    /// let mesh = ControlMesh::try_new(points, None).unwrap();
    /// assert_eq!(mesh.dimensions(), (2, 2));
    /// assert!(!mesh.is_rational());
    /// ```
    pub fn try_new(points: Vec<Vec<Point3<T>>>, weights: Option<Vec<Vec<T>>>) -> anyhow::Result<Self> {
        anyhow::ensure!(
            !points.is_empty() && !points[0].is_empty(),
            SurfaceError::TooFewControlPoints {
                direction: "u",
                count: points.len(),
                degree: 0,
            }
        );
        let columns = points[0].len();
        if let Some((row, r)) = points.iter().enumerate().find(|(_, r)| r.len() != columns) {
            anyhow::bail!(SurfaceError::NonRectangularGrid {
                row,
                found: r.len(),
                expected: columns,
            });
        }

        let weights = match weights {
            Some(weights) => {
                anyhow::ensure!(
                    weights.len() == points.len() && weights.iter().all(|r| r.len() == columns),
                    SurfaceError::WeightGridMismatch
                );
                for (row, r) in weights.iter().enumerate() {
                    let invalid = |w: &T| !w.is_finite() || *w <= T::zero();
                    if let Some(column) = r.iter().position(invalid) {
                        anyhow::bail!(SurfaceError::NonPositiveWeight {
                            row,
                            column,
                            weight: as_f64(r[column]),
                        });
                    }
                }
                weights
            }
            None => vec![vec![T::one(); columns]; points.len()],
        };

        Ok(Self { points, weights })
    }

    /// Build a control mesh from homogeneous points `(w·x, w·y, w·z, w)`
    pub(crate) fn from_homogeneous(points: &[Vec<Point4<T>>]) -> Self {
        Self {
            points: points
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|p| Point3::new(p.x / p.w, p.y / p.w, p.z / p.w))
                        .collect()
                })
                .collect(),
            weights: points
                .iter()
                .map(|row| row.iter().map(|p| p.w).collect())
                .collect(),
        }
    }

    /// Control points in homogeneous coordinates `(w·x, w·y, w·z, w)`
    pub fn homogeneous(&self) -> Vec<Vec<Point4<T>>> {
        self.points
            .iter()
            .zip(self.weights.iter())
            .map(|(row, weights)| {
                row.iter()
                    .zip(weights.iter())
                    .map(|(p, w)| Point4::new(p.x * *w, p.y * *w, p.z * *w, *w))
                    .collect()
            })
            .collect()
    }

    /// Number of control points in `(u, v)` directions
    pub fn dimensions(&self) -> (usize, usize) {
        (self.points.len(), self.points[0].len())
    }

    pub fn points(&self) -> &Vec<Vec<Point3<T>>> {
        &self.points
    }

    pub fn weights(&self) -> &Vec<Vec<T>> {
        &self.weights
    }

    pub fn point(&self, i: usize, j: usize) -> &Point3<T> {
        &self.points[i][j]
    }

    pub fn weight(&self, i: usize, j: usize) -> T {
        self.weights[i][j]
    }

    /// `true` if any weight differs from 1
    pub fn is_rational(&self) -> bool {
        self.weights
            .iter()
            .flatten()
            .any(|w| (*w - T::one()).abs() > T::default_epsilon())
    }

    /// Apply `f` to every control point, keeping the weights
    pub fn map_points<F: Fn(&Point3<T>) -> Point3<T>>(&self, f: F) -> Self {
        Self {
            points: self
                .points
                .iter()
                .map(|row| row.iter().map(&f).collect())
                .collect(),
            weights: self.weights.clone(),
        }
    }
}

/// Serialized form of a control mesh, validated again on the way in
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct ControlMeshData<T: FloatingPoint> {
    points: Vec<Vec<Point3<T>>>,
    weights: Vec<Vec<T>>,
}

#[cfg(feature = "serde")]
impl<'de, T: FloatingPoint + serde::Deserialize<'de>> serde::Deserialize<'de> for ControlMesh<T> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let data = ControlMeshData::<T>::deserialize(deserializer)?;
        Self::try_new(data.points, Some(data.weights)).map_err(serde::de::Error::custom)
    }
}
