use nalgebra::Point4;

use crate::{
    knot::KnotVector,
    misc::{as_f64, safe_div, FloatingPoint, SurfaceError},
    surface::{ControlMesh, NurbsSurface, UVDirection},
};

impl<T: FloatingPoint> NurbsSurface<T> {
    /// Insert a knot `multiplicity` times in the given direction
    /// Returns a new surface with `multiplicity` more control points per row (or column)
    /// describing exactly the same shape.
    /// # Failures
    /// - if the knot is not strictly inside the knot domain
    /// - if the resulting multiplicity would exceed the degree
    ///
    /// # Example
    /// ```
    /// use parasurf::prelude::*;
    ///
    /// let sphere = NurbsSurface::<f64>::try_sphere(1., 8, 6).unwrap();
    /// let refined = sphere.try_insert_knot(UVDirection::U, 0.37, 1).unwrap();
    /// assert_eq!(refined.control_mesh().dimensions().0, sphere.control_mesh().dimensions().0 + 1);
    /// ```
    pub fn try_insert_knot(
        &self,
        direction: UVDirection,
        knot: T,
        multiplicity: usize,
    ) -> anyhow::Result<Self> {
        if multiplicity == 0 {
            return Ok(self.clone());
        }

        let points = self.control_points();
        match direction {
            UVDirection::U => {
                let columns = points[0].len();
                let mut knots = self.u_knots().clone();
                let mut inserted = Vec::with_capacity(columns);
                for j in 0..columns {
                    let column: Vec<_> = points.iter().map(|row| row[j]).collect();
                    let (k, p) =
                        insert_knot(self.u_knots(), self.u_degree(), &column, knot, multiplicity)?;
                    knots = k;
                    inserted.push(p);
                }
                // back to [u][v] order
                let rows = (0..inserted[0].len())
                    .map(|i| inserted.iter().map(|column| column[i]).collect())
                    .collect::<Vec<Vec<_>>>();
                Ok(Self::from_parts(
                    self.u_degree(),
                    self.v_degree(),
                    knots,
                    self.v_knots().clone(),
                    ControlMesh::from_homogeneous(&rows),
                ))
            }
            UVDirection::V => {
                let mut knots = self.v_knots().clone();
                let mut rows = Vec::with_capacity(points.len());
                for row in points.iter() {
                    let (k, p) =
                        insert_knot(self.v_knots(), self.v_degree(), row, knot, multiplicity)?;
                    knots = k;
                    rows.push(p);
                }
                Ok(Self::from_parts(
                    self.u_degree(),
                    self.v_degree(),
                    self.u_knots().clone(),
                    knots,
                    ControlMesh::from_homogeneous(&rows),
                ))
            }
        }
    }

    /// Insert each of the given knots once, in order
    pub fn try_refine_knot(&self, direction: UVDirection, knots: &[T]) -> anyhow::Result<Self> {
        knots.iter().try_fold(self.clone(), |surface, knot| {
            surface.try_insert_knot(direction, *knot, 1)
        })
    }
}

/// Insert `u` `r` times into a curve of homogeneous control points (Boehm's algorithm)
/// Returns the new knot vector and control points.
fn insert_knot<T: FloatingPoint>(
    knots: &KnotVector<T>,
    degree: usize,
    points: &[Point4<T>],
    u: T,
    r: usize,
) -> anyhow::Result<(KnotVector<T>, Vec<Point4<T>>)> {
    let (start, end) = knots.domain(degree);
    anyhow::ensure!(
        u > start && u < end,
        SurfaceError::InvalidKnotInsertion {
            knot: as_f64(u),
            reason: format!(
                "outside of the knot domain ({}, {})",
                as_f64(start),
                as_f64(end)
            ),
        }
    );

    let p = degree;
    let s = knots.multiplicity_of(u);
    anyhow::ensure!(
        s + r <= p,
        SurfaceError::InvalidKnotInsertion {
            knot: as_f64(u),
            reason: format!("multiplicity {} would exceed degree {}", s + r, p),
        }
    );

    let np = points.len() - 1;
    let mp = np + p + 1;
    let k = knots.find_knot_span_index(np, p, u);

    let uq: KnotVector<T> = knots.as_slice()[..=k]
        .iter()
        .cloned()
        .chain(std::iter::repeat_n(u, r))
        .chain(knots.as_slice()[(k + 1)..=mp].iter().cloned())
        .collect();

    let mut qw = vec![Point4::origin(); np + r + 1];
    qw[..=(k - p)].copy_from_slice(&points[..=(k - p)]);
    for i in (k - s)..=np {
        qw[i + r] = points[i];
    }

    let mut rw: Vec<_> = (0..=(p - s)).map(|i| points[k - p + i]).collect();
    let mut l = k - p;
    for j in 1..=r {
        l = k - p + j;
        for i in 0..=(p - j - s) {
            let alpha = safe_div(u - knots[l + i], knots[i + k + 1] - knots[l + i]);
            rw[i] = rw[i].lerp(&rw[i + 1], alpha);
        }
        qw[l] = rw[0];
        qw[k + r - j - s] = rw[p - j - s];
    }

    for i in (l + 1)..(k - s) {
        qw[i] = rw[i - l];
    }

    Ok((uq, qw))
}
