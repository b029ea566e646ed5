use nalgebra::{Matrix4, Point3, Point4, Vector3, Vector4};

use crate::{
    bounding_box::BoundingBox,
    knot::KnotVector,
    misc::{Binomial, FloatingPoint, SurfaceError, DEGENERACY_TOLERANCE},
    surface::{ControlMesh, EvaluationCache, EvaluationKey, ParametricSurface},
};

/// Partial derivative table, `ders[k][l] = ∂^(k+l)S / ∂u^k ∂v^l`
pub type DerivativeTable<T> = Vec<Vec<Vector3<T>>>;

/// Tensor-product NURBS surface representation
///
/// The surface is immutable: editing operations such as knot insertion or
/// transformation return a new surface.
#[derive(Clone, Debug)]
pub struct NurbsSurface<T: FloatingPoint> {
    control_mesh: ControlMesh<T>,
    /// control points with homogeneous coordinates
    /// the last element of the vector is the `weight`
    control_points: Vec<Vec<Point4<T>>>,
    u_degree: usize,
    v_degree: usize,
    u_knots: KnotVector<T>,
    v_knots: KnotVector<T>,
    is_rational: bool,
    bounding_box: BoundingBox<T>,
    cache: EvaluationCache<DerivativeTable<T>>,
}

/// Plain data form of a [`NurbsSurface`], used for serialization
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NurbsSurfaceData<T: FloatingPoint> {
    pub control_points: Vec<Vec<Point3<T>>>,
    pub weights: Vec<Vec<T>>,
    pub u_degree: usize,
    pub v_degree: usize,
    pub u_knots: Vec<T>,
    pub v_knots: Vec<T>,
}

impl<T: FloatingPoint> NurbsSurface<T> {
    /// Create a new NURBS surface
    /// Knot vectors default to clamped uniform ones over `[0, 1]`.
    /// # Failures
    /// - if the number of control points in a direction is less than the degree + 1
    /// - if a knot vector is decreasing
    /// - if the number of knots is not equal to the number of control points + the degree + 1
    ///
    /// # Example
    /// ```
    /// use nalgebra::Point3;
    /// use parasurf::prelude::*;
    ///
    /// let points = vec![
    ///     vec![Point3::new(-1., -1., 0.), Point3::new(-1., 1., 0.)],
    ///     vec![Point3::new(1., -1., 0.), Point3::new(1., 1., 0.)],
    /// ];
    /// let mesh = ControlMesh::try_new(points, None).unwrap();
    /// let surface = NurbsSurface::try_new(1, 1, mesh, Some(vec![0., 0., 1., 1.]), None).unwrap();
    /// let p = surface.try_point_at(0.5, 0.5).unwrap();
    /// assert_eq!(p, Point3::origin());
    /// ```
    pub fn try_new(
        u_degree: usize,
        v_degree: usize,
        control_mesh: ControlMesh<T>,
        u_knots: Option<Vec<T>>,
        v_knots: Option<Vec<T>>,
    ) -> anyhow::Result<Self> {
        let (rows, columns) = control_mesh.dimensions();
        anyhow::ensure!(
            rows > u_degree,
            SurfaceError::TooFewControlPoints {
                direction: "u",
                count: rows,
                degree: u_degree,
            }
        );
        anyhow::ensure!(
            columns > v_degree,
            SurfaceError::TooFewControlPoints {
                direction: "v",
                count: columns,
                degree: v_degree,
            }
        );

        let u_knots = match u_knots {
            Some(knots) => KnotVector::try_new(knots)?,
            None => KnotVector::uniform_clamped(rows, u_degree),
        };
        let v_knots = match v_knots {
            Some(knots) => KnotVector::try_new(knots)?,
            None => KnotVector::uniform_clamped(columns, v_degree),
        };
        u_knots.validate(rows, u_degree, "u")?;
        v_knots.validate(columns, v_degree, "v")?;

        Ok(Self::from_parts(
            u_degree,
            v_degree,
            u_knots,
            v_knots,
            control_mesh,
        ))
    }

    /// Assemble a surface from already validated parts
    pub(crate) fn from_parts(
        u_degree: usize,
        v_degree: usize,
        u_knots: KnotVector<T>,
        v_knots: KnotVector<T>,
        control_mesh: ControlMesh<T>,
    ) -> Self {
        let bounding_box =
            BoundingBox::new_with_points(control_mesh.points().iter().flatten().cloned())
                .unwrap_or_else(BoundingBox::unit);
        Self {
            control_points: control_mesh.homogeneous(),
            is_rational: control_mesh.is_rational(),
            control_mesh,
            u_degree,
            v_degree,
            u_knots,
            v_knots,
            bounding_box,
            cache: EvaluationCache::new(),
        }
    }

    /// Rebuild a surface from its plain data form, validating it again
    pub fn try_from_data(data: NurbsSurfaceData<T>) -> anyhow::Result<Self> {
        let mesh = ControlMesh::try_new(data.control_points, Some(data.weights))?;
        Self::try_new(
            data.u_degree,
            data.v_degree,
            mesh,
            Some(data.u_knots),
            Some(data.v_knots),
        )
    }

    /// Convert the surface into its plain data form
    pub fn to_data(&self) -> NurbsSurfaceData<T> {
        NurbsSurfaceData {
            control_points: self.control_mesh.points().clone(),
            weights: self.control_mesh.weights().clone(),
            u_degree: self.u_degree,
            v_degree: self.v_degree,
            u_knots: self.u_knots.to_vec(),
            v_knots: self.v_knots.to_vec(),
        }
    }

    pub fn u_degree(&self) -> usize {
        self.u_degree
    }

    pub fn v_degree(&self) -> usize {
        self.v_degree
    }

    pub fn u_knots(&self) -> &KnotVector<T> {
        &self.u_knots
    }

    pub fn v_knots(&self) -> &KnotVector<T> {
        &self.v_knots
    }

    pub fn control_mesh(&self) -> &ControlMesh<T> {
        &self.control_mesh
    }

    /// Control points in homogeneous coordinates
    pub fn control_points(&self) -> &Vec<Vec<Point4<T>>> {
        &self.control_points
    }

    pub fn weights(&self) -> &Vec<Vec<T>> {
        self.control_mesh.weights()
    }

    /// `true` if any weight differs from 1
    pub fn is_rational(&self) -> bool {
        self.is_rational
    }

    /// Number of memoized evaluations
    pub fn cached_evaluations(&self) -> usize {
        self.cache.len()
    }

    /// Get the u domain of the knot vector by degree
    pub fn u_knots_domain(&self) -> (T, T) {
        self.u_knots.domain(self.u_degree)
    }

    /// Get the v domain of the knot vector by degree
    pub fn v_knots_domain(&self) -> (T, T) {
        self.v_knots.domain(self.v_degree)
    }

    /// Index of the last control point in each direction
    fn last_indices(&self) -> (usize, usize) {
        let (rows, columns) = self.control_mesh.dimensions();
        (rows - 1, columns - 1)
    }

    /// Evaluate the homogeneous point `(Σ w·P·N, Σ w·N)` at the given u, v parameters
    fn homogeneous_point(&self, u: T, v: T) -> Vector4<T> {
        let (n, m) = self.last_indices();
        let knot_span_index_u = self.u_knots.find_knot_span_index(n, self.u_degree, u);
        let knot_span_index_v = self.v_knots.find_knot_span_index(m, self.v_degree, v);
        let u_basis_vals = self
            .u_knots
            .basis_functions(knot_span_index_u, u, self.u_degree);
        let v_basis_vals = self
            .v_knots
            .basis_functions(knot_span_index_v, v, self.v_degree);
        let uind = knot_span_index_u - self.u_degree;

        let mut position = Vector4::zeros();
        for l in 0..=self.v_degree {
            let vind = knot_span_index_v - self.v_degree + l;

            // sample u isoline
            let mut temp = Vector4::zeros();
            for k in 0..=self.u_degree {
                temp += self.control_points[uind + k][vind].coords * u_basis_vals[k];
            }

            position += temp * v_basis_vals[l];
        }

        position
    }

    /// Evaluate the derivatives of the homogeneous surface at the given u, v parameters
    fn homogeneous_derivatives(&self, u: T, v: T, derivs: usize) -> Vec<Vec<Vector4<T>>> {
        let (n, m) = self.last_indices();
        let du = derivs.min(self.u_degree);
        let dv = derivs.min(self.v_degree);

        let mut skl = vec![vec![Vector4::zeros(); derivs + 1]; derivs + 1];
        let knot_span_index_u = self.u_knots.find_knot_span_index(n, self.u_degree, u);
        let knot_span_index_v = self.v_knots.find_knot_span_index(m, self.v_degree, v);
        let uders =
            self.u_knots
                .derivative_basis_functions(knot_span_index_u, u, self.u_degree, du);
        let vders =
            self.v_knots
                .derivative_basis_functions(knot_span_index_v, v, self.v_degree, dv);
        let mut temp = vec![Vector4::zeros(); self.v_degree + 1];

        for k in 0..=du {
            for (s, column) in temp.iter_mut().enumerate() {
                *column = Vector4::zeros();
                for r in 0..=self.u_degree {
                    *column += self.control_points[knot_span_index_u - self.u_degree + r]
                        [knot_span_index_v - self.v_degree + s]
                        .coords
                        * uders[k][r];
                }
            }

            let dd = (derivs - k).min(dv);
            for l in 0..=dd {
                for (s, column) in temp.iter().enumerate() {
                    skl[k][l] += column * vders[l][s];
                }
            }
        }

        skl
    }

    /// Evaluate the partial derivatives of the surface up to `derivs`
    /// Rational surfaces get the exact quotient-rule derivatives of `A(u, v) / w(u, v)`.
    fn evaluate_derivatives(&self, u: T, v: T, derivs: usize) -> DerivativeTable<T> {
        let u = self.u_knots.clamp(self.u_degree, u);
        let v = self.v_knots.clamp(self.v_degree, v);

        if derivs == 0 {
            let h = self.homogeneous_point(u, v);
            let mut position = h.xyz();
            if self.is_rational {
                position = dehomogenize(&h);
            }
            return vec![vec![position]];
        }

        let ders = self.homogeneous_derivatives(u, v, derivs);
        if self.is_rational {
            rational_derivatives(&ders, derivs)
        } else {
            ders.iter()
                .map(|row| row.iter().map(|d| d.xyz()).collect())
                .collect()
        }
    }

    /// Return a copy of the surface with every control point transformed by `transform`
    /// Weights and knot vectors are kept as they are.
    ///
    /// # Example
    /// ```
    /// use nalgebra::{Matrix4, Point3, Vector3};
    /// use parasurf::prelude::*;
    ///
    /// let plane = NurbsSurface::<f64>::try_plane(2., 2., 1, 1).unwrap();
    /// let moved = plane.transformed(&Matrix4::new_translation(&Vector3::new(0., 0., 3.)));
    /// let p = moved.try_point_at(0.5, 0.5).unwrap();
    /// assert_eq!(p, Point3::new(0., 0., 3.));
    /// ```
    pub fn transformed(&self, transform: &Matrix4<T>) -> Self {
        let control_mesh = self
            .control_mesh
            .map_points(|p| transform.transform_point(p));
        Self::from_parts(
            self.u_degree,
            self.v_degree,
            self.u_knots.clone(),
            self.v_knots.clone(),
            control_mesh,
        )
    }
}

impl<T: FloatingPoint> ParametricSurface<T> for NurbsSurface<T> {
    fn u_domain(&self) -> (T, T) {
        self.u_knots_domain()
    }

    fn v_domain(&self) -> (T, T) {
        self.v_knots_domain()
    }

    fn try_derivatives(&self, u: T, v: T, order: usize) -> anyhow::Result<DerivativeTable<T>> {
        self.ensure_parameter(u, v)?;
        self.cache
            .get_or_try_insert_with(EvaluationKey::new(u, v, order), || {
                Ok(self.evaluate_derivatives(u, v, order))
            })
    }

    fn bounding_box(&self) -> BoundingBox<T> {
        self.bounding_box.clone()
    }
}

/// Project a homogeneous point back to 3D
/// A vanishing weight sum leaves the numerator as it is.
fn dehomogenize<T: FloatingPoint>(h: &Vector4<T>) -> Vector3<T> {
    if h.w.abs() < T::from_f64(DEGENERACY_TOLERANCE).unwrap() {
        log::trace!("weight sum vanished, returning unnormalized point");
        h.xyz()
    } else {
        h.xyz() / h.w
    }
}

/// Compute the rational derivatives from the derivatives of the homogeneous surface
///
/// `S(k,l) = (A(k,l) - Σ C(k,i)C(l,j) w(i,j) S(k-i,l-j)) / w` over `(i, j) != (0, 0)`
fn rational_derivatives<T: FloatingPoint>(
    ders: &[Vec<Vector4<T>>],
    derivs: usize,
) -> DerivativeTable<T> {
    let w0 = ders[0][0].w;
    if w0.abs() < T::from_f64(DEGENERACY_TOLERANCE).unwrap() {
        log::trace!("weight sum vanished, returning unnormalized derivatives");
        return ders
            .iter()
            .map(|row| row.iter().map(|d| d.xyz()).collect())
            .collect();
    }

    let mut skl = vec![vec![Vector3::zeros(); derivs + 1]; derivs + 1];
    let mut binom = Binomial::<T>::new();

    for k in 0..=derivs {
        for l in 0..=(derivs - k) {
            let mut v = ders[k][l].xyz();
            for j in 1..=l {
                let coef = binom.get(l, j) * ders[0][j].w;
                v -= skl[k][l - j] * coef;
            }

            for i in 1..=k {
                let coef = binom.get(k, i) * ders[i][0].w;
                v -= skl[k - i][l] * coef;
                let mut v2 = Vector3::zeros();
                for j in 1..=l {
                    v2 += skl[k - i][l - j] * (binom.get(l, j) * ders[i][j].w);
                }
                v -= v2 * binom.get(k, i);
            }

            skl[k][l] = v / w0;
        }
    }

    skl
}

#[cfg(feature = "serde")]
impl<T: FloatingPoint + serde::Serialize> serde::Serialize for NurbsSurface<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_data().serialize(serializer)
    }
}

#[cfg(feature = "serde")]
impl<'de, T: FloatingPoint + serde::Deserialize<'de>> serde::Deserialize<'de> for NurbsSurface<T> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let data = NurbsSurfaceData::deserialize(deserializer)?;
        Self::try_from_data(data).map_err(serde::de::Error::custom)
    }
}
