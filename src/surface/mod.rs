pub mod control_mesh;
pub mod evaluation_cache;
pub mod function_surface;
pub mod knot_insertion;
pub mod nurbs_surface;
pub mod presets;
pub mod trimmed_surface;

pub use control_mesh::*;
pub use evaluation_cache::*;
pub use function_surface::*;
pub use nurbs_surface::*;
pub use trimmed_surface::*;

use nalgebra::{Point3, Vector2, Vector3};

use crate::{
    bounding_box::BoundingBox,
    misc::{as_f64, surface_normal, FloatingPoint, SurfaceCurvature, SurfaceError},
    tessellation::SurfacePoint,
};

/// Parametric direction of a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UVDirection {
    U,
    V,
}

/// Evaluation capability shared by every surface kind.
///
/// Implementors provide the parameter domain and a table of partial derivatives;
/// normals, curvature and sampling are derived from those.
pub trait ParametricSurface<T: FloatingPoint> {
    /// Parameter range in u direction
    fn u_domain(&self) -> (T, T);

    /// Parameter range in v direction
    fn v_domain(&self) -> (T, T);

    /// Evaluate the partial derivatives at the given u, v parameters
    /// Returns a table `ders` of size `(order + 1) x (order + 1)`
    /// where `ders[k][l]` is `∂^(k+l)S / ∂u^k ∂v^l` for `k + l <= order`,
    /// `ders[0][0]` being the position itself.
    fn try_derivatives(&self, u: T, v: T, order: usize) -> anyhow::Result<Vec<Vec<Vector3<T>>>>;

    /// Bounding box enclosing the surface
    fn bounding_box(&self) -> BoundingBox<T>;

    /// Evaluate the surface at the given u, v parameters to get a point
    fn try_point_at(&self, u: T, v: T) -> anyhow::Result<Point3<T>> {
        let ders = self.try_derivatives(u, v, 0)?;
        Ok(ders[0][0].into())
    }

    /// Check if the parameter lies inside the domain
    fn contains_parameter(&self, u: T, v: T) -> bool {
        let (u0, u1) = self.u_domain();
        let (v0, v1) = self.v_domain();
        let eps = T::default_epsilon();
        u >= u0 - eps && u <= u1 + eps && v >= v0 - eps && v <= v1 + eps
    }

    /// Fail with [`SurfaceError::OutOfDomain`] if the parameter lies outside the domain
    fn ensure_parameter(&self, u: T, v: T) -> anyhow::Result<()> {
        if self.contains_parameter(u, v) {
            return Ok(());
        }
        let (u0, u1) = self.u_domain();
        let (v0, v1) = self.v_domain();
        anyhow::bail!(SurfaceError::OutOfDomain {
            u: as_f64(u),
            v: as_f64(v),
            u_min: as_f64(u0),
            u_max: as_f64(u1),
            v_min: as_f64(v0),
            v_max: as_f64(v1),
        })
    }

    /// Map a normalized parameter in `[0, 1]^2` into the domain
    fn denormalize(&self, s: T, t: T) -> (T, T) {
        let (u0, u1) = self.u_domain();
        let (v0, v1) = self.v_domain();
        (u0 + (u1 - u0) * s, v0 + (v1 - v0) * t)
    }

    /// Evaluate position and unit normal at the given u, v parameters
    /// A vanishing `S_u x S_v` falls back to the +z axis and flags the point as degenerated.
    fn try_surface_point(&self, u: T, v: T) -> anyhow::Result<SurfacePoint<T>> {
        let ders = self.try_derivatives(u, v, 1)?;
        let point = ders[0][0].into();
        let uv = Vector2::new(u, v);
        Ok(match surface_normal(&ders[1][0], &ders[0][1]) {
            Some(normal) => SurfacePoint::new(uv, point, normal, false),
            None => {
                log::trace!(
                    "degenerate normal at ({}, {}), falling back to up vector",
                    as_f64(u),
                    as_f64(v)
                );
                SurfacePoint::new(uv, point, Vector3::z(), true)
            }
        })
    }

    /// Evaluate the unit normal at the given u, v parameters
    fn try_normal_at(&self, u: T, v: T) -> anyhow::Result<Vector3<T>> {
        Ok(self.try_surface_point(u, v)?.normal)
    }

    /// Evaluate Gaussian, mean and principal curvatures at the given u, v parameters
    /// Fails with [`SurfaceError::DegenerateNormal`] where no normal exists.
    fn try_curvature_at(&self, u: T, v: T) -> anyhow::Result<SurfaceCurvature<T>> {
        let ders = self.try_derivatives(u, v, 2)?;
        SurfaceCurvature::from_derivatives(&ders).ok_or_else(|| {
            SurfaceError::DegenerateNormal {
                u: as_f64(u),
                v: as_f64(v),
            }
            .into()
        })
    }

    /// Evaluate a regularly spaced `(divs_u + 1) x (divs_v + 1)` grid of points
    /// indexed `[j][i]`: the outer index steps along v and each row runs along u.
    fn regular_sample_points(
        &self,
        divs_u: usize,
        divs_v: usize,
    ) -> anyhow::Result<Vec<Vec<Point3<T>>>> {
        let divs_u = divs_u.max(1);
        let divs_v = divs_v.max(1);
        (0..=divs_v)
            .map(|j| {
                let t = T::from_usize(j).unwrap() / T::from_usize(divs_v).unwrap();
                (0..=divs_u)
                    .map(|i| {
                        let s = T::from_usize(i).unwrap() / T::from_usize(divs_u).unwrap();
                        let (u, v) = self.denormalize(s, t);
                        self.try_point_at(u, v)
                    })
                    .collect()
            })
            .collect()
    }
}

impl<T: FloatingPoint, S: ParametricSurface<T> + ?Sized> ParametricSurface<T> for &S {
    fn u_domain(&self) -> (T, T) {
        (**self).u_domain()
    }

    fn v_domain(&self) -> (T, T) {
        (**self).v_domain()
    }

    fn try_derivatives(&self, u: T, v: T, order: usize) -> anyhow::Result<Vec<Vec<Vector3<T>>>> {
        (**self).try_derivatives(u, v, order)
    }

    fn bounding_box(&self) -> BoundingBox<T> {
        (**self).bounding_box()
    }

    fn try_point_at(&self, u: T, v: T) -> anyhow::Result<Point3<T>> {
        (**self).try_point_at(u, v)
    }
}
