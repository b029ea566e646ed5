use nalgebra::Point3;

use crate::{
    bounding_box::BoundingBox,
    misc::{as_f64, FloatingPoint, SurfaceError},
    surface::{DerivativeTable, NurbsSurface, ParametricSurface},
};

/// A rectangular piece of a base surface.
/// `[0, 1]^2` is linearly mapped onto `u_range x v_range` of the base domain
/// and every query is delegated to the base surface.
#[derive(Debug, Clone)]
pub struct TrimmedSurface<T: FloatingPoint, S: ParametricSurface<T>> {
    base: S,
    u_range: (T, T),
    v_range: (T, T),
}

impl<T: FloatingPoint, S: ParametricSurface<T>> TrimmedSurface<T, S> {
    /// Create a trimmed view of `base`
    /// # Failures
    /// - if a range is empty or reversed
    /// - if a range reaches outside the base domain
    pub fn try_new(base: S, u_range: (T, T), v_range: (T, T)) -> anyhow::Result<Self> {
        ensure_range(u_range, base.u_domain())?;
        ensure_range(v_range, base.v_domain())?;
        Ok(Self {
            base,
            u_range,
            v_range,
        })
    }

    pub fn base(&self) -> &S {
        &self.base
    }

    pub fn u_range(&self) -> (T, T) {
        self.u_range
    }

    pub fn v_range(&self) -> (T, T) {
        self.v_range
    }

    /// Map a parameter of the trimmed surface into the base domain
    pub fn to_base_parameter(&self, u: T, v: T) -> (T, T) {
        (
            self.u_range.0 + (self.u_range.1 - self.u_range.0) * u,
            self.v_range.0 + (self.v_range.1 - self.v_range.0) * v,
        )
    }
}

impl<T: FloatingPoint, S: ParametricSurface<T>> ParametricSurface<T> for TrimmedSurface<T, S> {
    fn u_domain(&self) -> (T, T) {
        (T::zero(), T::one())
    }

    fn v_domain(&self) -> (T, T) {
        (T::zero(), T::one())
    }

    fn try_point_at(&self, u: T, v: T) -> anyhow::Result<Point3<T>> {
        self.ensure_parameter(u, v)?;
        let (bu, bv) = self.to_base_parameter(u, v);
        self.base.try_point_at(bu, bv)
    }

    /// Base derivatives scaled by the chain rule, `(Δu)^k (Δv)^l`
    fn try_derivatives(&self, u: T, v: T, order: usize) -> anyhow::Result<DerivativeTable<T>> {
        self.ensure_parameter(u, v)?;
        let (bu, bv) = self.to_base_parameter(u, v);
        let mut ders = self.base.try_derivatives(bu, bv, order)?;

        let su = self.u_range.1 - self.u_range.0;
        let sv = self.v_range.1 - self.v_range.0;
        for (k, row) in ders.iter_mut().enumerate() {
            for (l, d) in row.iter_mut().enumerate() {
                *d *= su.powi(k as i32) * sv.powi(l as i32);
            }
        }
        Ok(ders)
    }

    /// The base surface bounding box, an upper bound of the trimmed piece
    fn bounding_box(&self) -> BoundingBox<T> {
        self.base.bounding_box()
    }
}

impl<T: FloatingPoint> NurbsSurface<T> {
    /// Trim the surface to a sub-rectangle of its domain without touching the control points
    ///
    /// # Example
    /// ```
    /// use approx::assert_relative_eq;
    /// use parasurf::prelude::*;
    ///
    /// let sphere = NurbsSurface::<f64>::try_sphere(1., 8, 6).unwrap();
    /// let patch = sphere.try_trim((0., 0.25), (0.5, 1.)).unwrap();
    /// assert_relative_eq!(
    ///     patch.try_point_at(1., 0.5).unwrap(),
    ///     sphere.try_point_at(0.25, 0.75).unwrap()
    /// );
    /// ```
    pub fn try_trim(
        &self,
        u_range: (T, T),
        v_range: (T, T),
    ) -> anyhow::Result<TrimmedSurface<T, &Self>> {
        TrimmedSurface::try_new(self, u_range, v_range)
    }
}

fn ensure_range<T: FloatingPoint>((min, max): (T, T), (lo, hi): (T, T)) -> anyhow::Result<()> {
    let eps = T::default_epsilon();
    anyhow::ensure!(
        min < max && min >= lo - eps && max <= hi + eps,
        SurfaceError::InvalidDomain {
            min: as_f64(min),
            max: as_f64(max),
        }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    use super::TrimmedSurface;
    use crate::{
        misc::SurfaceError,
        surface::{FunctionSurface, NurbsSurface, ParametricSurface},
    };

    #[test]
    fn delegates_to_base() {
        let sphere = NurbsSurface::<f64>::try_sphere(2., 8, 6).unwrap();
        let patch = sphere.try_trim((0.25, 0.75), (0.1, 0.6)).unwrap();
        for (u, v) in [(0., 0.), (0.5, 0.5), (1., 1.), (0.3, 0.8)] {
            let (bu, bv) = patch.to_base_parameter(u, v);
            assert_relative_eq!(
                patch.try_point_at(u, v).unwrap(),
                sphere.try_point_at(bu, bv).unwrap(),
                epsilon = 1e-12
            );
            assert_relative_eq!(
                patch.try_normal_at(u, v).unwrap(),
                sphere.try_normal_at(bu, bv).unwrap(),
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn curvature_is_invariant_under_reparametrization() {
        let sphere = NurbsSurface::<f64>::try_sphere(2., 8, 6).unwrap();
        let patch = sphere.try_trim((0.1, 0.4), (0.3, 0.7)).unwrap();
        let curvature = patch.try_curvature_at(0.5, 0.5).unwrap();
        let (bu, bv) = patch.to_base_parameter(0.5, 0.5);
        let expected = sphere.try_curvature_at(bu, bv).unwrap();
        assert_relative_eq!(curvature.gaussian(), expected.gaussian(), epsilon = 1e-8);
        assert_relative_eq!(curvature.mean(), expected.mean(), epsilon = 1e-8);
    }

    #[test]
    fn scaled_derivatives() {
        let surface =
            FunctionSurface::try_new((0., 4.), (0., 2.), |u: f64, v: f64| Point3::new(u, v, u * v)).unwrap();
        let trimmed = TrimmedSurface::try_new(&surface, (1., 3.), (0.5, 1.)).unwrap();
        let ders = trimmed.try_derivatives(0.5, 0.5, 1).unwrap();
        // base parameter (2, 0.75), ranges of 2 and 0.5
        assert_relative_eq!(ders[0][0], Point3::new(2., 0.75, 1.5).coords, epsilon = 1e-12);
        assert_relative_eq!(ders[1][0], Point3::new(2., 0., 1.5).coords, epsilon = 1e-6);
        assert_relative_eq!(ders[0][1], Point3::new(0., 0.5, 1.).coords, epsilon = 1e-6);
    }

    #[test]
    fn invalid_ranges() {
        let plane = NurbsSurface::<f64>::try_plane(1., 1., 1, 1).unwrap();
        for (u_range, v_range) in [((0.5, 0.5), (0., 1.)), ((0., 1.), (0.8, 0.2)), ((-0.5, 1.), (0., 1.))] {
            let err = plane.try_trim(u_range, v_range).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<SurfaceError>(),
                Some(SurfaceError::InvalidDomain { .. })
            ));
        }
        let patch = plane.try_trim((0., 0.5), (0., 0.5)).unwrap();
        assert!(patch.try_point_at(1.5, 0.).is_err());
    }
}
