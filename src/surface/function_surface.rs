use std::{fmt, rc::Rc};

use nalgebra::{Point3, Vector3};

use crate::{
    bounding_box::BoundingBox,
    misc::{as_f64, binomial, FloatingPoint, SurfaceError},
    surface::{DerivativeTable, EvaluationCache, EvaluationKey, ParametricSurface},
};

/// Finite difference step as a fraction of the domain extent
const STEP_RATIO: f64 = 1e-3;

/// Samples per direction used to estimate the bounding box
const BOUNDING_BOX_SAMPLES: usize = 10;

/// User supplied `(u, v) -> point` mapping
pub type SurfaceFunction<T> = dyn Fn(T, T) -> anyhow::Result<Point3<T>>;

/// Surface defined by an arbitrary function over a rectangular domain.
///
/// Derivatives are estimated with centered finite differences,
/// so the function only needs to be continuous (and smooth where curvature is queried).
#[derive(Clone)]
pub struct FunctionSurface<T: FloatingPoint> {
    function: Rc<SurfaceFunction<T>>,
    u_domain: (T, T),
    v_domain: (T, T),
    bounding_box: BoundingBox<T>,
    points: EvaluationCache<Point3<T>>,
    derivatives: EvaluationCache<DerivativeTable<T>>,
}

impl<T: FloatingPoint> FunctionSurface<T> {
    /// Create a surface from an infallible function
    /// # Example
    /// ```
    /// use approx::assert_relative_eq;
    /// use nalgebra::Point3;
    /// use parasurf::prelude::*;
    ///
    /// let saddle = FunctionSurface::try_new((-1., 1.), (-1., 1.), |u: f64, v: f64| Point3::new(u, v, u * u - v * v)).unwrap();
    /// let curvature = saddle.try_curvature_at(0., 0.).unwrap();
    /// assert_relative_eq!(curvature.gaussian(), -4., epsilon = 1e-5);
    /// ```
    pub fn try_new<F>(u_domain: (T, T), v_domain: (T, T), function: F) -> anyhow::Result<Self>
    where
        F: Fn(T, T) -> Point3<T> + 'static,
    {
        Self::try_new_fallible(u_domain, v_domain, move |u, v| Ok(function(u, v)))
    }

    /// Create a surface from a function that may fail for some parameters
    /// Failures are reported as [`SurfaceError::FunctionEvaluation`] by the evaluation calls.
    pub fn try_new_fallible<F>(
        u_domain: (T, T),
        v_domain: (T, T),
        function: F,
    ) -> anyhow::Result<Self>
    where
        F: Fn(T, T) -> anyhow::Result<Point3<T>> + 'static,
    {
        ensure_domain(u_domain)?;
        ensure_domain(v_domain)?;

        let mut surface = Self {
            function: Rc::new(function),
            u_domain,
            v_domain,
            bounding_box: BoundingBox::unit(),
            points: EvaluationCache::new(),
            derivatives: EvaluationCache::new(),
        };
        surface.bounding_box = surface.sample_bounding_box();
        Ok(surface)
    }

    /// Number of distinct evaluations currently cached
    pub fn cached_evaluations(&self) -> usize {
        self.points.len() + self.derivatives.len()
    }

    fn sample_bounding_box(&self) -> BoundingBox<T> {
        let n = BOUNDING_BOX_SAMPLES;
        let points = (0..=n)
            .flat_map(|i| (0..=n).map(move |j| (i, j)))
            .filter_map(|(i, j)| {
                let s = T::from_usize(i).unwrap() / T::from_usize(n).unwrap();
                let t = T::from_usize(j).unwrap() / T::from_usize(n).unwrap();
                let (u, v) = self.denormalize(s, t);
                self.evaluate(u, v).ok()
            })
            .collect::<Vec<_>>();
        BoundingBox::new_with_points(points).unwrap_or_else(|| {
            log::debug!("no sample of the function succeeded, using the unit bounding box");
            BoundingBox::unit()
        })
    }

    /// Call the function through the point cache, without the domain check
    fn evaluate(&self, u: T, v: T) -> anyhow::Result<Point3<T>> {
        self.points
            .get_or_try_insert_with(EvaluationKey::new(u, v, 0), || {
                (self.function)(u, v).map_err(|e| {
                    e.context(SurfaceError::FunctionEvaluation {
                        u: as_f64(u),
                        v: as_f64(v),
                    })
                })
            })
    }

    /// Estimate `∂^(uo+vo)S / ∂u^uo ∂v^vo` with a centered binomial stencil.
    /// Samples sit at `(uo - 2i)·du, (vo - 2j)·dv` around a centre that is
    /// moved inward near the boundary so every sample stays inside the domain.
    fn finite_difference(&self, u: T, v: T, uo: usize, vo: usize) -> anyhow::Result<Vector3<T>> {
        let step = T::from_f64(STEP_RATIO).unwrap();
        let two = T::from_f64(2.0).unwrap();
        let du = (self.u_domain.1 - self.u_domain.0) * step;
        let dv = (self.v_domain.1 - self.v_domain.0) * step;
        let cu = stencil_centre(u, self.u_domain, du * T::from_usize(uo).unwrap());
        let cv = stencil_centre(v, self.v_domain, dv * T::from_usize(vo).unwrap());

        let mut sum = Vector3::zeros();
        for i in 0..=uo {
            let su = cu + du * T::from_i64(uo as i64 - 2 * i as i64).unwrap();
            for j in 0..=vo {
                let sv = cv + dv * T::from_i64(vo as i64 - 2 * j as i64).unwrap();
                let coefficient = T::from_f64(binomial(uo, i) * binomial(vo, j)).unwrap();
                let sign = if (i + j) % 2 == 0 { T::one() } else { -T::one() };
                let p = self.evaluate(
                    clamp(su, self.u_domain),
                    clamp(sv, self.v_domain),
                )?;
                sum += p.coords * (sign * coefficient);
            }
        }

        let denominator = (two * du).powi(uo as i32) * (two * dv).powi(vo as i32);
        Ok(sum / denominator)
    }
}

impl<T: FloatingPoint> ParametricSurface<T> for FunctionSurface<T> {
    fn u_domain(&self) -> (T, T) {
        self.u_domain
    }

    fn v_domain(&self) -> (T, T) {
        self.v_domain
    }

    fn try_point_at(&self, u: T, v: T) -> anyhow::Result<Point3<T>> {
        self.ensure_parameter(u, v)?;
        self.evaluate(u, v)
    }

    fn try_derivatives(&self, u: T, v: T, order: usize) -> anyhow::Result<DerivativeTable<T>> {
        self.ensure_parameter(u, v)?;
        let u = clamp(u, self.u_domain);
        let v = clamp(v, self.v_domain);
        self.derivatives
            .get_or_try_insert_with(EvaluationKey::new(u, v, order), || {
                let mut ders = vec![vec![Vector3::zeros(); order + 1]; order + 1];
                ders[0][0] = self.evaluate(u, v)?.coords;
                for k in 0..=order {
                    for l in 0..=(order - k) {
                        if k + l > 0 {
                            ders[k][l] = self.finite_difference(u, v, k, l)?;
                        }
                    }
                }
                Ok(ders)
            })
    }

    fn bounding_box(&self) -> BoundingBox<T> {
        self.bounding_box.clone()
    }
}

impl<T: FloatingPoint> fmt::Debug for FunctionSurface<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionSurface")
            .field("u_domain", &self.u_domain)
            .field("v_domain", &self.v_domain)
            .field("bounding_box", &self.bounding_box)
            .finish_non_exhaustive()
    }
}

/// The defining function has no data form, so serialization always fails.
#[cfg(feature = "serde")]
impl<T: FloatingPoint> serde::Serialize for FunctionSurface<T> {
    fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
        Err(serde::ser::Error::custom(SurfaceError::Unserializable(
            "FunctionSurface",
        )))
    }
}

fn ensure_domain<T: FloatingPoint>((min, max): (T, T)) -> anyhow::Result<()> {
    anyhow::ensure!(
        min.is_finite() && max.is_finite() && min < max,
        SurfaceError::InvalidDomain {
            min: as_f64(min),
            max: as_f64(max),
        }
    );
    Ok(())
}

fn clamp<T: FloatingPoint>(value: T, (min, max): (T, T)) -> T {
    value.clamp(min, max)
}

/// Move `value` so that `value ± reach` stays inside the domain
fn stencil_centre<T: FloatingPoint>(value: T, (min, max): (T, T), reach: T) -> T {
    if min + reach > max - reach {
        (min + max) / T::from_f64(2.0).unwrap()
    } else {
        value.clamp(min + reach, max - reach)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Vector3};

    use super::FunctionSurface;
    use crate::{misc::SurfaceError, surface::ParametricSurface};

    fn sphere(radius: f64) -> FunctionSurface<f64> {
        use std::f64::consts::{FRAC_PI_2, PI};
        FunctionSurface::try_new((0., 2. * PI), (-FRAC_PI_2, FRAC_PI_2), move |u: f64, v: f64| {
            Point3::new(
                radius * v.cos() * u.cos(),
                radius * v.cos() * u.sin(),
                radius * v.sin(),
            )
        })
        .unwrap()
    }

    #[test]
    fn flat_plane_has_no_curvature() {
        let plane = FunctionSurface::try_new((0., 1.), (0., 1.), |u: f64, v: f64| Point3::new(u, v, 0.)).unwrap();
        for (u, v) in [(0., 0.), (0.5, 0.5), (1., 0.3), (0.2, 1.)] {
            let curvature = plane.try_curvature_at(u, v).unwrap();
            assert_relative_eq!(curvature.gaussian(), 0., epsilon = 1e-6);
            assert_relative_eq!(curvature.mean(), 0., epsilon = 1e-6);
            assert_relative_eq!(*curvature.normal(), Vector3::z(), epsilon = 1e-9);
        }
    }

    #[test]
    fn first_derivatives() {
        let surface = FunctionSurface::try_new((0., 2.), (0., 3.), |u: f64, v: f64| {
            Point3::new(u * v, u + v * v, u.sin())
        })
        .unwrap();
        let ders = surface.try_derivatives(0.7, 1.2, 1).unwrap();
        assert_relative_eq!(ders[0][0], Vector3::new(0.84, 2.14, 0.7_f64.sin()), epsilon = 1e-12);
        assert_relative_eq!(ders[1][0], Vector3::new(1.2, 1., 0.7_f64.cos()), epsilon = 1e-5);
        assert_relative_eq!(ders[0][1], Vector3::new(0.7, 2.4, 0.), epsilon = 1e-5);
    }

    #[test]
    fn derivatives_at_the_boundary() {
        let surface =
            FunctionSurface::try_new((0., 1.), (0., 1.), |u: f64, v: f64| Point3::new(u, v, u * u * v)).unwrap();
        let ders = surface.try_derivatives(1., 0., 2).unwrap();
        assert_relative_eq!(ders[1][0], Vector3::new(1., 0., 0.), epsilon = 1e-4);
        assert_relative_eq!(ders[0][1], Vector3::new(0., 1., 1.), epsilon = 1e-4);
        assert_relative_eq!(ders[2][0], Vector3::new(0., 0., 0.), epsilon = 1e-4);
        // mixed stencil is centred one step inside both boundaries
        assert_relative_eq!(ders[1][1], Vector3::new(0., 0., 2.), epsilon = 1e-2);
    }

    #[test]
    fn paraboloid_curvature() {
        let paraboloid = FunctionSurface::try_new((-1., 1.), (-1., 1.), |u: f64, v: f64| {
            Point3::new(u, v, u * u + v * v)
        })
        .unwrap();
        let curvature = paraboloid.try_curvature_at(0., 0.).unwrap();
        assert_relative_eq!(curvature.gaussian(), 4., epsilon = 1e-5);
        assert_relative_eq!(curvature.mean().abs(), 2., epsilon = 1e-5);
        let (k1, k2) = curvature.principal();
        assert_relative_eq!(k1.abs(), 2., epsilon = 1e-3);
        assert_relative_eq!(k2.abs(), 2., epsilon = 1e-3);
    }

    #[test]
    fn sphere_curvature() {
        let surface = sphere(2.);
        let curvature = surface.try_curvature_at(1., 0.4).unwrap();
        assert_relative_eq!(curvature.gaussian(), 0.25, epsilon = 1e-4);
        assert_relative_eq!(curvature.mean().abs(), 0.5, epsilon = 1e-4);
    }

    #[test]
    fn sampled_bounding_box() {
        let surface = sphere(1.);
        let bb = surface.bounding_box();
        assert_relative_eq!(bb.min(), &Vector3::new(-1., -1., -1.), epsilon = 0.1);
        assert_relative_eq!(bb.max(), &Vector3::new(1., 1., 1.), epsilon = 0.1);
    }

    #[test]
    fn domain_errors() {
        let surface = sphere(1.);
        let err = surface.try_point_at(-0.1, 0.).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SurfaceError>(),
            Some(SurfaceError::OutOfDomain { .. })
        ));
        assert!(surface.try_derivatives(1., 2., 1).is_err());

        let err = FunctionSurface::try_new((1., 1.), (0., 1.), |u: f64, v: f64| Point3::new(u, v, 0.)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SurfaceError>(),
            Some(SurfaceError::InvalidDomain { .. })
        ));
    }

    #[test]
    fn function_failures() {
        let surface = FunctionSurface::try_new_fallible((0., 1.), (0., 1.), |u: f64, v: f64| {
            anyhow::ensure!(u < 0.5, "undefined for u >= 0.5");
            Ok(Point3::new(u, v, 0.))
        })
        .unwrap();
        assert!(surface.try_point_at(0.2, 0.2).is_ok());
        let err = surface.try_point_at(0.7, 0.2).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SurfaceError>(),
            Some(SurfaceError::FunctionEvaluation { .. })
        ));

        let never = FunctionSurface::try_new_fallible((0., 1.), (0., 1.), |_: f64, _| {
            anyhow::bail!("never defined")
        })
        .unwrap();
        assert_eq!(never.bounding_box(), crate::bounding_box::BoundingBox::unit());
    }

    #[test]
    fn clones_start_with_empty_cache() {
        let surface = sphere(1.);
        surface.try_derivatives(0.5, 0.5, 2).unwrap();
        assert!(surface.cached_evaluations() > 0);
        let cloned = surface.clone();
        assert_eq!(cloned.cached_evaluations(), 0);
        assert_relative_eq!(
            cloned.try_point_at(0.5, 0.5).unwrap(),
            surface.try_point_at(0.5, 0.5).unwrap()
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serialization_fails() {
        let surface = sphere(1.);
        let err = serde_json::to_string(&surface).unwrap_err();
        assert!(err.to_string().contains("FunctionSurface"));
    }
}
