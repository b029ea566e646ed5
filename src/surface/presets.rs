use nalgebra::{Point2, Point3};

use crate::{
    misc::{as_f64, FloatingPoint, SurfaceError},
    surface::{ControlMesh, NurbsSurface},
};

/// Exact rational quadratic representation of a circular arc
/// split into `narcs` pieces of equal sweep.
struct Arc<T: FloatingPoint> {
    points: Vec<Point2<T>>,
    weights: Vec<T>,
    knots: Vec<T>,
}

impl<T: FloatingPoint> Arc<T> {
    /// Arc of the unit circle from `start` sweeping `sweep` radians
    fn new(start: T, sweep: T, narcs: usize) -> Self {
        let two = T::from_f64(2.0).unwrap();
        let n = T::from_usize(narcs).unwrap();
        let dtheta = sweep / n;
        let wm = (dtheta / two).cos();

        let mut points = Vec::with_capacity(2 * narcs + 1);
        let mut weights = Vec::with_capacity(2 * narcs + 1);
        for i in 0..narcs {
            let angle = start + dtheta * T::from_usize(i).unwrap();
            let mid = angle + dtheta / two;
            points.push(Point2::new(angle.cos(), angle.sin()));
            weights.push(T::one());
            // tangent lines of both ends meet here
            points.push(Point2::new(mid.cos() / wm, mid.sin() / wm));
            weights.push(wm);
        }
        let end = start + sweep;
        points.push(Point2::new(end.cos(), end.sin()));
        weights.push(T::one());

        let mut knots = vec![T::zero(); 3];
        for i in 1..narcs {
            let k = T::from_usize(i).unwrap() / n;
            knots.push(k);
            knots.push(k);
        }
        knots.extend([T::one(); 3]);

        Self {
            points,
            weights,
            knots,
        }
    }
}

impl<T: FloatingPoint> NurbsSurface<T> {
    /// Create a flat rectangle in the xy plane centered at the origin
    /// The surface is bilinear, `width_segments x height_segments` spans of control points.
    ///
    /// # Example
    /// ```
    /// use nalgebra::{Point3, Vector3};
    /// use parasurf::prelude::*;
    ///
    /// let plane = NurbsSurface::<f64>::try_plane(4., 2., 2, 1).unwrap();
    /// assert_eq!(plane.try_point_at(0., 0.).unwrap(), Point3::new(-2., -1., 0.));
    /// assert_eq!(plane.try_normal_at(0.3, 0.6).unwrap(), Vector3::z());
    /// ```
    pub fn try_plane(
        width: T,
        height: T,
        width_segments: usize,
        height_segments: usize,
    ) -> anyhow::Result<Self> {
        ensure_positive(width)?;
        ensure_positive(height)?;

        let half = T::from_f64(0.5).unwrap();
        let nu = width_segments.max(1);
        let nv = height_segments.max(1);
        let points = (0..=nu)
            .map(|i| {
                let x = width * (T::from_usize(i).unwrap() / T::from_usize(nu).unwrap() - half);
                (0..=nv)
                    .map(|j| {
                        let y = height
                            * (T::from_usize(j).unwrap() / T::from_usize(nv).unwrap() - half);
                        Point3::new(x, y, T::zero())
                    })
                    .collect()
            })
            .collect();

        let mesh = ControlMesh::try_new(points, None)?;
        Self::try_new(1, 1, mesh, None, None)
    }

    /// Create a sphere centered at the origin
    /// u revolves around the z axis, v runs from the south pole to the north pole.
    /// The sphere is exact: every evaluated point lies at `radius` from the origin.
    ///
    /// # Example
    /// ```
    /// use approx::assert_relative_eq;
    /// use parasurf::prelude::*;
    ///
    /// let sphere = NurbsSurface::<f64>::try_sphere(1., 8, 6).unwrap();
    /// let p = sphere.try_point_at(0.3, 0.7).unwrap();
    /// assert_relative_eq!(p.coords.norm(), 1., epsilon = 1e-10);
    /// ```
    pub fn try_sphere(
        radius: T,
        width_segments: usize,
        height_segments: usize,
    ) -> anyhow::Result<Self> {
        ensure_positive(radius)?;
        let half_pi = T::frac_pi_2();
        let arc = Arc::new(-half_pi, T::pi(), height_segments.max(2));
        let profile = arc
            .points
            .iter()
            .map(|p| Point2::new(p.x * radius, p.y * radius))
            .collect::<Vec<_>>();
        Self::try_revolve_profile(&profile, &arc.weights, arc.knots, width_segments.max(3))
    }

    /// Create a torus around the z axis centered at the origin
    /// `radius` is the distance from the center to the middle of the tube.
    ///
    /// # Example
    /// ```
    /// use approx::assert_relative_eq;
    /// use parasurf::prelude::*;
    ///
    /// let torus = NurbsSurface::<f64>::try_torus(2., 0.5, 8, 6).unwrap();
    /// let p = torus.try_point_at(0., 0.).unwrap();
    /// assert_relative_eq!(p.coords.norm(), 2.5, epsilon = 1e-10);
    /// ```
    pub fn try_torus(
        radius: T,
        tube: T,
        radial_segments: usize,
        tubular_segments: usize,
    ) -> anyhow::Result<Self> {
        ensure_positive(radius)?;
        ensure_positive(tube)?;

        let circle = Arc::new(T::zero(), T::two_pi(), tubular_segments.max(3));
        let profile = circle
            .points
            .iter()
            .map(|p| Point2::new(radius + p.x * tube, p.y * tube))
            .collect::<Vec<_>>();
        Self::try_revolve_profile(
            &profile,
            &circle.weights,
            circle.knots,
            radial_segments.max(3),
        )
    }

    /// Revolve a rational profile given in the (radial, z) plane a full turn around the z axis
    fn try_revolve_profile(
        profile: &[Point2<T>],
        profile_weights: &[T],
        profile_knots: Vec<T>,
        narcs: usize,
    ) -> anyhow::Result<Self> {
        let circle = Arc::new(T::zero(), T::two_pi(), narcs);

        let (points, weights): (Vec<Vec<_>>, Vec<Vec<_>>) = circle
            .points
            .iter()
            .zip(circle.weights.iter())
            .map(|(c, cw)| {
                profile
                    .iter()
                    .zip(profile_weights.iter())
                    .map(|(p, pw)| (Point3::new(p.x * c.x, p.x * c.y, p.y), *cw * *pw))
                    .unzip::<_, _, Vec<_>, Vec<_>>()
            })
            .unzip();

        let mesh = ControlMesh::try_new(points, Some(weights))?;
        Self::try_new(2, 2, mesh, Some(circle.knots), Some(profile_knots))
    }
}

fn ensure_positive<T: FloatingPoint>(value: T) -> anyhow::Result<()> {
    anyhow::ensure!(
        value > T::zero(),
        SurfaceError::InvalidDomain {
            min: 0.,
            max: as_f64(value),
        }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    use crate::surface::{NurbsSurface, ParametricSurface};

    #[test]
    fn plane_is_flat() {
        let plane = NurbsSurface::<f64>::try_plane(2., 3., 3, 2).unwrap();
        assert!(!plane.is_rational());
        assert_eq!(plane.control_mesh().dimensions(), (4, 3));
        assert_relative_eq!(
            plane.try_point_at(1., 1.).unwrap(),
            Point3::new(1., 1.5, 0.)
        );
        let curvature = plane.try_curvature_at(0.4, 0.2).unwrap();
        assert_relative_eq!(curvature.gaussian(), 0.);
        assert_relative_eq!(curvature.mean(), 0.);
    }

    #[test]
    fn sphere_points_on_radius() {
        let sphere = NurbsSurface::<f64>::try_sphere(1.5, 8, 6).unwrap();
        assert!(sphere.is_rational());
        for p in sphere.regular_sample_points(12, 12).unwrap().iter().flatten() {
            assert_relative_eq!(p.coords.norm(), 1.5, epsilon = 1e-9);
        }
        // poles
        assert_relative_eq!(
            sphere.try_point_at(0.2, 0.).unwrap(),
            Point3::new(0., 0., -1.5),
            epsilon = 1e-12
        );
        assert_relative_eq!(
            sphere.try_point_at(0.7, 1.).unwrap(),
            Point3::new(0., 0., 1.5),
            epsilon = 1e-12
        );
    }

    #[test]
    fn sphere_curvature() {
        let sphere = NurbsSurface::<f64>::try_sphere(2., 4, 4).unwrap();
        for (u, v) in [(0.1, 0.5), (0.33, 0.27), (0.8, 0.71)] {
            let curvature = sphere.try_curvature_at(u, v).unwrap();
            assert_relative_eq!(curvature.gaussian(), 0.25, epsilon = 1e-8);
            assert_relative_eq!(curvature.mean().abs(), 0.5, epsilon = 1e-8);
            // outward normal
            let p = sphere.try_point_at(u, v).unwrap();
            assert_relative_eq!(
                *curvature.normal(),
                p.coords.normalize(),
                epsilon = 1e-8
            );
        }
    }

    #[test]
    fn torus_points_on_tube() {
        let (radius, tube) = (3., 1.);
        let torus = NurbsSurface::<f64>::try_torus(radius, tube, 8, 6).unwrap();
        for p in torus.regular_sample_points(10, 10).unwrap().iter().flatten() {
            let ring = (p.x * p.x + p.y * p.y).sqrt() - radius;
            assert_relative_eq!((ring * ring + p.z * p.z).sqrt(), tube, epsilon = 1e-9);
        }
    }

    #[test]
    fn invalid_dimensions() {
        assert!(NurbsSurface::<f64>::try_plane(0., 1., 1, 1).is_err());
        assert!(NurbsSurface::<f64>::try_sphere(-1., 8, 6).is_err());
        assert!(NurbsSurface::<f64>::try_torus(1., 0., 8, 6).is_err());
    }
}
