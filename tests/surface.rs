use approx::assert_relative_eq;
use nalgebra::{Matrix4, Point3, Vector3};
use parasurf::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Bicubic 5x5 rational patch with varying heights and weights
fn patch() -> NurbsSurface<f64> {
    let points = (0..5)
        .map(|i| {
            (0..5)
                .map(|j| {
                    let (x, y) = (i as f64, j as f64);
                    Point3::new(x, y, ((i * 7 + j * 3) % 5) as f64 * 0.4)
                })
                .collect()
        })
        .collect();
    let weights = (0..5)
        .map(|i| (0..5).map(|j| 1. + ((i + 2 * j) % 3) as f64 * 0.5).collect())
        .collect();
    let mesh = ControlMesh::try_new(points, Some(weights)).unwrap();
    NurbsSurface::try_new(3, 3, mesh, None, None).unwrap()
}

#[test]
fn clamped_surface_interpolates_corners() {
    let surface = patch();
    let mesh = surface.control_mesh();
    assert_relative_eq!(surface.try_point_at(0., 0.).unwrap(), *mesh.point(0, 0));
    assert_relative_eq!(
        surface.try_point_at(1., 1.).unwrap(),
        *mesh.point(4, 4),
        epsilon = 1e-12
    );
}

#[test]
fn basis_functions_partition_unity() {
    let knots = KnotVector::new(vec![0., 0., 0., 0., 0.2, 0.5, 0.5, 0.8, 1., 1., 1., 1.]);
    let degree = 3;
    let n = knots.len() - degree - 2;
    let mut rng = StdRng::seed_from_u64(1);
    for _ in 0..50 {
        let u = rng.random::<f64>();
        let span = knots.find_knot_span_index(n, degree, u);
        let sum: f64 = knots.basis_functions(span, u, degree).iter().sum();
        assert_relative_eq!(sum, 1., epsilon = 1e-9);
    }
}

#[test]
fn unit_weights_match_polynomial_evaluation() {
    let points: Vec<Vec<_>> = (0..4)
        .map(|i| {
            (0..4)
                .map(|j| Point3::new(i as f64, j as f64, ((i + j) % 3) as f64))
                .collect()
        })
        .collect();
    let polynomial = NurbsSurface::try_new(
        2,
        2,
        ControlMesh::try_new(points.clone(), None).unwrap(),
        None,
        None,
    )
    .unwrap();
    let rational = NurbsSurface::try_new(
        2,
        2,
        ControlMesh::try_new(points, Some(vec![vec![1.; 4]; 4])).unwrap(),
        None,
        None,
    )
    .unwrap();

    let mut rng = StdRng::seed_from_u64(20);
    for _ in 0..20 {
        let (u, v) = (rng.random::<f64>(), rng.random::<f64>());
        assert_relative_eq!(
            rational.try_point_at(u, v).unwrap(),
            polynomial.try_point_at(u, v).unwrap(),
            epsilon = 1e-12
        );
    }
}

#[test]
fn knot_insertion_keeps_the_shape() {
    let surface = patch();
    let refined = surface.try_insert_knot(UVDirection::U, 0.37, 1).unwrap();
    assert_eq!(refined.control_mesh().dimensions(), (6, 5));

    let mut rng = StdRng::seed_from_u64(37);
    for _ in 0..20 {
        let (u, v) = (rng.random::<f64>(), rng.random::<f64>());
        assert_relative_eq!(
            surface.try_point_at(u, v).unwrap(),
            refined.try_point_at(u, v).unwrap(),
            epsilon = 1e-4
        );
    }
}

#[test]
fn bilinear_plane() {
    let points: Vec<Vec<Point3<f64>>> = vec![
        vec![Point3::new(-1., -1., 0.), Point3::new(-1., 1., 0.)],
        vec![Point3::new(1., -1., 0.), Point3::new(1., 1., 0.)],
    ];
    let mesh = ControlMesh::try_new(points, Some(vec![vec![1.; 2]; 2])).unwrap();
    let surface = NurbsSurface::try_new(
        1,
        1,
        mesh,
        Some(vec![0., 0., 1., 1.]),
        Some(vec![0., 0., 1., 1.]),
    )
    .unwrap();
    assert_relative_eq!(surface.try_point_at(0.5, 0.5).unwrap(), Point3::origin());
    let normal = surface.try_normal_at(0.5, 0.5).unwrap();
    assert_relative_eq!(normal.z.abs(), 1.);
    assert_relative_eq!(normal.xy().norm(), 0.);
}

#[test]
fn sphere_lies_on_its_radius() {
    let sphere = NurbsSurface::<f64>::try_sphere(1., 8, 6).unwrap();
    for row in sphere.regular_sample_points(8, 8).unwrap() {
        for p in row {
            assert_relative_eq!(p.coords.norm(), 1., epsilon = 1e-6);
        }
    }
}

#[test]
fn flat_function_surface() {
    let plane = FunctionSurface::try_new((0., 1.), (0., 1.), |u: f64, v: f64| Point3::new(u, v, 0.)).unwrap();
    for i in 0..=4 {
        for j in 0..=4 {
            let (u, v) = (i as f64 / 4., j as f64 / 4.);
            let curvature = plane.try_curvature_at(u, v).unwrap();
            assert_relative_eq!(curvature.gaussian(), 0., epsilon = 1e-6);
            assert_relative_eq!(curvature.mean(), 0., epsilon = 1e-6);
        }
    }
}

#[test]
fn function_and_nurbs_spheres_agree() {
    let nurbs = NurbsSurface::<f64>::try_sphere(2., 8, 6).unwrap();
    let function = FunctionSurface::try_new(
        (0., std::f64::consts::TAU),
        (-std::f64::consts::FRAC_PI_2, std::f64::consts::FRAC_PI_2),
        |u: f64, v: f64| Point3::new(2. * v.cos() * u.cos(), 2. * v.cos() * u.sin(), 2. * v.sin()),
    )
    .unwrap();

    let a = nurbs.try_curvature_at(0.3, 0.4).unwrap();
    let b = function.try_curvature_at(1.3, 0.2).unwrap();
    assert_relative_eq!(a.gaussian(), b.gaussian(), epsilon = 1e-4);
    assert_relative_eq!(a.mean().abs(), b.mean().abs(), epsilon = 1e-4);
}

#[test]
fn transform_keeps_weights() {
    let surface = patch();
    let transform = Matrix4::new_translation(&Vector3::new(1., -2., 3.));
    let moved = surface.transformed(&transform);
    assert_eq!(moved.weights(), surface.weights());
    assert_eq!(moved.u_knots(), surface.u_knots());
    let (u, v) = (0.42, 0.77);
    assert_relative_eq!(
        moved.try_point_at(u, v).unwrap(),
        surface.try_point_at(u, v).unwrap() + Vector3::new(1., -2., 3.),
        epsilon = 1e-12
    );
}

#[test]
fn errors_are_typed() {
    let surface = patch();
    let err = surface.try_point_at(1.5, 0.).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SurfaceError>(),
        Some(SurfaceError::OutOfDomain { .. })
    ));

    let ragged: Vec<Vec<Point3<f64>>> = vec![
        vec![Point3::origin(), Point3::origin()],
        vec![Point3::origin()],
    ];
    let err = ControlMesh::try_new(ragged, None).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SurfaceError>(),
        Some(SurfaceError::NonRectangularGrid { row: 1, .. })
    ));
}
