use nalgebra::Vector3;

use crate::misc::{FloatingPoint, DEGENERACY_TOLERANCE};

/// Compute the unit normal `S_u x S_v / |S_u x S_v|`
/// Returns `None` when the cross product vanishes (e.g. at a pole of a sphere).
/// The test is relative to the longer tangent, so it does not depend on the scale of the surface.
pub fn surface_normal<T: FloatingPoint>(du: &Vector3<T>, dv: &Vector3<T>) -> Option<Vector3<T>> {
    let n = du.cross(dv);
    let len = n.norm();
    let scale = du.norm_squared().max(dv.norm_squared());
    if len <= scale * T::from_f64(DEGENERACY_TOLERANCE).unwrap() {
        None
    } else {
        Some(n / len)
    }
}

/// First and second fundamental forms at a surface point
///
/// `e`, `f`, `g` hold the first form (`S_u·S_u`, `S_u·S_v`, `S_v·S_v`),
/// `l`, `m`, `n` the second form (`S_uu·N`, `S_uv·N`, `S_vv·N`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FundamentalForms<T> {
    pub e: T,
    pub f: T,
    pub g: T,
    pub l: T,
    pub m: T,
    pub n: T,
}

impl<T: FloatingPoint> FundamentalForms<T> {
    pub fn new(
        du: &Vector3<T>,
        dv: &Vector3<T>,
        duu: &Vector3<T>,
        duv: &Vector3<T>,
        dvv: &Vector3<T>,
        normal: &Vector3<T>,
    ) -> Self {
        Self {
            e: du.dot(du),
            f: du.dot(dv),
            g: dv.dot(dv),
            l: duu.dot(normal),
            m: duv.dot(normal),
            n: dvv.dot(normal),
        }
    }

    /// Determinant of the first fundamental form `EG - F^2`
    pub fn first_determinant(&self) -> T {
        self.e * self.g - self.f * self.f
    }

    /// `true` if `EG - F^2` vanishes relative to `EG`
    pub fn is_singular(&self) -> bool {
        self.first_determinant().abs()
            <= self.e * self.g * T::from_f64(DEGENERACY_TOLERANCE).unwrap()
    }

    /// Gaussian curvature `(eg - f^2) / (EG - F^2)`, zero on a degenerate parametrization
    pub fn gaussian_curvature(&self) -> T {
        if self.is_singular() {
            return T::zero();
        }
        (self.l * self.n - self.m * self.m) / self.first_determinant()
    }

    /// Mean curvature `(eG - 2fF + gE) / 2(EG - F^2)`, zero on a degenerate parametrization
    pub fn mean_curvature(&self) -> T {
        if self.is_singular() {
            return T::zero();
        }
        let two = T::from_f64(2.0).unwrap();
        (self.l * self.g - two * self.m * self.f + self.n * self.e) / (two * self.first_determinant())
    }
}

/// Curvature measures of a surface at a point
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceCurvature<T: FloatingPoint> {
    normal: Vector3<T>,
    gaussian: T,
    mean: T,
}

impl<T: FloatingPoint> SurfaceCurvature<T> {
    /// Compute curvature from a partial derivative table
    /// where `ders[k][l]` is `∂^(k+l)S / ∂u^k ∂v^l` and `k + l <= 2`
    ///
    /// Returns `None` if the normal is degenerate.
    pub fn from_derivatives(ders: &[Vec<Vector3<T>>]) -> Option<Self> {
        let du = &ders[1][0];
        let dv = &ders[0][1];
        let normal = surface_normal(du, dv)?;
        let forms = FundamentalForms::new(du, dv, &ders[2][0], &ders[1][1], &ders[0][2], &normal);
        if forms.is_singular() {
            log::trace!("singular first fundamental form, curvature set to zero");
        }
        Some(Self {
            normal,
            gaussian: forms.gaussian_curvature(),
            mean: forms.mean_curvature(),
        })
    }

    pub fn normal(&self) -> &Vector3<T> {
        &self.normal
    }

    /// Gaussian curvature K
    pub fn gaussian(&self) -> T {
        self.gaussian
    }

    /// Mean curvature H
    pub fn mean(&self) -> T {
        self.mean
    }

    /// Principal curvatures `H ± sqrt(max(0, H^2 - K))`, larger first
    pub fn principal(&self) -> (T, T) {
        let disc = (self.mean * self.mean - self.gaussian).max(T::zero()).sqrt();
        (self.mean + disc, self.mean - disc)
    }

    /// `max(|K|, |H|)`, the refinement signal of the adaptive tessellator
    pub fn magnitude(&self) -> T {
        self.gaussian.abs().max(self.mean.abs())
    }
}
