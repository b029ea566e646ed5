use nalgebra::{Point3, Vector2, Vector3};

use crate::misc::FloatingPoint;

/// Surface point representation
/// containing evaluated data on a surface for the tessellators
#[derive(Clone, Debug, PartialEq)]
pub struct SurfacePoint<T: FloatingPoint> {
    pub uv: Vector2<T>,
    pub point: Point3<T>,
    pub normal: Vector3<T>,
    is_normal_degenerated: bool,
}

impl<T: FloatingPoint> SurfacePoint<T> {
    pub fn new(
        uv: Vector2<T>,
        point: Point3<T>,
        normal: Vector3<T>,
        is_normal_degenerated: bool,
    ) -> Self {
        Self {
            uv,
            point,
            normal,
            is_normal_degenerated,
        }
    }

    pub fn uv(&self) -> &Vector2<T> {
        &self.uv
    }

    pub fn point(&self) -> &Point3<T> {
        &self.point
    }

    pub fn normal(&self) -> &Vector3<T> {
        &self.normal
    }

    /// `true` if the normal is the fallback up vector because `S_u x S_v` vanished
    pub fn is_normal_degenerated(&self) -> bool {
        self.is_normal_degenerated
    }
}
