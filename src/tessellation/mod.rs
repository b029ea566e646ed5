pub mod adaptive_tessellation_node;
pub mod adaptive_tessellation_option;
pub mod adaptive_tessellation_processor;
pub mod surface_point;
pub mod surface_tessellation;

pub use adaptive_tessellation_node::*;
pub use adaptive_tessellation_option::*;
pub use adaptive_tessellation_processor::*;
pub use surface_point::*;
pub use surface_tessellation::*;

use crate::{
    misc::FloatingPoint,
    surface::{FunctionSurface, NurbsSurface, ParametricSurface, TrimmedSurface},
};

/// Grid resolution of the uniform tessellation used when no options are given
pub const DEFAULT_SEGMENTS: usize = 16;

/// A trait for tessellating a shape
pub trait Tessellation<Opt> {
    type Output;
    fn tessellate(&self, options: Opt) -> Self::Output;
}

/// `None` tessellates on a regular `DEFAULT_SEGMENTS x DEFAULT_SEGMENTS` grid,
/// `Some(options)` runs the adaptive tessellation.
fn tessellate_surface<T: FloatingPoint, S: ParametricSurface<T>>(
    surface: &S,
    options: Option<AdaptiveTessellationOptions<T>>,
) -> anyhow::Result<SurfaceTessellation<T>> {
    match options {
        None => SurfaceTessellation::try_uniform(surface, DEFAULT_SEGMENTS, DEFAULT_SEGMENTS),
        Some(options) => SurfaceTessellation::try_adaptive(surface, &options),
    }
}

impl<T: FloatingPoint> Tessellation<Option<AdaptiveTessellationOptions<T>>> for NurbsSurface<T> {
    type Output = anyhow::Result<SurfaceTessellation<T>>;

    /// Tessellate the surface
    /// # Example
    /// ```
    /// use parasurf::prelude::*;
    ///
    /// let torus = NurbsSurface::<f64>::try_torus(2., 0.5, 8, 6).unwrap();
    /// let mesh = torus.tessellate(None).unwrap();
    /// assert_eq!(mesh.vertex_count(), 17 * 17);
    /// let adaptive = torus.tessellate(Some(AdaptiveTessellationOptions::default())).unwrap();
    /// assert!(adaptive.triangle_count() > 0);
    /// ```
    fn tessellate(&self, options: Option<AdaptiveTessellationOptions<T>>) -> Self::Output {
        tessellate_surface(self, options)
    }
}

impl<T: FloatingPoint> Tessellation<Option<AdaptiveTessellationOptions<T>>>
    for FunctionSurface<T>
{
    type Output = anyhow::Result<SurfaceTessellation<T>>;

    fn tessellate(&self, options: Option<AdaptiveTessellationOptions<T>>) -> Self::Output {
        tessellate_surface(self, options)
    }
}

impl<T: FloatingPoint, S: ParametricSurface<T>> Tessellation<Option<AdaptiveTessellationOptions<T>>>
    for TrimmedSurface<T, S>
{
    type Output = anyhow::Result<SurfaceTessellation<T>>;

    fn tessellate(&self, options: Option<AdaptiveTessellationOptions<T>>) -> Self::Output {
        tessellate_surface(self, options)
    }
}
