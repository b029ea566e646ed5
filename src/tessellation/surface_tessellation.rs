use std::collections::HashMap;

use nalgebra::{Point3, Vector2, Vector3};
use simba::scalar::SupersetOf;

use crate::{
    misc::FloatingPoint,
    surface::{evaluation_cache::quantize, ParametricSurface},
};

use super::{
    adaptive_tessellation_node::AdaptiveTessellationNode,
    adaptive_tessellation_option::AdaptiveTessellationOptions,
    adaptive_tessellation_processor::AdaptiveTessellationProcessor,
};

/// Surface tessellation representation
/// Flat vertex buffers ready to be uploaded: `positions` and `normals` hold 3 scalars
/// per vertex, `uvs` holds the normalized parameter (2 scalars per vertex)
/// and `indices` 3 vertex indices per triangle.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SurfaceTessellation<T: FloatingPoint> {
    positions: Vec<T>,
    normals: Vec<T>,
    uvs: Vec<T>,
    indices: Vec<u32>,
}

impl<T: FloatingPoint> Default for SurfaceTessellation<T> {
    fn default() -> Self {
        Self {
            positions: vec![],
            normals: vec![],
            uvs: vec![],
            indices: vec![],
        }
    }
}

impl<T: FloatingPoint> SurfaceTessellation<T> {
    /// Tessellate the surface on a regular grid of `u_segments x v_segments` quads
    /// Vertex `(i, j)` lands at index `j * (u_segments + 1) + i`.
    ///
    /// # Example
    /// ```
    /// use parasurf::prelude::*;
    ///
    /// let sphere = NurbsSurface::<f64>::try_sphere(1., 8, 6).unwrap();
    /// let mesh = SurfaceTessellation::try_uniform(&sphere, 16, 8).unwrap();
    /// assert_eq!(mesh.vertex_count(), 17 * 9);
    /// assert_eq!(mesh.triangle_count(), 2 * 16 * 8);
    /// ```
    pub fn try_uniform<S: ParametricSurface<T>>(
        surface: &S,
        u_segments: usize,
        v_segments: usize,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(
            u_segments > 0 && v_segments > 0,
            "Segment counts must be positive, got {} x {}",
            u_segments,
            v_segments
        );

        let mut tess = Self::default();
        let nu = T::from_usize(u_segments).unwrap();
        let nv = T::from_usize(v_segments).unwrap();
        for j in 0..=v_segments {
            let t = T::from_usize(j).unwrap() / nv;
            for i in 0..=u_segments {
                let s = T::from_usize(i).unwrap() / nu;
                tess.push_vertex(surface, Vector2::new(s, t))?;
            }
        }

        let stride = u_segments + 1;
        for j in 0..v_segments {
            for i in 0..u_segments {
                let c0 = j * stride + i;
                let c1 = c0 + 1;
                let c2 = c1 + stride;
                let c3 = c0 + stride;
                tess.push_quad([c0, c1, c2, c3]);
            }
        }

        log::debug!(
            "uniform tessellation: {} vertices, {} triangles",
            tess.vertex_count(),
            tess.triangle_count()
        );
        Ok(tess)
    }

    /// Tessellate the surface with curvature-driven quad subdivision
    ///
    /// # Example
    /// ```
    /// use parasurf::prelude::*;
    ///
    /// let sphere = NurbsSurface::<f64>::try_sphere(1., 8, 6).unwrap();
    /// let options = AdaptiveTessellationOptions::default().with_max_segments(8);
    /// let mesh = SurfaceTessellation::try_adaptive(&sphere, &options).unwrap();
    /// assert!(mesh.triangle_count() <= 2 * 8 * 8);
    /// ```
    pub fn try_adaptive<S: ParametricSurface<T>>(
        surface: &S,
        options: &AdaptiveTessellationOptions<T>,
    ) -> anyhow::Result<Self> {
        let mut processor = AdaptiveTessellationProcessor::new(surface, options);
        processor.divide();
        let divided = processor.leaf_count();
        processor.merge();

        let tess = Self::try_from_leaves(surface, &processor.leaves())?;
        log::debug!(
            "adaptive tessellation: {} quads after division, {} after merge, {} vertices",
            divided,
            tess.triangle_count() / 2,
            tess.vertex_count()
        );
        Ok(tess)
    }

    /// Assemble the mesh of a set of leaf quads
    /// Vertices shared by neighboring quads are emitted once.
    fn try_from_leaves<S: ParametricSurface<T>>(
        surface: &S,
        leaves: &[&AdaptiveTessellationNode<T>],
    ) -> anyhow::Result<Self> {
        let mut tess = Self::default();
        let mut lookup: HashMap<(i64, i64), usize> = HashMap::new();

        for leaf in leaves {
            let mut ids = [0; 4];
            for (k, st) in leaf.corners().iter().enumerate() {
                let key = (quantize(st.x), quantize(st.y));
                ids[k] = match lookup.get(&key) {
                    Some(id) => *id,
                    None => {
                        let id = tess.push_vertex(surface, *st)?;
                        lookup.insert(key, id);
                        id
                    }
                };
            }
            tess.push_quad(ids);
        }

        Ok(tess)
    }

    /// Evaluate and append a vertex at a normalized parameter, returning its index
    fn push_vertex<S: ParametricSurface<T>>(
        &mut self,
        surface: &S,
        st: Vector2<T>,
    ) -> anyhow::Result<usize> {
        let (u, v) = surface.denormalize(st.x, st.y);
        let sp = surface.try_surface_point(u, v)?;
        let id = self.vertex_count();
        self.positions.extend(sp.point.iter());
        self.normals.extend(sp.normal.iter());
        self.uvs.extend(st.iter());
        Ok(id)
    }

    /// Two triangles `(0, 1, 3), (1, 2, 3)` of a counter-clockwise quad
    fn push_quad(&mut self, c: [usize; 4]) {
        for i in [c[0], c[1], c[3], c[1], c[2], c[3]] {
            self.indices.push(i as u32);
        }
    }

    pub fn positions(&self) -> &[T] {
        &self.positions
    }

    pub fn normals(&self) -> &[T] {
        &self.normals
    }

    pub fn uvs(&self) -> &[T] {
        &self.uvs
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn point(&self, index: usize) -> Option<Point3<T>> {
        self.positions
            .get(index * 3..index * 3 + 3)
            .map(|p| Point3::new(p[0], p[1], p[2]))
    }

    pub fn normal(&self, index: usize) -> Option<Vector3<T>> {
        self.normals
            .get(index * 3..index * 3 + 3)
            .map(|n| Vector3::new(n[0], n[1], n[2]))
    }

    pub fn uv(&self, index: usize) -> Option<Vector2<T>> {
        self.uvs
            .get(index * 2..index * 2 + 2)
            .map(|uv| Vector2::new(uv[0], uv[1]))
    }

    pub fn triangle(&self, index: usize) -> Option<[usize; 3]> {
        self.indices
            .get(index * 3..index * 3 + 3)
            .map(|t| [t[0] as usize, t[1] as usize, t[2] as usize])
    }

    /// Cast the surface tessellation to another floating point type,
    /// e.g. `f32` vertex buffers for rendering.
    pub fn cast<F: FloatingPoint + SupersetOf<T>>(&self) -> SurfaceTessellation<F> {
        let cast = |values: &[T]| -> Vec<F> {
            values.iter().map(|v| F::from_subset(v)).collect()
        };
        SurfaceTessellation {
            positions: cast(&self.positions),
            normals: cast(&self.normals),
            uvs: cast(&self.uvs),
            indices: self.indices.clone(),
        }
    }
}
