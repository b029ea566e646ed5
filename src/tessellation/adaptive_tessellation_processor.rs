use std::{cmp::Ordering, collections::VecDeque};

use itertools::Itertools;
use nalgebra::Vector2;

use crate::{
    misc::{as_f64, FloatingPoint},
    surface::ParametricSurface,
};

use super::{
    adaptive_tessellation_node::AdaptiveTessellationNode,
    adaptive_tessellation_option::AdaptiveTessellationOptions,
};

/// Refinement stops once the leaf count reaches this multiple of `max_segments^2`,
/// leaving the merge pass room to coarsen flat regions.
const LEAF_BUDGET_FACTOR: usize = 4;

/// Processor for adaptive tessellation of a surface
/// Divides the parameter space into quads driven by the sampled curvature.
pub struct AdaptiveTessellationProcessor<'a, T: FloatingPoint, S: ParametricSurface<T>> {
    /// The surface to tessellate
    surface: &'a S,
    options: &'a AdaptiveTessellationOptions<T>,
    /// The created nodes for the tessellation
    nodes: Vec<AdaptiveTessellationNode<T>>,
}

impl<'a, T: FloatingPoint, S: ParametricSurface<T>> AdaptiveTessellationProcessor<'a, T, S> {
    pub fn new(surface: &'a S, options: &'a AdaptiveTessellationOptions<T>) -> Self {
        Self {
            surface,
            options,
            nodes: vec![AdaptiveTessellationNode::root()],
        }
    }

    /// Quad cap of the final mesh
    fn max_leaves(&self) -> usize {
        let s = self.options.max_segments.max(1);
        s * s
    }

    /// Curvature magnitude at a normalized parameter
    /// Failures (degenerate normal) count as curvature above `max_error`.
    fn curvature_at(&self, st: &Vector2<T>) -> T {
        let (u, v) = self.surface.denormalize(st.x, st.y);
        match self.surface.try_curvature_at(u, v) {
            Ok(curvature) => curvature.magnitude(),
            Err(e) => {
                log::trace!(
                    "curvature unavailable at ({}, {}): {}",
                    as_f64(u),
                    as_f64(v),
                    e
                );
                self.options.max_error + T::one()
            }
        }
    }

    /// Largest curvature magnitude over the corners and the center
    fn sample_curvature(&self, node: &AdaptiveTessellationNode<T>) -> T {
        node.corners()
            .iter()
            .chain(std::iter::once(&node.center()))
            .map(|st| self.curvature_at(st))
            .fold(T::zero(), |a, b| a.max(b))
    }

    fn should_divide(&self, node: &AdaptiveTessellationNode<T>) -> bool {
        let half = node.extent() * T::from_f64(0.5).unwrap();
        half >= self.options.min_size && self.sample_curvature(node) > self.options.max_error
    }

    /// Refine the quad tree breadth first
    /// Every level is completed before the next one starts, so hitting the leaf budget
    /// leaves a uniformly refined mesh.
    pub fn divide(&mut self) {
        let budget = self.max_leaves() * LEAF_BUDGET_FACTOR;
        let mut leaves = self.leaf_count();
        let mut queue = VecDeque::from([0]);

        while let Some(id) = queue.pop_front() {
            if leaves + 3 > budget {
                log::debug!("leaf budget {} reached, refinement stopped", budget);
                break;
            }
            if !self.should_divide(&self.nodes[id]) {
                continue;
            }

            let depth = self.nodes[id].depth + 1;
            let quadrants = self.nodes[id].quadrants();
            let first = self.nodes.len();
            for (min, max) in quadrants {
                self.nodes
                    .push(AdaptiveTessellationNode::new(Some(id), min, max, depth));
            }
            self.nodes[id].children = (first..first + 4).collect();
            queue.extend(first..first + 4);
            leaves += 3;
        }
    }

    /// Coarsen the quad tree until the leaf count fits `max_segments^2`
    /// Groups of four sibling leaves are first merged back into their parent when every
    /// sibling's center curvature is below `max_error * factor`,
    /// `factor = sqrt(leaves / max_segments^2)`.
    /// If that is not enough, the remaining groups are merged by ascending curvature.
    /// Returns the number of merged groups.
    pub fn merge(&mut self) -> usize {
        let cap = self.max_leaves();
        let mut leaves = self.leaf_count();
        if leaves <= cap {
            return 0;
        }

        let ratio = T::from_usize(leaves).unwrap() / T::from_usize(cap).unwrap();
        let threshold = self.options.max_error * ratio.sqrt();
        let mut merged = 0;

        loop {
            let mut changed = false;
            for id in self.mergeable_groups() {
                if leaves <= cap {
                    break;
                }
                if self.group_curvature(id) < threshold {
                    self.nodes[id].children.clear();
                    leaves -= 3;
                    merged += 1;
                    changed = true;
                }
            }
            if !changed || leaves <= cap {
                break;
            }
        }
        let flat = merged;

        while leaves > cap {
            let mut groups = self
                .mergeable_groups()
                .into_iter()
                .map(|id| (id, self.group_curvature(id)))
                .collect::<Vec<_>>();
            if groups.is_empty() {
                break;
            }
            groups.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
            for (id, _) in groups {
                if leaves <= cap {
                    break;
                }
                self.nodes[id].children.clear();
                leaves -= 3;
                merged += 1;
            }
        }

        log::debug!(
            "merge pass: {} groups below threshold {}, {} more by curvature, {} leaves remain (cap {})",
            flat,
            as_f64(threshold),
            merged - flat,
            leaves,
            cap
        );
        merged
    }

    /// Parents whose children are all leaves, finest first
    fn mergeable_groups(&self) -> Vec<usize> {
        let mut parents = self
            .leaf_ids()
            .into_iter()
            .filter_map(|id| self.nodes[id].parent)
            .unique()
            .filter(|id| self.nodes[*id].children.iter().all(|c| self.nodes[*c].is_leaf()))
            .collect::<Vec<_>>();
        parents.sort_by(|a, b| self.nodes[*b].depth.cmp(&self.nodes[*a].depth));
        parents
    }

    /// Largest center curvature over the children of a node
    fn group_curvature(&self, id: usize) -> T {
        self.nodes[id]
            .children
            .iter()
            .map(|c| self.curvature_at(&self.nodes[*c].center()))
            .fold(T::zero(), |a, b| a.max(b))
    }

    /// Ids of the nodes still attached to the tree, parents before children
    fn reachable(&self) -> Vec<usize> {
        let mut ids = vec![];
        let mut stack = vec![0];
        while let Some(id) = stack.pop() {
            ids.push(id);
            stack.extend(self.nodes[id].children.iter().rev());
        }
        ids
    }

    fn leaf_ids(&self) -> Vec<usize> {
        self.reachable()
            .into_iter()
            .filter(|id| self.nodes[*id].is_leaf())
            .collect()
    }

    pub fn leaf_count(&self) -> usize {
        self.leaf_ids().len()
    }

    /// Leaf quads of the current tree
    pub fn leaves(&self) -> Vec<&AdaptiveTessellationNode<T>> {
        self.leaf_ids().into_iter().map(|id| &self.nodes[id]).collect()
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::{Point3, Vector2};

    use super::AdaptiveTessellationProcessor;
    use crate::{
        surface::{FunctionSurface, NurbsSurface},
        tessellation::AdaptiveTessellationOptions,
    };

    #[test]
    fn flat_surface_is_not_divided() {
        let plane = NurbsSurface::<f64>::try_plane(2., 2., 4, 4).unwrap();
        let options = AdaptiveTessellationOptions::default();
        let mut processor = AdaptiveTessellationProcessor::new(&plane, &options);
        processor.divide();
        assert_eq!(processor.leaf_count(), 1);
        assert_eq!(processor.merge(), 0);
    }

    #[test]
    fn curved_region_is_refined_locally() {
        // a bump around (0.8, 0.8)
        let bump = FunctionSurface::try_new((0., 1.), (0., 1.), |u: f64, v: f64| {
            let d = (u - 0.8).powi(2) + (v - 0.8).powi(2);
            Point3::new(u, v, 0.3 * (-d * 60.).exp())
        })
        .unwrap();
        let options = AdaptiveTessellationOptions::default()
            .with_max_error(0.5)
            .with_min_size(1e-2);
        let mut processor = AdaptiveTessellationProcessor::new(&bump, &options);
        processor.divide();
        let leaves = processor.leaves();
        assert!(leaves.len() > 4);

        let near = leaves
            .iter()
            .filter(|n| (n.center() - Vector2::new(0.8, 0.8)).norm() < 0.2);
        let far = leaves.iter().filter(|n| n.center().x < 0.4 && n.center().y < 0.4);
        let finest_near = near.map(|n| n.depth()).max().unwrap();
        let finest_far = far.map(|n| n.depth()).max().unwrap();
        assert!(finest_near > finest_far);
        for leaf in leaves {
            assert!(leaf.extent() >= options.min_size);
        }
    }

    #[test]
    fn degenerate_points_force_division_down_to_min_size() {
        let sphere = NurbsSurface::<f64>::try_sphere(1., 4, 4).unwrap();
        let options = AdaptiveTessellationOptions::default()
            .with_max_error(10.)
            .with_min_size(0.1)
            .with_max_segments(64);
        let mut processor = AdaptiveTessellationProcessor::new(&sphere, &options);
        processor.divide();
        let leaves = processor.leaves();
        // sphere curvature is 1, only the poles are refined
        let finest = leaves.iter().map(|n| n.extent()).fold(1., f64::min);
        assert!(finest >= 0.1 && finest < 0.2);
        assert!(leaves
            .iter()
            .filter(|n| n.min().y >= 0.25 && n.max().y <= 0.75)
            .all(|n| n.extent() >= 0.25));
    }

    #[test]
    fn merge_respects_the_cap() {
        // curvature magnitude 1 / 1.5 sits between max_error and the relaxed threshold
        let sphere = NurbsSurface::<f64>::try_sphere(1.5, 8, 6).unwrap();
        let options = AdaptiveTessellationOptions::default()
            .with_max_error(0.5)
            .with_max_segments(4)
            .with_min_size(1e-3);
        let mut processor = AdaptiveTessellationProcessor::new(&sphere, &options);
        processor.divide();
        let before = processor.leaf_count();
        assert!(before > 16);
        assert!(before <= 16 * super::LEAF_BUDGET_FACTOR);
        let merged = processor.merge();
        assert!(merged > 0);
        assert_eq!(processor.leaf_count(), before - 3 * merged);
        assert!(processor.leaf_count() <= 16);
    }

    #[test]
    fn cap_holds_above_the_relaxed_threshold() {
        // curvature 1 sits at the relaxed threshold 0.5 * sqrt(64 / 16)
        let sphere = NurbsSurface::<f64>::try_sphere(1., 8, 6).unwrap();
        let options = AdaptiveTessellationOptions::default()
            .with_max_error(0.5)
            .with_max_segments(4);
        let mut processor = AdaptiveTessellationProcessor::new(&sphere, &options);
        processor.divide();
        assert_eq!(processor.leaf_count(), 64);
        assert_eq!(processor.merge(), 16);
        assert_eq!(processor.leaf_count(), 16);

        // every quad is still covered by exactly one leaf
        let area: f64 = processor
            .leaves()
            .iter()
            .map(|n| (n.max() - n.min()).x * (n.max() - n.min()).y)
            .sum();
        assert!((area - 1.).abs() < 1e-12);
    }
}
