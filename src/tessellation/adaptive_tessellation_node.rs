use nalgebra::Vector2;

use crate::misc::FloatingPoint;

/// Node for adaptive tessellation of a surface
/// A quad of the normalized parameter space `[0, 1]^2`.
/// Nodes live in an arena owned by the processor and refer to each other by index.
#[derive(Clone, Debug)]
pub struct AdaptiveTessellationNode<T: FloatingPoint> {
    pub(crate) parent: Option<usize>,
    pub(crate) children: Vec<usize>,
    pub(crate) min: Vector2<T>,
    pub(crate) max: Vector2<T>,
    pub(crate) depth: usize,
}

impl<T: FloatingPoint> AdaptiveTessellationNode<T> {
    pub fn new(parent: Option<usize>, min: Vector2<T>, max: Vector2<T>, depth: usize) -> Self {
        Self {
            parent,
            children: vec![],
            min,
            max,
            depth,
        }
    }

    /// The whole parameter space
    pub fn root() -> Self {
        Self::new(None, Vector2::zeros(), Vector2::new(T::one(), T::one()), 0)
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    pub fn children(&self) -> &[usize] {
        &self.children
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn min(&self) -> &Vector2<T> {
        &self.min
    }

    pub fn max(&self) -> &Vector2<T> {
        &self.max
    }

    /// Smaller side of the quad
    pub fn extent(&self) -> T {
        let size = self.max - self.min;
        size.x.min(size.y)
    }

    pub fn center(&self) -> Vector2<T> {
        (self.min + self.max) * T::from_f64(0.5).unwrap()
    }

    /// Corners in counter-clockwise order starting at `min`
    pub fn corners(&self) -> [Vector2<T>; 4] {
        [
            self.min,
            Vector2::new(self.max.x, self.min.y),
            self.max,
            Vector2::new(self.min.x, self.max.y),
        ]
    }

    /// Bounds of the four equal sub-quads, in the same order as the corners
    pub fn quadrants(&self) -> [(Vector2<T>, Vector2<T>); 4] {
        let c = self.center();
        [
            (self.min, c),
            (Vector2::new(c.x, self.min.y), Vector2::new(self.max.x, c.y)),
            (c, self.max),
            (Vector2::new(self.min.x, c.y), Vector2::new(c.x, self.max.y)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::Vector2;

    use super::AdaptiveTessellationNode;

    #[test]
    fn quadrants_cover_the_quad() {
        let node = AdaptiveTessellationNode::<f64>::root();
        let quadrants = node.quadrants();
        let area: f64 = quadrants
            .iter()
            .map(|(min, max)| (max - min).x * (max - min).y)
            .sum();
        assert_eq!(area, 1.);
        assert_eq!(quadrants[0], (Vector2::zeros(), Vector2::new(0.5, 0.5)));
        assert_eq!(quadrants[2], (Vector2::new(0.5, 0.5), Vector2::new(1., 1.)));
        assert_eq!(node.extent(), 1.);
        assert_eq!(node.corners()[1], Vector2::new(1., 0.));
        assert!(node.is_leaf());
        assert_eq!(node.parent(), None);

        let (min, max) = quadrants[3];
        let child = AdaptiveTessellationNode::new(Some(0), min, max, 1);
        assert_eq!(child.parent(), Some(0));
        assert!(child.children().is_empty());
        assert_eq!(child.extent(), 0.5);
        assert_eq!(child.center(), Vector2::new(0.25, 0.75));
    }
}
