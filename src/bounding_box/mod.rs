use nalgebra::{Point3, Vector3};

use crate::misc::FloatingPoint;

/// Axis aligned bounding box in 3D space
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundingBox<T: FloatingPoint> {
    min: Vector3<T>,
    max: Vector3<T>,
}

impl<T: FloatingPoint> BoundingBox<T> {
    /// Create a new bounding box from two opposite corners in any order.
    pub fn new(a: Vector3<T>, b: Vector3<T>) -> Self {
        Self {
            min: a.zip_map(&b, |x, y| x.min(y)),
            max: a.zip_map(&b, |x, y| x.max(y)),
        }
    }

    /// Box spanning `[0, 1]^3`
    pub fn unit() -> Self {
        Self::new(Vector3::zeros(), Vector3::from_element(T::one()))
    }

    /// Create a bounding box enclosing the given points
    /// Returns `None` if the iterator is empty.
    pub fn new_with_points<I: IntoIterator<Item = Point3<T>>>(iter: I) -> Option<Self> {
        iter.into_iter().fold(None, |acc, p| match acc {
            None => Some(Self::new(p.coords, p.coords)),
            Some(bb) => Some(bb.union(&Self::new(p.coords, p.coords))),
        })
    }

    pub fn min(&self) -> &Vector3<T> {
        &self.min
    }

    pub fn max(&self) -> &Vector3<T> {
        &self.max
    }

    pub fn center(&self) -> Vector3<T> {
        (self.min + self.max) * T::from_f64(0.5).unwrap()
    }

    pub fn size(&self) -> Vector3<T> {
        self.max - self.min
    }

    /// Check if the bounding box contains a point.
    /// # Examples
    /// ```
    /// use nalgebra::{Point3, Vector3};
    /// use parasurf::prelude::BoundingBox;
    /// let bb = BoundingBox::new(Vector3::from_element(0.), Vector3::from_element(1.));
    /// assert!(bb.contains(&Point3::new(0.5, 0.5, 0.5)));
    /// assert!(bb.contains(&Point3::new(0., 0.5, 1.0)));
    /// assert!(!bb.contains(&Point3::new(-1e-8, 0.5, 0.5)));
    /// ```
    pub fn contains(&self, point: &Point3<T>) -> bool {
        (0..3).all(|i| self.min[i] <= point[i] && point[i] <= self.max[i])
    }

    /// Smallest box enclosing both boxes
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.zip_map(&other.min, |x, y| x.min(y)),
            max: self.max.zip_map(&other.max, |x, y| x.max(y)),
        }
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::{Point3, Vector3};

    use super::BoundingBox;

    #[test]
    fn from_points() {
        let bb = BoundingBox::new_with_points(vec![
            Point3::new(1., -2., 0.),
            Point3::new(-1., 2., 3.),
            Point3::new(0., 0., -3.),
        ])
        .unwrap();
        assert_eq!(bb.min(), &Vector3::new(-1., -2., -3.));
        assert_eq!(bb.max(), &Vector3::new(1., 2., 3.));
        assert_eq!(bb.center(), Vector3::zeros());
        assert_eq!(bb.size(), Vector3::new(2., 4., 6.));
        assert!(BoundingBox::<f64>::new_with_points(vec![]).is_none());
    }

    #[test]
    fn union() {
        let a = BoundingBox::new(Vector3::new(0., 0., 0.), Vector3::new(1., 1., 1.));
        let b = BoundingBox::new(Vector3::new(2., -1., 0.5), Vector3::new(0.5, 0.5, 0.5));
        let u = a.union(&b);
        assert_eq!(u.min(), &Vector3::new(0., -1., 0.));
        assert_eq!(u.max(), &Vector3::new(2., 1., 1.));
        assert_eq!(BoundingBox::<f64>::unit(), a);
    }
}
