use std::ops::Index;

use itertools::Itertools;

use crate::misc::{safe_div, FloatingPoint, SurfaceError};

/// Knot vector representation
/// A non-decreasing sequence of parameters which, together with a degree,
/// defines the B-spline basis functions of one parametric direction.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KnotVector<T>(Vec<T>);

impl<T: FloatingPoint> KnotVector<T> {
    /// Create a knot vector without validation
    pub fn new(knots: Vec<T>) -> Self {
        Self(knots)
    }

    /// Create a knot vector, failing if a knot is not finite or the sequence is decreasing anywhere
    /// # Example
    /// ```
    /// use parasurf::prelude::KnotVector;
    /// assert!(KnotVector::try_new(vec![0., 0., 0.5, 1., 1.]).is_ok());
    /// assert!(KnotVector::try_new(vec![0., 0.5, 0.2, 1.]).is_err());
    /// assert!(KnotVector::try_new(vec![0., f64::NAN, 1.]).is_err());
    /// ```
    pub fn try_new(knots: Vec<T>) -> anyhow::Result<Self> {
        if let Some(index) = knots.iter().position(|k| !k.is_finite()) {
            anyhow::bail!(SurfaceError::NonFiniteKnot { index });
        }
        if let Some(index) = knots.windows(2).position(|w| w[1] < w[0]) {
            anyhow::bail!(SurfaceError::DecreasingKnots { index: index + 1 });
        }
        Ok(Self(knots))
    }

    /// Create a clamped uniform knot vector over `[0, 1]`
    /// the first and last `degree + 1` knots are 0 and 1, the interior knots are evenly spaced
    /// # Example
    /// ```
    /// use parasurf::prelude::KnotVector;
    /// let knots: KnotVector<f64> = KnotVector::uniform_clamped(5, 2);
    /// assert_eq!(knots.to_vec(), vec![0., 0., 0., 1. / 3., 2. / 3., 1., 1., 1.]);
    /// ```
    pub fn uniform_clamped(control_points: usize, degree: usize) -> Self {
        let segments = control_points.saturating_sub(degree).max(1);
        let inv = T::one() / T::from_usize(segments).unwrap();
        let mut knots = Vec::with_capacity(control_points + degree + 1);
        knots.extend(std::iter::repeat_n(T::zero(), degree + 1));
        knots.extend((1..segments).map(|i| T::from_usize(i).unwrap() * inv));
        knots.extend(std::iter::repeat_n(T::one(), degree + 1));
        Self(knots)
    }

    /// Check that the knot count matches `control_points + degree + 1`
    pub fn validate(
        &self,
        control_points: usize,
        degree: usize,
        direction: &'static str,
    ) -> anyhow::Result<()> {
        let expected = control_points + degree + 1;
        anyhow::ensure!(
            self.len() == expected,
            SurfaceError::InvalidKnotCount {
                direction,
                found: self.len(),
                expected,
            }
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.0.clone()
    }

    pub fn first(&self) -> T {
        self.0[0]
    }

    pub fn last(&self) -> T {
        self.0[self.0.len() - 1]
    }

    pub fn as_slice(&self) -> &[T] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.0.iter()
    }

    /// Get the domain of the knot vector by degree
    pub fn domain(&self, degree: usize) -> (T, T) {
        (self.0[degree], self.0[self.0.len() - 1 - degree])
    }

    pub fn clamp(&self, degree: usize, u: T) -> T {
        let (min, max) = self.domain(degree);
        u.clamp(min, max)
    }

    /// Get the distinct knots paired with their multiplicity
    /// # Example
    /// ```
    /// use parasurf::prelude::KnotVector;
    /// let knots = KnotVector::new(vec![0., 0., 0., 1., 2., 3., 3., 3.]);
    /// let multiplicity = knots.multiplicity();
    /// assert_eq!(multiplicity, vec![(0., 3), (1., 1), (2., 1), (3., 3)]);
    /// ```
    pub fn multiplicity(&self) -> Vec<(T, usize)> {
        self.0
            .iter()
            .dedup_by_with_count(|a, b| (**a - **b).abs() <= T::default_epsilon())
            .map(|(count, knot)| (*knot, count))
            .collect()
    }

    /// Number of knots equal to `knot`
    pub fn multiplicity_of(&self, knot: T) -> usize {
        self.0
            .iter()
            .filter(|k| (**k - knot).abs() <= T::default_epsilon())
            .count()
    }

    /// Check if the knot vector is clamped
    /// `clamped` means the first and last knots have a multiplicity greater than the degree
    /// e.g. [0, 0, 0, 1, 2, 3, 3, 3] with degree 2 is clamped
    pub fn is_clamped(&self, degree: usize) -> bool {
        let multiplicity = self.multiplicity();
        match (multiplicity.first(), multiplicity.last()) {
            (Some(start), Some(end)) => start.1 > degree && end.1 > degree,
            _ => false,
        }
    }

    /// Find the knot span index by binary search
    /// `n` is the index of the last control point.
    /// Returns `i` such that `knots[i] <= u < knots[i + 1]`,
    /// the last knot maps to the last valid span `n` instead of running past the end.
    ///
    /// # Example
    /// ```
    /// use parasurf::prelude::KnotVector;
    /// let knots = KnotVector::new(vec![0., 0., 0., 1., 2., 3., 3., 3.]);
    /// assert_eq!(knots.find_knot_span_index(4, 2, 2.5), 4);
    /// assert_eq!(knots.find_knot_span_index(4, 2, 3.0), 4);
    /// assert_eq!(knots.find_knot_span_index(4, 2, 0.0), 2);
    /// ```
    pub fn find_knot_span_index(&self, n: usize, degree: usize, u: T) -> usize {
        if u >= self[n + 1] {
            return n;
        }

        if u <= self[degree] {
            return degree;
        }

        let mut low = degree;
        let mut high = n + 1;
        let mut mid = (low + high) / 2;
        while u < self[mid] || u >= self[mid + 1] {
            if u < self[mid] {
                high = mid;
            } else {
                low = mid;
            }
            mid = (low + high) / 2;
        }

        mid
    }

    /// Compute the `degree + 1` non-vanishing basis functions at `u` in the given span
    /// by the triangular Cox-de Boor recurrence.
    /// Terms whose denominator underflows are dropped instead of producing NaN.
    pub fn basis_functions(&self, knot_span_index: usize, u: T, degree: usize) -> Vec<T> {
        let mut basis_functions = vec![T::zero(); degree + 1];
        let mut left = vec![T::zero(); degree + 1];
        let mut right = vec![T::zero(); degree + 1];

        basis_functions[0] = T::one();

        for j in 1..=degree {
            left[j] = u - self[knot_span_index + 1 - j];
            right[j] = self[knot_span_index + j] - u;
            let mut saved = T::zero();

            for r in 0..j {
                let temp = safe_div(basis_functions[r], right[r + 1] + left[j - r]);
                basis_functions[r] = saved + right[r + 1] * temp;
                saved = left[j - r] * temp;
            }

            basis_functions[j] = saved;
        }

        basis_functions
    }

    /// Compute the non-vanishing basis functions and their derivatives up to `order`
    /// Returns a table of size `(order + 1) x (degree + 1)` where row `k` holds the `k`th derivatives.
    /// Rows above `degree` are identically zero.
    ///
    /// Follows the two stage algorithm of Piegl & Tiller (A2.3):
    /// the triangular table `ndu` of basis values and knot differences,
    /// then the differencing recurrence over alternating coefficient rows.
    pub fn derivative_basis_functions(
        &self,
        knot_span_index: usize,
        u: T,
        degree: usize,
        order: usize,
    ) -> Vec<Vec<T>> {
        let p = degree;
        let mut ndu = vec![vec![T::zero(); p + 1]; p + 1];
        let mut left = vec![T::zero(); p + 1];
        let mut right = vec![T::zero(); p + 1];

        ndu[0][0] = T::one();

        for j in 1..=p {
            left[j] = u - self[knot_span_index + 1 - j];
            right[j] = self[knot_span_index + j] - u;

            let mut saved = T::zero();
            for r in 0..j {
                // lower triangle holds the knot differences
                ndu[j][r] = right[r + 1] + left[j - r];
                let temp = safe_div(ndu[r][j - 1], ndu[j][r]);

                // upper triangle holds the basis values
                ndu[r][j] = saved + right[r + 1] * temp;
                saved = left[j - r] * temp;
            }
            ndu[j][j] = saved;
        }

        let mut ders = vec![vec![T::zero(); p + 1]; order + 1];
        for j in 0..=p {
            ders[0][j] = ndu[j][p];
        }

        // derivatives above the degree vanish
        let n = order.min(p);
        let mut a = vec![vec![T::zero(); p + 1]; 2];

        for r in 0..=p {
            let (mut s1, mut s2) = (0, 1);
            a[0][0] = T::one();

            for k in 1..=n {
                let mut d = T::zero();
                let pk = p - k;

                if r >= k {
                    let rk = r - k;
                    a[s2][0] = safe_div(a[s1][0], ndu[pk + 1][rk]);
                    d = a[s2][0] * ndu[rk][pk];
                }

                // j ranges over the coefficients with both neighbours inside the triangle
                let j1 = if r + 1 >= k { 1 } else { k - r };
                let j2 = if r <= pk + 1 { k - 1 } else { p - r };

                for j in j1..=j2 {
                    let rkj = r + j - k;
                    a[s2][j] = safe_div(a[s1][j] - a[s1][j - 1], ndu[pk + 1][rkj]);
                    d += a[s2][j] * ndu[rkj][pk];
                }

                if r <= pk {
                    a[s2][k] = safe_div(-a[s1][k - 1], ndu[pk + 1][r]);
                    d += a[s2][k] * ndu[r][pk];
                }

                ders[k][r] = d;
                std::mem::swap(&mut s1, &mut s2);
            }
        }

        // multiply through by p! / (p - k)!
        let mut factor = T::from_usize(p).unwrap();
        for k in 1..=n {
            for j in 0..=p {
                ders[k][j] *= factor;
            }
            factor *= T::from_usize(p - k).unwrap();
        }

        ders
    }
}

impl<T> Index<usize> for KnotVector<T> {
    type Output = T;
    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl<T> FromIterator<T> for KnotVector<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
