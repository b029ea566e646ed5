use nalgebra::RealField;
use num_traits::ToPrimitive;

/// Trait for floating point types (f32, f64)
/// Mainly used to identify the type of the field in nalgebra
pub trait FloatingPoint: RealField + ToPrimitive + Copy {}

impl FloatingPoint for f32 {}
impl FloatingPoint for f64 {}

/// Threshold below which a denominator is treated as zero
/// (basis recurrences, rational weight sums, fundamental form determinants)
pub const DEGENERACY_TOLERANCE: f64 = 1e-10;

/// Returns `numerator / denominator`, or zero when the denominator underflows.
pub fn safe_div<T: FloatingPoint>(numerator: T, denominator: T) -> T {
    if denominator.abs() < T::from_f64(DEGENERACY_TOLERANCE).unwrap() {
        T::zero()
    } else {
        numerator / denominator
    }
}

/// Lossy conversion used when reporting parameters in errors and logs
pub fn as_f64<T: FloatingPoint>(value: T) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::safe_div;

    #[test]
    fn zero_denominator_yields_zero() {
        assert_eq!(safe_div(1.0_f64, 0.0), 0.0);
        assert_eq!(safe_div(1.0_f64, 1e-12), 0.0);
        assert_eq!(safe_div(3.0_f64, 2.0), 1.5);
    }
}
