use std::{cell::RefCell, collections::HashMap, fmt};

use crate::misc::FloatingPoint;

/// Scale applied before rounding parameters, i.e. 6 decimal places
const KEY_SCALE: f64 = 1e6;

/// Quantize a parameter to 6 decimal places
pub(crate) fn quantize<T: FloatingPoint>(value: T) -> i64 {
    (value * T::from_f64(KEY_SCALE).unwrap())
        .round()
        .to_i64()
        .unwrap_or(i64::MAX)
}

/// Cache key: both parameters quantized to 6 decimal places plus a derivative order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EvaluationKey {
    u: i64,
    v: i64,
    order: usize,
}

impl EvaluationKey {
    pub fn new<T: FloatingPoint>(u: T, v: T, order: usize) -> Self {
        Self {
            u: quantize(u),
            v: quantize(v),
            order,
        }
    }
}

/// Per-surface memoization of evaluation results.
///
/// The cache lives as long as the owning surface and is never shared:
/// cloning yields an empty cache.
pub struct EvaluationCache<V> {
    entries: RefCell<HashMap<EvaluationKey, V>>,
}

impl<V: Clone> EvaluationCache<V> {
    pub fn new() -> Self {
        Self {
            entries: RefCell::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &EvaluationKey) -> Option<V> {
        self.entries.borrow().get(key).cloned()
    }

    /// Return the cached value for `key`, or compute, store and return it.
    /// Failed computations are not cached.
    pub fn get_or_try_insert_with<F>(&self, key: EvaluationKey, f: F) -> anyhow::Result<V>
    where
        F: FnOnce() -> anyhow::Result<V>,
    {
        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }
        let value = f()?;
        self.entries.borrow_mut().insert(key, value.clone());
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

impl<V: Clone> Default for EvaluationCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> Clone for EvaluationCache<V> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for EvaluationCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluationCache")
            .field("len", &self.entries.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::{EvaluationCache, EvaluationKey};

    #[test]
    fn quantized_keys() {
        assert_eq!(
            EvaluationKey::new(0.1_f64, 0.2, 1),
            EvaluationKey::new(0.1000000004, 0.2, 1)
        );
        assert_ne!(
            EvaluationKey::new(0.1_f64, 0.2, 1),
            EvaluationKey::new(0.100001, 0.2, 1)
        );
        assert_ne!(
            EvaluationKey::new(0.1_f64, 0.2, 1),
            EvaluationKey::new(0.1, 0.2, 2)
        );
    }

    #[test]
    fn memoizes_successful_results() {
        let cache = EvaluationCache::<f64>::new();
        let calls = Cell::new(0);
        let key = EvaluationKey::new(0.5_f64, 0.5, 0);
        for _ in 0..3 {
            let value = cache
                .get_or_try_insert_with(key, || {
                    calls.set(calls.get() + 1);
                    Ok(42.)
                })
                .unwrap();
            assert_eq!(value, 42.);
        }
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.clone().is_empty());

        let failed = cache.get_or_try_insert_with(EvaluationKey::new(0.1_f64, 0.1, 0), || {
            anyhow::bail!("no value")
        });
        assert!(failed.is_err());
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
