//! Per-call configuration

use crate::result::FallbackValue;

/// Options for the guarded writer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuardOptions {
    /// Round numeric results half away from zero to this many decimal places.
    /// `None` returns the evaluator's `f64` unchanged.
    pub precision: Option<u32>,
}

impl GuardOptions {
    pub fn with_precision(mut self, digits: u32) -> Self {
        self.precision = Some(digits);
        self
    }
}

/// Options for the repair loop
#[derive(Debug, Clone, PartialEq)]
pub struct RepairOptions {
    /// Maximum number of guarded writes (default: 3)
    pub max_retries: usize,
    /// Literal written when every candidate fails
    pub error_fallback: Option<FallbackValue>,
    /// Options for each guarded write
    pub guard: GuardOptions,
}

impl Default for RepairOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            error_fallback: None,
            guard: GuardOptions::default(),
        }
    }
}

impl RepairOptions {
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_fallback<V: Into<FallbackValue>>(mut self, fallback: V) -> Self {
        self.error_fallback = Some(fallback.into());
        self
    }

    pub fn with_guard(mut self, guard: GuardOptions) -> Self {
        self.guard = guard;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::ScalarValue;

    #[test]
    fn test_defaults() {
        let options = RepairOptions::default();
        assert_eq!(options.max_retries, 3);
        assert_eq!(options.error_fallback, None);
        assert_eq!(options.guard.precision, None);
    }

    #[test]
    fn test_builders() {
        let options = RepairOptions::default()
            .with_max_retries(1)
            .with_fallback(0.0)
            .with_guard(GuardOptions::default().with_precision(2));
        assert_eq!(options.max_retries, 1);
        assert_eq!(options.error_fallback, Some(ScalarValue::Number(0.0)));
        assert_eq!(options.guard.precision, Some(2));
    }
}
