#![forbid(unsafe_code)]

use std::sync::OnceLock;

use gf_types::ToleranceComparator;

/// Univariate aggregates over a numeric vector view.
///
/// Built from any `f64` sequence — a column, a row, or an arbitrary
/// selection — without mutating the source. NaN inputs are the null sentinel
/// and are excluded from every aggregate except [`Stats::null_count`].
///
/// Empty-input conventions: `sum` is `0.0`, every other aggregate is NaN.
/// `variance` is the sample estimator (ddof = 1);
/// [`Stats::variance_population`] divides by `n` instead.
#[derive(Debug, Clone, Default)]
pub struct Stats {
    values: Vec<f64>,
    nulls: usize,
    mean_cache: OnceLock<f64>,
}

impl Stats {
    pub fn from_iter(values: impl IntoIterator<Item = f64>) -> Self {
        let mut kept = Vec::new();
        let mut nulls = 0;
        for value in values {
            if value.is_nan() {
                nulls += 1;
            } else {
                kept.push(value);
            }
        }
        Self {
            values: kept,
            nulls,
            mean_cache: OnceLock::new(),
        }
    }

    /// Number of non-null observations.
    #[must_use]
    pub fn count(&self) -> usize {
        self.values.len()
    }

    /// Number of null (NaN) inputs that were excluded.
    #[must_use]
    pub fn null_count(&self) -> usize {
        self.nulls
    }

    #[must_use]
    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    #[must_use]
    pub fn sum_squares(&self) -> f64 {
        if self.values.is_empty() {
            return f64::NAN;
        }
        self.values.iter().map(|v| v * v).sum()
    }

    #[must_use]
    pub fn mean(&self) -> f64 {
        *self.mean_cache.get_or_init(|| {
            if self.values.is_empty() {
                f64::NAN
            } else {
                self.sum() / self.values.len() as f64
            }
        })
    }

    #[must_use]
    pub fn min(&self) -> f64 {
        if self.values.is_empty() {
            return f64::NAN;
        }
        self.values.iter().copied().fold(f64::INFINITY, f64::min)
    }

    #[must_use]
    pub fn max(&self) -> f64 {
        if self.values.is_empty() {
            return f64::NAN;
        }
        self.values
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Sample variance (ddof = 1). NaN with fewer than two observations.
    #[must_use]
    pub fn variance(&self) -> f64 {
        self.variance_with_ddof(1)
    }

    /// Population variance (ddof = 0). NaN with no observations.
    #[must_use]
    pub fn variance_population(&self) -> f64 {
        self.variance_with_ddof(0)
    }

    fn variance_with_ddof(&self, ddof: usize) -> f64 {
        let n = self.values.len();
        if n <= ddof {
            return f64::NAN;
        }
        let mean = self.mean();
        let sum_sq: f64 = self.values.iter().map(|v| (v - mean).powi(2)).sum();
        sum_sq / (n - ddof) as f64
    }

    #[must_use]
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Standard error of the mean.
    #[must_use]
    pub fn sem(&self) -> f64 {
        if self.values.is_empty() {
            return f64::NAN;
        }
        self.std_dev() / (self.values.len() as f64).sqrt()
    }

    #[must_use]
    pub fn median(&self) -> f64 {
        if self.values.is_empty() {
            return f64::NAN;
        }
        let mut sorted = self.values.clone();
        sorted.sort_by(f64::total_cmp);
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        }
    }

    /// Tolerance-equality across every named statistic. This is how the
    /// cross-representation agreement contract is checked: two `Stats` built
    /// from different views of the same data must compare equal.
    #[must_use]
    pub fn approx_eq(&self, other: &Self, cmp: &ToleranceComparator) -> bool {
        self.count() == other.count()
            && self.null_count() == other.null_count()
            && cmp.equals(self.sum(), other.sum())
            && cmp.equals(self.sum_squares(), other.sum_squares())
            && cmp.equals(self.mean(), other.mean())
            && cmp.equals(self.min(), other.min())
            && cmp.equals(self.max(), other.max())
            && cmp.equals(self.variance(), other.variance())
            && cmp.equals(self.std_dev(), other.std_dev())
            && cmp.equals(self.sem(), other.sem())
            && cmp.equals(self.median(), other.median())
    }
}
