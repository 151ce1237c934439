//! Offset/limit pagination with token-aware truncation.
//!
//! Token counts are a heuristic (compact JSON length divided by an average
//! characters-per-token ratio, plus structural overhead), not a real
//! tokenizer. The estimator sits behind [`TokenEstimator`] so a stricter one
//! can be swapped in without changing the pagination contract.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_MAX_TOKENS: usize = 20_000;
pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MAX_PAGE_SIZE: usize = 10_000;

/// Estimates how many tokens a JSON value costs a consumer.
pub trait TokenEstimator: Send + Sync {
    fn estimate(&self, value: &Value) -> usize;

    /// Estimate for `items` serialized as a JSON array.
    fn estimate_list(&self, items: &[Value]) -> usize {
        self.estimate(&Value::Array(items.to_vec()))
    }
}

/// `len(compact_json) / chars_per_token`, plus 2 per list element or 3 per
/// object key at the top level.
#[derive(Debug, Clone, Copy)]
pub struct HeuristicEstimator {
    pub chars_per_token: f64,
}

impl Default for HeuristicEstimator {
    fn default() -> Self {
        Self {
            chars_per_token: 4.0,
        }
    }
}

impl HeuristicEstimator {
    fn base<T: Serialize + ?Sized>(&self, value: &T) -> usize {
        let chars = match serde_json::to_string(value) {
            Ok(s) => s.len(),
            Err(e) => {
                tracing::warn!(error = %e, "Token estimation failed to serialize value");
                0
            }
        };
        (chars as f64 / self.chars_per_token.max(f64::MIN_POSITIVE)) as usize
    }
}

impl TokenEstimator for HeuristicEstimator {
    fn estimate(&self, value: &Value) -> usize {
        let overhead = match value {
            Value::Array(items) => items.len() * 2,
            Value::Object(map) => map.len() * 3,
            _ => 0,
        };
        self.base(value) + overhead
    }

    fn estimate_list(&self, items: &[Value]) -> usize {
        self.base(items) + items.len() * 2
    }
}

/// Pagination limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaginationConfig {
    pub max_tokens: usize,
    pub default_page_size: usize,
    pub max_page_size: usize,
    pub chars_per_token: f64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            chars_per_token: 4.0,
        }
    }
}

/// Why a page holds fewer items than the requested limit allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TruncationReason {
    TokenLimit,
    /// The first item alone exceeds the budget; it is skipped.
    ItemExceedsTokenLimit,
}

/// Pagination metadata attached to every list response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
    pub returned: usize,
    pub has_more: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_offset: Option<usize>,
    pub token_estimate: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncation_reason: Option<TruncationReason>,
    /// Set when the executor's backend result cap dropped rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_truncated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_max_results: Option<usize>,
}

impl PageInfo {
    /// Page info for a single non-list value.
    pub fn single(token_estimate: usize) -> Self {
        Self {
            total: 1,
            offset: 0,
            limit: 1,
            returned: 1,
            has_more: false,
            next_offset: None,
            token_estimate,
            truncation_reason: None,
            db_truncated: None,
            db_max_results: None,
        }
    }
}

/// Human-readable instruction for fetching the next page.
pub fn continuation_hint(info: &PageInfo) -> Option<String> {
    let next = info.next_offset.filter(|_| info.has_more)?;
    Some(format!(
        "Showing {} of {} results. Call with offset={} to continue.",
        info.returned, info.total, next
    ))
}

/// Slices result lists into pages that fit a token budget.
#[derive(Debug, Clone)]
pub struct Budgeter<E: TokenEstimator = HeuristicEstimator> {
    config: PaginationConfig,
    estimator: E,
}

impl Default for Budgeter {
    fn default() -> Self {
        Self::new(PaginationConfig::default())
    }
}

impl Budgeter {
    pub fn new(config: PaginationConfig) -> Self {
        let estimator = HeuristicEstimator {
            chars_per_token: config.chars_per_token,
        };
        Self { config, estimator }
    }
}

impl<E: TokenEstimator> Budgeter<E> {
    pub fn with_estimator(config: PaginationConfig, estimator: E) -> Self {
        Self { config, estimator }
    }

    pub fn config(&self) -> &PaginationConfig {
        &self.config
    }

    pub fn estimate(&self, value: &Value) -> usize {
        self.estimator.estimate(value)
    }

    /// Paginate under the configured token budget. A zero `limit` is
    /// treated as 1; see [`Budgeter::paginate_with_budget`].
    pub fn paginate(
        &self,
        items: Vec<Value>,
        offset: usize,
        limit: Option<usize>,
    ) -> (Vec<Value>, PageInfo) {
        self.paginate_with_budget(items, offset, limit, self.config.max_tokens)
    }

    /// Slice `items[offset..offset+limit]`, then shrink the page to the
    /// longest prefix whose estimate fits `max_tokens`.
    ///
    /// `limit` defaults to the configured page size and is clamped to
    /// `1..=max_page_size`; `Some(0)` behaves as `Some(1)`, so a
    /// continuation loop always makes progress.
    pub fn paginate_with_budget(
        &self,
        items: Vec<Value>,
        offset: usize,
        limit: Option<usize>,
        max_tokens: usize,
    ) -> (Vec<Value>, PageInfo) {
        let limit = limit
            .unwrap_or(self.config.default_page_size)
            .clamp(1, self.config.max_page_size.max(1));
        let total = items.len();
        let start = offset.min(total);
        let end = start.saturating_add(limit).min(total);
        let page = &items[start..end];

        let full_estimate = self.estimator.estimate_list(page);
        let (returned, token_estimate, truncation_reason) = if full_estimate <= max_tokens {
            (page.len(), full_estimate, None)
        } else {
            let fit = self.largest_fitting_prefix(page, max_tokens);
            let reason = if fit == 0 {
                TruncationReason::ItemExceedsTokenLimit
            } else {
                TruncationReason::TokenLimit
            };
            tracing::debug!(
                requested = page.len(),
                returned = fit,
                max_tokens,
                "Page truncated to token budget"
            );
            (fit, self.estimator.estimate_list(&page[..fit]), Some(reason))
        };

        let has_more = start + returned < total;
        let next_offset = match truncation_reason {
            Some(TruncationReason::ItemExceedsTokenLimit) => Some(start + 1),
            _ if has_more => Some(start + returned),
            _ => None,
        };

        let info = PageInfo {
            total,
            offset: start,
            limit,
            returned,
            has_more,
            next_offset,
            token_estimate,
            truncation_reason,
            db_truncated: None,
            db_max_results: None,
        };
        let page_items = items.into_iter().skip(start).take(returned).collect();
        (page_items, info)
    }

    /// Binary search over prefix lengths. Estimates grow with prefix
    /// length, so the result is monotone in `max_tokens`.
    fn largest_fitting_prefix(&self, page: &[Value], max_tokens: usize) -> usize {
        let (mut low, mut high) = (1usize, page.len());
        let mut best = 0;
        while low <= high {
            let mid = low + (high - low) / 2;
            if self.estimator.estimate_list(&page[..mid]) <= max_tokens {
                best = mid;
                low = mid + 1;
            } else {
                high = mid - 1;
            }
        }
        best
    }
}
