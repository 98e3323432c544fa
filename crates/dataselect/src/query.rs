//! Query bundle: pagination, sort, filter and metric requests.

use std::ops::Range;

use kdash_metric::{AggregationMode, ONLY_DEFAULT_AGGREGATION};
use smallvec::SmallVec;

use crate::{ComparableValue, PropertyName};

pub const CPU_USAGE: &str = "cpu/usage_rate";
pub const MEMORY_USAGE: &str = "memory/usage";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationQuery {
    pub items_per_page: i64,
    /// 0-based.
    pub page: i64,
}

impl PaginationQuery {
    /// Return everything.
    pub const NONE: Self = Self { items_per_page: -1, page: -1 };
    /// Return nothing.
    pub const EMPTY: Self = Self { items_per_page: 0, page: 0 };
    pub const DEFAULT: Self = Self { items_per_page: 10, page: 0 };

    pub fn new(items_per_page: i64, page: i64) -> Self {
        Self { items_per_page, page }
    }

    /// Negative values switch pagination off.
    pub fn is_valid(&self) -> bool {
        self.items_per_page >= 0 && self.page >= 0
    }

    /// Index range of the requested page over `items_count` items.
    ///
    /// Always `0 <= start <= end <= items_count`; a page past the end is the
    /// empty range at `items_count`; an invalid query spans everything.
    pub fn settings(&self, items_count: usize) -> Range<usize> {
        if !self.is_valid() {
            return 0..items_count;
        }
        let n = items_count as u64;
        let per = self.items_per_page as u64;
        let start = per.saturating_mul(self.page as u64).min(n);
        let end = start.saturating_add(per).min(n);
        start as usize..end as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortBy {
    pub property: PropertyName,
    pub ascending: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortQuery {
    pub sort_by_list: SmallVec<[SortBy; 4]>,
}

impl SortQuery {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(sort_by_list: impl IntoIterator<Item = SortBy>) -> Self {
        Self { sort_by_list: sort_by_list.into_iter().collect() }
    }

    pub fn is_empty(&self) -> bool {
        self.sort_by_list.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterBy {
    pub property: PropertyName,
    pub value: ComparableValue,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterQuery {
    pub filter_by_list: SmallVec<[FilterBy; 4]>,
}

impl FilterQuery {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(filter_by_list: impl IntoIterator<Item = FilterBy>) -> Self {
        Self { filter_by_list: filter_by_list.into_iter().collect() }
    }

    pub fn is_empty(&self) -> bool {
        self.filter_by_list.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricQuery {
    pub metric_names: Vec<String>,
    pub aggregations: Vec<AggregationMode>,
}

impl MetricQuery {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(metric_names: Vec<String>, aggregations: Vec<AggregationMode>) -> Self {
        Self { metric_names, aggregations }
    }

    /// CPU and memory usage, summed.
    pub fn standard() -> Self {
        Self::new(vec![CPU_USAGE.to_string(), MEMORY_USAGE.to_string()], ONLY_DEFAULT_AGGREGATION.to_vec())
    }

    pub fn is_empty(&self) -> bool {
        self.metric_names.is_empty()
    }
}

/// Everything a list request asks the selector to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSelectQuery {
    pub pagination: PaginationQuery,
    pub sort: SortQuery,
    pub filter: FilterQuery,
    pub metric: MetricQuery,
}

impl DataSelectQuery {
    pub fn new(pagination: PaginationQuery, sort: SortQuery, filter: FilterQuery, metric: MetricQuery) -> Self {
        Self { pagination, sort, filter, metric }
    }

    /// Identity query: no pagination, sort, filter or metrics.
    pub fn none() -> Self {
        Self::new(PaginationQuery::NONE, SortQuery::none(), FilterQuery::none(), MetricQuery::none())
    }

    /// First page of ten, otherwise untouched.
    pub fn default_query() -> Self {
        Self::new(PaginationQuery::DEFAULT, SortQuery::none(), FilterQuery::none(), MetricQuery::none())
    }

    /// Copy of this query that asks for the standard metrics when it names
    /// none of its own.
    pub fn with_default_metrics(&self) -> Self {
        if !self.metric.is_empty() {
            return self.clone();
        }
        Self { metric: MetricQuery::standard(), ..self.clone() }
    }
}

impl Default for DataSelectQuery {
    fn default() -> Self {
        Self::none()
    }
}
