//! Data-select request parameters as they arrive on the query string.

use kdash_metric::AggregationMode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    ComparableValue, DataSelectQuery, FilterBy, FilterQuery, MetricQuery, PaginationQuery, PropertyName, SortBy,
    SortQuery,
};

/// Raw query parameters. Malformed values degrade to the identity query for
/// that part rather than failing the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataSelectParams {
    pub items_per_page: Option<String>,
    /// 1-based.
    pub page: Option<String>,
    /// CSV of alternating direction/property pairs: `d,creationTimestamp,a,name`.
    pub sort_by: Option<String>,
    /// CSV of alternating property/value pairs: `name,nginx,namespace,prod`.
    pub filter_by: Option<String>,
    pub metric_names: Option<String>,
    pub aggregations: Option<String>,
}

fn csv(raw: Option<&str>) -> Vec<&str> {
    match raw {
        Some(s) if !s.is_empty() => s.split(',').collect(),
        _ => Vec::new(),
    }
}

impl DataSelectParams {
    pub fn pagination_query(&self) -> PaginationQuery {
        let parse = |v: &Option<String>| v.as_deref().and_then(|s| s.trim().parse::<i64>().ok());
        match (parse(&self.items_per_page), parse(&self.page)) {
            (Some(per), Some(page)) => PaginationQuery::new(per, page.saturating_sub(1)),
            _ => PaginationQuery::NONE,
        }
    }

    pub fn sort_query(&self) -> SortQuery {
        let raw = csv(self.sort_by.as_deref());
        if raw.len() % 2 == 1 {
            debug!(sort_by = ?self.sort_by, "odd sortBy list; not sorting");
            return SortQuery::none();
        }
        let mut out = Vec::with_capacity(raw.len() / 2);
        for pair in raw.chunks(2) {
            let ascending = match pair[0].trim() {
                "a" | "asc" => true,
                "d" | "dsc" | "desc" => false,
                other => {
                    debug!(direction = other, "unknown sort direction; not sorting");
                    return SortQuery::none();
                }
            };
            out.push(SortBy { property: PropertyName::parse(pair[1]), ascending });
        }
        SortQuery::new(out)
    }

    pub fn filter_query(&self) -> FilterQuery {
        let raw = csv(self.filter_by.as_deref());
        if raw.len() % 2 == 1 {
            debug!(filter_by = ?self.filter_by, "odd filterBy list; not filtering");
            return FilterQuery::none();
        }
        FilterQuery::new(raw.chunks(2).map(|pair| FilterBy {
            property: PropertyName::parse(pair[0]),
            value: ComparableValue::from(pair[1]),
        }))
    }

    pub fn metric_query(&self) -> MetricQuery {
        let names = csv(self.metric_names.as_deref()).into_iter().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let aggregations = csv(self.aggregations.as_deref()).into_iter().map(AggregationMode::from_name);
        MetricQuery::new(names.collect(), aggregations.collect())
    }

    pub fn to_query(&self) -> DataSelectQuery {
        DataSelectQuery::new(self.pagination_query(), self.sort_query(), self.filter_query(), self.metric_query())
    }
}

impl From<&DataSelectParams> for DataSelectQuery {
    fn from(p: &DataSelectParams) -> Self {
        p.to_query()
    }
}
