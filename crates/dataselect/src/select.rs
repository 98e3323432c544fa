//! The filter → sort → paginate engine.

use std::cmp::Ordering;

use kdash_metric::{MetricClient, MetricPromises, ResourceSelector};
use tracing::debug;

use crate::{ComparableValue, DataCell, DataSelectQuery, MetricDataCell, SortBy};

/// Runs the stages of a [`DataSelectQuery`] over a list of cells.
///
/// Stages chain on `self`; the intended order is `filter`, `sort`,
/// `paginate`, which [`DataSelector::select`] runs in one go.
pub struct DataSelector<'q, T> {
    cells: Vec<T>,
    query: &'q DataSelectQuery,
}

/// Lexicographic over the sort keys. A cell without a key sorts after every
/// cell that has it, in either direction.
fn compare_keys(a: &[Option<ComparableValue>], b: &[Option<ComparableValue>], keys: &[SortBy]) -> Ordering {
    for ((x, y), key) in a.iter().zip(b.iter()).zip(keys) {
        let ord = match (x, y) {
            (Some(x), Some(y)) if key.ascending => x.sort_cmp(y),
            (Some(x), Some(y)) => y.sort_cmp(x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

impl<'q, T: DataCell> DataSelector<'q, T> {
    pub fn new(cells: Vec<T>, query: &'q DataSelectQuery) -> Self {
        Self { cells, query }
    }

    /// Keep cells matching every filter pair. A cell without the filtered
    /// property is kept.
    pub fn filter(mut self) -> Self {
        let query = self.query;
        let filters = &query.filter.filter_by_list;
        if filters.is_empty() {
            return self;
        }
        self.cells.retain(|cell| {
            filters.iter().all(|f| cell.property(&f.property).map_or(true, |v| v.contains(&f.value)))
        });
        self
    }

    /// Stable multi-key sort; ties fall through to the next key.
    pub fn sort(mut self) -> Self {
        let query = self.query;
        let keys = &query.sort.sort_by_list;
        if keys.is_empty() {
            return self;
        }
        let mut keyed: Vec<(Vec<Option<ComparableValue>>, T)> = self
            .cells
            .drain(..)
            .map(|c| (keys.iter().map(|k| c.property(&k.property)).collect(), c))
            .collect();
        keyed.sort_by(|(a, _), (b, _)| compare_keys(a, b, keys));
        self.cells = keyed.into_iter().map(|(_, c)| c).collect();
        self
    }

    pub fn paginate(mut self) -> Self {
        let range = self.query.pagination.settings(self.cells.len());
        self.cells.truncate(range.end);
        self.cells.drain(..range.start);
        self
    }

    /// Full pipeline. Returns the page and the item count after filtering.
    pub fn select(self) -> (Vec<T>, usize) {
        let input = self.cells.len();
        let filtered = self.filter();
        let total = filtered.len();
        let page = filtered.sort().paginate();
        metrics::gauge!("dataselect_filtered_items", total as f64);
        debug!(input, filtered = total, page = page.len(), "data select");
        (page.cells, total)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[T] {
        &self.cells
    }

    pub fn into_cells(self) -> Vec<T> {
        self.cells
    }
}

impl<'q, T: MetricDataCell> DataSelector<'q, T> {
    /// Request the query's metrics for the current cells, aggregated once
    /// per aggregation mode. Call after paginating so only the returned page
    /// is fetched.
    pub fn cumulative_metrics(&self, client: &dyn MetricClient) -> MetricPromises {
        let mq = &self.query.metric;
        let mut out = MetricPromises::empty();
        if mq.is_empty() {
            return out;
        }
        let selectors: Vec<ResourceSelector> = self.cells.iter().map(|c| c.resource_selector()).collect();
        for name in &mq.metric_names {
            let raw = client.download_metric(&selectors, name);
            out.extend(client.aggregate_metrics(raw, name, &mq.aggregations));
        }
        debug!(resources = selectors.len(), metrics = mq.metric_names.len(), promises = out.len(), "cumulative metrics requested");
        out
    }
}

/// Filter, sort and paginate `cells`.
pub fn generic_data_select<T: DataCell>(cells: Vec<T>, query: &DataSelectQuery) -> Vec<T> {
    DataSelector::new(cells, query).select().0
}

/// Like [`generic_data_select`], also returning the count after filtering
/// so callers can compute the number of pages.
pub fn generic_data_select_with_filter<T: DataCell>(cells: Vec<T>, query: &DataSelectQuery) -> (Vec<T>, usize) {
    DataSelector::new(cells, query).select()
}

/// Like [`generic_data_select_with_filter`], also requesting cumulative
/// metrics for the returned page. Without a client no metrics are requested.
/// Spawns aggregation tasks, so it must run inside a tokio runtime.
pub fn generic_data_select_with_filter_and_metrics<T: MetricDataCell>(
    cells: Vec<T>,
    query: &DataSelectQuery,
    client: Option<&dyn MetricClient>,
) -> (Vec<T>, MetricPromises, usize) {
    let (page, total) = DataSelector::new(cells, query).select();
    let Some(client) = client else {
        return (page, MetricPromises::empty(), total);
    };
    let selector = DataSelector::new(page, query);
    let promises = selector.cumulative_metrics(client);
    (selector.into_cells(), promises, total)
}
