//! kdash dataselect: one filter → sort → paginate pipeline for every
//! resource kind.
//!
//! Resource kinds opt in by implementing [`DataCell`]: a lookup from a
//! [`PropertyName`] to a [`ComparableValue`]. Properties a kind does not
//! have come back as `None`: such a cell passes every filter on the
//! property and sorts after the cells that have it.

#![forbid(unsafe_code)]

pub mod cell;
pub mod params;
pub mod query;
pub mod select;
pub mod value;

pub use cell::{DataCell, MetricDataCell, PropertyName};
pub use params::DataSelectParams;
pub use query::{DataSelectQuery, FilterBy, FilterQuery, MetricQuery, PaginationQuery, SortBy, SortQuery};
pub use select::{
    generic_data_select, generic_data_select_with_filter, generic_data_select_with_filter_and_metrics,
    DataSelector,
};
pub use value::ComparableValue;
