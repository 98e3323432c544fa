use std::sync::Arc;

use kdash_metric::ResourceSelector;

use crate::ComparableValue;

/// Properties a cell can be sorted or filtered by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyName {
    Name,
    CreationTimestamp,
    Namespace,
    Status,
    Type,
    Reason,
    FirstSeen,
    LastSeen,
    /// A name outside the known set. No cell supports it.
    Other(String),
}

impl PropertyName {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "name" => PropertyName::Name,
            "creationTimestamp" => PropertyName::CreationTimestamp,
            "namespace" => PropertyName::Namespace,
            "status" => PropertyName::Status,
            "type" => PropertyName::Type,
            "reason" => PropertyName::Reason,
            "firstSeen" => PropertyName::FirstSeen,
            "lastSeen" => PropertyName::LastSeen,
            other => PropertyName::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PropertyName::Name => "name",
            PropertyName::CreationTimestamp => "creationTimestamp",
            PropertyName::Namespace => "namespace",
            PropertyName::Status => "status",
            PropertyName::Type => "type",
            PropertyName::Reason => "reason",
            PropertyName::FirstSeen => "firstSeen",
            PropertyName::LastSeen => "lastSeen",
            PropertyName::Other(s) => s,
        }
    }
}

impl From<&str> for PropertyName {
    fn from(raw: &str) -> Self {
        PropertyName::parse(raw)
    }
}

/// One selectable item.
pub trait DataCell {
    /// `None` when this kind has no such property.
    fn property(&self, name: &PropertyName) -> Option<ComparableValue>;
}

/// A cell that can be resolved to a resource for metric lookups.
pub trait MetricDataCell: DataCell {
    fn resource_selector(&self) -> ResourceSelector;
}

impl<T: DataCell + ?Sized> DataCell for &T {
    fn property(&self, name: &PropertyName) -> Option<ComparableValue> {
        (**self).property(name)
    }
}

impl<T: DataCell + ?Sized> DataCell for Arc<T> {
    fn property(&self, name: &PropertyName) -> Option<ComparableValue> {
        (**self).property(name)
    }
}

impl<T: MetricDataCell + ?Sized> MetricDataCell for &T {
    fn resource_selector(&self) -> ResourceSelector {
        (**self).resource_selector()
    }
}

impl<T: MetricDataCell + ?Sized> MetricDataCell for Arc<T> {
    fn resource_selector(&self) -> ResourceSelector {
        (**self).resource_selector()
    }
}
