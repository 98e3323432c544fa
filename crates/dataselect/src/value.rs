use std::borrow::Cow;
use std::cmp::Ordering;

use chrono::{DateTime, SecondsFormat, Utc};

/// A property value that can be ordered and matched.
///
/// Filter values arrive as text (`Str`). Comparing a typed value with text
/// coerces the text into the typed domain; when that fails both sides are
/// compared by their textual rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComparableValue {
    /// Lexicographic order, substring containment.
    Str(String),
    Int(i64),
    /// Compared at unix-second resolution.
    Time(DateTime<Utc>),
    /// An RFC 3339 timestamp kept as text; compared as time when both sides
    /// parse. Values that parse order ahead of values that do not.
    Rfc3339(String),
}

fn unix_seconds(raw: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(raw.trim()).ok().map(|t| t.timestamp())
}

/// Sort key: numbers, then times, then text. RFC 3339 text that parses
/// sorts as a time, text that does not sorts as text.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum SortKey<'a> {
    Int(i64),
    Time(i64),
    Text(Cow<'a, str>),
}

fn rfc3339_key(raw: &str) -> SortKey<'_> {
    match unix_seconds(raw) {
        Some(secs) => SortKey::Time(secs),
        None => SortKey::Text(Cow::Borrowed(raw)),
    }
}

impl ComparableValue {
    /// Match-oriented comparison used by filters. Text on either side is
    /// coerced into the other side's domain.
    pub fn compare(&self, other: &ComparableValue) -> Ordering {
        use ComparableValue::*;
        match (self, other) {
            (Str(a), Str(b)) => a.cmp(b),
            (Int(a), Int(b)) => a.cmp(b),
            (Time(a), Time(b)) => a.timestamp().cmp(&b.timestamp()),
            (Int(a), Str(b)) => match b.trim().parse::<i64>() {
                Ok(b) => a.cmp(&b),
                Err(_) => self.text().cmp(&other.text()),
            },
            (Time(a), Str(b)) | (Time(a), Rfc3339(b)) => match unix_seconds(b) {
                Some(b) => a.timestamp().cmp(&b),
                None => self.text().cmp(&other.text()),
            },
            (Rfc3339(a), Str(b)) | (Rfc3339(a), Rfc3339(b)) => rfc3339_key(a).cmp(&rfc3339_key(b)),
            (Str(_), Int(_)) | (Str(_), Time(_)) | (Rfc3339(_), Time(_)) | (Str(_), Rfc3339(_)) => {
                other.compare(self).reverse()
            }
            _ => self.text().cmp(&other.text()),
        }
    }

    /// Total order for sorting, consistent across mixed kinds.
    pub fn sort_cmp(&self, other: &ComparableValue) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }

    fn sort_key(&self) -> SortKey<'_> {
        match self {
            ComparableValue::Int(i) => SortKey::Int(*i),
            ComparableValue::Time(t) => SortKey::Time(t.timestamp()),
            ComparableValue::Rfc3339(s) => rfc3339_key(s),
            ComparableValue::Str(s) => SortKey::Text(Cow::Borrowed(s)),
        }
    }

    /// Substring match for strings, equality for everything else.
    pub fn contains(&self, other: &ComparableValue) -> bool {
        match self {
            ComparableValue::Str(a) => a.contains(other.text().as_ref()),
            _ => self.compare(other) == Ordering::Equal,
        }
    }

    pub fn text(&self) -> Cow<'_, str> {
        match self {
            ComparableValue::Str(s) | ComparableValue::Rfc3339(s) => Cow::Borrowed(s),
            ComparableValue::Int(i) => Cow::Owned(i.to_string()),
            ComparableValue::Time(t) => Cow::Owned(t.to_rfc3339_opts(SecondsFormat::Secs, true)),
        }
    }
}

impl From<&str> for ComparableValue {
    fn from(v: &str) -> Self {
        ComparableValue::Str(v.to_string())
    }
}

impl From<String> for ComparableValue {
    fn from(v: String) -> Self {
        ComparableValue::Str(v)
    }
}

impl From<i64> for ComparableValue {
    fn from(v: i64) -> Self {
        ComparableValue::Int(v)
    }
}

impl From<DateTime<Utc>> for ComparableValue {
    fn from(v: DateTime<Utc>) -> Self {
        ComparableValue::Time(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> ComparableValue {
        ComparableValue::Time(Utc.timestamp_opt(secs, 0).single().unwrap())
    }

    #[test]
    fn strings_compare_lexicographically_and_match_substrings() {
        let a = ComparableValue::from("nginx-7d9f");
        assert_eq!(a.compare(&"nginx-8".into()), Ordering::Less);
        assert!(a.contains(&"x-7".into()));
        assert!(!a.contains(&"redis".into()));
        assert!(a.contains(&"".into()));
    }

    #[test]
    fn ints_match_by_equality_and_coerce_text() {
        let three = ComparableValue::Int(3);
        assert_eq!(three.compare(&ComparableValue::Int(10)), Ordering::Less);
        assert!(three.contains(&"3".into()));
        assert!(!three.contains(&"33".into()));
        assert!(!three.contains(&"three".into()));
    }

    #[test]
    fn times_compare_at_second_resolution() {
        let a = ComparableValue::Time(Utc.timestamp_opt(100, 500_000_000).single().unwrap());
        assert_eq!(a.compare(&t(100)), Ordering::Equal);
        assert_eq!(t(99).compare(&t(100)), Ordering::Less);
        assert!(t(0).contains(&"1970-01-01T00:00:00Z".into()));
    }

    #[test]
    fn rfc3339_parses_or_falls_back_to_text() {
        let early = ComparableValue::Rfc3339("2021-01-01T10:00:00+02:00".into());
        let late = ComparableValue::Rfc3339("2021-01-01T09:00:00Z".into());
        // 08:00Z < 09:00Z even though the raw text sorts the other way
        assert_eq!(early.compare(&late), Ordering::Less);

        let junk = ComparableValue::Rfc3339("not-a-time".into());
        let other = ComparableValue::Rfc3339("2021-01-01T09:00:00Z".into());
        // parseable timestamps order ahead of unparseable text
        assert_eq!(junk.compare(&other), Ordering::Greater);
        assert_eq!(other.compare(&junk), Ordering::Less);
        assert!(late.contains(&"2021-01-01T09:00:00Z".into()));
    }

    #[test]
    fn mixed_text_and_int_compare_symmetrically() {
        let three = ComparableValue::Int(3);
        let ten = ComparableValue::from("10");
        assert_eq!(three.compare(&ten), Ordering::Less);
        assert_eq!(ten.compare(&three), Ordering::Greater);
        assert_eq!(ComparableValue::from("3").compare(&three), Ordering::Equal);
    }

    #[test]
    fn sort_order_is_transitive_across_parse_failures() {
        let a = ComparableValue::Rfc3339("2021-01-01T10:00:00+02:00".into());
        let b = ComparableValue::Rfc3339("2021-01-01T09:00:00Z".into());
        let c = ComparableValue::Rfc3339("2021-01-01T09:30".into());
        assert_eq!(a.sort_cmp(&b), Ordering::Less);
        assert_eq!(b.sort_cmp(&c), Ordering::Less);
        assert_eq!(a.sort_cmp(&c), Ordering::Less);
        assert_eq!(c.sort_cmp(&a), Ordering::Greater);

        let mut vals = vec![ComparableValue::from("x"), t(5), ComparableValue::Int(7), b.clone(), ComparableValue::Int(-1)];
        vals.sort_by(|x, y| x.sort_cmp(y));
        assert_eq!(vals[0], ComparableValue::Int(-1));
        assert_eq!(vals[1], ComparableValue::Int(7));
        assert_eq!(vals[2], t(5));
        assert_eq!(vals[3], b);
        assert_eq!(vals[4], ComparableValue::from("x"));
    }
}
