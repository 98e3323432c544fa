use serde::{Deserialize, Serialize};

/// Namespaces a request is scoped to. Empty means all namespaces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceQuery {
    namespaces: Vec<String>,
}

impl NamespaceQuery {
    pub fn new(namespaces: impl IntoIterator<Item = String>) -> Self {
        let mut out: Vec<String> = Vec::new();
        for ns in namespaces {
            let ns = ns.trim().to_string();
            if !ns.is_empty() && !out.contains(&ns) {
                out.push(ns);
            }
        }
        Self { namespaces: out }
    }

    pub fn all() -> Self {
        Self::default()
    }

    pub fn single(namespace: &str) -> Self {
        Self::new([namespace.to_string()])
    }

    /// Parse a comma-separated namespace list (`"default,kube-system"`).
    pub fn parse_csv(raw: &str) -> Self {
        Self::new(raw.split(',').map(|s| s.to_string()))
    }

    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }

    /// The namespace to hand to the API server. Only a single-namespace query
    /// can be narrowed server-side; anything else lists all namespaces.
    pub fn to_request_param(&self) -> Option<&str> {
        match self.namespaces.as_slice() {
            [ns] => Some(ns.as_str()),
            _ => None,
        }
    }

    pub fn matches(&self, namespace: &str) -> bool {
        self.namespaces.is_empty() || self.namespaces.iter().any(|ns| ns == namespace)
    }

    /// Cluster-scoped objects (no namespace) always match.
    pub fn matches_opt(&self, namespace: Option<&str>) -> bool {
        namespace.map_or(true, |ns| self.matches(ns))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_matches_everything() {
        let q = NamespaceQuery::all();
        assert!(q.matches("kube-system"));
        assert_eq!(q.to_request_param(), None);
    }

    #[test]
    fn csv_is_trimmed_and_deduplicated() {
        let q = NamespaceQuery::parse_csv(" default, ,kube-system,default");
        assert_eq!(q.namespaces(), &["default".to_string(), "kube-system".to_string()]);
        assert_eq!(q.to_request_param(), None);
        assert!(!q.matches("prod"));
        assert!(q.matches_opt(None));
    }

    #[test]
    fn single_namespace_is_pushed_upstream() {
        let q = NamespaceQuery::single("prod");
        assert_eq!(q.to_request_param(), Some("prod"));
    }
}
