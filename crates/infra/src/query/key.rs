//! Cache keys

use std::collections::BTreeMap;
use std::fmt;

/// Identifies one cached query: a dotted resource name plus parameters.
///
/// Parameters are kept sorted so the same set always produces the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    resource: String,
    params: BTreeMap<String, String>,
}

impl QueryKey {
    pub fn new(resource: impl Into<String>) -> Self {
        Self { resource: resource.into(), params: BTreeMap::new() }
    }

    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(name.into(), value.to_string());
        self
    }

    #[must_use]
    pub fn with_optional_param<V: ToString>(self, name: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.with_param(name, value),
            None => self,
        }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Whether this key belongs to `resource` or one of its sub-resources
    /// (`banking` matches `banking.accounts`).
    pub fn matches_resource(&self, resource: &str) -> bool {
        self.resource == resource
            || self
                .resource
                .strip_prefix(resource)
                .is_some_and(|rest| rest.starts_with('.'))
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.resource)?;
        if !self.params.is_empty() {
            let rendered: Vec<String> =
                self.params.iter().map(|(name, value)| format!("{name}={value}")).collect();
            write!(f, "?{}", rendered.join("&"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_order_does_not_matter() {
        let a = QueryKey::new("banking.transactions").with_param("limit", 100).with_param("offset", 0);
        let b = QueryKey::new("banking.transactions").with_param("offset", 0).with_param("limit", 100);
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "banking.transactions?limit=100&offset=0");
    }

    #[test]
    fn resource_prefix_matching() {
        let key = QueryKey::new("banking.accounts");
        assert!(key.matches_resource("banking"));
        assert!(key.matches_resource("banking.accounts"));
        assert!(!key.matches_resource("bank"));
        assert!(!key.matches_resource("transactions"));
    }

    #[test]
    fn optional_params_are_skipped_when_absent() {
        let key = QueryKey::new("banking.transactions").with_optional_param("account_id", None::<&str>);
        assert!(key.params().is_empty());
    }
}
