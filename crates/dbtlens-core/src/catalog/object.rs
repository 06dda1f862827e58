use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A dotted object path such as `project.dataset.table`.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct ObjectName(Vec<String>);

impl ObjectName {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    /// Parses a dotted path, stripping back-tick quoting.
    ///
    /// A quoted segment may itself contain dots (`` `p.d`.t ``), which are
    /// split like any other.
    pub fn parse(path: &str) -> Self {
        Self(
            path.split('.')
                .map(|part| part.trim().trim_matches('`').trim())
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Case-insensitive match of `suffix` against the trailing parts.
    pub fn ends_with(&self, suffix: &ObjectName) -> bool {
        suffix.len() <= self.len()
            && self.0[self.len() - suffix.len()..]
                .iter()
                .zip(&suffix.0)
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }

    /// Appends a part, returning the extended name.
    pub fn child(&self, part: impl Into<String>) -> Self {
        let mut parts = self.0.clone();
        parts.push(part.into());
        Self(parts)
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

impl From<&str> for ObjectName {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Table,
    Function,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table => f.write_str("table"),
            Self::Function => f.write_str("function"),
        }
    }
}

/// A named, typed column or function argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// Where a catalog object came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ObjectOrigin {
    /// Loaded from a schema source.
    #[default]
    Fetched,
    /// Produced from the analysis of an open model.
    Derived,
}

/// A table or user function known to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchemaObject {
    pub identity: ObjectName,
    pub kind: ObjectKind,
    /// Table columns, or function arguments.
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    #[serde(default)]
    pub time_partitioned: bool,
    #[serde(default)]
    pub origin: ObjectOrigin,
}

impl SchemaObject {
    pub fn table(identity: ObjectName, columns: Vec<Column>) -> Self {
        Self {
            identity,
            kind: ObjectKind::Table,
            columns,
            return_type: None,
            time_partitioned: false,
            origin: ObjectOrigin::Fetched,
        }
    }

    pub fn function(
        identity: ObjectName,
        arguments: Vec<Column>,
        return_type: Option<String>,
    ) -> Self {
        Self {
            identity,
            kind: ObjectKind::Function,
            columns: arguments,
            return_type,
            time_partitioned: false,
            origin: ObjectOrigin::Fetched,
        }
    }

    pub fn partitioned(mut self, time_partitioned: bool) -> Self {
        self.time_partitioned = time_partitioned;
        self
    }

    pub fn derived(mut self) -> Self {
        self.origin = ObjectOrigin::Derived;
        self
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|column| column.name.eq_ignore_ascii_case(name))
    }
}

/// An object referenced by compiled SQL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub struct ObjectRef {
    pub name: ObjectName,
    pub kind: ObjectKind,
}

impl ObjectRef {
    pub fn table(name: impl Into<ObjectName>) -> Self {
        Self {
            name: name.into(),
            kind: ObjectKind::Table,
        }
    }

    pub fn function(name: impl Into<ObjectName>) -> Self {
        Self {
            name: name.into(),
            kind: ObjectKind::Function,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_strips_backticks() {
        let name = ObjectName::parse("`my-project`.`dataset`.`events`");
        assert_eq!(name.parts(), ["my-project", "dataset", "events"]);
        assert_eq!(name.to_string(), "my-project.dataset.events");
    }

    #[test]
    fn parse_splits_quoted_paths() {
        assert_eq!(ObjectName::parse("`p.d.t`"), ObjectName::parse("p.d.t"));
    }

    #[test]
    fn suffix_match_ignores_case() {
        let name = ObjectName::parse("proj.Analytics.Orders");
        assert!(name.ends_with(&ObjectName::parse("analytics.orders")));
        assert!(!name.ends_with(&ObjectName::parse("other.orders")));
        assert!(!name.ends_with(&ObjectName::parse("x.proj.analytics.orders")));
    }
}
