use super::object::{ObjectKind, ObjectName, SchemaObject};
use std::collections::BTreeMap;

/// Immutable view of the catalog handed to the analyzer.
///
/// Table columns include partition pseudo-columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogSnapshot {
    tables: BTreeMap<ObjectName, SchemaObject>,
    functions: BTreeMap<ObjectName, SchemaObject>,
}

impl CatalogSnapshot {
    /// Builds a snapshot directly, bypassing a registry.
    pub fn from_objects(objects: impl IntoIterator<Item = SchemaObject>) -> Self {
        let mut snapshot = Self::default();
        for object in objects {
            snapshot.insert(object);
        }
        snapshot
    }

    pub(crate) fn insert(&mut self, object: SchemaObject) {
        let map = match object.kind {
            ObjectKind::Table => &mut self.tables,
            ObjectKind::Function => &mut self.functions,
        };
        map.insert(object.identity.clone(), object);
    }

    /// Exact lookup by identity.
    pub fn table(&self, name: &ObjectName) -> Option<&SchemaObject> {
        self.tables.get(name)
    }

    /// Resolves a possibly partial, case-insensitive table path.
    ///
    /// An exact match wins; otherwise the shortest identity ending with
    /// `name` is chosen.
    pub fn find_table(&self, name: &ObjectName) -> Option<&SchemaObject> {
        find(&self.tables, name)
    }

    pub fn find_function(&self, name: &ObjectName) -> Option<&SchemaObject> {
        find(&self.functions, name)
    }

    pub fn tables(&self) -> impl Iterator<Item = &SchemaObject> {
        self.tables.values()
    }

    pub fn functions(&self) -> impl Iterator<Item = &SchemaObject> {
        self.functions.values()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.functions.is_empty()
    }
}

fn find<'a>(
    objects: &'a BTreeMap<ObjectName, SchemaObject>,
    name: &ObjectName,
) -> Option<&'a SchemaObject> {
    if name.is_empty() {
        return None;
    }
    objects.get(name).or_else(|| {
        objects
            .values()
            .filter(|object| object.identity.ends_with(name))
            .min_by_key(|object| object.identity.len())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Column;

    fn snapshot() -> CatalogSnapshot {
        CatalogSnapshot::from_objects([
            SchemaObject::table(ObjectName::parse("p.sales.orders"), vec![Column::new("id", "INT64")]),
            SchemaObject::table(ObjectName::parse("p.raw.events"), vec![]),
            SchemaObject::function(ObjectName::parse("p.udfs.clean"), vec![], Some("STRING".into())),
        ])
    }

    #[test]
    fn partial_paths_resolve_by_suffix() {
        let snapshot = snapshot();
        let found = snapshot.find_table(&ObjectName::parse("SALES.orders")).unwrap();
        assert_eq!(found.identity, ObjectName::parse("p.sales.orders"));
        assert!(snapshot.find_table(&ObjectName::parse("raw.orders")).is_none());
    }

    #[test]
    fn functions_and_tables_are_separate() {
        let snapshot = snapshot();
        assert!(snapshot.find_table(&ObjectName::parse("udfs.clean")).is_none());
        assert!(snapshot.find_function(&ObjectName::parse("udfs.clean")).is_some());
    }
}
