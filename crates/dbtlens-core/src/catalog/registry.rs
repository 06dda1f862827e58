use super::object::{Column, ObjectKind, ObjectName, ObjectRef, SchemaObject};
use super::snapshot::CatalogSnapshot;
use crate::engine::SchemaSource;
use crate::error::FetchError;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Pseudo-columns every time-partitioned table exposes.
pub const PARTITION_TIME_COLUMN: &str = "_PARTITIONTIME";
pub const PARTITION_DATE_COLUMN: &str = "_PARTITIONDATE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Inserted,
    Updated,
    Unchanged,
}

/// Result of one [`CatalogRegistry::sync`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Identities fetched and registered by this call, sorted.
    pub registered: Vec<ObjectName>,
    pub failures: Vec<SyncFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    pub name: ObjectName,
    pub error: FetchError,
}

#[derive(Debug, Clone)]
struct CatalogEntry {
    object: SchemaObject,
    system_columns: Vec<Column>,
    registered_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct CatalogState {
    tables: HashMap<ObjectName, CatalogEntry>,
    functions: HashMap<ObjectName, CatalogEntry>,
    /// Raised by inserts and updates, cleared when a snapshot is taken.
    has_new: bool,
    snapshot: Option<Arc<CatalogSnapshot>>,
}

impl CatalogState {
    fn entries(&self, kind: ObjectKind) -> &HashMap<ObjectName, CatalogEntry> {
        match kind {
            ObjectKind::Table => &self.tables,
            ObjectKind::Function => &self.functions,
        }
    }

    fn entries_mut(&mut self, kind: ObjectKind) -> &mut HashMap<ObjectName, CatalogEntry> {
        match kind {
            ObjectKind::Table => &mut self.tables,
            ObjectKind::Function => &mut self.functions,
        }
    }
}

/// Shared, idempotent registry of tables and user functions.
///
/// Cloning yields another handle to the same registry.
#[derive(Debug, Clone, Default)]
pub struct CatalogRegistry {
    state: Arc<Mutex<CatalogState>>,
}

impl CatalogRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_registered(&self, name: &ObjectName, kind: ObjectKind) -> bool {
        self.state.lock().entries(kind).contains_key(name)
    }

    pub fn len(&self) -> usize {
        let state = self.state.lock();
        state.tables.len() + state.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_new_objects(&self) -> bool {
        self.state.lock().has_new
    }

    /// When `name` was first registered and when it last changed.
    pub fn timestamps(
        &self,
        name: &ObjectName,
        kind: ObjectKind,
    ) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.state
            .lock()
            .entries(kind)
            .get(name)
            .map(|entry| (entry.registered_at, entry.updated_at))
    }

    /// Inserts `object`, or reconciles it with the registered version.
    ///
    /// Columns no longer present are removed and current ones upserted in
    /// place. Partition pseudo-columns are tracked separately and never
    /// reported as changes of the column list.
    pub fn register(&self, object: SchemaObject) -> RegisterOutcome {
        let mut state = self.state.lock();
        let now = Utc::now();
        let kind = object.kind;
        let identity = object.identity.clone();
        let (columns, system_columns) = split_system_columns(&object);

        let outcome = match state.entries_mut(kind).entry(identity.clone()) {
            Entry::Vacant(vacant) => {
                vacant.insert(CatalogEntry {
                    object: SchemaObject { columns, ..object },
                    system_columns,
                    registered_at: now,
                    updated_at: now,
                });
                RegisterOutcome::Inserted
            }
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                let mut changed = reconcile_columns(&mut entry.object.columns, columns);
                if entry.system_columns != system_columns {
                    entry.system_columns = system_columns;
                    changed = true;
                }
                if entry.object.time_partitioned != object.time_partitioned
                    || entry.object.return_type != object.return_type
                    || entry.object.origin != object.origin
                {
                    entry.object.time_partitioned = object.time_partitioned;
                    entry.object.return_type = object.return_type;
                    entry.object.origin = object.origin;
                    changed = true;
                }
                if changed {
                    entry.updated_at = now;
                    RegisterOutcome::Updated
                } else {
                    RegisterOutcome::Unchanged
                }
            }
        };

        if outcome != RegisterOutcome::Unchanged {
            state.has_new = true;
            debug!(name = %identity, %kind, ?outcome, "catalog registration");
        }
        outcome
    }

    /// An immutable view of the registry, rebuilt only after changes.
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        let mut state = self.state.lock();
        if let Some(snapshot) = &state.snapshot {
            if !state.has_new {
                return Arc::clone(snapshot);
            }
        }

        let mut snapshot = CatalogSnapshot::default();
        for entry in state.tables.values() {
            let mut table = entry.object.clone();
            table.columns.extend(entry.system_columns.iter().cloned());
            snapshot.insert(table);
        }
        for entry in state.functions.values() {
            snapshot.insert(entry.object.clone());
        }

        let snapshot = Arc::new(snapshot);
        state.snapshot = Some(Arc::clone(&snapshot));
        state.has_new = false;
        snapshot
    }

    /// Fetches and registers every candidate that is not registered yet.
    ///
    /// Fetches run concurrently without the registry lock held. A failed
    /// fetch is logged and reported without affecting the others. Functions
    /// with single-part names are builtins and never fetched.
    pub async fn sync(&self, candidates: &[ObjectRef], source: Arc<dyn SchemaSource>) -> SyncReport {
        let missing: BTreeSet<ObjectRef> = {
            let state = self.state.lock();
            candidates
                .iter()
                .filter(|candidate| !candidate.name.is_empty())
                .filter(|candidate| candidate.kind != ObjectKind::Function || candidate.name.len() >= 2)
                .filter(|candidate| !state.entries(candidate.kind).contains_key(&candidate.name))
                .cloned()
                .collect()
        };

        let mut report = SyncReport::default();
        if missing.is_empty() {
            return report;
        }

        let mut fetches = JoinSet::new();
        for candidate in missing {
            let source = Arc::clone(&source);
            fetches.spawn(async move {
                let result = source.fetch(&candidate.name, candidate.kind).await;
                (candidate, result)
            });
        }

        while let Some(joined) = fetches.join_next().await {
            match joined {
                Ok((candidate, Ok(mut object))) => {
                    if object.identity != candidate.name {
                        debug!(
                            requested = %candidate.name,
                            returned = %object.identity,
                            "schema source renamed object; keeping requested identity"
                        );
                        object.identity = candidate.name.clone();
                    }
                    object.kind = candidate.kind;
                    self.register(object);
                    report.registered.push(candidate.name);
                }
                Ok((candidate, Err(error))) => {
                    warn!(name = %candidate.name, kind = %candidate.kind, %error, "schema fetch failed");
                    report.failures.push(SyncFailure {
                        name: candidate.name,
                        error,
                    });
                }
                Err(error) => {
                    warn!(%error, "schema fetch task aborted");
                }
            }
        }

        report.registered.sort();
        report.failures.sort_by(|a, b| a.name.cmp(&b.name));
        if !report.registered.is_empty() {
            info!(count = report.registered.len(), "registered catalog objects");
        }
        report
    }
}

fn is_partition_column(name: &str) -> bool {
    name.eq_ignore_ascii_case(PARTITION_TIME_COLUMN) || name.eq_ignore_ascii_case(PARTITION_DATE_COLUMN)
}

fn split_system_columns(object: &SchemaObject) -> (Vec<Column>, Vec<Column>) {
    if object.kind != ObjectKind::Table {
        return (object.columns.clone(), Vec::new());
    }
    let columns = object
        .columns
        .iter()
        .filter(|column| !is_partition_column(&column.name))
        .cloned()
        .collect();
    let system = if object.time_partitioned {
        vec![
            Column::new(PARTITION_TIME_COLUMN, "TIMESTAMP"),
            Column::new(PARTITION_DATE_COLUMN, "DATE"),
        ]
    } else {
        Vec::new()
    };
    (columns, system)
}

/// Removes columns missing from `incoming` and upserts the rest. Returns
/// true if anything changed.
fn reconcile_columns(existing: &mut Vec<Column>, incoming: Vec<Column>) -> bool {
    let before = existing.len();
    existing.retain(|column| {
        incoming
            .iter()
            .any(|candidate| candidate.name.eq_ignore_ascii_case(&column.name))
    });
    let mut changed = existing.len() != before;

    for column in incoming {
        match existing
            .iter_mut()
            .find(|current| current.name.eq_ignore_ascii_case(&column.name))
        {
            Some(current) if *current != column => {
                *current = column;
                changed = true;
            }
            Some(_) => {}
            None => {
                existing.push(column);
                changed = true;
            }
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn orders(columns: &[(&str, &str)]) -> SchemaObject {
        SchemaObject::table(
            ObjectName::parse("p.d.orders"),
            columns.iter().map(|(n, t)| Column::new(*n, *t)).collect(),
        )
    }

    #[test]
    fn register_is_idempotent() {
        let registry = CatalogRegistry::new();
        let table = orders(&[("id", "INT64"), ("paused", "BOOL")]);

        assert_eq!(registry.register(table.clone()), RegisterOutcome::Inserted);
        registry.snapshot();
        assert!(!registry.has_new_objects());

        assert_eq!(registry.register(table), RegisterOutcome::Unchanged);
        assert!(!registry.has_new_objects());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn reconcile_removes_and_upserts_columns() {
        let registry = CatalogRegistry::new();
        registry.register(orders(&[("id", "INT64"), ("old", "STRING")]));
        let outcome = registry.register(orders(&[("id", "STRING"), ("new", "DATE")]));
        assert_eq!(outcome, RegisterOutcome::Updated);

        let snapshot = registry.snapshot();
        let table = snapshot.table(&ObjectName::parse("p.d.orders")).unwrap();
        assert_eq!(
            table.columns,
            vec![Column::new("id", "STRING"), Column::new("new", "DATE")]
        );
    }

    #[test]
    fn partition_columns_are_kept_apart() {
        let registry = CatalogRegistry::new();
        let table = orders(&[("id", "INT64")]).partitioned(true);
        registry.register(table.clone());

        let snapshot = registry.snapshot();
        let names: Vec<_> = snapshot
            .table(&ObjectName::parse("p.d.orders"))
            .unwrap()
            .columns
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, ["id", "_PARTITIONTIME", "_PARTITIONDATE"]);

        // a source that echoes the pseudo-columns back is not a change
        let mut echoed = table;
        echoed.columns.push(Column::new("_PARTITIONTIME", "TIMESTAMP"));
        assert_eq!(registry.register(echoed), RegisterOutcome::Unchanged);
    }

    #[test]
    fn snapshot_is_reused_until_change() {
        let registry = CatalogRegistry::new();
        registry.register(orders(&[("id", "INT64")]));
        let first = registry.snapshot();
        assert!(Arc::ptr_eq(&first, &registry.snapshot()));

        registry.register(orders(&[("id", "INT64"), ("x", "STRING")]));
        assert!(!Arc::ptr_eq(&first, &registry.snapshot()));
    }

    #[test]
    fn timestamps_track_updates() {
        let registry = CatalogRegistry::new();
        let name = ObjectName::parse("p.d.orders");
        registry.register(orders(&[("id", "INT64")]));
        let (registered, updated) = registry.timestamps(&name, ObjectKind::Table).unwrap();
        assert_eq!(registered, updated);

        registry.register(orders(&[("id", "INT64")]));
        assert_eq!(registry.timestamps(&name, ObjectKind::Table).unwrap().1, updated);
    }

    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SchemaSource for CountingSource {
        async fn fetch(&self, name: &ObjectName, kind: ObjectKind) -> Result<SchemaObject, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match (name.last(), kind) {
                (Some("missing"), _) => Err(FetchError::NotFound(name.clone())),
                (_, ObjectKind::Function) => Ok(SchemaObject::function(
                    name.clone(),
                    vec![Column::new("x", "INT64")],
                    Some("INT64".into()),
                )),
                _ => Ok(SchemaObject::table(name.clone(), vec![Column::new("id", "INT64")])),
            }
        }
    }

    #[tokio::test]
    async fn sync_fetches_only_unregistered_objects() {
        let registry = CatalogRegistry::new();
        registry.register(SchemaObject::table(ObjectName::parse("a.b.t1"), vec![]));
        let source = Arc::new(CountingSource { calls: AtomicUsize::new(0) });

        let report = registry
            .sync(
                &[ObjectRef::table("a.b.t1"), ObjectRef::table("a.b.t2")],
                source.clone(),
            )
            .await;

        assert_eq!(report.registered, vec![ObjectName::parse("a.b.t2")]);
        assert!(report.failures.is_empty());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert!(registry.is_registered(&ObjectName::parse("a.b.t2"), ObjectKind::Table));
    }

    #[tokio::test]
    async fn sync_isolates_failures() {
        let registry = CatalogRegistry::new();
        let source = Arc::new(CountingSource { calls: AtomicUsize::new(0) });

        let report = registry
            .sync(
                &[
                    ObjectRef::table("a.b.missing"),
                    ObjectRef::table("a.b.present"),
                    ObjectRef::function("a.udf"),
                    ObjectRef::function("upper"),
                ],
                source.clone(),
            )
            .await;

        assert_eq!(
            report.registered,
            vec![ObjectName::parse("a.b.present"), ObjectName::parse("a.udf")]
        );
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].error.is_not_found());
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn sync_with_everything_registered_is_a_no_op() {
        let registry = CatalogRegistry::new();
        registry.register(orders(&[("id", "INT64")]));
        let source = Arc::new(CountingSource { calls: AtomicUsize::new(0) });

        let report = registry.sync(&[ObjectRef::table("p.d.orders")], source.clone()).await;
        assert_eq!(report, SyncReport::default());
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }
}
