//! Process-wide registry of tables and user functions.

mod object;
mod registry;
mod snapshot;

pub use object::{Column, ObjectKind, ObjectName, ObjectOrigin, ObjectRef, SchemaObject};
pub use registry::{
    CatalogRegistry, RegisterOutcome, SyncFailure, SyncReport, PARTITION_DATE_COLUMN,
    PARTITION_TIME_COLUMN,
};
pub use snapshot::CatalogSnapshot;
