//! The external calls of one pass. These run on spawned tasks and never touch
//! session state.

use crate::catalog::{CatalogRegistry, Column, ObjectName, SchemaObject};
use crate::engine::Engines;
use crate::error::{AnalysisError, CompileError};
use crate::templater::{model_name, TemplateConfig};
use crate::text::TextSnapshot;
use crate::types::Analysis;
use std::sync::Arc;
use tracing::{debug, info};

pub(crate) async fn compile_pass(
    engines: Engines,
    raw: Arc<TextSnapshot>,
) -> Result<String, CompileError> {
    let compiled = engines.templater.expand(&raw).await?;
    debug!(uri = %raw.uri, version = raw.version, bytes = compiled.len(), "expanded template");
    Ok(compiled)
}

/// Syncs the catalog with the objects `compiled` references, then analyzes
/// it. A successful analysis registers the model's own relation.
pub(crate) async fn analysis_pass(
    engines: Engines,
    catalog: CatalogRegistry,
    compiled: Arc<TextSnapshot>,
    derived: Option<ObjectName>,
) -> Result<Analysis, AnalysisError> {
    let references = engines.analyzer.referenced_objects(&compiled.content).await;
    let report = catalog.sync(&references, Arc::clone(&engines.schema)).await;
    if !report.failures.is_empty() {
        debug!(uri = %compiled.uri, failures = report.failures.len(), "catalog sync incomplete");
    }

    let snapshot = catalog.snapshot();
    let analysis = engines.analyzer.analyze(&compiled.content, &snapshot).await?;

    if let Some(name) = derived {
        let columns: Vec<Column> = analysis
            .output_columns
            .iter()
            .filter(|column| !column.name.starts_with('$'))
            .map(|column| {
                Column::new(
                    column.name.clone(),
                    column.data_type.clone().unwrap_or_else(|| "UNKNOWN".to_string()),
                )
            })
            .collect();
        let outcome = catalog.register(SchemaObject::table(name.clone(), columns).derived());
        info!(name = %name, ?outcome, "registered model output");
    }
    Ok(analysis)
}

/// Catalog identity of the model stored at `uri`:
/// `project.dataset.<file stem>` when both are configured, otherwise the
/// bare file stem.
pub fn derived_name(uri: &str, template: &TemplateConfig) -> Option<ObjectName> {
    let model = model_name(uri)?;
    Some(match (&template.project, &template.dataset) {
        (Some(project), Some(dataset)) => {
            ObjectName::new([project.as_str(), dataset.as_str(), model])
        }
        (None, Some(dataset)) => ObjectName::new([dataset.as_str(), model]),
        _ => ObjectName::new([model]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_name_uses_project_and_dataset() {
        let template = TemplateConfig {
            project: Some("acme".into()),
            dataset: Some("analytics".into()),
            ..TemplateConfig::default()
        };
        assert_eq!(
            derived_name("file:///repo/models/orders.sql", &template),
            Some(ObjectName::parse("acme.analytics.orders"))
        );
        assert_eq!(
            derived_name("file:///repo/models/orders.sql", &TemplateConfig::default()),
            Some(ObjectName::parse("orders"))
        );
    }
}
