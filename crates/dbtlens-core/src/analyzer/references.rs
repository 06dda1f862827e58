use super::helpers::object_name;
use super::visit::{visit_statement, Reference};
use crate::catalog::{ObjectName, ObjectRef};
use crate::parser::parse_sql_with_dialect;
use crate::types::Dialect;
use std::collections::BTreeSet;
use tracing::trace;

/// Tables and multi-part functions referenced by `sql`, sorted and
/// deduplicated. CTE names are not tables. Unparseable SQL yields nothing.
pub fn referenced_objects(sql: &str, dialect: Dialect) -> Vec<ObjectRef> {
    let statements = match parse_sql_with_dialect(sql, dialect) {
        Ok(statements) => statements,
        Err(err) => {
            trace!(%err, "no references: sql does not parse");
            return Vec::new();
        }
    };

    let mut ctes: Vec<String> = Vec::new();
    let mut found: BTreeSet<ObjectRef> = BTreeSet::new();
    for statement in &statements {
        visit_statement(statement, &mut |reference| match reference {
            Reference::Cte(ident) => ctes.push(ident.value.to_ascii_lowercase()),
            Reference::Relation(name) => {
                found.insert(ObjectRef::table(object_name(name)));
            }
            Reference::Function(func) => {
                let name = object_name(&func.name);
                if name.len() >= 2 {
                    found.insert(ObjectRef::function(name));
                }
            }
        });
    }

    found
        .into_iter()
        .filter(|reference| !is_cte(&reference.name, &ctes))
        .collect()
}

fn is_cte(name: &ObjectName, ctes: &[String]) -> bool {
    name.len() == 1
        && name
            .last()
            .is_some_and(|last| ctes.iter().any(|cte| cte.eq_ignore_ascii_case(last)))
}
