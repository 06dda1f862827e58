//! Stubs for the dbt builtins.
//!
//! These only need to produce SQL the analyzer can resolve, not to reproduce a
//! dbt run:
//!
//! - `ref('m')` renders `` `project`.`dataset`.`m` `` when both are configured;
//!   the two-argument form treats its first argument as the project
//! - `source('s', 't')` renders `` `project`.`s`.`t` ``
//! - `var()` falls back to the default, then to the variable name
//! - `is_incremental()` and `execute` are false; `run_query()` is empty
//! - package namespaces (`dbt_utils.*`, ...) pass their first argument through

use super::TemplateConfig;
use minijinja::value::{Object, ValueKind};
use minijinja::{Environment, Error, ErrorKind, State, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

const DEFAULT_PACKAGES: &[&str] = &[
    "dbt_utils",
    "dbt_expectations",
    "dbt_date",
    "audit_helper",
    "codegen",
    "elementary",
];

const MAX_ZIP_LENGTH: usize = 10_000;

/// Everything the builtins read, detached from the config borrow.
#[derive(Debug, Clone)]
pub(crate) struct DbtContext {
    project: Option<String>,
    dataset: Option<String>,
    model: Option<String>,
    vars: HashMap<String, Value>,
    env_vars: HashMap<String, String>,
    packages: Vec<String>,
}

impl DbtContext {
    pub(crate) fn new(config: &TemplateConfig, model: Option<&str>) -> Self {
        Self {
            project: config.project.clone(),
            dataset: config.dataset.clone(),
            model: model.map(str::to_string),
            vars: config
                .vars
                .iter()
                .map(|(k, v)| (k.clone(), Value::from_serialize(v)))
                .collect(),
            env_vars: config.env_vars.clone(),
            packages: config.packages.clone(),
        }
    }

    fn relation(&self, schema: Option<&str>, identifier: &str) -> Relation {
        Relation {
            database: self.project.clone(),
            schema: schema.map(str::to_string).or_else(|| self.dataset.clone()),
            identifier: identifier.to_string(),
        }
    }
}

/// A dbt relation. Renders as a back-tick quoted path.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Relation {
    database: Option<String>,
    schema: Option<String>,
    identifier: String,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = [self.database.as_deref(), self.schema.as_deref()]
            .into_iter()
            .flatten()
            .chain(std::iter::once(self.identifier.as_str()))
            .collect();
        if parts.len() == 1 {
            return f.write_str(&self.identifier);
        }
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "`{part}`")?;
        }
        Ok(())
    }
}

impl Object for Relation {
    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        let optional = |value: &Option<String>| {
            value
                .as_deref()
                .map(Value::from)
                .unwrap_or(Value::UNDEFINED)
        };
        match key.as_str()? {
            "database" | "project" => Some(optional(&self.database)),
            "schema" | "dataset" => Some(optional(&self.schema)),
            "identifier" | "name" | "table" => Some(Value::from(self.identifier.as_str())),
            "is_table" | "is_view" => Some(Value::from(true)),
            _ => None,
        }
    }

    /// `render()` stringifies; every other method returns the relation so
    /// chains like `.include(schema=false)` keep working.
    fn call_method(
        self: &Arc<Self>,
        _state: &State,
        method: &str,
        _args: &[Value],
    ) -> Result<Value, Error> {
        match method {
            "render" => Ok(Value::from(self.to_string())),
            _ => Ok(Value::from_object((**self).clone())),
        }
    }

    fn render(self: &Arc<Self>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// A package namespace whose macros pass their first argument through.
#[derive(Debug)]
struct PackageNamespace {
    name: String,
}

impl fmt::Display for PackageNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "__{}__", self.name)
    }
}

impl Object for PackageNamespace {
    fn call_method(
        self: &Arc<Self>,
        _state: &State,
        method: &str,
        args: &[Value],
    ) -> Result<Value, Error> {
        Ok(match args.first().and_then(passthrough_text) {
            Some(text) => Value::from(text),
            None => Value::from(format!("__{}_{method}__", self.name)),
        })
    }
}

/// Text form of a passthrough argument. Sequences and maps have none.
fn passthrough_text(value: &Value) -> Option<String> {
    if let Some(text) = value.as_str() {
        return Some(text.to_string());
    }
    if value.as_object().is_some() {
        return Some(value.to_string());
    }
    match value.kind() {
        ValueKind::Number | ValueKind::Bool => Some(value.to_string()),
        _ => None,
    }
}

fn arity_error(name: &str, expected: &str) -> Error {
    Error::new(
        ErrorKind::InvalidOperation,
        format!("{name}() expects {expected}"),
    )
}

fn string_arg<'a>(args: &'a [Value], index: usize, name: &str) -> Result<&'a str, Error> {
    args.get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::new(ErrorKind::InvalidOperation, format!("{name}() expects string arguments")))
}

pub(crate) fn register_dbt_builtins(env: &mut Environment<'_>, context: &DbtContext) {
    let ctx = Arc::new(context.clone());

    let refs = Arc::clone(&ctx);
    env.add_function("ref", move |args: &[Value]| -> Result<Value, Error> {
        match args.len() {
            1 => {
                let model = string_arg(args, 0, "ref")?;
                Ok(Value::from_object(refs.relation(None, model)))
            }
            2 => {
                let project = string_arg(args, 0, "ref")?;
                let model = string_arg(args, 1, "ref")?;
                let mut relation = refs.relation(None, model);
                relation.database = Some(project.to_string());
                Ok(Value::from_object(relation))
            }
            _ => Err(arity_error("ref", "1 or 2 arguments")),
        }
    });

    let sources = Arc::clone(&ctx);
    env.add_function("source", move |args: &[Value]| -> Result<Value, Error> {
        if args.len() != 2 {
            return Err(arity_error("source", "2 arguments"));
        }
        let schema = string_arg(args, 0, "source")?;
        let table = string_arg(args, 1, "source")?;
        Ok(Value::from_object(sources.relation(Some(schema), table)))
    });

    env.add_function("config", |_args: &[Value]| Value::from(""));

    let vars = Arc::clone(&ctx);
    env.add_function("var", move |args: &[Value]| -> Result<Value, Error> {
        let name = match args.len() {
            1 | 2 => string_arg(args, 0, "var")?,
            _ => return Err(arity_error("var", "1 or 2 arguments")),
        };
        Ok(vars
            .vars
            .get(name)
            .cloned()
            .or_else(|| args.get(1).cloned())
            .unwrap_or_else(|| Value::from(name)))
    });

    let envs = Arc::clone(&ctx);
    env.add_function("env_var", move |args: &[Value]| -> Result<Value, Error> {
        let name = match args.len() {
            1 | 2 => string_arg(args, 0, "env_var")?,
            _ => return Err(arity_error("env_var", "1 or 2 arguments")),
        };
        Ok(match (envs.env_vars.get(name), args.get(1)) {
            (Some(value), _) => Value::from(value.as_str()),
            (None, Some(default)) => default.clone(),
            (None, None) => Value::from(format!("__ENV_VAR_{name}__")),
        })
    });

    env.add_function("is_incremental", || Value::from(false));
    env.add_function("run_query", |_sql: Value| Value::from(Vec::<Value>::new()));
    env.add_function("zip", |args: &[Value]| -> Result<Value, Error> { zip(args) });
    env.add_global("execute", Value::from(false));

    let this = match &ctx.model {
        Some(model) => Value::from_object(ctx.relation(None, model)),
        None => Value::UNDEFINED,
    };
    env.add_global("this", this);

    let packages = DEFAULT_PACKAGES
        .iter()
        .map(|name| name.to_string())
        .chain(ctx.packages.iter().cloned());
    for name in packages {
        env.add_global(name.clone(), Value::from_object(PackageNamespace { name }));
    }
}

/// `zip(a, b, ...)`, truncated to the shortest sequence.
fn zip(args: &[Value]) -> Result<Value, Error> {
    let sequences = args
        .iter()
        .map(|arg| {
            let items: Vec<Value> = arg.try_iter()?.take(MAX_ZIP_LENGTH + 1).collect();
            if items.len() > MAX_ZIP_LENGTH {
                return Err(Error::new(
                    ErrorKind::InvalidOperation,
                    format!("zip: sequences are limited to {MAX_ZIP_LENGTH} items"),
                ));
            }
            Ok(items)
        })
        .collect::<Result<Vec<_>, Error>>()?;

    let len = sequences.iter().map(Vec::len).min().unwrap_or(0);
    let rows: Vec<Value> = (0..len)
        .map(|i| Value::from(sequences.iter().map(|seq| seq[i].clone()).collect::<Vec<_>>()))
        .collect();
    Ok(Value::from(rows))
}

#[cfg(test)]
mod tests {
    use super::super::jinja::render_dbt;
    use super::super::TemplateConfig;
    use rstest::rstest;

    fn configured() -> TemplateConfig {
        TemplateConfig {
            project: Some("acme".into()),
            dataset: Some("analytics".into()),
            ..TemplateConfig::default()
        }
    }

    #[rstest]
    #[case("{{ ref('users') }}", "`acme`.`analytics`.`users`")]
    #[case("{{ ref('other', 'users') }}", "`other`.`analytics`.`users`")]
    #[case("{{ source('raw', 'events') }}", "`acme`.`raw`.`events`")]
    #[case("{{ ref('users').identifier }}", "users")]
    #[case("{{ source('raw', 'events').schema }}", "raw")]
    #[case("{{ var('day', '2024-01-01') }}", "2024-01-01")]
    #[case("{{ var('unset') }}", "unset")]
    #[case("{{ env_var('DBT_TARGET', 'dev') }}", "dev")]
    #[case("{{ dbt_utils.star(ref('orders')) }}", "`acme`.`analytics`.`orders`")]
    #[case("{% for a, b in zip([1, 2], ['x', 'y']) %}{{ a }}{{ b }}{% endfor %}", "1x2y")]
    fn builtins_render(#[case] template: &str, #[case] expected: &str) {
        assert_eq!(render_dbt(template, &configured(), Some("model")).unwrap(), expected);
    }

    #[test]
    fn unconfigured_ref_is_bare_name() {
        let rendered = render_dbt("FROM {{ ref('users') }}", &TemplateConfig::default(), None).unwrap();
        assert_eq!(rendered, "FROM users");
    }

    #[test]
    fn vars_and_env_vars_come_from_config() {
        let mut config = configured();
        config.vars.insert("day".into(), serde_json::json!("2030-01-01"));
        config.env_vars.insert("DBT_TARGET".into(), "prod".into());
        let rendered = render_dbt(
            "{{ var('day', 'x') }} {{ env_var('DBT_TARGET') }}",
            &config,
            None,
        )
        .unwrap();
        assert_eq!(rendered, "2030-01-01 prod");
    }

    #[test]
    fn incremental_block_is_skipped() {
        let template = "{{ config(materialized='incremental') }}SELECT * FROM {{ ref('stg') }}\
                        {% if is_incremental() %} WHERE ts > (SELECT MAX(ts) FROM {{ this }}){% endif %}";
        let rendered = render_dbt(template, &configured(), Some("orders")).unwrap();
        assert_eq!(rendered, "SELECT * FROM `acme`.`analytics`.`stg`");
    }

    #[test]
    fn configured_packages_are_namespaces() {
        let mut config = configured();
        config.packages.push("my_pkg".into());
        let rendered = render_dbt("{{ my_pkg.col('user_id') }}", &config, None).unwrap();
        assert_eq!(rendered, "user_id");
    }
}
