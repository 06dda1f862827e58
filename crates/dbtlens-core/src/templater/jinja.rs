//! MiniJinja rendering.

use super::dbt::{register_dbt_builtins, DbtContext};
use super::error::TemplateError;
use super::TemplateConfig;
use minijinja::{Environment, ErrorKind, UndefinedBehavior, Value};
use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};
use tracing::debug;

const RECURSION_LIMIT: usize = 100;

/// Upper bound on distinct unknown macros stubbed in one render.
const MAX_STUBBED_MACROS: usize = 50;

/// Upper bound on the stub-and-retry loop.
const RENDER_TIMEOUT: Duration = Duration::from_secs(5);

/// Plain Jinja with strict undefined checks.
pub(crate) fn render_jinja(
    template: &str,
    vars: &HashMap<String, serde_json::Value>,
) -> Result<String, TemplateError> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_recursion_limit(RECURSION_LIMIT);
    env.add_template("model", template)?;

    let rendered = env
        .get_template("model")?
        .render(Value::from_serialize(vars))?;
    Ok(rendered)
}

/// Jinja with dbt builtins.
///
/// Unknown macros (project macros, package helpers) are stubbed one at a
/// time and the render retried, so a model compiles even without its
/// project's macro library.
pub(crate) fn render_dbt(
    template: &str,
    config: &TemplateConfig,
    model: Option<&str>,
) -> Result<String, TemplateError> {
    let context = DbtContext::new(config, model);
    let mut stubbed: BTreeSet<String> = BTreeSet::new();
    let started = Instant::now();

    while stubbed.len() <= MAX_STUBBED_MACROS {
        if started.elapsed() > RENDER_TIMEOUT {
            return Err(TemplateError::RenderError(format!(
                "rendering timed out after {RENDER_TIMEOUT:?} with {} stubbed macros",
                stubbed.len()
            )));
        }

        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Lenient);
        env.set_recursion_limit(RECURSION_LIMIT);
        register_dbt_builtins(&mut env, &context);
        for name in &stubbed {
            register_stub_macro(&mut env, name);
        }
        env.add_template("model", template)?;

        match env.get_template("model")?.render(()) {
            Ok(rendered) => {
                if !stubbed.is_empty() {
                    debug!(stubbed = ?stubbed, "rendered with stubbed macros");
                }
                return Ok(rendered);
            }
            Err(err) => match unknown_function_name(&err) {
                Some(name) if !stubbed.contains(&name) => {
                    debug!(%name, "stubbing unknown macro");
                    stubbed.insert(name);
                }
                _ => return Err(err.into()),
            },
        }
    }

    Err(TemplateError::RenderError(format!(
        "too many unknown macros (limit {MAX_STUBBED_MACROS})"
    )))
}

/// A stub returns its first string argument, or a placeholder identifier.
fn register_stub_macro(env: &mut Environment<'_>, name: &str) {
    let placeholder = format!("__{name}__");
    env.add_function(name.to_string(), move |args: &[Value]| -> Value {
        match args.first().and_then(Value::as_str) {
            Some(first) => Value::from(first),
            None => Value::from(placeholder.clone()),
        }
    });
}

fn unknown_function_name(err: &minijinja::Error) -> Option<String> {
    if err.kind() != ErrorKind::UnknownFunction {
        return None;
    }
    // "unknown function: <name> is unknown"
    let message = err.to_string();
    let rest = &message[message.find("unknown function: ")? + "unknown function: ".len()..];
    let name = &rest[..rest.find(" is unknown")?];

    let valid = !name.is_empty()
        && name.len() <= 100
        && name.chars().all(|c| c.is_alphanumeric() || c == '_');
    valid.then(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dbt() -> TemplateConfig {
        TemplateConfig::default()
    }

    #[test]
    fn jinja_renders_loop_over_vars() {
        let mut vars = HashMap::new();
        vars.insert("columns".to_string(), serde_json::json!(["id", "name"]));
        let template =
            "SELECT {% for c in columns %}{{ c }}{% if not loop.last %}, {% endif %}{% endfor %} FROM t";
        assert_eq!(render_jinja(template, &vars).unwrap(), "SELECT id, name FROM t");
    }

    #[test]
    fn jinja_is_strict_about_undefined() {
        let err = render_jinja("SELECT * FROM {{ missing }}", &HashMap::new()).unwrap_err();
        assert!(matches!(err, TemplateError::UndefinedVariable(_)));
    }

    #[test]
    fn unknown_macros_are_stubbed() {
        let sql = "SELECT {{ cents_to_dollars('amount') }}, {{ surrogate() }} FROM t";
        assert_eq!(
            render_dbt(sql, &dbt(), None).unwrap(),
            "SELECT amount, __surrogate__ FROM t"
        );
    }

    #[test]
    fn unterminated_expression_is_a_syntax_error() {
        let err = render_dbt("SELECT {{ ref('a') ", &dbt(), None).unwrap_err();
        assert!(matches!(err, TemplateError::SyntaxError(_)));
    }
}
