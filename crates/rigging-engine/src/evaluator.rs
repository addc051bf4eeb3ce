//! Tree evaluator based on MiniJinja
//!
//! Every string in the tree that contains `{{` or `{%` is a template rendered
//! against the tree root. A string made of one `{{ expr }}` is evaluated as an
//! expression and keeps the type of the result, so `"{{ db }}"` copies a whole
//! mapping and `"{{ replicas }}"` stays a number.
//!
//! Values may reference values that are themselves templates, so evaluation
//! runs in passes until the tree stops changing. Each pass renders the
//! original template strings against the previous pass's output; rendered
//! text is never parsed again, so `{% raw %}` output survives as a literal.

use minijinja::{Environment, ErrorKind, UndefinedBehavior, Value};
use once_cell::sync::Lazy;
use regex::Regex;
use rigging_core::{EvalError, EvalScope, Evaluator, Values};
use serde_json::Value as JsonValue;

use crate::error::{EngineError, Result, TemplateError};
use crate::filters;
use crate::functions;

/// Upper bound on evaluation passes before the tree is considered cyclic
pub const DEFAULT_MAX_PASSES: usize = 16;

static SINGLE_EXPRESSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*\{\{-?(.*?)-?\}\}\s*$").expect("single expression pattern is valid")
});

/// Evaluator builder
pub struct TreeEvaluatorBuilder {
    max_passes: usize,
}

impl Default for TreeEvaluatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeEvaluatorBuilder {
    pub fn new() -> Self {
        Self {
            max_passes: DEFAULT_MAX_PASSES,
        }
    }

    /// Set the number of passes after which a changing tree is an error
    pub fn max_passes(mut self, passes: usize) -> Self {
        self.max_passes = passes.max(1);
        self
    }

    pub fn build(self) -> TreeEvaluator {
        TreeEvaluator {
            env: create_environment(),
            max_passes: self.max_passes,
        }
    }
}

/// Resolves templates inside a value tree
pub struct TreeEvaluator {
    env: Environment<'static>,
    max_passes: usize,
}

impl Default for TreeEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeEvaluator {
    pub fn new() -> Self {
        TreeEvaluatorBuilder::new().build()
    }

    pub fn builder() -> TreeEvaluatorBuilder {
        TreeEvaluatorBuilder::new()
    }

    /// Evaluate every template in `tree`
    pub fn evaluate_tree(&self, tree: Values, scope: EvalScope) -> Result<Values> {
        self.evaluate_over(tree, &Values::new(), scope)
    }

    /// Evaluate the templates of `tree` with `context` merged underneath it
    ///
    /// Strings from `context` are plain data and are never rendered.
    pub fn evaluate_over(
        &self,
        tree: Values,
        context: &Values,
        scope: EvalScope,
    ) -> Result<Values> {
        let source = tree.into_inner();
        let layered = |top: JsonValue| {
            let mut merged = context.clone();
            merged.merge(&Values(top));
            merged.into_inner()
        };

        let mut current = layered(source.clone());

        for pass in 1..=self.max_passes {
            let rendered = Pass::new(&self.env, &current, scope).node(&source, "")?;
            let next = layered(rendered);
            if next == current {
                tracing::trace!(passes = pass, ?scope, "values settled");
                return Ok(Values(next));
            }
            current = next;
        }

        Err(EngineError::ReferenceCycle {
            passes: self.max_passes,
        })
    }
}

impl Evaluator for TreeEvaluator {
    fn evaluate(&self, tree: Values, scope: EvalScope) -> std::result::Result<Values, EvalError> {
        self.evaluate_tree(tree, scope).map_err(Into::into)
    }

    fn evaluate_with(
        &self,
        tree: Values,
        context: &Values,
        scope: EvalScope,
    ) -> std::result::Result<Values, EvalError> {
        self.evaluate_over(tree, context, scope).map_err(Into::into)
    }
}

/// Create a configured MiniJinja environment
fn create_environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);

    env.add_filter("toyaml", filters::toyaml);
    env.add_filter("tojson", filters::tojson);
    env.add_filter("b64encode", filters::b64encode);
    env.add_filter("b64decode", filters::b64decode);
    env.add_filter("quote", filters::quote);
    env.add_filter("required", filters::required);
    env.add_filter("sha256", filters::sha256);

    env.add_function("fail", functions::fail);

    env
}

/// One walk over the tree, rendering against a fixed snapshot of the root
struct Pass<'a> {
    env: &'a Environment<'static>,
    ctx: Value,
    scope: EvalScope,
    top_level_keys: Vec<&'a str>,
}

impl<'a> Pass<'a> {
    fn new(env: &'a Environment<'static>, root: &'a JsonValue, scope: EvalScope) -> Self {
        let top_level_keys = root
            .as_object()
            .map(|m| m.keys().map(String::as_str).collect())
            .unwrap_or_default();

        Self {
            env,
            ctx: Value::from_serialize(root),
            scope,
            top_level_keys,
        }
    }

    fn node(&self, value: &JsonValue, location: &str) -> Result<JsonValue> {
        match value {
            JsonValue::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (key, child) in map {
                    let child_location = if location.is_empty() {
                        key.clone()
                    } else {
                        format!("{location}.{key}")
                    };
                    out.insert(key.clone(), self.node(child, &child_location)?);
                }
                Ok(JsonValue::Object(out))
            }
            JsonValue::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| self.node(item, &format!("{location}[{i}]")))
                .collect::<Result<Vec<_>>>()
                .map(JsonValue::Array),
            JsonValue::String(s) if is_template(s) => self.render(s, location),
            other => Ok(other.clone()),
        }
    }

    fn render(&self, source: &str, location: &str) -> Result<JsonValue> {
        let rendered = match single_expression(source) {
            Some(expr) => self
                .env
                .compile_expression(expr)
                .and_then(|compiled| compiled.eval(&self.ctx))
                .and_then(|value| {
                    if value.is_undefined() {
                        Err(minijinja::Error::new(ErrorKind::UndefinedError, ""))
                    } else {
                        Ok(value)
                    }
                }),
            None => self.env.render_str(source, &self.ctx).map(Value::from),
        };

        let unchanged = || JsonValue::String(source.to_string());

        match rendered {
            Ok(value) => {
                let value = serde_json::to_value(&value)?;
                // Output that still looks like a template waits for the merged tree
                if self.scope == EvalScope::Fragment && contains_template(&value) {
                    Ok(unchanged())
                } else {
                    Ok(value)
                }
            }
            Err(e)
                if self.scope == EvalScope::Fragment && e.kind() == ErrorKind::UndefinedError =>
            {
                Ok(unchanged())
            }
            Err(e) => Err(
                TemplateError::from_minijinja(&e, location, source, &self.top_level_keys).into(),
            ),
        }
    }
}

fn is_template(s: &str) -> bool {
    s.contains("{{") || s.contains("{%")
}

fn contains_template(value: &JsonValue) -> bool {
    match value {
        JsonValue::String(s) => is_template(s),
        JsonValue::Array(items) => items.iter().any(contains_template),
        JsonValue::Object(map) => map.values().any(contains_template),
        _ => false,
    }
}

/// Inner expression of a string made of a single `{{ ... }}` block
fn single_expression(source: &str) -> Option<&str> {
    let caps = SINGLE_EXPRESSION.captures(source)?;
    let inner = caps.get(1)?.as_str();
    if inner.contains("{{") || inner.contains("}}") || inner.contains("{%") {
        return None;
    }
    Some(inner.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TemplateErrorKind;
    use serde_json::json;

    fn eval(yaml: &str, scope: EvalScope) -> Result<Values> {
        TreeEvaluator::new().evaluate_tree(Values::from_yaml(yaml).unwrap(), scope)
    }

    #[test]
    fn test_string_interpolation() {
        let out = eval(
            "name: web\nurl: \"https://{{ name }}.example.com\"\n",
            EvalScope::Merged,
        )
        .unwrap();

        assert_eq!(out.get("url").unwrap(), "https://web.example.com");
    }

    #[test]
    fn test_single_expression_keeps_type() {
        let out = eval(
            r#"
db:
  host: db.internal
  port: 5432
port: "{{ db.port }}"
copy: "{{ db }}"
clustered: "{{ db.port > 1000 }}"
"#,
            EvalScope::Merged,
        )
        .unwrap();

        assert_eq!(out.get("port").unwrap(), &json!(5432));
        assert_eq!(out.get("copy").unwrap(), &json!({"host": "db.internal", "port": 5432}));
        assert_eq!(out.get("clustered").unwrap(), &json!(true));
    }

    #[test]
    fn test_chained_references_resolve() {
        let out = eval("a: '{{ b }}'\nb: '{{ c }}'\nc: 1\n", EvalScope::Merged).unwrap();
        assert_eq!(out.get("a").unwrap(), &json!(1));
        assert_eq!(out.get("b").unwrap(), &json!(1));
    }

    #[test]
    fn test_lists_and_blocks() {
        let out = eval(
            r#"
name: web
debug: true
hosts: ["{{ name }}-0", "{{ name }}-1"]
mode: "{% if debug %}verbose{% else %}quiet{% endif %}"
"#,
            EvalScope::Merged,
        )
        .unwrap();

        assert_eq!(out.get("hosts").unwrap(), &json!(["web-0", "web-1"]));
        assert_eq!(out.get("mode").unwrap(), "verbose");
    }

    #[test]
    fn test_fragment_leaves_unresolved_references() {
        let yaml = r#"
local: ok
url: "{{ cluster.name }}.svc"
full: "{{ missing }}"
self: "{{ local }}"
"#;

        let out = eval(yaml, EvalScope::Fragment).unwrap();

        assert_eq!(out.get("url").unwrap(), "{{ cluster.name }}.svc");
        assert_eq!(out.get("full").unwrap(), "{{ missing }}");
        assert_eq!(out.get("self").unwrap(), "ok");
    }

    #[test]
    fn test_merged_requires_every_reference() {
        let err = eval("url: \"{{ cluster.name }}.svc\"\n", EvalScope::Merged).unwrap_err();

        match err {
            EngineError::Template(e) => {
                assert_eq!(e.kind(), TemplateErrorKind::UndefinedVariable);
                assert_eq!(e.location, "url");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_reference_cycle() {
        let err = eval("a: 'x{{ b }}'\nb: 'y{{ a }}'\n", EvalScope::Merged).unwrap_err();
        assert!(matches!(err, EngineError::ReferenceCycle { passes: DEFAULT_MAX_PASSES }));
    }

    #[test]
    fn test_raw_blocks_stay_literal() {
        let yaml = r#"
name: web
annotation: "{% raw %}{{ .Release.Name }}{% endraw %}"
escaped: "{{ '{{' }} .Values.image }}"
label: "{{ name }}-{% raw %}{{ .Chart.Version }}{% endraw %}"
"#;

        let out = eval(yaml, EvalScope::Merged).unwrap();
        assert_eq!(out.get("annotation").unwrap(), "{{ .Release.Name }}");
        assert_eq!(out.get("escaped").unwrap(), "{{ .Values.image }}");
        assert_eq!(out.get("label").unwrap(), "web-{{ .Chart.Version }}");
    }

    #[test]
    fn test_fragment_defers_raw_output_to_merged_tree() {
        let yaml = "annotation: \"{% raw %}{{ .Release.Name }}{% endraw %}\"\n";

        let fragment = eval(yaml, EvalScope::Fragment).unwrap();
        assert_eq!(
            fragment.get("annotation").unwrap(),
            "{% raw %}{{ .Release.Name }}{% endraw %}"
        );

        let merged = TreeEvaluator::new()
            .evaluate_tree(fragment, EvalScope::Merged)
            .unwrap();
        assert_eq!(merged.get("annotation").unwrap(), "{{ .Release.Name }}");
    }

    #[test]
    fn test_context_strings_are_not_rendered() {
        let context = Values::from_yaml("name: web
literal: \"{{ .Release.Name }}\"\n").unwrap();
        let tree = Values::from_yaml("host: \"{{ name }}.example.com\"\n").unwrap();

        let out = TreeEvaluator::new()
            .evaluate_over(tree, &context, EvalScope::Merged)
            .unwrap();

        assert_eq!(out.get("host").unwrap(), "web.example.com");
        assert_eq!(out.get("literal").unwrap(), "{{ .Release.Name }}");
    }

    #[test]
    fn test_custom_filters() {
        let out = eval(
            r#"
password: hunter2
encoded: "{{ password | b64encode }}"
quoted: "{{ password | quote }}"
"#,
            EvalScope::Merged,
        )
        .unwrap();

        assert_eq!(out.get("encoded").unwrap(), "aHVudGVyMg==");
        assert_eq!(out.get("quoted").unwrap(), "\"hunter2\"");
    }

    #[test]
    fn test_fail_function_aborts_in_any_scope() {
        for scope in [EvalScope::Fragment, EvalScope::Merged] {
            let err = eval("region: \"{{ fail('region must be set') }}\"\n", scope).unwrap_err();
            assert!(err.to_string().contains("region must be set"), "{err}");
        }
    }

    #[test]
    fn test_nested_location_in_error() {
        let err = eval("apps:\n  - name: \"{{ nope.x }}-a\"\n", EvalScope::Merged).unwrap_err();
        assert!(err.to_string().starts_with("apps[0].name: "), "{err}");
    }

    #[test]
    fn test_through_evaluator_trait() {
        let evaluator: &dyn Evaluator = &TreeEvaluator::new();
        let tree = Values::from_yaml("a: 1\nb: '{{ a + 1 }}'\n").unwrap();

        let out = evaluator.evaluate(tree, EvalScope::Merged).unwrap();
        assert_eq!(out.get("b").unwrap(), &json!(2));
    }

    #[test]
    fn test_single_expression_detection() {
        assert_eq!(single_expression("{{ a.b }}"), Some("a.b"));
        assert_eq!(single_expression("  {{- a -}} "), Some("a"));
        assert_eq!(single_expression("{{ a }}-{{ b }}"), None);
        assert_eq!(single_expression("x {{ a }}"), None);
    }
}
