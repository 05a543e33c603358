//! The `{{path.to.field}}` variable substitution processor every node's config goes
//! through before use (§4.4): plain substitutions, `{{for x in list}}...{{endfor}}`
//! loops, and `{{if expr}}...{{else}}...{{endif}}` conditionals.
//!
//! No direct teacher analog — the teacher's node configs are Rust closures, not
//! authored text, so it has no template grammar to generalize from. Built fresh
//! against the spec's own description, kept deliberately small: one dotted-path
//! lookup, one truthiness test, no user-defined functions or filters.

use regex::Regex;
use serde_json::Value;

use crate::error::{NodeError, Result};

fn resolve_path<'a>(state: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = state;
    for segment in path.trim().split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None => false,
        Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
    }
}

fn evaluate_condition(expr: &str, state: &Value) -> bool {
    let expr = expr.trim();
    if let Some(path) = expr.strip_prefix('!') {
        return !truthy(resolve_path(state, path.trim()));
    }
    truthy(resolve_path(state, expr))
}

/// Renders a template string against `state`. Loops and conditionals are processed
/// before plain substitutions so their bodies see the outer scope's bindings.
pub struct TemplateProcessor;

impl TemplateProcessor {
    pub fn render(template: &str, state: &Value) -> Result<String> {
        let rendered = Self::render_loops(template, state)?;
        let rendered = Self::render_conditionals(&rendered, state)?;
        Self::render_substitutions(&rendered, state)
    }

    fn render_loops(template: &str, state: &Value) -> Result<String> {
        let for_re = Regex::new(r"(?s)\{\{\s*for\s+(\w+)\s+in\s+([\w.]+)\s*\}\}(.*?)\{\{\s*endfor\s*\}\}")
            .expect("static regex is valid");

        let mut out = String::new();
        let mut last_end = 0;
        for caps in for_re.captures_iter(template) {
            let m = caps.get(0).unwrap();
            out.push_str(&template[last_end..m.start()]);

            let var = &caps[1];
            let path = &caps[2];
            let body = &caps[3];

            let items = resolve_path(state, path)
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();

            for item in items {
                let mut scope = state.clone();
                if let Some(obj) = scope.as_object_mut() {
                    obj.insert(var.to_string(), item);
                }
                out.push_str(&Self::render(body, &scope)?);
            }
            last_end = m.end();
        }
        out.push_str(&template[last_end..]);
        Ok(out)
    }

    fn render_conditionals(template: &str, state: &Value) -> Result<String> {
        let if_re = Regex::new(
            r"(?s)\{\{\s*if\s+(.+?)\s*\}\}(.*?)(?:\{\{\s*else\s*\}\}(.*?))?\{\{\s*endif\s*\}\}",
        )
        .expect("static regex is valid");

        let mut out = String::new();
        let mut last_end = 0;
        for caps in if_re.captures_iter(template) {
            let m = caps.get(0).unwrap();
            out.push_str(&template[last_end..m.start()]);

            let condition = &caps[1];
            let then_branch = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            let else_branch = caps.get(3).map(|m| m.as_str()).unwrap_or("");

            if evaluate_condition(condition, state) {
                out.push_str(&Self::render(then_branch, state)?);
            } else {
                out.push_str(&Self::render(else_branch, state)?);
            }
            last_end = m.end();
        }
        out.push_str(&template[last_end..]);
        Ok(out)
    }

    fn render_substitutions(template: &str, state: &Value) -> Result<String> {
        let sub_re = Regex::new(r"\{\{\s*([\w.]+)\s*\}\}").expect("static regex is valid");
        let mut out = String::new();
        let mut last_end = 0;
        for caps in sub_re.captures_iter(template) {
            let m = caps.get(0).unwrap();
            out.push_str(&template[last_end..m.start()]);

            let path = &caps[1];
            let value = resolve_path(state, path).ok_or_else(|| NodeError::TemplateField(path.to_string()))?;
            out.push_str(&stringify(value));
            last_end = m.end();
        }
        out.push_str(&template[last_end..]);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn substitutes_dotted_path() {
        let state = json!({"user": {"name": "ada"}});
        let out = TemplateProcessor::render("hello {{user.name}}", &state).unwrap();
        assert_eq!(out, "hello ada");
    }

    #[test]
    fn missing_field_is_an_error() {
        let state = json!({});
        assert!(TemplateProcessor::render("{{missing}}", &state).is_err());
    }

    #[test]
    fn renders_for_loop_over_array() {
        let state = json!({"items": ["a", "b", "c"]});
        let out = TemplateProcessor::render("{{for x in items}}[{{x}}]{{endfor}}", &state).unwrap();
        assert_eq!(out, "[a][b][c]");
    }

    #[test]
    fn renders_if_else_branch() {
        let state = json!({"verdict": "pass"});
        let template = "{{if verdict}}ok{{else}}no{{endif}}";
        assert_eq!(TemplateProcessor::render(template, &state).unwrap(), "ok");

        let state = json!({});
        assert_eq!(TemplateProcessor::render(template, &state).unwrap(), "no");
    }

    #[test]
    fn negated_condition_checks_falsiness() {
        let state = json!({"flag": false});
        let template = "{{if !flag}}absent{{else}}present{{endif}}";
        assert_eq!(TemplateProcessor::render(template, &state).unwrap(), "absent");
    }
}
