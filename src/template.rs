//! Template rendering: liquid substitution plus JSON validation.
//!
//! Config templates and compound-parameter format strings both use liquid
//! `{{ name }}` placeholders over the resolved parameter values. A rendered
//! config template must be syntactically valid JSON; violations are reported
//! with the line, column, and a bounded excerpt around the failing position.

use std::collections::BTreeMap;

use crate::error::ResolveError;

/// Longest excerpt included in a JSON syntax error.
const MAX_SNIPPET_CHARS: usize = 80;

/// Render a format string against already-resolved values.
///
/// Used for compound parameters; unknown placeholders are an error so typos
/// surface instead of rendering empty strings.
///
/// # Errors
///
/// Returns the template engine diagnostic as a plain string.
pub fn render_format(
    format: &str,
    values: &BTreeMap<String, serde_json::Value>,
) -> Result<String, String> {
    render_liquid(format, values)
}

/// Render a config template and validate the result as JSON.
///
/// `location` names the config (its coordinate string) for error reporting.
///
/// # Errors
///
/// Returns [`ResolveError::TemplateFailed`] when the template itself cannot
/// be parsed or rendered, and [`ResolveError::InvalidRenderedJson`] with
/// positional detail when the output is not valid JSON.
pub fn render_template(
    location: &str,
    coordinate: &crate::model::Coordinate,
    content: &str,
    values: &BTreeMap<String, serde_json::Value>,
) -> Result<serde_json::Value, ResolveError> {
    let rendered =
        render_liquid(content, values).map_err(|message| ResolveError::TemplateFailed {
            coordinate: coordinate.clone(),
            message,
        })?;

    serde_json::from_str(&rendered).map_err(|e| ResolveError::InvalidRenderedJson {
        location: location.to_string(),
        line: e.line(),
        column: e.column(),
        snippet: snippet_at(&rendered, e.line(), e.column()),
    })
}

/// Parse and render a liquid template with the given values as globals.
fn render_liquid(
    text: &str,
    values: &BTreeMap<String, serde_json::Value>,
) -> Result<String, String> {
    let parser = liquid::ParserBuilder::with_stdlib()
        .build()
        .map_err(|e| e.to_string())?;
    let template = parser.parse(text).map_err(|e| e.to_string())?;

    let mut globals = liquid::Object::new();
    for (name, value) in values {
        let liquid_value = liquid::model::to_value(value).map_err(|e| e.to_string())?;
        globals.insert(name.clone().into(), liquid_value);
    }

    template.render(&globals).map_err(|e| e.to_string())
}

/// Extract a bounded excerpt of `text` around the 1-based (line, column).
///
/// The excerpt is the failing line, truncated to [`MAX_SNIPPET_CHARS`]
/// characters centred on the column when the line is longer.
fn snippet_at(text: &str, line: usize, column: usize) -> String {
    let Some(line_text) = text.lines().nth(line.saturating_sub(1)) else {
        return String::new();
    };
    let chars: Vec<char> = line_text.chars().collect();
    if chars.len() <= MAX_SNIPPET_CHARS {
        return line_text.to_string();
    }
    let start = column
        .saturating_sub(MAX_SNIPPET_CHARS / 2)
        .min(chars.len().saturating_sub(MAX_SNIPPET_CHARS));
    chars[start..start + MAX_SNIPPET_CHARS].iter().collect()
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::model::Coordinate;

    fn coord() -> Coordinate {
        Coordinate::new("p", "dashboard", "main")
    }

    fn values(pairs: &[(&str, serde_json::Value)]) -> BTreeMap<String, serde_json::Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    // -----------------------------------------------------------------------
    // render_format
    // -----------------------------------------------------------------------

    #[test]
    fn render_format_substitutes_values() {
        let v = values(&[
            ("host", serde_json::json!("web-1")),
            ("port", serde_json::json!(8080)),
        ]);
        assert_eq!(
            render_format("{{ host }}:{{ port }}", &v).unwrap(),
            "web-1:8080"
        );
    }

    #[test]
    fn render_format_without_placeholders_is_identity() {
        assert_eq!(
            render_format("plain text", &BTreeMap::new()).unwrap(),
            "plain text"
        );
    }

    #[test]
    fn render_format_unknown_placeholder_fails() {
        let err = render_format("{{ missing }}", &BTreeMap::new()).unwrap_err();
        assert!(err.contains("missing"), "unexpected diagnostic: {err}");
    }

    // -----------------------------------------------------------------------
    // render_template
    // -----------------------------------------------------------------------

    #[test]
    fn render_template_produces_json() {
        let v = values(&[("name", serde_json::json!("My dashboard"))]);
        let json = render_template(
            "p:dashboard:main",
            &coord(),
            r#"{"displayName": "{{ name }}", "tiles": []}"#,
            &v,
        )
        .unwrap();
        assert_eq!(json["displayName"], "My dashboard");
    }

    #[test]
    fn render_template_keeps_json_braces_intact() {
        let json = render_template(
            "p:dashboard:main",
            &coord(),
            r#"{"a": {"b": [1, 2]}, "c": null}"#,
            &BTreeMap::new(),
        )
        .unwrap();
        assert_eq!(json["a"]["b"][1], 2);
    }

    #[test]
    fn render_template_invalid_json_reports_position() {
        let err = render_template(
            "p:dashboard:main",
            &coord(),
            "{\n  \"a\": [}\n}",
            &BTreeMap::new(),
        )
        .unwrap_err();
        let ResolveError::InvalidRenderedJson {
            location,
            line,
            column,
            snippet,
        } = err
        else {
            panic!("expected InvalidRenderedJson, got {err:?}")
        };
        assert_eq!(location, "p:dashboard:main");
        assert_eq!(line, 2);
        assert!(column > 0);
        assert!(snippet.contains("[}"));
    }

    #[test]
    fn render_template_bad_liquid_reports_template_failure() {
        let err = render_template(
            "p:dashboard:main",
            &coord(),
            "{{ unclosed",
            &BTreeMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ResolveError::TemplateFailed { .. }));
    }

    #[test]
    fn render_template_unknown_variable_reports_template_failure() {
        let err = render_template(
            "p:dashboard:main",
            &coord(),
            r#"{"x": "{{ nope }}"}"#,
            &BTreeMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ResolveError::TemplateFailed { .. }));
    }

    // -----------------------------------------------------------------------
    // snippet_at
    // -----------------------------------------------------------------------

    #[test]
    fn snippet_returns_short_line_whole() {
        assert_eq!(snippet_at("ab\ncd\nef", 2, 1), "cd");
    }

    #[test]
    fn snippet_truncates_long_lines() {
        let long = "x".repeat(300);
        let s = snippet_at(&long, 1, 150);
        assert_eq!(s.chars().count(), MAX_SNIPPET_CHARS);
    }

    #[test]
    fn snippet_out_of_range_line_is_empty() {
        assert_eq!(snippet_at("one line", 5, 1), "");
    }
}
