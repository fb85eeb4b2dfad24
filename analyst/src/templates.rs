//! Dashboard page templates.
//!
//! Templates are compiled into the binary and registered once at startup.

use anyhow::{Context, Result};
use handlebars::{handlebars_helper, Handlebars};
use serde::Serialize;
use serde_json::{json, Value};

use analyst_common::util;

pub const INDEX: &str = "index";
pub const SCREENER_TASKS: &str = "screener_tasks";
pub const SCREENER_STOCK_DATA: &str = "screener_stock_data";

const PARTIALS: &[(&str, &str)] = &[
    ("header", include_str!("../templates/header.hbs")),
    ("footer", include_str!("../templates/footer.hbs")),
];

const PAGES: &[(&str, &str)] = &[
    (INDEX, include_str!("../templates/index.hbs")),
    (SCREENER_TASKS, include_str!("../templates/screener_tasks.hbs")),
    (SCREENER_STOCK_DATA, include_str!("../templates/screener_stock_data.hbs")),
];

// Floats become percentages; anything else (null, integers, text) passes through.
handlebars_helper!(format_pct: |value: Json| match value {
    Value::Number(n) if n.is_f64() => n
        .as_f64()
        .map_or(Value::Null, |x| json!(util::format_pct(x))),
    other => other.clone(),
});

handlebars_helper!(format_num: |value: Json| match value {
    Value::Number(n) => n
        .as_f64()
        .map_or(Value::Null, |x| Value::String(util::format_num(x))),
    other => other.clone(),
});

/// Registered dashboard templates.
pub struct Templates {
    registry: Handlebars<'static>,
}

impl Templates {
    pub fn new() -> Result<Self> {
        let mut registry = Handlebars::new();
        registry.register_helper("format_pct", Box::new(format_pct));
        registry.register_helper("format_num", Box::new(format_num));

        for (name, source) in PARTIALS {
            registry
                .register_partial(name, *source)
                .with_context(|| format!("Failed to register partial {name}"))?;
        }
        for (name, source) in PAGES {
            registry
                .register_template_string(name, *source)
                .with_context(|| format!("Failed to register template {name}"))?;
        }

        Ok(Self { registry })
    }

    /// Render a page to HTML.
    pub fn render<T: Serialize>(&self, name: &str, data: &T) -> Result<String> {
        self.registry
            .render(name, data)
            .with_context(|| format!("Failed to render template {name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_inline(source: &str, data: Value) -> String {
        let templates = Templates::new().unwrap();
        let mut registry = templates.registry;
        registry.register_template_string("inline", source).unwrap();
        registry.render("inline", &data).unwrap()
    }

    #[test]
    fn test_format_pct_helper() {
        assert_eq!(render_inline("{{format_pct x}}", json!({"x": 0.1234})), "12.34");
        assert_eq!(render_inline("{{format_pct x}}", json!({"x": -0.5})), "-50.0");
        // integers and nulls pass through untouched
        assert_eq!(render_inline("{{format_pct x}}", json!({"x": 3})), "3");
        assert_eq!(render_inline("{{format_pct x}}", json!({"x": null})), "");
    }

    #[test]
    fn test_format_num_helper() {
        assert_eq!(render_inline("{{format_num x}}", json!({"x": 1_234_567})), "1.23M");
        assert_eq!(render_inline("{{format_num x}}", json!({"x": 999.0})), "999.00");
        assert_eq!(render_inline("{{format_num x}}", json!({"x": "n/a"})), "n/a");
    }

    #[test]
    fn test_index_renders() {
        let templates = Templates::new().unwrap();
        let html = templates.render(INDEX, &json!({"version": "1.2.3"})).unwrap();
        assert!(html.contains("<title>Dashboard | Analyst</title>"));
        assert!(html.contains("v1.2.3"));
        assert!(html.contains("</html>"));
    }

    #[test]
    fn test_empty_task_list() {
        let templates = Templates::new().unwrap();
        let html = templates
            .render(SCREENER_TASKS, &json!({"tasks": [], "latest_fetch": null}))
            .unwrap();
        assert!(html.contains("No tasks found."));
    }

    #[test]
    fn test_stock_page_pagination_links() {
        let templates = Templates::new().unwrap();
        let data = json!({
            "task_id": "t1",
            "stocks": [],
            "pagination": {"prev": null, "next": 2, "current": "1 - 5", "total": 7},
        });
        let html = templates.render(SCREENER_STOCK_DATA, &data).unwrap();
        assert!(html.contains(r#"href="/screener/t1/2">next</a>"#));
        assert!(!html.contains(">prev</a>"));
    }
}
