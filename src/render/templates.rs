//! Document templates.
//!
//! Pages extend `layout.html`, which opens the document, defines the section
//! swap script and embeds the dehydrated query state. The layout never closes
//! `<body>`: the render driver appends resolved sections and the closing tags
//! after the shell has been flushed.

use minijinja::Environment;
use serde_json::Value;

const BUILTIN: &[(&str, &str)] = &[
    ("layout.html", include_str!("templates/layout.html")),
    ("index.html", include_str!("templates/index.html")),
    ("sign_in.html", include_str!("templates/sign_in.html")),
    ("auth_error.html", include_str!("templates/auth_error.html")),
    ("dashboard.html", include_str!("templates/dashboard.html")),
    ("account.html", include_str!("templates/account.html")),
];

/// Compiled template set.
pub struct Templates {
    env: Environment<'static>,
}

impl Templates {
    /// The application's bundled templates.
    pub fn builtin() -> Result<Self, minijinja::Error> {
        Self::from_sources(BUILTIN.iter().copied())
    }

    pub fn from_sources(
        sources: impl IntoIterator<Item = (&'static str, &'static str)>,
    ) -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        for (name, source) in sources {
            env.add_template(name, source)?;
        }
        Ok(Self { env })
    }

    pub fn render(&self, name: &str, context: &Value) -> Result<String, minijinja::Error> {
        self.env.get_template(name)?.render(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtin_templates_compile() {
        let templates = Templates::builtin().unwrap();
        let html = templates
            .render(
                "index.html",
                &json!({"title": "Home", "user": null, "dehydrated_state": "{}"}),
            )
            .unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains(r#"href="/sign-in""#));
        assert!(!html.contains("</body>"));
    }

    #[test]
    fn test_values_are_escaped() {
        let templates = Templates::builtin().unwrap();
        let html = templates
            .render(
                "auth_error.html",
                &json!({
                    "title": "Error",
                    "code": "bad",
                    "message": "<script>alert(1)</script>",
                    "dehydrated_state": "{}",
                }),
            )
            .unwrap();
        assert!(!html.contains("<script>alert(1)"));
        assert!(html.contains("&lt;script&gt;"));
    }
}
