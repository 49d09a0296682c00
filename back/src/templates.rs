use minijinja::{default_auto_escape_callback, Environment};
use serde::Serialize;

/// Page templates compiled into the binary.
#[derive(Debug)]
pub struct Templates {
    env: Environment<'static>,
}

impl Templates {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_auto_escape_callback(default_auto_escape_callback);
        env.set_loader(embedded_template_loader);
        Self { env }
    }

    pub fn render(&self, name: &str, context: impl Serialize) -> Result<String, minijinja::Error> {
        self.env.get_template(name)?.render(context)
    }
}

impl Default for Templates {
    fn default() -> Self {
        Self::new()
    }
}

fn embedded_template_loader(name: &str) -> Result<Option<String>, minijinja::Error> {
    let source = match name {
        "base.html" => Some(include_str!("../templates/base.html")),
        "index.html" => Some(include_str!("../templates/index.html")),
        "todo_form.html" => Some(include_str!("../templates/todo_form.html")),
        "licenses.html" => Some(include_str!("../templates/licenses.html")),
        "not_found.html" => Some(include_str!("../templates/not_found.html")),
        _ => None,
    };

    Ok(source.map(String::from))
}

#[cfg(test)]
mod tests {
    use minijinja::context;

    use super::*;

    #[test]
    fn escapes_html() {
        let templates = Templates::new();
        let html = templates
            .render(
                "not_found.html",
                context! {
                    project_name => "<b>Todo</b>",
                    api_prefix => "/v1",
                    page_title => "Not found",
                },
            )
            .unwrap();

        assert!(html.contains("&lt;b&gt;Todo"));
        assert!(!html.contains("<b>Todo</b>"));
    }

    #[test]
    fn unknown_template_fails() {
        assert!(Templates::new().render("missing.html", ()).is_err());
    }
}
