use chrono::Local;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tera::{Context, Tera, Value};
use thiserror::Error;

/// Default output of the `timestamp()` helper, e.g. `2024-03-09T14:05:33+0100`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to read template '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse template '{name}': {message}")]
    Parse { name: String, message: String },

    #[error("failed to render template '{name}': {message}")]
    Render { name: String, message: String },
}

/// A template body parsed once and bound to the built-in helpers.
///
/// Bodies use Tera syntax. Rules rewrite their capture shorthands first,
/// see [`crate::rule::expand`].
///
/// Helpers available to every template:
/// - `timestamp()`: local time formatted with [`TIMESTAMP_FORMAT`]
/// - `timestamp(format="%H:%M")`: local time with a custom strftime format
pub struct Template {
    name: String,
    tera: Tera,
}

impl Template {
    pub fn compile(name: &str, body: &str) -> Result<Self, TemplateError> {
        let mut tera = Tera::default();
        // Payloads are not HTML.
        tera.autoescape_on(vec![]);
        tera.register_function("timestamp", timestamp);

        tera.add_raw_template(name, body)
            .map_err(|e| TemplateError::Parse {
                name: name.to_string(),
                message: describe(&e),
            })?;

        Ok(Self {
            name: name.to_string(),
            tera,
        })
    }

    /// Read the template body stored at `path`.
    pub fn read_body(path: &Path) -> Result<String, TemplateError> {
        std::fs::read_to_string(path).map_err(|source| TemplateError::Read {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn render(&self, context: &Context) -> Result<String, TemplateError> {
        self.tera
            .render(&self.name, context)
            .map_err(|e| TemplateError::Render {
                name: self.name.clone(),
                message: describe(&e),
            })
    }
}

impl std::fmt::Debug for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Template").field("name", &self.name).finish()
    }
}

fn timestamp(args: &HashMap<String, Value>) -> tera::Result<Value> {
    let format = match args.get("format") {
        None => TIMESTAMP_FORMAT,
        Some(Value::String(format)) => format.as_str(),
        Some(other) => {
            return Err(tera::Error::msg(format!(
                "timestamp: `format` must be a string, got {}",
                other
            )))
        }
    };

    let mut rendered = String::new();
    write!(rendered, "{}", Local::now().format(format))
        .map_err(|_| tera::Error::msg(format!("timestamp: invalid format '{}'", format)))?;
    Ok(Value::String(rendered))
}

/// Tera keeps the useful part of an error in its source chain.
fn describe(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_render_with_context() {
        let template = Template::compile("greet", "{{ user }} logged in").unwrap();
        let mut context = Context::new();
        context.insert("user", "alice");
        assert_eq!(template.render(&context).unwrap(), "alice logged in");
    }

    #[test]
    fn test_no_html_escaping() {
        let template = Template::compile("raw", "{{ value }}").unwrap();
        let mut context = Context::new();
        context.insert("value", "<a & b>");
        assert_eq!(template.render(&context).unwrap(), "<a & b>");
    }

    #[test]
    fn test_timestamp_helper() {
        let template = Template::compile("ts", "{{ timestamp() }}").unwrap();
        let rendered = template.render(&Context::new()).unwrap();
        let re = Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}[+-]\d{4}$").unwrap();
        assert!(re.is_match(&rendered), "unexpected timestamp: {}", rendered);
    }

    #[test]
    fn test_timestamp_helper_custom_format() {
        let template = Template::compile("ts", r#"{{ timestamp(format="%Y") }}"#).unwrap();
        let rendered = template.render(&Context::new()).unwrap();
        assert_eq!(rendered.len(), 4);
        assert!(rendered.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_parse_error() {
        let result = Template::compile("bad", "{{ unclosed");
        assert!(matches!(result, Err(TemplateError::Parse { .. })));
    }

    #[test]
    fn test_missing_variable_is_render_error() {
        let template = Template::compile("missing", "{{ nope }}").unwrap();
        let err = template.render(&Context::new()).unwrap_err();
        assert!(matches!(err, TemplateError::Render { .. }));
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_load_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "event: {{{{ kind }}}}").unwrap();
        temp_file.flush().unwrap();

        let body = Template::read_body(temp_file.path()).unwrap();
        let template = Template::compile("file", &body).unwrap();
        let mut context = Context::new();
        context.insert("kind", "login");
        assert_eq!(template.render(&context).unwrap(), "event: login");
    }

    #[test]
    fn test_load_missing_file() {
        let result = Template::read_body(Path::new("/nonexistent/sest/login.tpl"));
        assert!(matches!(result, Err(TemplateError::Read { .. })));
    }
}
