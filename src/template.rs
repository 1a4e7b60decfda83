//! Template engine seam used by [`Context::html`](crate::Context::html).
//!
//! The context only needs one operation from an engine: render a named
//! template with some data into a writer. Any engine can sit behind the
//! trait; [`handlebars::Handlebars`] is supported out of the box.

use std::io;

use handlebars::Handlebars;

pub type TemplateError = Box<dyn std::error::Error + Send + Sync>;

pub trait TemplateEngine: Send + Sync {
    fn execute_template(
        &self,
        writer: &mut dyn io::Write,
        name: &str,
        data: &serde_json::Value,
    ) -> Result<(), TemplateError>;
}

impl TemplateEngine for Handlebars<'static> {
    fn execute_template(
        &self,
        writer: &mut dyn io::Write,
        name: &str,
        data: &serde_json::Value,
    ) -> Result<(), TemplateError> {
        self.render_to_write(name, data, writer)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handlebars_renders_registered_template() {
        let mut hb = Handlebars::new();
        hb.register_template_string("hello", "<p>{{name}}</p>").unwrap();

        let mut out = Vec::new();
        hb.execute_template(&mut out, "hello", &serde_json::json!({ "name": "Al" })).unwrap();
        assert_eq!(out, b"<p>Al</p>");
    }

    #[test]
    fn unknown_template_is_an_error() {
        let hb = Handlebars::new();
        let mut out = Vec::new();
        assert!(hb.execute_template(&mut out, "missing", &serde_json::Value::Null).is_err());
    }
}
