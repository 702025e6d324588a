//! Template Engine
//!
//! Handles HTML template rendering using minijinja.

use impmail_common::{Error, Result};
use minijinja::Environment;
use serde::Serialize;
use tracing::debug;

/// Built-in templates, by name
const TEMPLATES: &[(&str, &str)] = &[("mime/zip.html", include_str!("../templates/mime/zip.html"))];

/// Template manager
pub struct Templates {
    env: Environment<'static>,
}

impl Templates {
    /// Create a template manager with the built-in templates registered
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        for (name, source) in TEMPLATES {
            env.add_template(name, source)
                .map_err(|e| Error::Template(format!("{}: {}", name, e)))?;
        }

        Ok(Self { env })
    }

    /// Render a template with context
    pub fn render<S: Serialize>(&self, name: &str, context: S) -> Result<String> {
        let template = self
            .env
            .get_template(name)
            .map_err(|e| Error::Template(e.to_string()))?;
        debug!(template = %name, "Rendering template");
        template
            .render(context)
            .map_err(|e| Error::Template(format!("{}: {}", name, e)))
    }
}
