use std::path::Path;

use tera::{Context, Tera};
use tracing::{info, warn};

use expensey_core::templates::{
    RenderError, TemplateRenderer, TemplateVars, APPROVAL_REQUEST_TEMPLATE, MESSAGE_TEMPLATE,
};

const EMBEDDED_TEMPLATES: [(&str, &str); 2] = [
    (MESSAGE_TEMPLATE, include_str!("../../../templates/message.html")),
    (APPROVAL_REQUEST_TEMPLATE, include_str!("../../../templates/approval_request.html")),
];

/// Tera-backed renderer. Templates found in the override directory win over
/// the built-in copies of the same name.
pub struct TeraRenderer {
    tera: Tera,
}

impl TeraRenderer {
    pub fn embedded() -> Result<Self, RenderError> {
        Self::new(None)
    }

    pub fn new(templates_dir: Option<&str>) -> Result<Self, RenderError> {
        let mut tera = match templates_dir {
            Some(dir) => load_directory(dir)?,
            None => Tera::default(),
        };

        for (name, source) in EMBEDDED_TEMPLATES {
            if tera.get_template_names().any(|existing| existing == name) {
                continue;
            }
            tera.add_raw_template(name, source).map_err(|error| RenderError::Failed {
                name: name.to_string(),
                detail: error.to_string(),
            })?;
        }

        Ok(Self { tera })
    }
}

fn load_directory(dir: &str) -> Result<Tera, RenderError> {
    if !Path::new(dir).is_dir() {
        warn!(
            event_name = "system.templates.override_missing",
            correlation_id = "bootstrap",
            templates_dir = %dir,
            "template override directory not found, using built-in templates"
        );
        return Ok(Tera::default());
    }

    let glob = format!("{}/**/*.html", dir.trim_end_matches('/'));
    let tera = Tera::new(&glob)
        .map_err(|error| RenderError::Failed { name: glob.clone(), detail: error.to_string() })?;
    info!(
        event_name = "system.templates.override_loaded",
        correlation_id = "bootstrap",
        templates_dir = %dir,
        template_count = tera.get_template_names().count(),
        "loaded template overrides"
    );
    Ok(tera)
}

impl TemplateRenderer for TeraRenderer {
    fn render(&self, name: &str, vars: &TemplateVars) -> Result<String, RenderError> {
        if !self.tera.get_template_names().any(|existing| existing == name) {
            return Err(RenderError::UnknownTemplate(name.to_string()));
        }

        let context = Context::from_serialize(vars).map_err(|error| RenderError::Failed {
            name: name.to_string(),
            detail: error.to_string(),
        })?;
        self.tera
            .render(name, &context)
            .map_err(|error| RenderError::Failed { name: name.to_string(), detail: error.to_string() })
    }
}
