//! Theme engine
//!
//! Template rendering using Tera. The default templates are compiled into
//! the binary; a directory given in `theme.path` may override any of them
//! by relative name (e.g. `blog/detail.html`).

use anyhow::{Context, Result};
use chrono::Datelike;
use rust_embed::RustEmbed;
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context as TeraContext, Tera};

use crate::models::User;

mod error;

pub use error::ThemeError;

/// Name shown in page titles and the header
pub const SITE_NAME: &str = "Blogicum";

#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct DefaultTemplates;

/// Theme engine for rendering templates
pub struct ThemeEngine {
    /// Tera template engine instance
    tera: Tera,
    /// Directory whose templates replace the embedded ones
    override_path: Option<PathBuf>,
}

impl ThemeEngine {
    /// Build the engine from the embedded templates plus any overrides
    /// found under `override_path`.
    pub fn new(override_path: Option<&Path>) -> Result<Self> {
        let mut engine = Self {
            tera: Tera::default(),
            override_path: override_path.map(Path::to_path_buf),
        };
        engine.reload_templates()?;
        Ok(engine)
    }

    /// Re-read every template from the binary and the override directory
    pub fn reload_templates(&mut self) -> Result<()> {
        let mut templates: BTreeMap<String, String> = BTreeMap::new();

        for name in DefaultTemplates::iter() {
            let file = DefaultTemplates::get(&name)
                .ok_or_else(|| ThemeError::NotFound(name.to_string()))?;
            let content = String::from_utf8(file.data.into_owned()).map_err(|e| {
                ThemeError::TemplateError(format!("Template {} is not UTF-8: {}", name, e))
            })?;
            templates.insert(name.to_string(), content);
        }

        if let Some(path) = &self.override_path {
            if path.is_dir() {
                let mut overrides = Vec::new();
                collect_templates_from_dir(path, path, &mut overrides)?;
                for (name, content) in overrides {
                    tracing::debug!("Template override: {}", name);
                    templates.insert(name, content);
                }
            } else {
                tracing::warn!("Theme path {:?} is not a directory, using built-in templates", path);
            }
        }

        let mut tera = Tera::default();
        tera.add_raw_templates(templates)
            .map_err(|e| ThemeError::TemplateError(format!("Failed to load templates: {}", e)))?;

        self.tera = tera;
        Ok(())
    }

    /// Render a template with context
    ///
    /// # Arguments
    /// * `template` - Template name (e.g., "blog/index.html")
    /// * `context` - Tera context with template variables
    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String> {
        self.tera.render(template, context).map_err(|e| {
            let mut error_msg = format!("Failed to render '{}': {}", template, e);
            let mut source = e.source();
            while let Some(s) = source {
                error_msg.push_str(&format!("\n  Caused by: {}", s));
                source = s.source();
            }
            ThemeError::TemplateError(error_msg).into()
        })
    }

    /// Render a page with the per-request variables every layout expects
    pub fn render_page(
        &self,
        template: &str,
        context: &TeraContext,
        standard_vars: &StandardTemplateVars,
    ) -> Result<String> {
        let mut full_context = context.clone();
        full_context.insert("site_name", SITE_NAME);
        full_context.insert("request_path", &standard_vars.request_path);
        full_context.insert("csrf_token", &standard_vars.csrf_token);
        full_context.insert("year", &standard_vars.year);
        full_context.insert("current_user", &standard_vars.current_user);

        self.render(template, &full_context)
    }

    /// Render an error page. Never fails: if the template itself cannot be
    /// rendered a bare page with only the status line is returned.
    pub fn render_error_page(
        &self,
        template: &str,
        status_line: &str,
        standard_vars: &StandardTemplateVars,
    ) -> String {
        match self.render_page(template, &TeraContext::new(), standard_vars) {
            Ok(html) => html,
            Err(e) => {
                tracing::error!("Failed to render error page '{}': {:#}", template, e);
                simple_error_page(status_line)
            }
        }
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }
}

/// Collect `.html` files below `current_path`, named relative to `base_path`
fn collect_templates_from_dir(
    base_path: &Path,
    current_path: &Path,
    templates: &mut Vec<(String, String)>,
) -> Result<()> {
    for entry in fs::read_dir(current_path).map_err(ThemeError::IoError)? {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            collect_templates_from_dir(base_path, &path, templates)?;
        } else if path.extension().is_some_and(|ext| ext == "html") {
            let relative_path = path
                .strip_prefix(base_path)
                .map_err(|_| ThemeError::TemplateError("Failed to get relative path".to_string()))?;

            let template_name = relative_path.to_string_lossy().replace('\\', "/");
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read template: {:?}", path))?;

            templates.push((template_name, content));
        }
    }

    Ok(())
}

/// Last-resort page when even the error template fails
fn simple_error_page(status_line: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>{0}</title></head>
<body><h1>{0}</h1></body>
</html>"#,
        status_line
    )
}

/// Variables injected into every page
#[derive(Debug, Clone, Serialize)]
pub struct StandardTemplateVars {
    /// Logged-in user, if any
    pub current_user: Option<CurrentUser>,
    /// Path of the current request
    pub request_path: String,
    /// Value for the hidden `csrfmiddlewaretoken` form field
    pub csrf_token: String,
    /// Current year (for the footer)
    pub year: i32,
}

/// Current user information for templates
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub is_superuser: bool,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            is_superuser: user.is_superuser,
        }
    }
}

impl StandardTemplateVars {
    pub fn new(request_path: impl Into<String>, csrf_token: impl Into<String>) -> Self {
        Self {
            current_user: None,
            request_path: request_path.into(),
            csrf_token: csrf_token.into(),
            year: chrono::Utc::now().year(),
        }
    }

    /// Set the current user
    pub fn with_user(mut self, user: Option<&User>) -> Self {
        self.current_user = user.map(CurrentUser::from);
        self
    }
}
