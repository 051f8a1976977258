//! `{{ key }}` placeholder templates.
//!
//! Every `*.template` file in a checkout is rendered to its sibling without
//! the suffix (`kitty.conf.template` → `kitty.conf`). Keys are looked up in a
//! JSON context; dotted keys walk nested objects.
use regex::{Captures, Regex};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use super::TemplateRenderer;
use crate::error::CollaboratorError;
use crate::logging::Log;

/// Template file suffix.
pub const TEMPLATE_SUFFIX: &str = ".template";

static PLACEHOLDER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_][A-Za-z0-9_.\-]*)\s*\}\}").ok());

/// Renders placeholder templates in place.
pub struct PlaceholderRenderer {
    log: Arc<dyn Log>,
}

impl std::fmt::Debug for PlaceholderRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaceholderRenderer").finish_non_exhaustive()
    }
}

impl PlaceholderRenderer {
    /// Renderer logging to `log`.
    #[must_use]
    pub fn new(log: Arc<dyn Log>) -> Self {
        Self { log }
    }
}

impl TemplateRenderer for PlaceholderRenderer {
    fn render(
        &self,
        source_dir: &Path,
        context: &serde_json::Value,
    ) -> Result<Vec<PathBuf>, CollaboratorError> {
        let mut templates = Vec::new();
        collect_templates(source_dir, &mut templates)
            .map_err(|e| CollaboratorError::Template(format!("{}: {e}", source_dir.display())))?;
        templates.sort();

        let mut written = Vec::new();
        for template in templates {
            let content = std::fs::read_to_string(&template).map_err(|e| {
                CollaboratorError::Template(format!("{}: {e}", template.display()))
            })?;
            let rendered = render_str(&content, context).map_err(|key| {
                CollaboratorError::Template(format!(
                    "unknown key '{key}' in {}",
                    template.display()
                ))
            })?;
            let out = strip_suffix(&template);
            std::fs::write(&out, rendered)
                .map_err(|e| CollaboratorError::Template(format!("{}: {e}", out.display())))?;
            self.log.debug(&format!("rendered {}", out.display()));
            written.push(out);
        }
        Ok(written)
    }
}

/// Replace every placeholder in `content`; `Err` carries the first unknown key.
pub fn render_str(content: &str, context: &serde_json::Value) -> Result<String, String> {
    let Some(re) = PLACEHOLDER.as_ref() else {
        return Ok(content.to_string());
    };
    let mut missing = None;
    let rendered = re.replace_all(content, |caps: &Captures<'_>| {
        let key = caps.get(1).map_or("", |m| m.as_str());
        lookup(context, key).unwrap_or_else(|| {
            missing.get_or_insert_with(|| key.to_string());
            String::new()
        })
    });
    match missing {
        Some(key) => Err(key),
        None => Ok(rendered.into_owned()),
    }
}

fn lookup(context: &serde_json::Value, key: &str) -> Option<String> {
    let value = key
        .split('.')
        .try_fold(context, |node, part| node.as_object()?.get(part))?;
    Some(match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn strip_suffix(template: &Path) -> PathBuf {
    let name = template
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    template.with_file_name(name.strip_suffix(TEMPLATE_SUFFIX).unwrap_or(&name))
}

fn collect_templates(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            if entry.file_name() != ".git" {
                collect_templates(&path, out)?;
            }
        } else if file_type.is_file()
            && entry
                .file_name()
                .to_string_lossy()
                .ends_with(TEMPLATE_SUFFIX)
        {
            out.push(path);
        }
    }
    Ok(())
}
