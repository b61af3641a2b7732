//! Template Store
//!
//! Resolves template names against the configured directories, compiles
//! them on first use and renders them with a caller-supplied context.
//! Directories are searched in order; the first one holding a template wins.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use super::cache::{CacheStats, TemplateCache};
use super::template::{CompiledTemplate, Template, TemplateContext, new_registry};
use crate::config::TemplateConfig;
use crate::constants::cache::TEMPLATE_EXTENSION;
use crate::types::{CrossCheckError, Result};

pub struct TemplateStore {
    dirs: Vec<PathBuf>,
    auto_reload: bool,
    cache: TemplateCache,
}

impl std::fmt::Debug for TemplateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateStore")
            .field("dirs", &self.dirs)
            .field("auto_reload", &self.auto_reload)
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl TemplateStore {
    pub fn new(config: &TemplateConfig) -> Self {
        for dir in &config.dirs {
            if !dir.is_dir() {
                warn!("Template directory does not exist: {}", dir.display());
            }
        }
        debug!(
            dirs = ?config.dirs,
            cache_size = config.cache_size,
            auto_reload = config.auto_reload,
            "Initialized template store"
        );
        Self {
            dirs: config.dirs.clone(),
            auto_reload: config.auto_reload,
            cache: TemplateCache::new(config.cache_size),
        }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Template metadata and body, compiling and caching it if needed
    pub fn load(&self, name: &str) -> Result<Template> {
        Ok(self.compiled(name)?.template().clone())
    }

    /// Render a named template
    pub fn render(&self, name: &str, context: &TemplateContext) -> Result<String> {
        let compiled = self.compiled(name)?;
        let rendered = compiled.render(context)?;
        debug!(
            template = %name,
            variables = context.len(),
            rendered_len = rendered.len(),
            "Rendered template"
        );
        Ok(rendered)
    }

    /// Render an inline template source without touching the cache
    pub fn render_string(&self, source: &str, context: &TemplateContext) -> Result<String> {
        new_registry()
            .render_template(source, context)
            .map_err(|e| CrossCheckError::TemplateParse {
                name: "<inline>".to_string(),
                message: e.to_string(),
            })
    }

    /// Template names, sorted; optionally only those in `category`
    pub fn list_templates(&self, category: Option<&str>) -> Vec<String> {
        let mut names = BTreeSet::new();
        for dir in &self.dirs {
            let mut files = Vec::new();
            collect_templates(dir, &mut files);
            for path in files {
                let Some(name) = template_name(dir, &path) else {
                    continue;
                };
                if let Some(category) = category
                    && category_of(&name).as_deref() != Some(category)
                {
                    continue;
                }
                names.insert(name);
            }
        }
        names.into_iter().collect()
    }

    /// Whether `name` resolves and compiles
    pub fn validate_template(&self, name: &str) -> bool {
        match self.compiled(name) {
            Ok(_) => true,
            Err(e) => {
                debug!(template = %name, error = %e, "Template failed validation");
                false
            }
        }
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
        debug!("Cleared template cache");
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn compiled(&self, name: &str) -> Result<Arc<CompiledTemplate>> {
        if let Some(compiled) = self.cache.get(name, self.auto_reload) {
            return Ok(compiled);
        }

        let path = self
            .find(name)
            .ok_or_else(|| CrossCheckError::TemplateNotFound {
                name: name.to_string(),
            })?;
        let raw = fs::read_to_string(&path)?;
        let template = Template::parse(name, &raw, category_of(name));
        let compiled = Arc::new(CompiledTemplate::compile(template)?);

        debug!(
            template = %name,
            path = %path.display(),
            version = %compiled.template().version,
            "Loaded template"
        );
        self.cache.insert(name, Arc::clone(&compiled), &path);
        Ok(compiled)
    }

    fn find(&self, name: &str) -> Option<PathBuf> {
        if !is_safe_name(name) {
            warn!(template = %name, "Rejected template name outside template directories");
            return None;
        }
        let file = format!("{}.{}", name, TEMPLATE_EXTENSION);
        self.dirs
            .iter()
            .map(|dir| dir.join(&file))
            .find(|path| path.is_file())
    }
}

/// Relative, `/`-separated, no parent or root components
fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains('\\')
        && Path::new(name)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

/// Parent path of a template name, e.g. `crosscheck` for `crosscheck/direct_query`
fn category_of(name: &str) -> Option<String> {
    name.rsplit_once('/').map(|(parent, _)| parent.to_string())
}

fn template_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?.with_extension("");
    let parts: Vec<&str> = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    Some(parts.join("/"))
}

fn collect_templates(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_templates(&path, out);
        } else if path.extension().is_some_and(|ext| ext == TEMPLATE_EXTENSION) {
            out.push(path);
        }
    }
}
