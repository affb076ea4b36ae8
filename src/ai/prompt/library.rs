//! Filesystem-backed prompt templates
//!
//! Templates live at `<prompt_dir>/<name>.yml` and are used as raw text.

use dashmap::DashMap;
use regex::{NoExpand, Regex, RegexBuilder};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tracing::debug;

use crate::constants::layout;
use crate::types::{EscalatorError, Result, TaskFamily};

/// `<USER-CONTENT>` blocks are stripped from user input; an unterminated
/// block runs to the end of the input
static USER_CONTENT_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"<USER-CONTENT>.*?(?:</USER-CONTENT>|$)")
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .expect("user content pattern is a valid regex")
});

static INPUT_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{input\}\}|\[\[input\]\]|\{input\}")
        .expect("placeholder pattern is a valid regex")
});

pub struct TemplateLibrary {
    base_dir: PathBuf,
    cache: DashMap<String, Arc<str>>,
}

impl TemplateLibrary {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            cache: DashMap::new(),
        }
    }

    /// Template name for a family, e.g. `code_assist_v1`
    pub fn name_for(family: &TaskFamily) -> String {
        format!("{}_{}", family, layout::TEMPLATE_VERSION)
    }

    pub fn load_for(&self, family: &TaskFamily) -> Result<Arc<str>> {
        self.load(&Self::name_for(family))
    }

    /// Load a template by name (no extension), caching the text
    pub fn load(&self, name: &str) -> Result<Arc<str>> {
        if let Some(cached) = self.cache.get(name) {
            return Ok(Arc::clone(cached.value()));
        }

        let path = self.resolve(name)?;
        if !path.is_file() {
            return Err(EscalatorError::unknown_key(
                "prompt template",
                name,
                self.available(),
            ));
        }

        let text: Arc<str> = fs::read_to_string(&path)?.into();
        debug!(template = name, path = %path.display(), "Loaded prompt template");
        self.cache.insert(name.to_string(), Arc::clone(&text));
        Ok(text)
    }

    /// Template names found on disk, sorted
    pub fn available(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.base_dir) else {
            return Vec::new();
        };
        let suffix = format!(".{}", layout::TEMPLATE_EXT);
        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .and_then(|name| name.strip_suffix(suffix.as_str()))
                    .map(str::to_string)
            })
            .collect();
        names.sort();
        names
    }

    /// Path for `name`, refusing anything that leaves `base_dir`
    fn resolve(&self, name: &str) -> Result<PathBuf> {
        let relative = PathBuf::from(format!("{}.{}", name, layout::TEMPLATE_EXT));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(refuse(name, &self.base_dir));
        }

        let path = self.base_dir.join(&relative);
        // Symlinks may still point elsewhere
        if let (Ok(base), Ok(target)) = (self.base_dir.canonicalize(), path.canonicalize())
            && !target.starts_with(&base)
        {
            return Err(refuse(name, &self.base_dir));
        }
        Ok(path)
    }

    /// Substitute sanitized user input for every placeholder
    pub fn render(template: &str, user_input: &str) -> String {
        let sanitized = USER_CONTENT_BLOCK.replace_all(user_input, "");
        let sanitized = sanitized.trim();
        INPUT_PLACEHOLDER
            .replace_all(template, NoExpand(sanitized))
            .into_owned()
    }
}

fn refuse(name: &str, base: &Path) -> EscalatorError {
    EscalatorError::Config(format!(
        "Refusing to load template '{}' outside {}",
        name,
        base.display()
    ))
}
