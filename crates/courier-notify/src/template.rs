//! A minimal placeholder template engine for outgoing mail bodies.
//!
//! Templates contain `{key}` placeholders which are substituted
//! case-insensitively, so `{code}`, `{Code}` and `{CODE}` all resolve to the
//! same variable. File-backed templates are read once and cached for the
//! lifetime of the process.

use std::{
  collections::HashMap,
  path::PathBuf,
  sync::{Arc, Mutex},
};

use regex::Regex;
use serde::Deserialize;

use crate::{Error, Result};

/// Where a template's text comes from. Deserialised from configuration as
/// either a bare string (inline) or `{ template = "path" }` (file).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TemplateSource {
  Inline(String),
  File { template: PathBuf },
}

/// Template renderer with a per-path cache of file contents.
#[derive(Default)]
pub struct Templates {
  cache: Mutex<HashMap<PathBuf, Arc<str>>>,
}

impl Templates {
  pub fn new() -> Self { Self::default() }

  /// Render `source`, substituting each `(key, value)` pair into `{key}`
  /// placeholders. Placeholders with no matching key are left verbatim.
  pub fn render(
    &self,
    source: &TemplateSource,
    vars: &[(&str, &str)],
  ) -> Result<String> {
    let text = self.resolve(source)?;

    let mut rendered = text.to_string();
    for (key, value) in vars {
      let pattern =
        Regex::new(&format!(r"(?i)\{{{}\}}", regex::escape(key)))?;
      // NoExpand so a `$` in a value is not mistaken for a capture group.
      rendered =
        pattern.replace_all(&rendered, regex::NoExpand(value)).into_owned();
    }
    Ok(rendered)
  }

  fn resolve(&self, source: &TemplateSource) -> Result<Arc<str>> {
    match source {
      TemplateSource::Inline(text) => Ok(Arc::from(text.as_str())),
      TemplateSource::File { template } => {
        let mut cache = self.cache.lock().expect("template cache poisoned");
        if let Some(cached) = cache.get(template) {
          return Ok(Arc::clone(cached));
        }
        let text = std::fs::read_to_string(template).map_err(|source| {
          Error::TemplateRead { path: template.clone(), source }
        })?;
        let text: Arc<str> = Arc::from(text);
        cache.insert(template.clone(), Arc::clone(&text));
        Ok(text)
      }
    }
  }
}
