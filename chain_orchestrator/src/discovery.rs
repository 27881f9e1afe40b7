//! Capability discovery from Markdown definition files.
//!
//! Each `*.md` file in the capability directory (by default
//! `<repo>/.github/agents/`) starts with a YAML front-matter block:
//!
//! ```text
//! ---
//! name: code-reviewer
//! description: Reviews code for quality and correctness
//! keywords: [code-review, quality]
//! ---
//! # Instructions for the capability follow...
//! ```
//!
//! Files are read in file-name order so the registry's registration order
//! (and therefore the fallback selection) is stable across platforms.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::capability::{CapabilityDescriptor, CapabilityRegistry};
use crate::settings::DiscoveryConfig;

static FRONT_MATTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\A---[ \t]*\r?\n((?s:.*?))\r?\n---").expect("front matter pattern is valid")
});

/// Scans a directory of capability definition files.
pub struct CapabilityDiscovery {
    agents_dir: PathBuf,
}

impl CapabilityDiscovery {
    /// Discover from `<repo_root>/.github/agents`.
    pub fn new(repo_root: impl AsRef<Path>) -> Self {
        Self::from_config(&DiscoveryConfig {
            repo_root: repo_root.as_ref().to_path_buf(),
            ..DiscoveryConfig::default()
        })
    }

    pub fn from_config(config: &DiscoveryConfig) -> Self {
        Self {
            agents_dir: config.agents_path(),
        }
    }

    pub fn agents_dir(&self) -> &Path {
        &self.agents_dir
    }

    /// Parse every definition file into a catalog, skipping bad files.
    ///
    /// A missing directory yields an empty catalog.
    pub fn discover(&self) -> Result<Vec<CapabilityDescriptor>> {
        if !self.agents_dir.is_dir() {
            warn!(path = %self.agents_dir.display(), "capability directory not found");
            return Ok(Vec::new());
        }

        let mut files: Vec<PathBuf> = std::fs::read_dir(&self.agents_dir)
            .with_context(|| format!("failed to read {}", self.agents_dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "md"))
            .collect();
        files.sort();

        let mut catalog = Vec::with_capacity(files.len());
        for path in files {
            match parse_definition_file(&path) {
                Ok(descriptor) => {
                    debug!(capability = %descriptor.name, path = %path.display(), "discovered capability");
                    catalog.push(descriptor);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to parse capability file, skipping");
                }
            }
        }

        Ok(catalog)
    }

    /// Discover and register, dropping duplicates after the first.
    pub fn discover_registry(&self) -> Result<CapabilityRegistry> {
        let registry = CapabilityRegistry::from_catalog(self.discover()?);
        info!(count = registry.len(), "capability discovery complete");
        Ok(registry)
    }
}

/// Pretty JSON of the registry contents, in registration order.
pub fn export_json(registry: &CapabilityRegistry) -> Result<String> {
    serde_json::to_string_pretty(&registry.all()).context("failed to serialize capabilities")
}

fn parse_definition_file(path: &Path) -> Result<CapabilityDescriptor> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    parse_definition(&content)
}

/// Parse the front matter of a single definition.
pub fn parse_definition(content: &str) -> Result<CapabilityDescriptor> {
    let front_matter = FRONT_MATTER
        .captures(content)
        .and_then(|c| c.get(1))
        .ok_or_else(|| anyhow!("no front matter found"))?
        .as_str();

    let mut descriptor = match serde_yaml::from_str::<CapabilityDescriptor>(front_matter) {
        Ok(descriptor) => descriptor,
        Err(e) => {
            debug!(error = %e, "front matter is not strict YAML, reading line by line");
            parse_front_matter_lines(front_matter)
        }
    };

    descriptor.name = descriptor.name.trim().to_string();
    if descriptor.name.is_empty() {
        return Err(anyhow!("capability name not found in front matter"));
    }
    descriptor.keywords.retain(|kw| !kw.trim().is_empty());

    Ok(descriptor)
}

/// Lenient reader for hand-written front matter such as
/// `description: Reviews code: quality, security`, which strict YAML rejects.
///
/// Each line is split on its first `:`. Unknown keys are ignored and
/// keywords are only read from an inline `[a, "b", 'c']` list.
fn parse_front_matter_lines(front_matter: &str) -> CapabilityDescriptor {
    let mut descriptor = CapabilityDescriptor::new("", "");
    for line in front_matter.lines() {
        let Some((key, value)) = line.trim().split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "name" => descriptor.name = value.to_string(),
            "description" => descriptor.description = value.to_string(),
            "keywords" => {
                if let Some(list) = value.strip_prefix('[').and_then(|v| v.strip_suffix(']')) {
                    descriptor.keywords = list
                        .split(',')
                        .map(|kw| kw.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
                        .filter(|kw| !kw.is_empty())
                        .collect();
                }
            }
            _ => {}
        }
    }
    descriptor
}
