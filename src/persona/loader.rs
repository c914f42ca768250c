//! Persona catalog: built-in roster plus user YAML files

use eyre::{Context, Result};
use indexmap::IndexMap;
use lazy_regex::regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const BUILTIN_ROSTER: &str = include_str!("roster.yaml");

/// Persona data as written in YAML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaProfile {
    /// Role name shown in output (e.g., "Lead Designer")
    pub name: String,

    /// What the persona is after; descriptive only, never sent to the model
    #[serde(default)]
    pub goal: String,

    /// System message for every request this persona makes
    pub backstory: String,

    /// Model override for this persona only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl PersonaProfile {
    pub fn slug(&self) -> String {
        slugify(&self.name)
    }
}

impl std::fmt::Display for PersonaProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.goal)
    }
}

/// Lowercase, hyphen-separated file stem for a persona name
pub fn slugify(name: &str) -> String {
    let lower = name.to_lowercase();
    regex!(r"[^a-z0-9]+").replace_all(&lower, "-").trim_matches('-').to_string()
}

/// The design team shipped with the binary, in speaking order
pub fn builtin_roster() -> Result<Vec<PersonaProfile>> {
    serde_yaml::from_str(BUILTIN_ROSTER).context("Failed to parse built-in persona roster")
}

/// Ordered persona catalog keyed by slug
pub struct PersonaLoader {
    personas_dir: PathBuf,
    catalog: IndexMap<String, PersonaProfile>,
}

impl PersonaLoader {
    pub fn new(personas_dir: PathBuf) -> Self {
        Self {
            personas_dir,
            catalog: IndexMap::new(),
        }
    }

    /// Built-ins first, then every YAML file in the personas directory.
    ///
    /// A file whose persona shares a built-in's name replaces it in place.
    pub fn load_all(&mut self) -> Result<Vec<PersonaProfile>> {
        self.catalog.clear();

        for profile in builtin_roster()? {
            self.catalog.insert(profile.slug(), profile);
        }

        if self.personas_dir.exists() {
            let entries = fs::read_dir(&self.personas_dir)
                .with_context(|| format!("Failed to read personas directory: {}", self.personas_dir.display()))?;

            let mut paths: Vec<PathBuf> = entries
                .flatten()
                .map(|entry| entry.path())
                .filter(|path| path.extension().map(|e| e == "yaml" || e == "yml").unwrap_or(false))
                .collect();
            paths.sort();

            for path in paths {
                match self.load_persona(&path) {
                    Ok(profile) => {
                        log::debug!("Loaded persona '{}' from {}", profile.name, path.display());
                        self.catalog.insert(profile.slug(), profile);
                    }
                    Err(e) => {
                        log::warn!("Failed to load persona from {}: {}", path.display(), e);
                    }
                }
            }
        }

        Ok(self.catalog.values().cloned().collect())
    }

    /// Load a single persona from a file
    pub fn load_persona(&self, path: &Path) -> Result<PersonaProfile> {
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read persona file: {}", path.display()))?;

        let profile: PersonaProfile = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse persona file: {}", path.display()))?;

        if profile.slug().is_empty() {
            eyre::bail!(
                "Persona in {} needs a name with at least one letter or digit (got '{}')",
                path.display(),
                profile.name
            );
        }

        Ok(profile)
    }

    /// Look up by name, case-insensitively, or by slug
    pub fn get(&self, name: &str) -> Option<&PersonaProfile> {
        self.catalog.get(&slugify(name))
    }

    /// Resolve a roster in the requested order; empty selects the whole catalog
    pub fn select(&self, names: &[String]) -> Result<Vec<PersonaProfile>> {
        if names.is_empty() {
            return Ok(self.catalog.values().cloned().collect());
        }

        names
            .iter()
            .map(|name| {
                self.get(name).cloned().ok_or_else(|| {
                    let known: Vec<&str> = self.catalog.values().map(|p| p.name.as_str()).collect();
                    eyre::eyre!("Unknown persona: {}. Known: {}", name, known.join(", "))
                })
            })
            .collect()
    }

    pub fn personas_dir(&self) -> &Path {
        &self.personas_dir
    }

    /// Where a persona with this name is stored
    pub fn path_for(&self, name: &str) -> Result<PathBuf> {
        let slug = slugify(name);
        if slug.is_empty() {
            eyre::bail!("Persona name '{}' needs at least one letter or digit", name);
        }
        Ok(self.personas_dir.join(format!("{}.yaml", slug)))
    }
}
