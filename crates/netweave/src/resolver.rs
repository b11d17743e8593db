//! Finds referenced modules on the search path.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use tracing::debug;

use crate::error::Result;
use crate::image;
use crate::module::ModuleDef;

/// Looks modules up by name as `<dir>/<name>.nsym`, first directory wins.
/// Loaded modules are cached for the resolver's lifetime.
#[derive(Debug, Default)]
pub struct ModuleResolver {
    dirs: Vec<PathBuf>,
    cache: HashMap<String, (PathBuf, ModuleDef)>,
}

impl ModuleResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_search_dir(&mut self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        if !self.dirs.contains(&dir) {
            self.dirs.push(dir);
        }
    }

    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Path of the first image named `name`, if any.
    pub fn locate(&self, name: &str) -> Option<PathBuf> {
        self.dirs
            .iter()
            .map(|dir| dir.join(format!("{}.{}", name, image::EXTENSION)))
            .find(|path| path.is_file())
    }

    /// Loads `name`. `Ok(None)` when no directory has it.
    pub fn resolve(&mut self, name: &str) -> Result<Option<(PathBuf, ModuleDef)>> {
        if let Some(hit) = self.cache.get(name) {
            return Ok(Some(hit.clone()));
        }
        let Some(path) = self.locate(name) else {
            return Ok(None);
        };
        debug!(module = name, path = %path.display(), "resolved module");
        let module = image::read_file(&path)?;
        self.cache.insert(name.to_string(), (path.clone(), module.clone()));
        Ok(Some((path, module)))
    }

    pub fn is_cached(&self, name: &str) -> bool {
        self.cache.contains_key(name)
    }
}

/// Canonical form of `path` for identity checks. Falls back to the path as
/// given when it cannot be canonicalized.
pub fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
