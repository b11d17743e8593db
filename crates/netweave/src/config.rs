//! Weave configuration.

use std::path::PathBuf;

use netsync::reflect;

/// Names and limits the weaver works with.
///
/// Defaults agree with the attribute and capability names the runtime uses,
/// so a module woven with `WeaveConfig::default()` talks to
/// `netsync::DefaultInterceptor` unchanged.
#[derive(Clone, Debug)]
pub struct WeaveConfig {
    pub sync_attribute: String,
    pub ignore_attribute: String,
    pub name_argument: String,
    pub capability_module: String,
    pub capability_namespace: String,
    pub capability_name: String,
    pub write_value: String,
    pub call_function: String,
    /// Most parameters a synchronized method may declare.
    pub max_parameters: usize,
    /// Location of the weaver itself. Never woven.
    pub self_location: Option<PathBuf>,
    /// Searched before the target's include directory.
    pub search_dirs: Vec<PathBuf>,
}

impl Default for WeaveConfig {
    fn default() -> Self {
        Self {
            sync_attribute: reflect::SYNC_ATTRIBUTE.to_string(),
            ignore_attribute: reflect::IGNORE_ATTRIBUTE.to_string(),
            name_argument: reflect::NAME_ARGUMENT.to_string(),
            capability_module: reflect::CAPABILITY_MODULE.to_string(),
            capability_namespace: reflect::CAPABILITY_NAMESPACE.to_string(),
            capability_name: reflect::CAPABILITY_NAME.to_string(),
            write_value: reflect::WRITE_VALUE.to_string(),
            call_function: reflect::CALL_FUNCTION.to_string(),
            max_parameters: 255,
            self_location: None,
            search_dirs: Vec::new(),
        }
    }
}

impl WeaveConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn self_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.self_location = Some(path.into());
        self
    }

    pub fn search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_dirs.push(dir.into());
        self
    }

    pub fn max_parameters(mut self, max: usize) -> Self {
        self.max_parameters = max;
        self
    }

    pub fn sync_attribute(mut self, name: impl Into<String>) -> Self {
        self.sync_attribute = name.into();
        self
    }

    pub fn ignore_attribute(mut self, name: impl Into<String>) -> Self {
        self.ignore_attribute = name.into();
        self
    }

    pub fn capability_full_name(&self) -> String {
        format!("{}.{}", self.capability_namespace, self.capability_name)
    }
}
