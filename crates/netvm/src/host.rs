use std::path::Path;
use std::sync::Arc;

use netsync::reflect;
use netweave::ModuleDef;
use netweave::module::TypeDef;
use tracing::debug;

use crate::error::Error;
use crate::error::Result;
use crate::instance::Instance;

/// Interpreter limits and the capability type it dispatches to.
#[derive(Clone, Debug)]
pub struct HostConfig {
    /// Instructions one top-level member may execute, callees included.
    pub max_steps: u64,
    pub max_depth: usize,
    pub capability_type: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            max_steps: 1_000_000,
            max_depth: 256,
            capability_type: format!("{}.{}", reflect::CAPABILITY_NAMESPACE, reflect::CAPABILITY_NAME),
        }
    }
}

impl HostConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_steps(mut self, steps: u64) -> Self {
        self.max_steps = steps;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }
}

/// A loaded module plus the limits it runs under. Shared by every instance.
pub(crate) struct Program {
    pub module: ModuleDef,
    pub config: HostConfig,
}

impl Program {
    pub fn type_def(&self, name: &str) -> Result<&TypeDef> {
        self.module.find_type(name).ok_or_else(|| Error::MissingType(name.to_string()))
    }
}

/// Runs the types of one module.
pub struct Host {
    program: Arc<Program>,
}

impl Host {
    pub fn new(module: ModuleDef) -> Self {
        Self::with_config(module, HostConfig::default())
    }

    pub fn with_config(module: ModuleDef, config: HostConfig) -> Self {
        Self { program: Arc::new(Program { module, config }) }
    }

    /// Loads a module image from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let module = netweave::image::read_file(path)?;
        debug!("loaded module '{}' from {}", module.name, path.display());
        Ok(Self::new(module))
    }

    pub fn module(&self) -> &ModuleDef {
        &self.program.module
    }

    /// Creates an instance of `type_name` with every field at its default.
    pub fn instantiate(&self, type_name: &str) -> Result<Arc<Instance>> {
        Instance::new(self.program.clone(), type_name)
    }
}
