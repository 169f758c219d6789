//! Module source resolution for `from <module> import ...`

use crate::error::{FaultKind, ScriptError, ScriptResult};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Resolves a module name to its source text
pub trait ModuleLoader: Send + Sync + fmt::Debug {
    fn load_source(&self, module: &str) -> ScriptResult<String>;
}

fn not_found(module: &str) -> ScriptError {
    ScriptError::new(FaultKind::ImportError, format!("No module named '{module}'"))
}

/// Loader that knows no modules
#[derive(Debug, Clone, Copy, Default)]
pub struct NoModules;

impl ModuleLoader for NoModules {
    fn load_source(&self, module: &str) -> ScriptResult<String> {
        Err(not_found(module))
    }
}

/// Reads `<root>/<module>.<extension>`
#[derive(Debug, Clone)]
pub struct FsLoader {
    root: PathBuf,
    extension: String,
}

impl FsLoader {
    pub const DEFAULT_EXTENSION: &'static str = "py";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: Self::DEFAULT_EXTENSION.to_string(),
        }
    }

    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, module: &str) -> PathBuf {
        self.root.join(format!("{module}.{}", self.extension))
    }
}

impl ModuleLoader for FsLoader {
    fn load_source(&self, module: &str) -> ScriptResult<String> {
        // module names are plain identifiers, never paths
        if module.is_empty() || !module.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(not_found(module));
        }
        let path = self.path_for(module);
        match std::fs::read_to_string(&path) {
            Ok(src) => Ok(src),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(not_found(module)),
            Err(e) => Err(ScriptError::new(
                FaultKind::ImportError,
                format!("cannot read {}: {e}", path.display()),
            )),
        }
    }
}

/// Modules held in memory, keyed by name
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    modules: BTreeMap<String, String>,
}

impl MemoryLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_module(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.modules.insert(name.into(), source.into());
        self
    }
}

impl ModuleLoader for MemoryLoader {
    fn load_source(&self, module: &str) -> ScriptResult<String> {
        self.modules.get(module).cloned().ok_or_else(|| not_found(module))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fs_loader_reads_module_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hog.py"), "x = 1\n").unwrap();
        let loader = FsLoader::new(dir.path());
        assert_eq!(loader.load_source("hog").unwrap(), "x = 1\n");
        let err = loader.load_source("missing").unwrap_err();
        assert_eq!(err.kind, FaultKind::ImportError);
        assert!(loader.load_source("../etc").is_err());
    }

    #[test]
    fn memory_loader() {
        let loader = MemoryLoader::new().with_module("m", "y = 2");
        assert_eq!(loader.load_source("m").unwrap(), "y = 2");
        assert!(NoModules.load_source("m").is_err());
    }
}
