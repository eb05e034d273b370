//! NPC library and script loading
//!
//! A failed load is reported at warn and leaves the affected behaviour
//! unavailable; it never aborts the server.

use crate::error::{Result, ScriptError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Loads script sources into whatever runtime backs them
pub trait ScriptLoader {
    fn load_file(&mut self, path: &Path) -> Result<()>;
}

/// Loader that reads sources from disk and keeps them by path
#[derive(Debug, Default)]
pub struct SourceLoader {
    sources: HashMap<PathBuf, String>,
}

impl SourceLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(&self, path: &Path) -> Option<&str> {
        self.sources.get(path).map(String::as_str)
    }
}

impl ScriptLoader for SourceLoader {
    fn load_file(&mut self, path: &Path) -> Result<()> {
        let text = std::fs::read_to_string(path).map_err(|err| ScriptError::LoadFailed {
            file: path.display().to_string(),
            reason: err.to_string(),
        })?;
        self.sources.insert(path.to_path_buf(), text);
        Ok(())
    }
}

/// The shared NPC library, loaded at most once
#[derive(Debug, Default)]
pub struct NpcLibrary {
    loaded: bool,
}

impl NpcLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Load the library file unless already loaded
    pub fn load(&mut self, loader: &mut dyn ScriptLoader, path: &Path) -> bool {
        if self.loaded {
            return true;
        }
        match loader.load_file(path) {
            Ok(()) => {
                info!(path = %path.display(), "NPC library loaded");
                self.loaded = true;
                true
            }
            Err(err) => {
                warn!(path = %path.display(), %err, "Can not load NPC library");
                false
            }
        }
    }

    pub fn reset(&mut self) {
        self.loaded = false;
    }
}

/// Load one NPC's script; on failure the NPC runs without script events
pub fn load_npc_script(loader: &mut dyn ScriptLoader, path: &Path) -> bool {
    match loader.load_file(path) {
        Ok(()) => true,
        Err(err) => {
            warn!(path = %path.display(), %err, "Can not load NPC script");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    struct CountingLoader {
        calls: usize,
        fail: bool,
    }

    impl ScriptLoader for CountingLoader {
        fn load_file(&mut self, path: &Path) -> Result<()> {
            self.calls += 1;
            if self.fail {
                return Err(ScriptError::LoadFailed {
                    file: path.display().to_string(),
                    reason: "syntax error".into(),
                });
            }
            Ok(())
        }
    }

    #[test]
    fn test_library_loads_once() {
        let mut loader = CountingLoader { calls: 0, fail: false };
        let mut lib = NpcLibrary::new();
        assert!(lib.load(&mut loader, Path::new("npc/lib/npc.lua")));
        assert!(lib.load(&mut loader, Path::new("npc/lib/npc.lua")));
        assert_eq!(loader.calls, 1);
        assert!(lib.is_loaded());
    }

    #[test]
    fn test_library_failure_is_not_fatal() {
        let mut loader = CountingLoader { calls: 0, fail: true };
        let mut lib = NpcLibrary::new();
        assert!(!lib.load(&mut loader, Path::new("npc/lib/npc.lua")));
        assert!(!lib.is_loaded());
        assert!(!load_npc_script(&mut loader, Path::new("npc/scripts/sam.lua")));
    }

    #[test]
    fn test_source_loader_reads_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "function onThink() end").unwrap();

        let mut loader = SourceLoader::new();
        assert!(load_npc_script(&mut loader, file.path()));
        assert_eq!(loader.source(file.path()), Some("function onThink() end\n"));
        assert!(!load_npc_script(&mut loader, Path::new("/nonexistent/npc.lua")));
    }
}
