//! A `std::fs`-backed [`VirtualFileSystem`] rooted at a fixed directory.
//! No sandboxing beyond path joining — shell/sandbox integration is out
//! of scope for the core (§1).

use std::path::{Path, PathBuf};

use stacks_tools::VirtualFileSystem;

pub struct LocalFs {
    root: PathBuf,
}

impl LocalFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl VirtualFileSystem for LocalFs {
    fn read(&self, path: &str) -> Result<String, String> {
        std::fs::read_to_string(self.resolve(path)).map_err(|e| e.to_string())
    }

    fn write(&self, path: &str, content: &str) -> Result<(), String> {
        let target = self.resolve(path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        std::fs::write(target, content).map_err(|e| e.to_string())
    }

    fn list(&self, path: &str) -> Result<Vec<String>, String> {
        let dir = self.resolve(path);
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&dir).map_err(|e| e.to_string())? {
            let entry = entry.map_err(|e| e.to_string())?;
            entries.push(entry.file_name().to_string_lossy().into_owned());
        }
        entries.sort();
        Ok(entries)
    }

    fn tree(&self, path: &str) -> Result<String, String> {
        let mut out = String::new();
        render(&self.resolve(path), 0, &mut out)?;
        Ok(out)
    }
}

fn render(dir: &Path, depth: usize, out: &mut String) -> Result<(), String> {
    let mut names: Vec<_> = std::fs::read_dir(dir)
        .map_err(|e| e.to_string())?
        .filter_map(|e| e.ok())
        .collect();
    names.sort_by_key(|e| e.file_name());
    for entry in names {
        out.push_str(&"  ".repeat(depth));
        out.push_str(&entry.file_name().to_string_lossy());
        out.push('\n');
        if entry.path().is_dir() {
            render(&entry.path(), depth + 1, out)?;
        }
    }
    Ok(())
}
