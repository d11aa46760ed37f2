//! Directory walking and file filtering
//!
//! Selects the JavaScript entries of an npm-style package tree: `.js`
//! files within the size limit plus extensionless scripts with a Node
//! shebang, skipping `.git`, `node_modules` and asset directories by
//! name. Entry names are normalized to the path inside the package.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AnalysisError, Result};

const EXCLUDED_DIRS: &[&str] = &[".git", "node_modules", "assets", ".node_modules.ember-try"];

const NODE_SHEBANG: &str = "#!/usr/bin/env node";

/// Captures the path below the last `/package/` segment, the layout npm
/// pack tarballs unpack to.
static PACKAGE_PATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:/?.+)(?:/package/)(.+)").expect("package path pattern"));

pub struct WalkedFile {
    pub path: PathBuf,
    pub name: String,
}

pub struct FileWalker {
    size_limit: u64,
}

impl FileWalker {
    pub fn new(size_limit: u64) -> Self {
        Self { size_limit }
    }

    pub fn walk(&self, root: &Path) -> Result<Vec<WalkedFile>> {
        let mut files = Vec::new();

        let walker = WalkBuilder::new(root)
            .hidden(false)
            .ignore(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .filter_entry(|entry| {
                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                !(is_dir && EXCLUDED_DIRS.contains(&entry.file_name().to_string_lossy().as_ref()))
            })
            .build();

        for entry in walker {
            let entry = entry.map_err(|e| AnalysisError::Walk(e.to_string()))?;
            let path = entry.path();
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            if self.accepts(path)? {
                files.push(WalkedFile {
                    name: entry_name(root, path),
                    path: path.to_path_buf(),
                });
            }
        }

        Ok(files)
    }

    fn accepts(&self, path: &Path) -> Result<bool> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("js") => Ok(std::fs::metadata(path)?.len() <= self.size_limit),
            Some(_) => Ok(false),
            None => {
                let contents = std::fs::read_to_string(path).unwrap_or_default();
                Ok(contents.starts_with(NODE_SHEBANG))
            }
        }
    }
}

/// The name a file is indexed and reported under: the path below the
/// package directory when there is one, else the path relative to the
/// walked root.
pub fn entry_name(root: &Path, path: &Path) -> String {
    let full = path.to_string_lossy().replace('\\', "/");
    if full.contains("package") {
        if let Some(captures) = PACKAGE_PATH_RE.captures(&full) {
            if let Some(inner) = captures.get(1) {
                return inner.as_str().to_string();
            }
        }
    }
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::TempDir;

    fn create_file(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut file = File::create(path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn test_walk_finds_js_files() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "index.js", "foo();");
        create_file(temp_dir.path(), "lib/util.js", "bar();");
        create_file(temp_dir.path(), "README.md", "# readme");

        let walker = FileWalker::new(1024);
        let files = walker.walk(temp_dir.path()).unwrap();

        let mut names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["index.js", "lib/util.js"]);
    }

    #[test]
    fn test_walk_respects_size_limit() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "small.js", "a();");
        create_file(temp_dir.path(), "big.js", &"x".repeat(64));

        let walker = FileWalker::new(16);
        let files = walker.walk(temp_dir.path()).unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "small.js");
    }

    #[test]
    fn test_walk_includes_node_shebang_scripts() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "cli", "#!/usr/bin/env node\nmain();");
        create_file(temp_dir.path(), "other", "#!/bin/sh\necho hi");

        let walker = FileWalker::new(1024);
        let files = walker.walk(temp_dir.path()).unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "cli");
    }

    #[test]
    fn test_walk_excludes_vendored_directories() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "index.js", "a();");
        create_file(temp_dir.path(), "node_modules/dep/index.js", "b();");
        create_file(temp_dir.path(), ".git/hooks/hook.js", "c();");
        create_file(temp_dir.path(), "assets/bundle.js", "d();");

        let walker = FileWalker::new(1024);
        let files = walker.walk(temp_dir.path()).unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "index.js");
    }

    #[test]
    fn test_entry_name_strips_package_prefix() {
        let name = entry_name(
            Path::new("/analysis/input"),
            Path::new("/analysis/input/foo/package/src/a.js"),
        );
        assert_eq!(name, "src/a.js");
    }

    #[test]
    fn test_entry_name_relative_without_package() {
        let name = entry_name(Path::new("/work/pkg"), Path::new("/work/pkg/lib/b.js"));
        assert_eq!(name, "lib/b.js");
    }
}
