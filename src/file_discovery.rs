use crate::config::Config;
use crate::model::{ElementKind, SourceFile};
use ignore::WalkBuilder;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Scans the target directory and produces the snapshot the engine runs on.
///
/// This is the only part of the crate that touches the filesystem during an
/// analysis; everything downstream consumes the collected `SourceFile` set.
pub struct FileDiscovery {
    config: Config,
}

impl FileDiscovery {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Walk the target directory and read every eligible file.
    ///
    /// Unreadable or binary files are skipped, never fatal. The result is
    /// sorted by path so downstream stages see a deterministic snapshot.
    pub fn collect_sources(&self) -> crate::Result<Vec<SourceFile>> {
        let mut files = Vec::new();

        let mut walker_builder = WalkBuilder::new(&self.config.target_directory);
        walker_builder
            .standard_filters(true)
            .hidden(false)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true);

        for result in walker_builder.build() {
            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };
            let path = entry.path();

            if !path.is_file() || self.should_ignore_file(path) {
                continue;
            }

            if let Some(file) = self.process_file(path) {
                files.push(file);
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    fn should_ignore_file(&self, path: &Path) -> bool {
        for pattern in &self.config.ignore_patterns {
            if let Some(ext) = pattern.strip_prefix("*.") {
                if let Some(filename) = path.file_name() {
                    if filename.to_string_lossy().ends_with(&format!(".{}", ext)) {
                        return true;
                    }
                }
            } else if pattern.contains('/') {
                // Path fragments match as substrings.
                if path.to_string_lossy().contains(pattern.as_str()) {
                    return true;
                }
            } else if path
                .components()
                .any(|c| c.as_os_str().to_string_lossy() == *pattern)
            {
                // Bare names only match whole path components, so a pattern
                // like "target" never swallows "my_target_notes.py".
                return true;
            }
        }

        false
    }

    fn process_file(&self, path: &Path) -> Option<SourceFile> {
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable file");
                return None;
            }
        };

        let size = metadata.len();
        if size > self.config.max_file_size as u64 {
            debug!(path = %path.display(), size, "skipping oversized file");
            return None;
        }

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|s| s.to_lowercase())?;

        if !self.config.file_extensions.contains(&extension) {
            return None;
        }
        let kind = ElementKind::from_extension(&extension).unwrap_or(ElementKind::Other);

        // Binary or non-UTF-8 content contributes nothing, not an error.
        let content = match fs::read(path) {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(content) => content,
                Err(_) => {
                    debug!(path = %path.display(), "skipping non-UTF-8 file");
                    return None;
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable file");
                return None;
            }
        };

        Some(SourceFile {
            path: self.relative_path(path),
            content,
            kind,
            size,
        })
    }

    fn relative_path(&self, path: &Path) -> String {
        let rel = path
            .strip_prefix(&self.config.target_directory)
            .unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }

    pub fn get_stats(&self, files: &[SourceFile]) -> FileStats {
        let mut stats = FileStats::default();

        for file in files {
            stats.total_files += 1;
            stats.total_size += file.size;
            *stats.kinds.entry(format!("{:?}", file.kind)).or_insert(0) += 1;
        }

        stats
    }
}

#[derive(Debug, Default)]
pub struct FileStats {
    pub total_files: usize,
    pub total_size: u64,
    pub kinds: HashMap<String, usize>,
}

impl FileStats {
    pub fn print_summary(&self) {
        println!("File Discovery Summary:");
        println!("  Total files: {}", self.total_files);
        println!(
            "  Total size: {:.2} MB",
            self.total_size as f64 / (1024.0 * 1024.0)
        );
        println!("  Kinds:");

        let mut kinds: Vec<_> = self.kinds.iter().collect();
        kinds.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));

        for (kind, count) in kinds {
            println!("    {}: {} files", kind, count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn discovery_for(dir: &TempDir) -> FileDiscovery {
        let mut config = Config::default();
        config.target_directory = dir.path().to_path_buf();
        FileDiscovery::new(config)
    }

    #[test]
    fn collects_eligible_files_sorted() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.py"), "import os\n").unwrap();
        fs::write(dir.path().join("a.rs"), "fn main() {}\n").unwrap();
        fs::write(dir.path().join("notes.xyz"), "ignored\n").unwrap();

        let files = discovery_for(&dir).collect_sources().unwrap();
        let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["a.rs", "b.py"]);
        assert_eq!(files[0].kind, ElementKind::Rust);
    }

    #[test]
    fn skips_binary_content() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("blob.py"), [0xff, 0xfe, 0x00, 0x01]).unwrap();
        fs::write(dir.path().join("ok.py"), "import sys\n").unwrap();

        let files = discovery_for(&dir).collect_sources().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "ok.py");
    }

    #[test]
    fn respects_ignore_patterns() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("node_modules")).unwrap();
        fs::write(dir.path().join("node_modules/dep.js"), "x\n").unwrap();
        fs::write(dir.path().join("app.js"), "require('./x')\n").unwrap();

        let files = discovery_for(&dir).collect_sources().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "app.js");
    }

    #[test]
    fn bare_pattern_matches_components_not_substrings() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("target")).unwrap();
        fs::write(dir.path().join("target/generated.rs"), "fn g() {}\n").unwrap();
        fs::write(dir.path().join("my_target_notes.py"), "x = 1\n").unwrap();

        let files = discovery_for(&dir).collect_sources().unwrap();
        let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["my_target_notes.py"]);
    }

    #[test]
    fn empty_directory_yields_empty_snapshot() {
        let dir = TempDir::new().unwrap();
        let files = discovery_for(&dir).collect_sources().unwrap();
        assert!(files.is_empty());
    }
}
