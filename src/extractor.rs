use crate::model::{ElementKind, SourceFile};
use anyhow::Result;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};

/// Extracts raw dependency identifiers from file content.
///
/// Rules are per-language line patterns. The output is unresolved: module
/// names, quoted import paths and normalized relative references. Matching
/// identifiers against known elements is the graph builder's job.
pub struct DependencyExtractor {
    patterns: HashMap<ElementKind, Vec<Regex>>,
}

impl DependencyExtractor {
    pub fn new() -> Result<Self> {
        let mut patterns: HashMap<ElementKind, Vec<Regex>> = HashMap::new();

        let javascript = vec![
            Regex::new(r#"import\s+.*?\s+from\s+['"]([^'"]+)['"]"#)?,
            Regex::new(r#"export\s+.*?\s+from\s+['"]([^'"]+)['"]"#)?,
            Regex::new(r#"^\s*import\s+['"]([^'"]+)['"]"#)?,
            Regex::new(r#"require\s*\(\s*['"]([^'"]+)['"]"#)?,
        ];
        patterns.insert(ElementKind::TypeScript, javascript.clone());
        patterns.insert(ElementKind::JavaScript, javascript);

        patterns.insert(
            ElementKind::Python,
            vec![
                Regex::new(r"^\s*from\s+([\w\.]+)\s+import")?,
                Regex::new(r"^\s*import\s+([\w\.]+)")?,
            ],
        );

        patterns.insert(
            ElementKind::Rust,
            vec![
                Regex::new(r"^\s*(?:pub\s+)?use\s+(?:crate\s*::\s*)?([A-Za-z_][A-Za-z0-9_]*)\s*::")?,
                Regex::new(r"^\s*extern\s+crate\s+(\w+)")?,
                Regex::new(r"^\s*(?:pub\s+)?mod\s+(\w+)\s*;")?,
            ],
        );

        patterns.insert(
            ElementKind::Go,
            vec![Regex::new(r#"^\s*import\s+(?:\w+\s+)?"([^"]+)""#)?],
        );

        patterns.insert(
            ElementKind::Java,
            vec![Regex::new(r"^\s*import\s+(?:static\s+)?([\w\.]+)\s*;")?],
        );

        let include = vec![Regex::new(r#"^\s*#include\s*["<]([^">]+)[">]"#)?];
        patterns.insert(ElementKind::C, include.clone());
        patterns.insert(ElementKind::Cpp, include.clone());
        patterns.insert(ElementKind::Header, include);

        Ok(Self { patterns })
    }

    /// Scan one file and return its raw dependency identifiers.
    ///
    /// Unknown languages yield an empty set. Unresolvable relative
    /// references are dropped silently.
    pub fn extract(&self, file: &SourceFile) -> BTreeSet<String> {
        let mut identifiers = BTreeSet::new();

        let Some(patterns) = self.patterns.get(&file.kind) else {
            return identifiers;
        };

        let mut in_go_import_block = false;
        for line in file.content.lines() {
            if file.kind == ElementKind::Go {
                let trimmed = line.trim();
                if trimmed.starts_with("import (") || trimmed == "import (" {
                    in_go_import_block = true;
                    continue;
                }
                if in_go_import_block {
                    if trimmed.starts_with(')') {
                        in_go_import_block = false;
                    } else if let Some(raw) = trimmed.split('"').nth(1) {
                        if let Some(id) = normalize(raw, &file.path) {
                            identifiers.insert(id);
                        }
                    }
                    continue;
                }
            }

            for pattern in patterns {
                if let Some(captures) = pattern.captures(line) {
                    if let Some(raw) = captures.get(1) {
                        if let Some(id) = normalize(raw.as_str(), &file.path) {
                            identifiers.insert(id);
                        }
                    }
                }
            }
        }

        identifiers
    }
}

/// Normalize one raw identifier against the importing file's directory.
///
/// Relative references become sibling paths; references that climb above the
/// snapshot root resolve to None and are discarded. Everything else passes
/// through untouched.
fn normalize(raw: &str, source_path: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let mut dir: Vec<&str> = source_path.split('/').collect();
    dir.pop(); // drop the file name

    if raw.starts_with("./") || raw.starts_with("../") {
        return join_relative(&dir, raw.split('/'));
    }

    // Python-style relative imports: one leading dot per level, starting at
    // the importing file's own package.
    if raw.starts_with('.') {
        let dots = raw.chars().take_while(|&c| c == '.').count();
        let rest = &raw[dots..];
        if rest.is_empty() {
            return None;
        }
        for _ in 1..dots {
            if dir.pop().is_none() {
                return None;
            }
        }
        return join_relative(&dir, rest.split('.'));
    }

    Some(raw.to_string())
}

fn join_relative<'a>(base: &[&str], segments: impl Iterator<Item = &'a str>) -> Option<String> {
    let mut parts: Vec<String> = base.iter().map(|s| s.to_string()).collect();
    for segment in segments {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return None;
                }
            }
            other => parts.push(other.to_string()),
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
