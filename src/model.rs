use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One file of the input snapshot, as handed to the engine by the scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
    pub kind: ElementKind,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Java,
    Go,
    Cpp,
    C,
    Header,
    Config,
    Documentation,
    Other,
}

impl ElementKind {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "rs" => Some(Self::Rust),
            "py" => Some(Self::Python),
            "js" | "jsx" | "mjs" => Some(Self::JavaScript),
            "ts" | "tsx" => Some(Self::TypeScript),
            "java" => Some(Self::Java),
            "go" => Some(Self::Go),
            "cpp" | "cc" | "cxx" => Some(Self::Cpp),
            "c" => Some(Self::C),
            "h" | "hpp" => Some(Self::Header),
            "toml" | "json" | "yaml" | "yml" => Some(Self::Config),
            "md" | "txt" => Some(Self::Documentation),
            _ => None,
        }
    }

    /// How safe this kind of file is to change, all else being equal.
    pub fn stability_weight(self) -> f64 {
        match self {
            Self::Config => 1.0,
            Self::Documentation => 0.9,
            Self::Rust | Self::Go => 0.8,
            Self::TypeScript => 0.7,
            Self::JavaScript | Self::Python => 0.6,
            Self::Java | Self::Cpp => 0.5,
            Self::C => 0.4,
            Self::Header => 0.3,
            Self::Other => 0.5,
        }
    }

    pub fn is_source(self) -> bool {
        !matches!(self, Self::Config | Self::Documentation | Self::Other)
    }
}

/// Spherical coordinates of an element on the model sphere.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SphericalPosition {
    pub r: f64,
    pub theta: f64,
    pub phi: f64,
}

impl SphericalPosition {
    pub fn as_vector(&self) -> [f64; 3] {
        [self.r, self.theta, self.phi]
    }

    pub fn distance(&self, other: &SphericalPosition) -> f64 {
        let a = self.as_vector();
        let b = other.as_vector();
        ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)).sqrt()
    }
}

/// One source unit in the structural model.
///
/// Dependencies and dependents are filled in by the graph builder; the
/// position is written exactly once by the embedding step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeElement {
    pub path: String,
    pub kind: ElementKind,
    pub size: u64,
    pub complexity: f64,
    pub stability: f64,
    pub dependencies: BTreeSet<String>,
    pub dependents: BTreeSet<String>,
    pub position: Option<SphericalPosition>,
}

impl CodeElement {
    pub fn from_source(file: &SourceFile) -> Self {
        Self {
            path: file.path.clone(),
            kind: file.kind,
            size: file.size,
            complexity: score_complexity(&file.content),
            stability: 0.0,
            dependencies: BTreeSet::new(),
            dependents: BTreeSet::new(),
            position: None,
        }
    }

    /// Stability from dependency fan-out, fan-in and file-kind weighting.
    /// Must run after the graph builder has populated both edge sets.
    pub fn score_stability(&mut self) {
        let dependency_factor = 1.0 / (1.0 + self.dependencies.len() as f64);
        let usage_factor = (self.dependents.len() as f64 * 0.1).min(1.0);
        let kind_factor = self.kind.stability_weight();

        let stability = dependency_factor * 0.4 + usage_factor * 0.4 + kind_factor * 0.2;
        self.stability = stability.min(1.0);
    }
}

/// Weighted complexity score for a file's content, capped at 100.
pub fn score_complexity(content: &str) -> f64 {
    let lines = content.lines().count() as f64;
    let functions = (content.matches("def ").count()
        + content.matches("fn ").count()
        + content.matches("func ").count()
        + content.matches("function ").count()) as f64;
    let classes = (content.matches("class ").count() + content.matches("struct ").count()) as f64;
    let imports = (content.matches("import ").count()
        + content.matches("from ").count()
        + content.matches("use ").count()) as f64;

    let complexity =
        lines * 0.1 + functions * 0.3 + classes * 0.5 + imports * 0.1 + content.len() as f64 * 0.001;

    complexity.min(100.0)
}

/// Validator output attached to a finalized cluster.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoundaryConditions {
    pub binomial_test: f64,
    pub good_elements_ratio: f64,
    pub passes: bool,
}

/// A cluster of elements on the model sphere.
///
/// Created once after clustering; the only later mutation is the validator
/// attaching `boundary_conditions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiniteElement {
    pub id: usize,
    pub center: [f64; 3],
    pub radius: f64,
    pub members: Vec<String>,
    pub stress: f64,
    pub strain: f64,
    pub boundary_conditions: BoundaryConditions,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(path: &str, kind: ElementKind, content: &str) -> SourceFile {
        SourceFile {
            path: path.to_string(),
            content: content.to_string(),
            kind,
            size: content.len() as u64,
        }
    }

    #[test]
    fn complexity_is_capped() {
        let body = "def f():\n    pass\n".repeat(5000);
        assert_eq!(score_complexity(&body), 100.0);
    }

    #[test]
    fn complexity_of_empty_content_is_zero() {
        assert_eq!(score_complexity(""), 0.0);
    }

    #[test]
    fn stability_stays_in_unit_interval() {
        let file = source("a.py", ElementKind::Python, "import os\n");
        let mut element = CodeElement::from_source(&file);
        for i in 0..50 {
            element.dependents.insert(format!("user_{i}.py"));
        }
        element.score_stability();
        assert!(element.stability > 0.0 && element.stability <= 1.0);
    }

    #[test]
    fn isolated_config_file_is_highly_stable() {
        let file = source("settings.toml", ElementKind::Config, "[a]\nb = 1\n");
        let mut element = CodeElement::from_source(&file);
        element.score_stability();
        // No fan-out (factor 1.0), no fan-in, kind weight 1.0.
        assert!((element.stability - 0.6).abs() < 1e-9);
    }

    #[test]
    fn element_kind_keys_a_hash_map() {
        // The extractor's per-language pattern table is keyed by kind.
        let mut table = std::collections::HashMap::new();
        table.insert(ElementKind::Python, 2);
        table.insert(ElementKind::Rust, 3);
        assert_eq!(table.get(&ElementKind::Python), Some(&2));
    }

    #[test]
    fn spherical_distance_is_euclidean_over_coordinates() {
        let a = SphericalPosition { r: 1.0, theta: 0.0, phi: 0.0 };
        let b = SphericalPosition { r: 1.0, theta: 3.0, phi: 4.0 };
        assert!((a.distance(&b) - 5.0).abs() < 1e-12);
    }
}
