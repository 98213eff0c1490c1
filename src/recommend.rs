use crate::markov::MarkovModel;
use crate::model::{CodeElement, FiniteElement};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    fn rank(self) -> u8 {
        match self {
            Self::Critical => 0,
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 3,
        }
    }
}

/// Closed taxonomy of findings. Adding a category is a type change, not a
/// new dictionary key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Category {
    HighStressCluster,
    ExcessiveSubdirectories { subdirectory_count: usize },
    LooseRootFile,
    LowStability { stability: f64 },
    MarkovCoverageGap { coverage: f64 },
    NoElementsFound,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub severity: Severity,
    pub category: Category,
    /// Element or cluster id this finding points at.
    pub evidence: String,
    pub description: String,
    pub suggested_action: String,
    /// Triggering stress/instability magnitude; used for ordering only.
    pub score: f64,
}

/// Deterministic, ordered rule evaluation over finalized elements and
/// clusters. Output order is total: severity rank, then score descending,
/// then evidence id.
pub struct RecommendationEngine {
    adr_max_subdirs: usize,
}

impl RecommendationEngine {
    pub fn new(adr_max_subdirs: usize) -> Self {
        Self { adr_max_subdirs }
    }

    pub fn evaluate(
        &self,
        elements: &BTreeMap<String, CodeElement>,
        clusters: &[FiniteElement],
        markov: Option<&MarkovModel>,
    ) -> Vec<Recommendation> {
        if elements.is_empty() {
            return vec![Recommendation {
                severity: Severity::Low,
                category: Category::NoElementsFound,
                evidence: String::new(),
                description: "No eligible source elements were discovered in the snapshot"
                    .to_string(),
                suggested_action: "Check the target directory, ignore patterns and extension filters"
                    .to_string(),
                score: 0.0,
            }];
        }

        let mut recommendations = Vec::new();

        // Rule 1: critical structural hotspots.
        for cluster in clusters {
            if cluster.stress > 0.8 {
                recommendations.push(Recommendation {
                    severity: Severity::Critical,
                    category: Category::HighStressCluster,
                    evidence: format!("cluster:{}", cluster.id),
                    description: format!(
                        "Cluster of {} elements under high structural stress ({:.3})",
                        cluster.members.len(),
                        cluster.stress
                    ),
                    suggested_action:
                        "Refactor this code cluster: high complexity and coupling".to_string(),
                    score: cluster.stress,
                });
            }
        }

        // Rule 2: architecture violations derived from the tree shape.
        for (directory, subdirectories) in directory_children(elements) {
            if subdirectories.len() > self.adr_max_subdirs {
                let label = if directory.is_empty() { "<root>" } else { &directory };
                recommendations.push(Recommendation {
                    severity: Severity::High,
                    category: Category::ExcessiveSubdirectories {
                        subdirectory_count: subdirectories.len(),
                    },
                    evidence: directory.clone(),
                    description: format!(
                        "Directory {} has {} immediate subdirectories",
                        label,
                        subdirectories.len()
                    ),
                    suggested_action: "Consider flattening or grouping directories".to_string(),
                    score: subdirectories.len() as f64,
                });
            }
        }
        for (path, element) in elements {
            if !path.contains('/') && element.kind.is_source() {
                recommendations.push(Recommendation {
                    severity: Severity::High,
                    category: Category::LooseRootFile,
                    evidence: path.clone(),
                    description: format!("Source file {path} sits loose at the tree root"),
                    suggested_action: "Move it under a module directory".to_string(),
                    score: 1.0,
                });
            }
        }

        // Rule 3: unstable elements.
        for (path, element) in elements {
            if element.stability < 0.3 {
                recommendations.push(Recommendation {
                    severity: Severity::Medium,
                    category: Category::LowStability {
                        stability: element.stability,
                    },
                    evidence: path.clone(),
                    description: format!(
                        "Element {path} has low stability ({:.3})",
                        element.stability
                    ),
                    suggested_action:
                        "Consider refactoring or isolating this unstable component".to_string(),
                    score: 1.0 - element.stability,
                });
            }
        }

        // Rule 4: model coverage. Skipped entirely when no model was built.
        if let Some(markov) = markov {
            let coverage = markov.coverage(elements.len());
            if coverage < 0.1 {
                recommendations.push(Recommendation {
                    severity: Severity::Low,
                    category: Category::MarkovCoverageGap { coverage },
                    evidence: String::new(),
                    description: format!(
                        "Markov model built from {:.1}% of elements ({} of {})",
                        coverage * 100.0,
                        markov.contributing_elements(),
                        elements.len()
                    ),
                    suggested_action: "Improve dependency analysis coverage".to_string(),
                    score: 1.0 - coverage,
                });
            }
        }

        recommendations.sort_by(|a, b| {
            a.severity
                .rank()
                .cmp(&b.severity.rank())
                .then(b.score.total_cmp(&a.score))
                .then(a.evidence.cmp(&b.evidence))
        });

        recommendations
    }
}

/// Immediate subdirectory names per directory, reconstructed from element
/// paths. The empty string key is the tree root.
fn directory_children(
    elements: &BTreeMap<String, CodeElement>,
) -> BTreeMap<String, BTreeSet<String>> {
    let mut children: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for path in elements.keys() {
        let parts: Vec<&str> = path.split('/').collect();
        // Last component is the file itself.
        for depth in 0..parts.len().saturating_sub(1) {
            let parent = parts[..depth].join("/");
            children
                .entry(parent)
                .or_default()
                .insert(parts[depth].to_string());
        }
    }
    children
}
