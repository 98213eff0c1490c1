use crate::analyzer::StructuralAnalysis;
use crate::model::{BoundaryConditions, ElementKind};
use crate::recommend::{Recommendation, Severity};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::{fs, path::PathBuf};

#[derive(Debug, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    /// "ok" or "no_elements_found".
    pub status: String,
    pub elements: Vec<ElementEntry>,
    pub clusters: Vec<ClusterEntry>,
    pub markov: Option<MarkovSection>,
    pub recommendations: Vec<Recommendation>,
    pub summary: Summary,
    pub diagnostics: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub generated_at: String,
    pub project_name: String,
    pub total_elements: usize,
    pub total_size: u64,
    pub analysis_duration_ms: u128,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ElementEntry {
    pub path: String,
    pub kind: ElementKind,
    pub size: u64,
    pub complexity: f64,
    pub stability: f64,
    pub dependencies: Vec<String>,
    pub dependents: Vec<String>,
    pub position: Option<[f64; 3]>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClusterEntry {
    pub id: usize,
    pub center: [f64; 3],
    pub radius: f64,
    pub members: Vec<String>,
    pub stress: f64,
    pub strain: f64,
    pub boundary_conditions: BoundaryConditions,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MarkovSection {
    pub order: usize,
    pub state_count: usize,
    pub contributing_elements: usize,
    pub coverage: f64,
    /// State keys are the "|"-joined successor windows.
    pub transitions: BTreeMap<String, BTreeMap<String, f64>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Summary {
    pub node_count: usize,
    pub edge_count: usize,
    pub self_loop_count: usize,
    pub cluster_count: usize,
    pub stress: MetricSummary,
    pub strain: MetricSummary,
    /// Share of clusters whose binomial test passed.
    pub binomial_pass_rate: f64,
    pub recommendation_counts: BTreeMap<String, usize>,
}

/// Five-number summary of a per-cluster metric. All zero when there are no
/// clusters.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MetricSummary {
    pub mean: f64,
    pub median: f64,
    pub stdev: f64,
    pub min: f64,
    pub max: f64,
}

impl MetricSummary {
    fn of(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let median = if sorted.len() % 2 == 1 {
            sorted[sorted.len() / 2]
        } else {
            (sorted[sorted.len() / 2 - 1] + sorted[sorted.len() / 2]) / 2.0
        };

        Self {
            mean,
            median,
            stdev: variance.sqrt(),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
        }
    }
}

pub struct Reporter;

impl Reporter {
    pub fn new() -> Self {
        Self
    }

    pub fn generate_report(
        &self,
        analysis: &StructuralAnalysis,
        project_name: &str,
        duration_ms: u128,
    ) -> Report {
        let status = if analysis.elements.is_empty() {
            "no_elements_found"
        } else {
            "ok"
        };

        let total_size = analysis.elements.values().map(|e| e.size).sum();
        let metadata = ReportMetadata {
            generated_at: chrono::Utc::now().to_rfc3339(),
            project_name: project_name.to_string(),
            total_elements: analysis.elements.len(),
            total_size,
            analysis_duration_ms: duration_ms,
            version: env!("CARGO_PKG_VERSION").to_string(),
        };

        let elements = analysis
            .elements
            .values()
            .map(|e| ElementEntry {
                path: e.path.clone(),
                kind: e.kind,
                size: e.size,
                complexity: e.complexity,
                stability: e.stability,
                dependencies: e.dependencies.iter().cloned().collect(),
                dependents: e.dependents.iter().cloned().collect(),
                position: e.position.map(|p| p.as_vector()),
            })
            .collect();

        let clusters = analysis
            .clusters
            .iter()
            .map(|c| ClusterEntry {
                id: c.id,
                center: c.center,
                radius: c.radius,
                members: c.members.clone(),
                stress: c.stress,
                strain: c.strain,
                boundary_conditions: c.boundary_conditions.clone(),
            })
            .collect();

        let markov = analysis.markov.as_ref().map(|model| MarkovSection {
            order: model.order(),
            state_count: model.state_count(),
            contributing_elements: model.contributing_elements(),
            coverage: model.coverage(analysis.elements.len()),
            transitions: model
                .transitions()
                .iter()
                .map(|(state, distribution)| (state.join("|"), distribution.clone()))
                .collect(),
        });

        Report {
            metadata,
            status: status.to_string(),
            elements,
            clusters,
            markov,
            summary: self.summarize(analysis),
            recommendations: analysis.recommendations.clone(),
            diagnostics: analysis.diagnostics.clone(),
        }
    }

    fn summarize(&self, analysis: &StructuralAnalysis) -> Summary {
        let stresses: Vec<f64> = analysis.clusters.iter().map(|c| c.stress).collect();
        let strains: Vec<f64> = analysis.clusters.iter().map(|c| c.strain).collect();

        let passing = analysis
            .clusters
            .iter()
            .filter(|c| c.boundary_conditions.passes)
            .count();
        let binomial_pass_rate = if analysis.clusters.is_empty() {
            0.0
        } else {
            passing as f64 / analysis.clusters.len() as f64
        };

        let mut recommendation_counts = BTreeMap::new();
        for recommendation in &analysis.recommendations {
            let key = match recommendation.severity {
                Severity::Critical => "critical",
                Severity::High => "high",
                Severity::Medium => "medium",
                Severity::Low => "low",
            };
            *recommendation_counts.entry(key.to_string()).or_insert(0) += 1;
        }

        Summary {
            node_count: analysis.node_count,
            edge_count: analysis.edge_count,
            self_loop_count: analysis.self_loops.len(),
            cluster_count: analysis.clusters.len(),
            stress: MetricSummary::of(&stresses),
            strain: MetricSummary::of(&strains),
            binomial_pass_rate,
            recommendation_counts,
        }
    }

    pub fn export_report(&self, report: &Report, output_dir: &PathBuf) -> Result<PathBuf> {
        fs::create_dir_all(output_dir)?;

        let json_path = output_dir.join("structural_report.json");
        let json_content = serde_json::to_string_pretty(report)?;
        fs::write(&json_path, json_content)?;

        Ok(json_path)
    }

    pub fn print_summary(&self, report: &Report) {
        println!("\n📊 Structural Health Summary");
        println!("═══════════════════════════");
        println!("📦 Project: {}", report.metadata.project_name);
        println!(
            "📁 Elements: {} ({:.2} MB)",
            report.metadata.total_elements,
            report.metadata.total_size as f64 / (1024.0 * 1024.0)
        );
        println!(
            "🔗 Graph: {} nodes, {} edges, {} self-loops",
            report.summary.node_count, report.summary.edge_count, report.summary.self_loop_count
        );
        println!(
            "🌐 Clusters: {} (mean stress {:.3}, mean strain {:.3})",
            report.summary.cluster_count, report.summary.stress.mean, report.summary.strain.mean
        );
        println!(
            "🧪 Binomial pass rate: {:.1}%",
            report.summary.binomial_pass_rate * 100.0
        );
        if let Some(markov) = &report.markov {
            println!(
                "🔮 Markov model: order {}, {} states, {:.1}% coverage",
                markov.order,
                markov.state_count,
                markov.coverage * 100.0
            );
        }

        println!("\n💡 Top recommendations:");
        for recommendation in report.recommendations.iter().take(5) {
            println!(
                "  [{:?}] {}",
                recommendation.severity, recommendation.description
            );
        }
        if report.recommendations.len() > 5 {
            println!("  … and {} more", report.recommendations.len() - 5);
        }

        for diagnostic in &report.diagnostics {
            println!("⚠️  {diagnostic}");
        }
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}
