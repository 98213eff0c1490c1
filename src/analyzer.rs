use crate::binomial::BinomialValidator;
use crate::clustering::{self, ClusterSettings};
use crate::config::Config;
use crate::extractor::DependencyExtractor;
use crate::graph::GraphBuilder;
use crate::markov::MarkovModel;
use crate::model::{CodeElement, FiniteElement, SourceFile};
use crate::recommend::{Recommendation, RecommendationEngine};
use crate::{centrality, Result};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

/// Which optional stages of the pipeline are available to this run. The
/// extraction, graph and embedding stages always run.
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    pub clustering: bool,
    pub markov: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            clustering: true,
            markov: true,
        }
    }
}

/// Everything one run of the engine produced, in the order the stages ran.
#[derive(Debug, Clone)]
pub struct StructuralAnalysis {
    pub elements: BTreeMap<String, CodeElement>,
    pub clusters: Vec<FiniteElement>,
    pub markov: Option<MarkovModel>,
    pub recommendations: Vec<Recommendation>,
    /// Non-fatal degradations (skipped stages, disabled capabilities).
    pub diagnostics: Vec<String>,
    pub node_count: usize,
    pub edge_count: usize,
    pub self_loops: Vec<String>,
}

/// Runs the full structural-health pipeline over a file snapshot:
/// extraction, graph assembly, spherical embedding, clustering, cluster
/// validation, Markov modeling and recommendation ranking.
///
/// A snapshot is analyzed as-is; the analyzer never touches the filesystem.
/// Optional stages degrade to diagnostics instead of failing the run.
pub struct Analyzer {
    config: Config,
    extractor: DependencyExtractor,
    capabilities: Capabilities,
}

impl Analyzer {
    pub fn new(config: Config) -> Result<Self> {
        Self::with_capabilities(config, Capabilities::default())
    }

    pub fn with_capabilities(config: Config, capabilities: Capabilities) -> Result<Self> {
        Ok(Self {
            config,
            extractor: DependencyExtractor::new()?,
            capabilities,
        })
    }

    pub fn analyze(&self, files: &[SourceFile]) -> Result<StructuralAnalysis> {
        let engine = &self.config.engine;
        let mut diagnostics = Vec::new();

        info!(files = files.len(), "starting structural analysis");

        // Extraction is per-file and embarrassingly parallel; everything
        // after it is merged back into deterministic ordered maps.
        let raw_dependencies: BTreeMap<String, BTreeSet<String>> = files
            .par_iter()
            .map(|file| (file.path.clone(), self.extractor.extract(file)))
            .collect::<Vec<_>>()
            .into_iter()
            .collect();

        let mut elements: BTreeMap<String, CodeElement> = files
            .iter()
            .map(|file| (file.path.clone(), CodeElement::from_source(file)))
            .collect();

        let builder = GraphBuilder::build(&mut elements, &raw_dependencies);
        info!(
            nodes = builder.node_count(),
            edges = builder.edge_count(),
            self_loops = builder.self_loops().len(),
            "dependency graph assembled"
        );
        for path in builder.self_loops() {
            diagnostics.push(format!("self-dependency detected: {path}"));
        }

        centrality::embed_elements(&mut elements, &builder, engine.sphere_radius);

        let mut clusters = if self.capabilities.clustering {
            let settings = ClusterSettings {
                max_clusters: engine.max_clusters,
                seed: engine.clustering_seed,
            };
            match clustering::cluster_elements(&elements, settings) {
                Ok(clusters) => clusters,
                Err(e) => {
                    warn!(error = %e, "clustering failed, continuing without clusters");
                    diagnostics.push(format!("clustering skipped: {e}"));
                    Vec::new()
                }
            }
        } else {
            diagnostics.push("clustering capability disabled".to_string());
            Vec::new()
        };

        let validator = BinomialValidator::new(engine.binomial_p0, engine.stability_threshold);
        for cluster in &mut clusters {
            validator.validate(cluster, &elements);
        }
        info!(clusters = clusters.len(), "clusters finalized and validated");

        let markov = if self.capabilities.markov {
            Some(MarkovModel::build(&elements, engine.markov_order))
        } else {
            diagnostics.push("markov capability disabled".to_string());
            None
        };

        let recommender = RecommendationEngine::new(engine.adr_max_subdirs);
        let recommendations = recommender.evaluate(&elements, &clusters, markov.as_ref());
        info!(
            recommendations = recommendations.len(),
            "analysis complete"
        );

        Ok(StructuralAnalysis {
            node_count: builder.node_count(),
            edge_count: builder.edge_count(),
            self_loops: builder.self_loops().to_vec(),
            elements,
            clusters,
            markov,
            recommendations,
            diagnostics,
        })
    }
}
