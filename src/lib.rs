pub mod analyzer;
pub mod binomial;
pub mod centrality;
pub mod clustering;
pub mod config;
pub mod extractor;
pub mod file_discovery;
pub mod graph;
pub mod markov;
pub mod mechanics;
pub mod model;
pub mod recommend;
pub mod reporter;

pub use analyzer::{Analyzer, Capabilities, StructuralAnalysis};
pub use config::Config;
pub use extractor::DependencyExtractor;
pub use file_discovery::FileDiscovery;
pub use graph::GraphBuilder;
pub use markov::MarkovModel;
pub use model::{CodeElement, ElementKind, FiniteElement, SourceFile, SphericalPosition};
pub use recommend::{Recommendation, RecommendationEngine, Severity};
pub use reporter::Reporter;

pub type Result<T> = anyhow::Result<T>;
