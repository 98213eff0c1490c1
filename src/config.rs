use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::{env, path::PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub target_directory: PathBuf,
    pub ignore_patterns: Vec<String>,
    pub file_extensions: Vec<String>,
    pub max_file_size: usize,
    pub engine: EngineConfig,
}

/// Knobs for the structural-health engine itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub sphere_radius: f64,
    pub max_clusters: usize,
    pub markov_order: usize,
    pub binomial_p0: f64,
    pub stability_threshold: f64,
    pub adr_max_subdirs: usize,
    pub clustering_seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_directory: PathBuf::from("."),
            ignore_patterns: vec![
                "node_modules".to_string(),
                ".git".to_string(),
                "target".to_string(),
                "build".to_string(),
                "dist".to_string(),
                "*.log".to_string(),
                "*.min.js".to_string(),
                "*.map".to_string(),
            ],
            file_extensions: vec![
                "rs".to_string(),
                "py".to_string(),
                "js".to_string(),
                "jsx".to_string(),
                "ts".to_string(),
                "tsx".to_string(),
                "java".to_string(),
                "go".to_string(),
                "cpp".to_string(),
                "c".to_string(),
                "h".to_string(),
                "toml".to_string(),
                "json".to_string(),
                "yaml".to_string(),
                "yml".to_string(),
                "md".to_string(),
            ],
            max_file_size: 1024 * 1024, // 1MB
            engine: EngineConfig::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sphere_radius: 1.0,
            max_clusters: 10,
            markov_order: 5,
            binomial_p0: 0.05,
            stability_threshold: 0.7,
            adr_max_subdirs: 20,
            clustering_seed: 42,
        }
    }
}

impl Config {
    /// Get the default config file path (~/.codesphere.toml)
    pub fn default_config_path() -> crate::Result<PathBuf> {
        let home_dir = env::var("HOME")
            .or_else(|_| env::var("USERPROFILE"))
            .map_err(|_| anyhow::anyhow!("Could not determine home directory"))?;
        Ok(PathBuf::from(home_dir).join(".codesphere.toml"))
    }

    /// Load config from file, falling back to defaults if file doesn't exist
    pub fn load() -> crate::Result<Self> {
        let config_path = Self::default_config_path()?;

        let config = if config_path.exists() {
            println!("📝 Loading configuration from: {}", config_path.display());
            Self::from_file(&config_path)?
        } else {
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Load config from a specific file path
    pub fn from_file(path: &PathBuf) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to a file
    pub fn to_file(&self, path: &PathBuf) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> crate::Result<()> {
        let engine = &self.engine;
        if engine.sphere_radius <= 0.0 {
            bail!("sphere_radius must be positive, got {}", engine.sphere_radius);
        }
        if engine.max_clusters == 0 {
            bail!("max_clusters must be at least 1");
        }
        if engine.markov_order == 0 {
            bail!("markov_order must be at least 1");
        }
        // Design target: the null success rate stays a low base rate.
        if engine.binomial_p0 <= 0.0 || engine.binomial_p0 >= 0.10 {
            bail!("binomial_p0 must be in (0, 0.10), got {}", engine.binomial_p0);
        }
        if !(0.0..=1.0).contains(&engine.stability_threshold) {
            bail!(
                "stability_threshold must be in [0, 1], got {}",
                engine.stability_threshold
            );
        }
        Ok(())
    }

    /// Create a config file with all available options documented
    pub fn create_documented_config() -> String {
        r#"# Codesphere Configuration File
# This file configures how codesphere analyzes your codebase

# Target directory to analyze (defaults to current directory)
target_directory = "."

# Patterns to ignore during file discovery
ignore_patterns = [
    "node_modules",
    ".git",
    "target",
    "build",
    "dist",
    "*.log",
    "*.min.js",
    "*.map"
]

# File extensions to include in analysis
file_extensions = [
    "rs", "py", "js", "jsx", "ts", "tsx", "java", "go",
    "cpp", "c", "h", "toml", "json", "yaml", "yml", "md"
]

# Maximum file size to analyze (in bytes, default 1MB)
max_file_size = 1048576

[engine]
# Radius of the model sphere; element radius is scaled by stability
sphere_radius = 1.0

# Upper bound on the number of structural clusters
max_clusters = 10

# Order of the dependency-chain Markov model
markov_order = 5

# Null success probability for the binomial cluster test (must be < 0.10)
binomial_p0 = 0.05

# Stability above which an element counts as "good" in the binomial test
stability_threshold = 0.7

# Directories with more immediate subdirectories than this are flagged
adr_max_subdirs = 20

# Seed for the clustering backend; fixed for reproducible output
clustering_seed = 42
"#
        .to_string()
    }
}
