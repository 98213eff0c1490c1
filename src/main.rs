use clap::{Parser, Subcommand};
use codesphere::{Analyzer, Capabilities, Config, FileDiscovery, Reporter};
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "codesphere")]
#[command(about = "Structural health analysis for codebases: dependency graphs, spherical embedding and finite-element clustering")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a project directory
    Analyze {
        /// Target directory to analyze
        #[arg(short, long, default_value = ".")]
        path: PathBuf,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output directory for the JSON report
        #[arg(short, long, default_value = "./analysis-output")]
        output: PathBuf,

        /// Skip the clustering stage
        #[arg(long)]
        no_clustering: bool,

        /// Skip the Markov modeling stage
        #[arg(long)]
        no_markov: bool,
    },
    /// Generate a default configuration file
    Config {
        /// Output path for the config file (defaults to ~/.codesphere.toml)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            path,
            config,
            output,
            no_clustering,
            no_markov,
        } => {
            let capabilities = Capabilities {
                clustering: !no_clustering,
                markov: !no_markov,
            };
            analyze_project(path, config, output, capabilities)?;
        }
        Commands::Config { output } => {
            generate_config(output)?;
        }
    }

    Ok(())
}

fn analyze_project(
    target_path: PathBuf,
    config_path: Option<PathBuf>,
    output_path: PathBuf,
    capabilities: Capabilities,
) -> anyhow::Result<()> {
    println!("🚀 Starting Codesphere Analysis");
    println!("===============================");

    let start_time = Instant::now();

    let mut config = if let Some(config_path) = config_path {
        Config::from_file(&config_path)?
    } else {
        Config::load()?
    };
    config.target_directory = target_path.clone();

    println!("🎯 Target directory: {}", target_path.display());
    println!("📤 Output directory: {}", output_path.display());

    let project_name = target_path
        .canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "unknown".to_string());

    let discovery = FileDiscovery::new(config.clone());
    let files = discovery.collect_sources()?;
    discovery.get_stats(&files).print_summary();

    let analyzer = Analyzer::with_capabilities(config, capabilities)?;
    let analysis = analyzer.analyze(&files)?;

    let duration = start_time.elapsed();

    println!("\n📊 Generating report...");
    let reporter = Reporter::new();
    let report = reporter.generate_report(&analysis, &project_name, duration.as_millis());
    reporter.print_summary(&report);
    let exported = reporter.export_report(&report, &output_path)?;

    println!("\n✅ Analysis completed in {:.2}s", duration.as_secs_f64());
    println!("📁 Report exported to: {}", exported.display());

    Ok(())
}

fn generate_config(output_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config_path = output_path.unwrap_or_else(|| {
        Config::default_config_path().unwrap_or_else(|_| PathBuf::from("codesphere.toml"))
    });

    println!("📝 Generating configuration file: {}", config_path.display());

    let documented_config = Config::create_documented_config();
    std::fs::write(&config_path, documented_config)?;

    println!("✅ Configuration file created successfully!");
    println!("💡 Edit the file to customize your analysis settings.");

    Ok(())
}
