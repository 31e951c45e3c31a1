//! Object-counting evaluation CLI

use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use counting_benchmark::{
    analysis::{score_methods, summarize_counts},
    config::{Config, ProviderConfig},
    dataset::{self, DatasetSelector},
    extract::{split_responses, Section},
    providers::{create_provider, default_model_for},
    reporting::{
        print_console_report, print_count_summary, print_stage_report, update_rmse_report,
        JsonSummary,
    },
    runner::{
        load_stage_table, run_stage, ConsoleProgress, Executor, ExecutorConfig, HintVariant, Stage,
        StageContext,
    },
    table::ResultTable,
};

#[derive(Parser)]
#[command(name = "counting-benchmark")]
#[command(about = "Object-counting evaluation of vision LLMs with self-generated hints")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Options shared by every generation stage
#[derive(Args)]
struct StageArgs {
    /// Table to start from when the output does not exist yet (default: label table)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Evaluation table to write (default: from config)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory holding the selected images
    #[arg(long)]
    image_dir: Option<PathBuf>,

    /// Provider name (openai, anthropic)
    #[arg(short, long)]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long)]
    model: Option<String>,

    /// Clear the stage's columns and ask again for every row
    #[arg(long)]
    force: bool,
}

impl StageArgs {
    fn provider_config(&self, base: &ProviderConfig) -> ProviderConfig {
        let mut config = base.clone();
        if let Some(name) = &self.provider {
            if !name.eq_ignore_ascii_case(&base.name) {
                if let Some(model) = default_model_for(name) {
                    config.model = model.to_string();
                }
            }
            config.name = name.clone();
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        config
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Sample images from the source corpus and write the label table
    Select {
        /// Number of images to sample
        #[arg(short = 'n', long)]
        sample_size: Option<usize>,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Remove images that the label table does not list
    Clean {
        /// Image directory (default: from config)
        #[arg(long)]
        image_dir: Option<PathBuf>,
    },

    /// Crop images to a bottom-anchored square and resize them
    Preprocess {
        /// Single image to process instead of a whole directory
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Output path for a single image (default: overwrite)
        #[arg(short, long, requires = "file")]
        output: Option<PathBuf>,

        /// Directory to process in place (default: image directory from config)
        #[arg(long, conflicts_with = "file")]
        dir: Option<PathBuf>,

        /// Edge length after resizing
        #[arg(long, default_value_t = dataset::TARGET_SIZE)]
        size: u32,
    },

    /// Ask for a plain count of every image
    Count {
        #[command(flatten)]
        stage: StageArgs,
    },

    /// Ask for a description, direct hint and indirect hint of every image
    Hints {
        #[command(flatten)]
        stage: StageArgs,
    },

    /// Split hint responses into description / direct_hint / indirect_hint columns
    Split {
        /// Evaluation table (default: from config)
        #[arg(short, long)]
        table: Option<PathBuf>,
    },

    /// Ask for counts again with hint combinations (default: the four reported ones)
    CountWithHints {
        #[command(flatten)]
        stage: StageArgs,

        /// Include the description
        #[arg(long)]
        description: bool,

        /// Include the direct hint
        #[arg(long)]
        direct: bool,

        /// Include the indirect hint
        #[arg(long)]
        indirect: bool,
    },

    /// Compute bucketed RMSE and update the RMSE report
    Rmse {
        /// Evaluation table with model columns
        #[arg(short, long)]
        evaluation: Option<PathBuf>,

        /// Human evaluation table with a `human` column
        #[arg(long)]
        human: Option<PathBuf>,

        /// RMSE report to update
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Summarize true counts of the label table
    Summary {
        /// Label table (default: from config)
        #[arg(short, long)]
        labels: Option<PathBuf>,

        /// Number of classes to list
        #[arg(long, default_value = "10")]
        top: usize,
    },

    /// Generate sample configuration
    InitConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "config/harness.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("counting_benchmark=debug,info")
    } else {
        EnvFilter::new("counting_benchmark=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load_or_default()?,
    };

    match cli.command {
        Commands::Select { sample_size, seed } => {
            select(&config, sample_size, seed)?;
        }

        Commands::Clean { image_dir } => {
            let image_dir = image_dir.unwrap_or_else(|| config.paths.image_dir.clone());
            let removed = dataset::clean(&image_dir, &config.paths.labels_csv)?;
            println!("Removed {} files from {}", removed.len(), image_dir.display());
        }

        Commands::Preprocess {
            file,
            output,
            dir,
            size,
        } => {
            preprocess(&config, file, output, dir, size)?;
        }

        Commands::Count { stage } => {
            run_stages(&config, &stage, vec![Stage::InitialCount]).await?;
        }

        Commands::Hints { stage } => {
            run_stages(&config, &stage, vec![Stage::GenerateHints]).await?;
        }

        Commands::Split { table } => {
            split(table.unwrap_or_else(|| config.paths.evaluation_csv.clone()))?;
        }

        Commands::CountWithHints {
            stage,
            description,
            direct,
            indirect,
        } => {
            let variants = if description || direct || indirect {
                vec![HintVariant::new(description, direct, indirect)]
            } else {
                HintVariant::paper().to_vec()
            };
            let stages = variants.into_iter().map(Stage::CountWithHints).collect();
            run_stages(&config, &stage, stages).await?;
        }

        Commands::Rmse {
            evaluation,
            human,
            output,
        } => {
            rmse(
                evaluation.unwrap_or_else(|| config.paths.evaluation_csv.clone()),
                human.unwrap_or_else(|| config.paths.human_csv.clone()),
                output.unwrap_or_else(|| config.paths.rmse_csv.clone()),
            )?;
        }

        Commands::Summary { labels, top } => {
            let labels = labels.unwrap_or_else(|| config.paths.labels_csv.clone());
            let summary = summarize_counts(&ResultTable::read(&labels)?)?;
            print_count_summary(&summary, top);
        }

        Commands::InitConfig { output } => {
            init_config(output)?;
        }
    }

    Ok(())
}

fn select(
    config: &Config,
    sample_size: Option<usize>,
    seed: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut selector = DatasetSelector::from_config(config);
    if let Some(n) = sample_size {
        selector.sample_size = n;
    }
    if let Some(seed) = seed {
        selector.seed = seed;
    }

    println!("=== Dataset Selection ===");
    println!("Source: {}", selector.source_dir.display());
    println!("Sample: {} images, seed {}", selector.sample_size, selector.seed);

    let labeled = selector.select()?;
    let annotated = labeled.iter().filter(|l| l.object_count > 0).count();
    println!(
        "Copied {} images to {} ({} with annotations)",
        labeled.len(),
        selector.destination_dir.display(),
        annotated
    );
    println!("Labels written to: {}", selector.labels_csv.display());
    Ok(())
}

fn preprocess(
    config: &Config,
    file: Option<PathBuf>,
    output: Option<PathBuf>,
    dir: Option<PathBuf>,
    size: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    match file {
        Some(file) => {
            let cropped = dataset::crop_to_square(&file, output.as_deref())?;
            let resized = dataset::resize_image(&cropped, None, size)?;
            println!("Preprocessed image written to: {}", resized.display());
        }
        None => {
            let dir = dir.unwrap_or_else(|| config.paths.image_dir.clone());
            let n = dataset::preprocess_dir(&dir, size)?;
            println!("Preprocessed {} images in {}", n, dir.display());
        }
    }
    Ok(())
}

async fn run_stages(
    config: &Config,
    args: &StageArgs,
    stages: Vec<Stage>,
) -> Result<(), Box<dyn std::error::Error>> {
    let started_at = Utc::now();
    let run_id = started_at.format("%Y%m%d-%H%M%S").to_string();

    let provider_config = args.provider_config(&config.provider);
    let provider = create_provider(&provider_config)?;
    let executor = Executor::new(provider, ExecutorConfig::from(&config.run));

    let input = args.input.clone().unwrap_or_else(|| config.paths.labels_csv.clone());
    let output = args.output.clone().unwrap_or_else(|| config.paths.evaluation_csv.clone());
    let ctx = StageContext {
        image_dir: args.image_dir.clone().unwrap_or_else(|| config.paths.image_dir.clone()),
        output,
        force: args.force,
    };

    println!("=== Counting Evaluation ===");
    println!("Run ID:   {}", run_id);
    println!("Provider: {} ({})", executor.provider_name(), executor.model());
    println!("Images:   {}", ctx.image_dir.display());
    println!("Output:   {}", ctx.output.display());

    let mut table = load_stage_table(&input, &ctx.output)?;
    let mut reports = Vec::new();
    for stage in stages {
        println!("\n--- {} ---", stage);
        let report = run_stage(&executor, stage, &mut table, &ctx, &ConsoleProgress).await?;
        reports.push(report);
    }

    let elapsed = Utc::now() - started_at;
    println!("\nCompleted in {}s", elapsed.num_seconds());
    for report in &reports {
        print_stage_report(report);
    }
    Ok(())
}

fn split(path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let mut table = ResultTable::read(&path)?;
    let report = split_responses(&mut table)?;
    table.write(&path)?;

    println!("Split {} responses in {}", report.rows, path.display());
    for section in Section::all() {
        println!("  Number of missing values in {}: {}", section, report.missing(section));
    }
    Ok(())
}

fn rmse(evaluation: PathBuf, human: PathBuf, output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let evaluation_table = ResultTable::read(&evaluation)?;
    let human_table = if human.exists() {
        Some(ResultTable::read(&human)?)
    } else {
        tracing::warn!("Human evaluation {} not found, skipping Human row", human.display());
        None
    };

    let results = score_methods(human_table.as_ref(), &evaluation_table)?;
    update_rmse_report(&output, &results)?;
    print_console_report(&results);

    let run_id = Utc::now().format("%Y%m%d-%H%M%S").to_string();
    let summary_path = JsonSummary::default_path(&output);
    JsonSummary::new(&run_id, display(&evaluation), display(&output), &results)
        .write_to_file(&summary_path)?;

    println!("RMSE report written to: {}", output.display());
    println!("JSON summary written to: {}", summary_path.display());
    Ok(())
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

fn init_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();

    // Ensure parent directory exists
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }

    config.save_toml(&output)?;
    println!("Configuration written to: {}", output.display());
    Ok(())
}
