use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};

use quakelens::aggregate::TimeUnit;
use quakelens::config::PipelineConfig;
use quakelens::data::quality::FillStrategy;
use quakelens::regression::{ForestParams, ModelKind};
use quakelens::session::{Request, Session};

mod render;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// Event dataset (.csv, .tsv, .txt, .parquet or .json)
    data: PathBuf,
    /// Pipeline configuration (JSON); missing fields keep their defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Null handling applied before every analysis
    #[arg(long, global = true)]
    fill: Option<FillStrategy>,
    /// Keep only rows where COLUMN equals VALUE (repeatable)
    #[arg(long = "where", value_name = "COLUMN=VALUE", global = true)]
    filters: Vec<String>,
    /// Print JSON instead of text tables
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Row count, schema, missing values and fill report
    Overview,
    /// Descriptive statistics per numeric column
    Summary,
    /// Pearson correlation matrix
    Correlation,
    /// Rows outside the Tukey fences of a column
    Outliers {
        #[arg(long)]
        column: Option<String>,
        /// IQR multiplier
        #[arg(long)]
        k: Option<f64>,
    },
    /// Equal-width histogram of a numeric column
    Histogram {
        #[arg(long)]
        column: Option<String>,
        #[arg(long)]
        bins: Option<usize>,
    },
    /// Paired values of two numeric columns, e.g. magnitude against casualties
    Scatter {
        /// Defaults to the magnitude column
        #[arg(long)]
        x: Option<String>,
        #[arg(long)]
        y: String,
    },
    /// Event counts per calendar bucket
    Timeline {
        #[arg(long, default_value = "year")]
        unit: TimeUnit,
        /// Rolling average window, in buckets
        #[arg(long)]
        window: Option<usize>,
    },
    /// Event counts per category value
    Categories {
        #[arg(long)]
        column: Option<String>,
        #[arg(long)]
        top: Option<usize>,
    },
    /// DBSCAN over standardized coordinates
    Clusters {
        #[arg(long)]
        eps: Option<f64>,
        #[arg(long)]
        min_samples: Option<usize>,
    },
    /// Map markers with colour and radius
    Map {
        #[arg(long)]
        min_magnitude: Option<f64>,
        /// Colour markers by spatial cluster instead of magnitude
        #[arg(long)]
        by_cluster: bool,
    },
    /// Fit a magnitude regression and score it on a held-out split
    Regress {
        #[arg(long, value_delimiter = ',')]
        features: Option<Vec<String>>,
        #[arg(long)]
        target: Option<String>,
        #[arg(long, value_enum, default_value_t = ModelChoice::Linear)]
        model: ModelChoice,
        #[arg(long)]
        test_fraction: Option<f64>,
        #[arg(long)]
        seed: Option<u64>,
        /// Forest size
        #[arg(long, default_value_t = 100)]
        trees: usize,
        #[arg(long)]
        max_depth: Option<usize>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModelChoice {
    Linear,
    Forest,
}

impl Mode {
    fn into_request(self) -> Request {
        match self {
            Mode::Overview => Request::Overview,
            Mode::Summary => Request::Summary,
            Mode::Correlation => Request::Correlation,
            Mode::Outliers { column, k } => Request::Outliers {
                column,
                multiplier: k,
            },
            Mode::Histogram { column, bins } => Request::Histogram { column, bins },
            Mode::Scatter { x, y } => Request::Scatter { x, y },
            Mode::Timeline { unit, window } => Request::Timeline { unit, window },
            Mode::Categories { column, top } => Request::Categories { column, top_n: top },
            Mode::Clusters { eps, min_samples } => Request::Clusters { eps, min_samples },
            Mode::Map {
                min_magnitude,
                by_cluster,
            } => Request::MapPoints {
                min_magnitude,
                color_by_cluster: by_cluster,
            },
            Mode::Regress {
                features,
                target,
                model,
                test_fraction,
                seed,
                trees,
                max_depth,
            } => Request::Regression {
                features,
                target,
                model: Some(match model {
                    ModelChoice::Linear => ModelKind::Linear,
                    ModelChoice::Forest => ModelKind::RandomForest(ForestParams {
                        trees,
                        max_depth,
                        ..ForestParams::default()
                    }),
                }),
                test_fraction,
                seed,
            },
        }
    }
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();

    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(fill) = args.fill {
        config.fill = fill;
    }

    let mut session = Session::new(&args.data, config);
    for filter in &args.filters {
        let (column, value) = filter
            .split_once('=')
            .with_context(|| format!("Filter '{filter}' is not of the form COLUMN=VALUE"))?;
        session.add_filter(column.trim(), vec![value.to_string()]);
    }

    let response = session
        .handle(args.mode.into_request())
        .with_context(|| format!("Failed to analyze {}", args.data.display()))?;

    if args.json {
        let json = serde_json::to_string_pretty(&response).context("Failed to serialize response")?;
        println!("{json}");
    } else {
        println!("{}", render::text(&response)?);
    }
    Ok(())
}
