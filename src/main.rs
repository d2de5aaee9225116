//! estate-advisor CLI
//!
//! Train the investment classifier, classify a single listing, or rank a
//! corpus by investment score.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use estate_advisor::dataset::{fields, Column, Frame, Record};
use estate_advisor::features::{add_price_per_area, add_property_age, projected_price, InvestmentScorer};
use estate_advisor::{train, AdvisorConfig, ArtifactPaths, CancelFlag, Predictor};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "estate-advisor")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Real-estate investment classifier", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Project root holding data/, models/ and mlruns/
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fit the feature pipeline and forest, then write artifacts
    Train {
        /// Training corpus CSV
        #[arg(long)]
        data: Option<PathBuf>,

        /// Number of trees
        #[arg(long)]
        trees: Option<usize>,
    },
    /// Classify one listing and print the result as JSON
    Predict {
        /// JSON file holding one record
        #[arg(long, conflicts_with = "json")]
        record: Option<PathBuf>,

        /// Inline JSON record
        #[arg(long)]
        json: Option<String>,
    },
    /// Print the highest-scoring listings of a corpus
    Score {
        /// Corpus CSV (defaults to the training corpus)
        #[arg(long)]
        data: Option<PathBuf>,

        #[arg(long, default_value = "10")]
        top: usize,
    },
}

#[derive(Serialize)]
struct ScoredListing {
    id: Option<String>,
    city: Option<String>,
    locality: Option<String>,
    score: f64,
    projected_price: Option<f64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => AdvisorConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AdvisorConfig::default(),
    };
    if let Some(root) = &cli.root {
        let experiment = config.paths.experiment.clone();
        config.paths = ArtifactPaths {
            experiment,
            ..ArtifactPaths::rooted_at(root)
        };
    }

    match cli.command {
        Command::Train { data, trees } => {
            if let Some(data) = data {
                config.paths.training_data = data;
            }
            if let Some(trees) = trees {
                config.forest.n_trees = trees;
            }
            let report = train(&config, CancelFlag::new()).context("Training failed")?;
            info!(
                accuracy = report.evaluation.accuracy,
                run = %report.run_id,
                "training complete"
            );
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Predict { record, json } => {
            let text = match (record, json) {
                (Some(path), _) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read record {}", path.display()))?,
                (None, Some(json)) => json,
                (None, None) => bail!("Provide a record with --record <file> or --json <object>"),
            };
            let record = Record::from_json_str(&text).context("Record is not a JSON object")?;
            let predictor = Predictor::load(&config).context("Failed to load model artifacts")?;
            let result = predictor.predict(&record)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Score { data, top } => {
            let path = data.unwrap_or_else(|| config.paths.training_data.clone());
            let mut frame = Frame::from_csv_path(&path)
                .with_context(|| format!("Failed to load corpus {}", path.display()))?;
            add_price_per_area(&mut frame, &config.features)?;
            add_property_age(&mut frame, &config.features)?;

            let scorer = InvestmentScorer::from_frame(&frame, &config.features);
            let scores = scorer.score_frame(&frame);
            let text = |name: &str| frame.column(name).map(Column::to_categorical);
            let (ids, cities, localities) = (text(fields::ID), text(fields::CITY), text(fields::LOCALITY));
            let prices = frame.column(fields::PRICE).map(Column::to_numeric);

            let mut order: Vec<usize> = (0..scores.len()).collect();
            order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
            let growth = config.features.growth_rate;
            let years = config.features.projection_years;
            let ranked: Vec<ScoredListing> = order
                .into_iter()
                .take(top)
                .map(|i| ScoredListing {
                    id: ids.as_ref().and_then(|c| c[i].clone()),
                    city: cities.as_ref().and_then(|c| c[i].clone()),
                    locality: localities.as_ref().and_then(|c| c[i].clone()),
                    score: scores[i],
                    projected_price: prices
                        .as_ref()
                        .map(|p| p[i])
                        .filter(|p| p.is_finite())
                        .map(|p| projected_price(p, growth, years)),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&ranked)?);
        }
    }

    Ok(())
}
