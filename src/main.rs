use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use motion_trajectories::batch;
use motion_trajectories::config::*;

#[derive(Parser)]
#[clap(about = "Human action recognition from point trajectories")]
pub struct Args {
    /// Log debug output
    #[clap(short, long)]
    pub verbose: bool,
    /// JSON file overriding the tracking flags
    #[clap(long)]
    pub config_file: Option<PathBuf>,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Play the listed videos with their trajectories drawn on top
    Show {
        #[clap(short, default_value = "input.txt")]
        input: PathBuf,
        /// Also save the overlays to a rerun recording
        #[clap(long)]
        record: Option<PathBuf>,
        #[clap(flatten)]
        config: Config,
    },
    /// Classify the listed videos with a trained model
    Recognize {
        #[clap(short, default_value = "input.txt")]
        input: PathBuf,
        #[clap(short, default_value = "output.txt")]
        output: PathBuf,
        #[clap(short, default_value = "training_data.xml")]
        model: PathBuf,
        #[clap(flatten)]
        config: Config,
    },
    /// Train a model on the listed videos, labelled by their paths
    Train {
        #[clap(short, default_value = "input.txt")]
        input: PathBuf,
        #[clap(short, default_value = "training_data.xml")]
        model: PathBuf,
        #[clap(flatten)]
        config: Config,
    },
}

fn resolve_config(config: Config, config_file: &Option<PathBuf>) -> Result<Config> {
    match config_file {
        Some(path) => Config::from_json_file(path),
        None => {
            config.validate()?;
            Ok(config)
        }
    }
}

fn main() -> Result<()> {
    // parse the config
    let args = Args::parse();

    // setup logging
    let level = if args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let indicatif_layer = IndicatifLayer::new();
    tracing_subscriber::registry()
        .with(level)
        .with(tracing_subscriber::fmt::layer().with_writer(indicatif_layer.get_stdout_writer()))
        .with(indicatif_layer)
        .init();

    match args.command {
        Command::Show {
            input,
            record,
            config,
        } => {
            let config = resolve_config(config, &args.config_file)?;
            batch::show(&input, &config, record.as_deref())?;
        }
        Command::Recognize {
            input,
            output,
            model,
            config,
        } => {
            let config = resolve_config(config, &args.config_file)?;
            batch::recognize(&input, &output, &model, &config)?;
        }
        Command::Train {
            input,
            model,
            config,
        } => {
            let config = resolve_config(config, &args.config_file)?;
            batch::train(&input, &model, &config)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn test_parse_recognize() {
        let args = Args::parse_from([
            "motion-trajectories",
            "recognize",
            "-i",
            "jobs.txt",
            "--max-age",
            "15",
        ]);
        match args.command {
            Command::Recognize {
                input,
                output,
                model,
                config,
            } => {
                assert_eq!(input, Path::new("jobs.txt"));
                assert_eq!(output, Path::new("output.txt"));
                assert_eq!(model, Path::new("training_data.xml"));
                assert_eq!(config.max_age, 15);
                assert_eq!(config.lower_bound, 5);
            }
            _ => panic!("expected the recognize command"),
        }
    }
}
