use anyhow::Result;
use clap::Parser;
use sonority_etl::{Config, LoggingConfig};
use std::path::PathBuf;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "sonority", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Model directory (default: ~/.local/share/sonority/model)
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    /// Path to the song catalog (default: ~/.local/share/sonority/catalog.db)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Log at debug level regardless of the configured level
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Build a model from a dataset CSV
    ///
    /// Reads the dataset in chunks, weights and standardizes the four audio
    /// features (acousticness, liveness, valence, tempo), and indexes every
    /// row in a forest of random-projection trees. Row order defines ids:
    /// the first data row is id 0.
    ///
    /// Required columns: acousticness, liveness, valence, tempo, year.
    /// Optional columns: name, artists, popularity. When present they are
    /// written to the catalog under the same ids.
    ///
    /// The model directory is replaced in one step once every artifact is
    /// written, so a failed build leaves the previous model in place.
    Build {
        /// Path to the dataset CSV
        dataset: PathBuf,

        /// Trees in the index forest (default from config)
        #[arg(long)]
        trees: Option<usize>,

        /// Fixed seed for a reproducible build
        #[arg(long)]
        seed: Option<u64>,

        /// Rows processed per chunk (default from config)
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Skip writing song rows to the catalog
        #[arg(long)]
        no_catalog: bool,
    },
    /// Recommend songs similar to a feature vector
    ///
    /// Features come either from repeated --feature key=value flags (all
    /// four keys required) or from a track looked up in a JSON feature
    /// table with --track and --tracks. A track with missing or incomplete
    /// features falls back to a neutral default vector.
    Recommend {
        /// A feature value, e.g. --feature tempo=120
        #[arg(long = "feature", value_name = "KEY=VALUE")]
        features: Vec<String>,

        /// Track id to look up in the --tracks table
        #[arg(long, requires = "tracks", conflicts_with = "features")]
        track: Option<String>,

        /// JSON file mapping track ids to feature objects
        #[arg(long, requires = "track")]
        tracks: Option<PathBuf>,

        /// Release year of the query; favours songs from nearby years
        #[arg(long)]
        year: Option<u16>,

        /// Number of results (default from config)
        #[arg(short = 'n', long)]
        count: Option<usize>,

        /// Print the raw response as JSON
        #[arg(long)]
        json: bool,
    },
    /// Recommend from the average of several tracks' features
    Profile {
        /// JSON file holding an array of feature objects
        tracks: PathBuf,

        /// Number of results (default from config)
        #[arg(short = 'n', long)]
        count: Option<usize>,

        /// Print the raw response as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a summary of the current model
    Inspect {
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage the song catalog
    #[command(subcommand)]
    Catalog(CatalogCommand),
    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, clap::Subcommand)]
enum CatalogCommand {
    /// Replace the catalog with the song rows of a dataset CSV
    Import {
        /// Path to the dataset CSV
        dataset: PathBuf,
    },
    /// Search song names and artists, most popular first
    Search {
        /// Text to look for
        text: String,

        /// Maximum results
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show one song
    Show {
        /// Song id
        id: u32,
    },
}

#[derive(Debug, clap::Subcommand)]
enum ConfigCommand {
    /// Show the effective configuration
    Show,
    /// Print one value, or the whole config file
    Get {
        /// Config key
        key: Option<String>,
    },
    /// Set a value in the config file
    Set {
        /// Config key
        key: String,
        /// New value
        value: String,
    },
    /// Print the config file path
    Path,
    /// Print an example config file
    Example,
    /// Create the config file with defaults
    Init,
}

fn setup_logging(logging: &LoggingConfig, verbose: bool) -> Result<()> {
    let level = if verbose {
        twyg::LogLevel::Debug
    } else {
        parse_level(&logging.level)?
    };
    let opts = twyg::OptsBuilder::new()
        .coloured(logging.coloured)
        .level(level)
        .report_caller(logging.report_caller)
        .build()
        .map_err(|e| anyhow::anyhow!("Invalid logging options: {e}"))?;
    twyg::setup(opts).map_err(|e| anyhow::anyhow!("Failed to set up logging: {e}"))?;
    Ok(())
}

fn parse_level(level: &str) -> Result<twyg::LogLevel> {
    match level.to_ascii_lowercase().as_str() {
        "trace" => Ok(twyg::LogLevel::Trace),
        "debug" => Ok(twyg::LogLevel::Debug),
        "info" => Ok(twyg::LogLevel::Info),
        "warn" | "warning" => Ok(twyg::LogLevel::Warn),
        "error" => Ok(twyg::LogLevel::Error),
        other => anyhow::bail!("Unknown log level: {other}"),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(model_dir) = cli.model_dir {
        config.model_dir = model_dir;
    }
    if let Some(catalog) = cli.catalog {
        config.catalog_path = catalog;
    }

    setup_logging(&config.logging, cli.verbose)?;

    match cli.command {
        Commands::Build {
            dataset,
            trees,
            seed,
            chunk_size,
            no_catalog,
        } => {
            if let Some(trees) = trees {
                config.tree_count = trees;
            }
            if let Some(chunk_size) = chunk_size {
                config.chunk_size = chunk_size;
            }
            if seed.is_some() {
                config.seed = seed;
            }
            commands::run_build(&config, &dataset, !no_catalog)?;
        }
        Commands::Recommend {
            features,
            track,
            tracks,
            year,
            count,
            json,
        } => {
            let query = match (track, tracks) {
                (Some(track), Some(tracks)) => commands::Query::Track { track, tracks },
                _ => commands::Query::Features(features),
            };
            let count = count.unwrap_or(config.default_count);
            commands::run_recommend(&config, &query, year, count, json)?;
        }
        Commands::Profile {
            tracks,
            count,
            json,
        } => {
            let count = count.unwrap_or(config.default_count);
            commands::run_profile(&config, &tracks, count, json)?;
        }
        Commands::Inspect { json } => {
            commands::show_inspect(&config, json)?;
        }
        Commands::Catalog(command) => match command {
            CatalogCommand::Import { dataset } => {
                commands::catalog::import(&config, &dataset)?;
            }
            CatalogCommand::Search { text, limit } => {
                commands::catalog::search(&config, &text, limit)?;
            }
            CatalogCommand::Show { id } => {
                commands::catalog::show(&config, id)?;
            }
        },
        Commands::Config(command) => match command {
            ConfigCommand::Show => commands::config::show_config(&config)?,
            ConfigCommand::Get { key } => commands::config::get_config(&config, key)?,
            ConfigCommand::Set { key, value } => commands::config::set_config(&key, &value)?,
            ConfigCommand::Path => commands::config::show_path(),
            ConfigCommand::Example => commands::config::show_example(),
            ConfigCommand::Init => commands::config::init_config()?,
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_level() {
        assert!(matches!(parse_level("INFO"), Ok(twyg::LogLevel::Info)));
        assert!(matches!(parse_level("warning"), Ok(twyg::LogLevel::Warn)));
        assert!(parse_level("loud").is_err());
    }

    #[test]
    fn test_recommend_args() {
        let cli = Cli::parse_from([
            "sonority",
            "recommend",
            "--feature",
            "tempo=120",
            "--feature",
            "valence=0.4",
            "--year",
            "1999",
            "-n",
            "5",
        ]);
        match cli.command {
            Commands::Recommend {
                features,
                year,
                count,
                ..
            } => {
                assert_eq!(features.len(), 2);
                assert_eq!(year, Some(1999));
                assert_eq!(count, Some(5));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_tracks_needs_track() {
        let err = Cli::try_parse_from(["sonority", "recommend", "--tracks", "t.json"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
        assert!(Cli::try_parse_from([
            "sonority", "recommend", "--track", "abc", "--tracks", "t.json"
        ])
        .is_ok());
    }
}
