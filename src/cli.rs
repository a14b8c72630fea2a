use std::fs;
use std::path::{Path, PathBuf};
use serde::Deserialize;

use clap::Parser;

use crate::archive::Mode;
use crate::entry::MAX_NAME_LEN;
use crate::error::SetupError;
use crate::transform::CommandTransform;

const DEFAULT_OUTPUT: &str = "./extracted";
const DEFAULT_LOG_FILE: &str = "hexarc.log";
const DEFAULT_REPORT_NAME: &str = "metadata.txt";
const DEFAULT_TRANSFORM: [&str; 2] = ["python3", "process_data.py"];

#[derive(Parser, Debug)]
#[command(name = "hexarc")]
#[command(about = "Extract the entries of a hex encoded archive")]
#[command(author, version, long_about = None)]
pub struct Cli {
    /// Archive text, `.hex` for plain hex lines, `.txt` for an xxd style dump
    #[arg(short, long, value_name = "FILE")]
    pub input: PathBuf,

    /// Directory the entries are extracted under
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// 0 = warnings, 1 = info, 2 = debug
    #[arg(
        short,
        long,
        num_args = 0..=1,
        default_value_t = 0,
        default_missing_value = "1",
        value_parser = clap::value_parser!(u8).range(0..=2)
    )]
    pub verbose: u8,

    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Walk the archive and write the report without extracting anything
    #[arg(short, long)]
    pub list: bool,

    /// Log file, appended to across runs
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

// Configuration, every field is optional and the cli wins over it
#[derive(Deserialize, Debug, Default, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub output: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub report_name: Option<String>,

    /// Program followed by its leading arguments
    pub transform: Option<Vec<String>>,
    pub staging_dir: Option<PathBuf>,
    pub max_name_len: Option<usize>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Config, SetupError> {
        let text = fs::read_to_string(path).map_err(|source| SetupError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&text).map_err(|source| SetupError::Config {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub input: PathBuf,
    pub output: PathBuf,
    pub log_file: PathBuf,
    pub report: PathBuf,
    pub transform: CommandTransform,
    pub staging_dir: PathBuf,
    pub max_name_len: usize,
    pub mode: Mode,
}

impl Settings {
    pub fn new(cli: &Cli, config: Config) -> Settings {
        let output = cli
            .output
            .clone()
            .or(config.output)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));

        let report = output.join(
            config
                .report_name
                .as_deref()
                .unwrap_or(DEFAULT_REPORT_NAME),
        );

        // An empty command would leave nothing to run
        let transform = config
            .transform
            .as_deref()
            .and_then(CommandTransform::from_argv)
            .unwrap_or_else(|| {
                CommandTransform::new(DEFAULT_TRANSFORM[0], vec![DEFAULT_TRANSFORM[1].to_string()])
            });

        Settings {
            input: cli.input.clone(),
            log_file: cli
                .log_file
                .clone()
                .or(config.log_file)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
            report,
            transform,
            staging_dir: config.staging_dir.unwrap_or_else(|| output.clone()),
            max_name_len: config.max_name_len.unwrap_or(MAX_NAME_LEN),
            mode: if cli.list { Mode::List } else { Mode::Extract },
            output,
        }
    }
}
