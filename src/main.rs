use std::fs::{create_dir_all, File};
use std::io::BufReader;
use std::process::exit;

use clap::Parser;
use log::{error, info, LevelFilter};

use hexarc::archive::{Archive, Summary};
use hexarc::cli::{Cli, Config, Settings};
use hexarc::error::{Error, SetupError};
use hexarc::extract::Extractor;
use hexarc::hexdump::{reassemble, Dialect};
use hexarc::sink::{FileSink, Sink};

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };

    // RUST_LOG still wins over the flag
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn load_settings(cli: &Cli) -> Result<Settings, SetupError> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    Ok(Settings::new(cli, config))
}

fn prepare(settings: &Settings, sink: &mut FileSink) -> Result<(), SetupError> {
    for dir in [&settings.output, &settings.staging_dir] {
        create_dir_all(dir).map_err(|source| SetupError::CreateOutput {
            path: dir.clone(),
            source,
        })?;
    }

    sink.open_report(&settings.report)
}

fn load(settings: &Settings, sink: &mut dyn Sink) -> Result<Vec<u8>, SetupError> {
    let dialect = Dialect::from_path(&settings.input)?;
    let file = File::open(&settings.input).map_err(|source| SetupError::OpenInput {
        path: settings.input.clone(),
        source,
    })?;

    reassemble(BufReader::new(file), dialect, sink).map_err(SetupError::Read)
}

// Every error is reported once, on the console before the sink exists and
// through the sink after
fn run(cli: &Cli) -> Result<Summary, Error> {
    let settings = load_settings(cli).inspect_err(|e| error!("{}", e))?;
    let mut sink = FileSink::open(&settings.log_file).inspect_err(|e| error!("{}", e))?;

    prepare(&settings, &mut sink).inspect_err(|e| sink.write_error(&e.to_string()))?;
    sink.write_line(&format!("Reading archive {:?}", settings.input));
    let buf = load(&settings, &mut sink).inspect_err(|e| sink.write_error(&e.to_string()))?;

    let archive = Archive::open(&buf)
        .inspect_err(|e| sink.write_error(&e.to_string()))?
        .with_max_name_len(settings.max_name_len);

    let mut extractor = Extractor::new(&settings.output, settings.transform.clone())
        .with_staging_dir(&settings.staging_dir)
        .with_reserved(&settings.report)
        .with_reserved(&settings.log_file);

    // Framing errors from the walk are already in the sink
    let summary = archive.run(&mut extractor, &mut sink, settings.mode)?;

    sink.write_line(&format!(
        "Done: {} entries, {} extracted, {} failed",
        summary.entries, summary.extracted, summary.failed
    ));
    Ok(summary)
}

fn main() {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    match run(&cli) {
        Ok(summary) => info!("{:?}", summary),
        Err(_) => exit(1),
    }
}
