use chrono::Utc;
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use log::{error, info};
use std::path::{Path, PathBuf};
use std::{error, fs, io, process};
use trendfetch::batch::{self, InputSpec};
use trendfetch::config::{DEFAULT_SETTINGS, Settings};
use trendfetch::driver::{self, DriverArgs};
use trendfetch::errors::Result;
use trendfetch::export;
use trendfetch::options::{OptionsPatch, Property};
use trendfetch::output::OError;
use trendfetch::provider::GoogleTrends;

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Search term, comma-separated terms, or a trends explore link
    #[arg(short, long)]
    input: Option<String>,
    /// Batch input file (JSON)
    #[arg(short = 'f', long)]
    input_file: Option<PathBuf>,
    /// Region code, e.g. US
    #[arg(long)]
    geo: Option<String>,
    /// Time window, e.g. "today 12-m" or "now 7-d"
    #[arg(long)]
    timeframe: Option<String>,
    /// Interface language, e.g. en-US
    #[arg(long)]
    hl: Option<String>,
    /// Timezone offset in minutes
    #[arg(long, allow_hyphen_values = true)]
    tz: Option<i32>,
    /// Search property: images, news, youtube or froogle
    #[arg(long)]
    gprop: Option<Property>,
    /// Category id
    #[arg(long)]
    category: Option<u32>,
    /// Seconds to wait between provider requests
    #[arg(long)]
    sleep: Option<f64>,
    /// Export formats, comma-separated: json, csv, excel, xml, html
    #[arg(long)]
    formats: Option<String>,
    /// Directory for exported files
    #[arg(long)]
    export_dir: Option<PathBuf>,
    /// Settings file (JSON)
    #[arg(long, default_value = DEFAULT_SETTINGS)]
    config: PathBuf,
    /// Report errors as a JSON file
    #[arg(long)]
    error_file: Option<PathBuf>,
    /// Log level; takes precedence over -v and -q
    #[arg(long)]
    log_level: Option<log::LevelFilter>,
    /// Verbosity
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

impl Args {
    fn overrides(&self) -> OptionsPatch {
        OptionsPatch {
            language: self.hl.clone(),
            timezone_offset: self.tz,
            region: self.geo.clone(),
            timeframe: self.timeframe.clone(),
            property: self.gprop,
            category: self.category,
            request_delay: self.sleep,
        }
    }

    fn input(&self) -> Option<&str> {
        self.input.as_deref().filter(|s| !s.trim().is_empty())
    }
}

fn process(args: &Args) -> Result<()> {
    let settings = Settings::load(&args.config)?;
    let formats = match &args.formats {
        Some(list) => export::parse_formats(list)?,
        None => settings.formats()?,
    };
    let export_dir = args.export_dir.as_ref().unwrap_or(&settings.export_dir);
    let driver_args = DriverArgs {
        base: settings.base_options(),
        overrides: args.overrides(),
    };
    let specs = match (&args.input_file, args.input()) {
        (Some(path), _) => batch::read_batch(path)?,
        (None, Some(input)) => vec![InputSpec::new(input, OptionsPatch::default())],
        (None, None) => vec![],
    };
    let provider = GoogleTrends::new()?;
    let records = driver::fetch_all(&driver_args, &provider, &specs)?;
    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    let base = export_dir.join(format!("google_trends_{stamp}"));
    let written = export::write_all(&records, &formats, &base)?;
    info!("{} records, {} files written", records.len(), written.len());
    Ok(())
}

fn store_error(error_file: &Path, e: &dyn error::Error) -> Result<()> {
    let error = OError {
        error: format!("{e}"),
    };
    let file = fs::File::create(error_file)?;
    let writer = io::BufWriter::new(file);
    serde_json::to_writer(writer, &error)?;
    Ok(())
}

fn main() {
    let args = Args::parse();
    pretty_env_logger::formatted_timed_builder()
        .filter_level(args.log_level.unwrap_or(args.verbose.log_level_filter()))
        .init();
    if args.input_file.is_none() && args.input().is_none() {
        error!("nothing to fetch: give --input or --input-file");
        process::exit(2);
    }
    match process(&args) {
        Ok(()) => info!("done"),
        Err(e) => {
            match &args.error_file {
                Some(filename) => match store_error(filename, &*e) {
                    Ok(()) => info!("error reported: {e}"),
                    Err(e2) => {
                        error!("{e}");
                        error!("{e2}");
                    }
                },
                None => error!("{e}"),
            }
            process::exit(1);
        }
    }
}
