use clap::Parser;
use clap_verbosity_flag::{Verbosity, WarnLevel};
use log::{error, info};
use std::path::PathBuf;
use std::{fs, process};
use trendfetch::errors::Result;
use trendfetch::export;
use trendfetch::output::TrendRecord;

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Records saved by an earlier run (JSON)
    infile: PathBuf,
    /// Output path without extension
    outbase: PathBuf,
    /// Export formats, comma-separated: json, csv, excel, xml, html
    #[arg(long, default_value = "csv")]
    formats: String,
    /// Verbosity
    #[command(flatten)]
    verbose: Verbosity<WarnLevel>,
}

fn process(args: &Args) -> Result<()> {
    let formats = export::parse_formats(&args.formats)?;
    info!("read: {}", args.infile.display());
    let indata = fs::read_to_string(&args.infile)?;
    let records: Vec<TrendRecord> = serde_json::from_str(&indata)?;
    export::write_all(&records, &formats, &args.outbase)?;
    Ok(())
}

fn main() {
    let args = Args::parse();
    pretty_env_logger::formatted_timed_builder()
        .filter_level(args.verbose.log_level_filter())
        .init();
    match process(&args) {
        Ok(()) => (),
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    }
}
