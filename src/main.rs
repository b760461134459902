use chrono::NaiveDate;
use clap::Parser;
use iphoto_export::export::DEFAULT_DATE_DELIMITER;
use iphoto_export::{ExifTool, ExportOptions, Exporter, Grouping, LibraryIndex};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "exportiphoto", version, about = "Export an iPhoto library to a folder tree")]
struct Args {
    /// iPhoto library directory (the one holding AlbumData.xml)
    library: PathBuf,
    /// Destination directory
    destination: PathBuf,
    /// Use albums instead of events
    #[arg(short = 'a', long)]
    albums: bool,
    /// Only log warnings and errors
    #[arg(short = 'q', long)]
    quiet: bool,
    /// Don't prefix folder names with their date
    #[arg(short = 'd', long = "no-date", alias = "date")]
    no_date: bool,
    /// Export original images instead of edited ones
    #[arg(short = 'o', long)]
    originals: bool,
    /// Deconflict export directories and files of the same name
    #[arg(short = 'x', long)]
    deconflict: bool,
    /// Don't actually copy files, write metadata or import folders
    #[arg(short = 't', long = "test")]
    dry_run: bool,
    /// Add a year directory above dated folders
    #[arg(short = 'y', long = "yeardir")]
    year_dirs: bool,
    /// Date delimiter in folder names
    #[arg(short = 'e', long, alias = "date_delimiter", default_value = DEFAULT_DATE_DELIMITER)]
    date_delimiter: String,
    /// Import dated destination folders that are missing from the library
    #[arg(short = 'i', long = "import")]
    import_missing: bool,
    /// Ignore the modification time when deciding whether to copy a file
    #[arg(short = 'j', long, alias = "ignore_time_delta")]
    ignore_time_delta: bool,
    /// Only import missing folders dated on or after this day (YYYY-MM-DD)
    #[arg(short = 'z', long, alias = "import_from_date", value_parser = parse_day)]
    import_from_date: Option<NaiveDate>,
    /// Write captions, ratings, comments and keywords to the copies
    #[arg(short = 'm', long)]
    metadata: bool,
    /// Store faces as keywords (requires -m)
    #[arg(short = 'f', long, requires = "metadata")]
    faces: bool,
    /// The exiftool executable used to write metadata
    #[arg(long, default_value = "exiftool")]
    exiftool: PathBuf,
}

fn parse_day(text: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
}

impl Args {
    fn options(&self) -> ExportOptions {
        ExportOptions {
            grouping: if self.albums {
                Grouping::Albums
            } else {
                Grouping::Events
            },
            date_prefix: !self.no_date,
            year_dirs: self.year_dirs,
            date_delimiter: self.date_delimiter.clone(),
            deconflict: self.deconflict,
            originals: self.originals,
            metadata: self.metadata,
            faces: self.faces,
            ignore_time_delta: self.ignore_time_delta,
            dry_run: self.dry_run,
            import_missing: self.import_missing,
            import_from: self.import_from_date,
        }
    }
}

fn init_logging(quiet: bool) {
    let default = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let options = args.options();
    let library = LibraryIndex::open(&args.library, options.grouping)?;
    let mut exiftool = if args.metadata && !args.dry_run {
        Some(ExifTool::with_executable(&args.exiftool)?)
    } else {
        None
    };

    let mut exporter = Exporter::new(&library, &args.destination, options)?;
    if let Some(exiftool) = exiftool.as_mut() {
        exporter = exporter.with_metadata_writer(exiftool);
    }

    let summary = exporter.run()?;
    if summary.failed > 0 {
        log::warn!("{} images could not be exported", summary.failed);
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.quiet);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
