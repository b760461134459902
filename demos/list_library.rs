//! Concise example: list the events (or albums, with `--albums`) of a library
//! and what the first images of each are.
use iphoto_export::{Grouping, LibraryError, LibraryIndex};
use std::path::PathBuf;

const DEFAULT_LIBRARY: &str = "Pictures/iPhoto Library";

fn main() -> Result<(), LibraryError> {
    let mut grouping = Grouping::Events;
    let mut library_dir = PathBuf::from(DEFAULT_LIBRARY);
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--albums" => grouping = Grouping::Albums,
            path => library_dir = PathBuf::from(path),
        }
    }

    let library = LibraryIndex::open(&library_dir, grouping)?;
    let version = library.version();
    println!(
        "iPhoto library {}.{} with {} images",
        version.major,
        version.minor,
        library.image_count()
    );

    for folder in library.folders(grouping) {
        let date = folder
            .date()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "undated".to_string());
        println!("\n{} ({date}, {} images)", folder.name(), folder.image_ids().len());

        for id in folder.image_ids().iter().take(3) {
            let record = match library.image_record(id) {
                Ok(record) => record,
                Err(err) => {
                    println!("  #{id}: {err}");
                    continue;
                }
            };
            let keywords: Vec<String> = library.keyword_names(record).into_iter().collect();
            println!(
                "  #{id}: {} {:?} [{}]",
                record.source_path(false).unwrap_or("<no path>"),
                record.caption().unwrap_or_default(),
                keywords.join(", ")
            );
        }
    }
    Ok(())
}
