//! `term,peak_date,popularity_score` CSV, one row per term.
use populus_common::{PopulusError, RelatedTerm, Result};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

pub const DEFAULT_OUTPUT: &str = "results.csv";

const HEADER: [&str; 3] = ["term", "peak_date", "popularity_score"];

/// Write the CSV to any sink. Fields are quoted only when needed.
pub fn write_csv<W: Write>(writer: W, terms: &[RelatedTerm]) -> io::Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(HEADER)?;
    for term in terms {
        let date = term
            .peak_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        csv.write_record([
            term.term.as_str(),
            date.as_str(),
            term.popularity_score.to_string().as_str(),
        ])?;
    }
    csv.flush()
}

/// Write the CSV to `path`, replacing any existing file.
pub fn export_csv(path: &Path, terms: &[RelatedTerm]) -> Result<()> {
    let file = File::create(path).map_err(|e| PopulusError::io(path, e))?;
    write_csv(BufWriter::new(file), terms).map_err(|e| PopulusError::io(path, e))?;
    tracing::info!(target: "render.csv", path = %path.display(), rows = terms.len(), "csv.export.success");
    Ok(())
}
