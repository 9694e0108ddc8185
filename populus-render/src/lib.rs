//! Output artifacts: the CSV export and the word-cloud PNG.
pub mod csv_export;
pub mod wordcloud;

pub use csv_export::{DEFAULT_OUTPUT, export_csv, write_csv};
pub use wordcloud::{RenderError, WordCloudOptions, WordCloudRenderer};
