mod fetcher;
mod ingest;
mod opml_import;

pub use fetcher::{FeedFetcher, FeedSource};
pub use ingest::{IngestReport, Ingestor};
pub use opml_import::parse_opml_file;
