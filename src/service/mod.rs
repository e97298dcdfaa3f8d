mod ingest;

pub use ingest::{IngestError, IngestOutcome, LocationIngestService, LocationReport};
