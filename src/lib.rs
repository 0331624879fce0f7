pub mod error;
pub mod fetch;
pub mod geometry;
pub mod ingest;
pub mod output;
pub mod snapshot;
pub mod stations;
pub mod stats;
pub mod timeline;
