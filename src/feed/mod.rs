//! Feed retrieval, parsing and ingestion.
//!
//! - [`fetcher`] - single-shot HTTP retrieval with a timeout and size limit
//! - [`parser`] - RSS decoding into a [`SyndicationDocument`]
//! - [`reconcile`] - turning parsed items into posts without duplicates
//!
//! [`ingest`] chains the three for one source and is what a scheduler tick runs.

mod fetcher;
mod parser;
mod reconcile;

pub use fetcher::{
    FetchError, Fetcher, FetcherConfig, DEFAULT_MAX_FEED_SIZE, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT,
};
pub use parser::{parse_document, ParseError, SyndicationDocument, SyndicationItem};
pub use reconcile::{
    ingest, natural_key, parse_pub_date, reconcile, IngestError, ReconcileError, PUB_DATE_FORMAT,
};
