//! arxin Core Library
//!
//! This library provides the ingestion pipeline behind the `arxin` tool,
//! which mirrors arXiv bibliographic metadata into a local SQLite store and
//! keeps it current incrementally.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`feed`] - arXiv API access and Atom decoding
//! - [`extract`] - Cursor-driven pagination over a date window
//! - [`parser`] - Identifier validation and entry-to-article parsing
//! - [`keywords`] - Keyword vocabulary and occurrence counting
//! - [`sync`] - Reconciliation of parsed articles with stored state
//! - [`store`] - Article persistence behind a repository trait
//! - [`backfill`] - Batch driver tying the pipeline together
//! - [`db`] - Database connection and schema management

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod article;
pub mod backfill;
pub mod db;
pub mod extract;
pub mod feed;
pub mod keywords;
pub mod parser;
pub mod store;
pub mod sync;
pub mod taxonomy;
pub mod throttle;
mod user_agent;

// Re-export commonly used types
pub use article::{Article, StoredArticle};
pub use backfill::{
    Backfill, BackfillReport, BackfillWindow, FileRejectionSink, MemoryRejectionSink, Rejection,
    RejectionSink, StopReason, default_backfill_start, resolve_window,
};
pub use db::{Database, DbError};
pub use extract::{PaginationEnd, PaginationStats, Paginator};
pub use feed::{
    ArxivClient, FeedClientOptions, PageSource, RawEntry, RawField, RawPage, TransportError,
};
pub use keywords::{KeywordId, KeywordVocabulary};
pub use parser::{MalformedIdentifier, ParseError, ParsedArticle, normalize_abs_url, parse_entry};
pub use store::{ArticleRepository, StoreError};
pub use sync::{InvariantViolation, SyncEffect, SyncError, Synchronizer};
pub use taxonomy::{CategoryTaxonomy, TaxonomyError};
pub use throttle::PageThrottle;
