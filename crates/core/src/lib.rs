//! Domain core for toll-usage ingestion and reconciliation.
//!
//! Everything in this crate is pure: parsing, hashing, the import session
//! state machine, chunk reassembly, duplicate partitioning, match scoring and
//! validation. Storage is reached only through the capability traits in
//! [`storage`], implemented by `tollsync-db` and the pipeline's in-memory
//! store.

pub mod chunk;
pub mod duplicate_detection;
pub mod error;
pub mod hashing;
pub mod import_session;
pub mod mapping;
pub mod matching;
pub mod pagination;
pub mod row_parser;
pub mod storage;
pub mod toll_record;
pub mod types;
