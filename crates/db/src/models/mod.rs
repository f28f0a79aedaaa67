//! Row structs for the PostgreSQL schema.
//!
//! Each submodule holds a `FromRow` struct matching one table and the
//! conversion into the corresponding `tollsync_core` domain type.

pub mod external_trip;
pub mod import_session;
pub mod mapping;
pub mod toll_record;
