//! Zero-sized repositories, one per table.
//!
//! Every method takes a `&PgPool` and returns raw `sqlx::Error`s;
//! [`crate::store::PgStore`] maps those into domain errors.

pub mod external_trip_repo;
pub mod import_session_repo;
pub mod mapping_repo;
pub mod toll_record_repo;

pub use external_trip_repo::ExternalTripRepo;
pub use import_session_repo::ImportSessionRepo;
pub use mapping_repo::MappingRepo;
pub use toll_record_repo::TollRecordRepo;

use tollsync_core::pagination::SortSpec;

/// Render an ORDER BY clause. `sort.field` comes from a whitelist, so it is
/// safe to interpolate; `id` is appended as a stable tie-breaker.
pub(crate) fn order_by(sort: &SortSpec, secondary: Option<&str>) -> String {
    let dir = sort.direction.as_sql();
    let mut clause = format!("ORDER BY {} {dir}", sort.field);
    if let Some(col) = secondary {
        clause.push_str(&format!(", {col} {dir}"));
    }
    if sort.field != "id" {
        clause.push_str(&format!(", id {dir}"));
    }
    clause
}
