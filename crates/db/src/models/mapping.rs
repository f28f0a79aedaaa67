use sqlx::types::Json;
use sqlx::FromRow;
use tollsync_core::error::CoreError;
use tollsync_core::mapping::{Mapping, MappingStatus, Metadata};
use tollsync_core::types::{DbId, Timestamp};

/// A row from the `mappings` table.
#[derive(Debug, Clone, FromRow)]
pub struct MappingRow {
    pub id: DbId,
    pub toll_record_id: DbId,
    pub mapping_type: String,
    pub mapped_entity_id: DbId,
    pub mapped_entity_type: String,
    pub confidence: f64,
    pub status_id: i16,
    pub metadata: Json<Metadata>,
    pub created_by: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<MappingRow> for Mapping {
    type Error = CoreError;

    fn try_from(row: MappingRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            toll_record_id: row.toll_record_id,
            mapping_type: row.mapping_type,
            mapped_entity_id: row.mapped_entity_id,
            mapped_entity_type: row.mapped_entity_type,
            confidence: row.confidence,
            status: MappingStatus::from_id(row.status_id)?,
            metadata: row.metadata.0,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
