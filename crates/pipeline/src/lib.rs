//! Orchestration for tollsync: the import coordinator, the mapping engine
//! and the toll record service, all written against the storage capability
//! traits from `tollsync_core::storage`.

pub mod config;
pub mod coordinator;
pub mod mapping_engine;
pub mod memory;
pub mod records;

pub use config::PipelineConfig;
pub use coordinator::{ImportCoordinator, ImportRequest, ImportStream, StreamRequest};
pub use mapping_engine::MappingEngine;
pub use memory::{MemoryStore, StaticCandidates};
pub use records::TollRecordService;
