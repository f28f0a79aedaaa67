pub mod import_stream;
pub mod imports;
pub mod mappings;
pub mod records;
