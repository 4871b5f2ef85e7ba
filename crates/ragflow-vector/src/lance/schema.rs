use arrow_schema::{DataType, Field, Schema, SchemaRef};
use std::sync::Arc;

pub const ID: &str = "id";
pub const SOURCE_ID: &str = "source_id";
pub const TEXT: &str = "text";
pub const METADATA: &str = "metadata";
pub const VECTOR: &str = "vector";

/// Chunk table layout. `metadata` holds the entry's metadata map as JSON.
pub fn build_chunk_schema(dim: i32) -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(ID, DataType::Utf8, false),
        Field::new(SOURCE_ID, DataType::Utf8, true),
        Field::new(TEXT, DataType::Utf8, false),
        Field::new(METADATA, DataType::Utf8, false),
        Field::new(VECTOR, DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
    ]))
}

pub const META_KEY: &str = "key";
pub const META_VALUE: &str = "value";

/// Key/value table kept next to each chunk table.
pub fn build_meta_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(META_KEY, DataType::Utf8, false),
        Field::new(META_VALUE, DataType::Utf8, false),
    ]))
}

/// The fixed vector width of a chunk table.
pub fn vector_dimension(schema: &Schema) -> Option<usize> {
    match schema.field_with_name(VECTOR).ok()?.data_type() {
        DataType::FixedSizeList(_, dim) => usize::try_from(*dim).ok(),
        _ => None,
    }
}
