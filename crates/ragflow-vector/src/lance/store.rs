use anyhow::{anyhow, Result};
use arrow_array::cast::AsArray;
use arrow_array::{Array, FixedSizeListArray, RecordBatch, RecordBatchIterator, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection, DistanceType, Table};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use ragflow_core::rank::{cosine_similarity, top_k};
use ragflow_core::{ensure_same_model, Error, Meta, SearchHit, VectorEntry, VectorStore};

use super::schema::{self, build_chunk_schema, build_meta_schema, vector_dimension};
use crate::memory::batch_dimension;

/// Candidates fetched per requested hit before local re-ranking.
const OVERFETCH: usize = 10;

const MODEL_KEY: &str = "embedding_model";

/// LanceDB-backed store. One table per collection; the vector width is fixed by
/// the table schema when the first batch creates it.
pub struct LanceVectorStore {
    db: Connection,
    table_name: String,
    meta_table: String,
}

impl LanceVectorStore {
    pub async fn open(db_path: &Path, table_name: &str) -> Result<Self> {
        std::fs::create_dir_all(db_path)?;
        let db = connect(db_path.to_string_lossy().as_ref()).execute().await?;
        tracing::debug!(path = %db_path.display(), table = table_name, "opened lance store");
        Ok(Self { db, table_name: table_name.to_string(), meta_table: format!("{table_name}_meta") })
    }

    async fn open_if_exists(&self, name: &str) -> Result<Option<Table>> {
        let names = self.db.table_names().execute().await?;
        if !names.iter().any(|n| n == name) {
            return Ok(None);
        }
        Ok(Some(self.db.open_table(name).execute().await?))
    }

    async fn table(&self) -> Result<Option<Table>> {
        self.open_if_exists(&self.table_name).await
    }

    async fn rows(&self) -> Result<usize> {
        match self.table().await? {
            Some(t) => Ok(t.count_rows(None).await?),
            None => Ok(0),
        }
    }

    async fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let Some(t) = self.open_if_exists(&self.meta_table).await? else { return Ok(None) };
        let filter = format!("{} = '{}'", schema::META_KEY, key.replace('\'', "''"));
        let mut stream = t.query().only_if(filter).execute().await?;
        while let Some(batch) = stream.try_next().await? {
            if batch.num_rows() > 0 {
                return Ok(Some(string_column(&batch, schema::META_VALUE)?.value(0).to_string()));
            }
        }
        Ok(None)
    }

    async fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        let batch = RecordBatch::try_new(
            build_meta_schema(),
            vec![Arc::new(StringArray::from(vec![key.to_string()])), Arc::new(StringArray::from(vec![value.to_string()]))],
        )?;
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), build_meta_schema()));
        match self.open_if_exists(&self.meta_table).await? {
            Some(t) => {
                let mut mi = t.merge_insert(&[schema::META_KEY]);
                mi.when_matched_update_all(None).when_not_matched_insert_all();
                mi.execute(reader).await?;
            }
            None => {
                self.db.create_table(&self.meta_table, reader).execute().await?;
            }
        }
        Ok(())
    }

    async fn dimension(&self) -> Result<Option<usize>> {
        match self.table().await? {
            Some(t) => Ok(vector_dimension(&t.schema().await?)),
            None => Ok(None),
        }
    }

    async fn write(&self, entries: &[VectorEntry], dim: usize) -> Result<()> {
        let schema = build_chunk_schema(i32::try_from(dim)?);
        let batch = entries_to_record_batch(entries, dim)?;
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        match self.table().await? {
            Some(t) => {
                // Upsert behavior via merge_insert: id is unique
                let mut mi = t.merge_insert(&[schema::ID]);
                mi.when_matched_update_all(None).when_not_matched_insert_all();
                mi.execute(reader).await?;
            }
            None => {
                self.db.create_table(&self.table_name, reader).execute().await?;
            }
        }
        Ok(())
    }

    async fn candidates(&self, query: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
        let Some(t) = self.table().await? else { return Ok(Vec::new()) };
        let mut stream = t
            .vector_search(query.to_vec())?
            .distance_type(DistanceType::Cosine)
            .limit(limit)
            .execute()
            .await?;
        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            hits.extend(hits_from_batch(&batch, query)?);
        }
        Ok(hits)
    }

    async fn distinct_sources(&self) -> Result<usize> {
        let Some(t) = self.table().await? else { return Ok(0) };
        let mut stream = t.query().execute().await?;
        let mut sources = BTreeSet::new();
        while let Some(batch) = stream.try_next().await? {
            let col = string_column(&batch, schema::SOURCE_ID)?;
            for i in 0..batch.num_rows() {
                if col.is_valid(i) {
                    sources.insert(col.value(i).to_string());
                }
            }
        }
        Ok(sources.len())
    }
}

fn entries_to_record_batch(entries: &[VectorEntry], dim: usize) -> Result<RecordBatch> {
    let mut ids = Vec::with_capacity(entries.len());
    let mut sources = Vec::with_capacity(entries.len());
    let mut texts = Vec::with_capacity(entries.len());
    let mut metas = Vec::with_capacity(entries.len());
    let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(entries.len());
    for e in entries {
        ids.push(e.id.clone());
        sources.push(e.source_id().map(str::to_string));
        texts.push(e.text.clone());
        metas.push(serde_json::to_string(&e.metadata)?);
        vectors.push(Some(e.vector.iter().map(|&x| Some(x)).collect()));
    }
    let dim = i32::try_from(dim)?;
    Ok(RecordBatch::try_new(
        build_chunk_schema(dim),
        vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(StringArray::from(sources)),
            Arc::new(StringArray::from(texts)),
            Arc::new(StringArray::from(metas)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors.into_iter(), dim)),
        ],
    )?)
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow!("{name} column missing"))
}

/// Rows to hits, rescored with the local cosine so ordering matches the other stores.
fn hits_from_batch(batch: &RecordBatch, query: &[f32]) -> Result<Vec<SearchHit>> {
    let ids = string_column(batch, schema::ID)?;
    let texts = string_column(batch, schema::TEXT)?;
    let metas = string_column(batch, schema::METADATA)?;
    let vectors = batch
        .column_by_name(schema::VECTOR)
        .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
        .ok_or_else(|| anyhow!("vector column missing"))?;
    let mut hits = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let list = vectors.value(i);
        let vector = list.as_primitive::<arrow_array::types::Float32Type>().values();
        let metadata: Meta = serde_json::from_str(metas.value(i))?;
        hits.push(SearchHit {
            id: ids.value(i).to_string(),
            text: texts.value(i).to_string(),
            metadata,
            score: cosine_similarity(query, vector),
        });
    }
    Ok(hits)
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    async fn upsert(&self, entries: Vec<VectorEntry>) -> ragflow_core::Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let stored = self.dimension().await.map_err(Error::store)?;
        let Some(dim) = batch_dimension(&entries, stored)? else { return Ok(()) };
        self.write(&entries, dim).await.map_err(Error::store)
    }

    async fn search(&self, query: &[f32], k: usize) -> ragflow_core::Result<Vec<SearchHit>> {
        if k == 0 {
            return Err(Error::InvalidConfiguration("k must be greater than zero".into()));
        }
        let Some(dim) = self.dimension().await.map_err(Error::store)? else { return Ok(Vec::new()) };
        if query.len() != dim {
            return Err(Error::DimensionMismatch { expected: dim, actual: query.len() });
        }
        let candidates = self.candidates(query, k.saturating_mul(OVERFETCH)).await.map_err(Error::store)?;
        Ok(top_k(candidates, k))
    }

    async fn count(&self) -> ragflow_core::Result<usize> {
        self.rows().await.map_err(Error::store)
    }

    async fn document_count(&self) -> ragflow_core::Result<usize> {
        self.distinct_sources().await.map_err(Error::store)
    }

    async fn clear(&self) -> ragflow_core::Result<()> {
        for name in [&self.table_name, &self.meta_table] {
            if self.open_if_exists(name).await.map_err(Error::store)?.is_some() {
                self.db.drop_table(name).await.map_err(Error::store)?;
            }
        }
        Ok(())
    }

    async fn embedding_model(&self) -> ragflow_core::Result<Option<String>> {
        if self.rows().await.map_err(Error::store)? == 0 {
            return Ok(None);
        }
        self.get_meta(MODEL_KEY).await.map_err(Error::store)
    }

    async fn bind_model(&self, model_id: &str) -> ragflow_core::Result<()> {
        let stored = self.get_meta(MODEL_KEY).await.map_err(Error::store)?;
        if stored.as_deref() == Some(model_id) {
            return Ok(());
        }
        if self.rows().await.map_err(Error::store)? > 0 {
            ensure_same_model(stored.as_deref(), model_id)?;
        }
        self.set_meta(MODEL_KEY, model_id).await.map_err(Error::store)
    }
}
