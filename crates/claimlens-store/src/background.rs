//! Background reference dataset for the attribution engine.
//!
//! A Parquet file with one Float32 column per embedding dimension
//! (`nlp_0` … `nlp_383`), holding a sample of training-set embeddings. The
//! column names and order must match the feature schema the regressor was
//! trained on; this is validated here, at load time.

use std::path::Path;

use arrow::array::{Array, Float32Array};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tracing::info;

use claimlens_core::feature_names;

use crate::StoreError;

/// Background reference rows, materialized as dense vectors.
#[derive(Debug)]
pub struct BackgroundData {
    rows: Vec<Vec<f32>>,
    dim: usize,
}

impl BackgroundData {
    /// Read the background table from a Parquet file and validate it against
    /// the 384-wide feature schema.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Err(StoreError::ParquetNotFound(path.to_path_buf()));
        }
        let batches = read_parquet(path)?;
        let data = Self::from_batches(&batches, &feature_names())?;
        info!(
            rows = data.len(),
            dim = data.dim(),
            path = %path.display(),
            "loaded background reference data"
        );
        Ok(data)
    }

    /// Build from in-memory batches, validating column names against
    /// `expected_names` in order.
    pub fn from_batches(
        batches: &[RecordBatch],
        expected_names: &[String],
    ) -> Result<Self, StoreError> {
        let first = batches.first().ok_or(StoreError::Empty)?;

        let actual: Vec<&str> = first
            .schema_ref()
            .fields()
            .iter()
            .map(|f| f.name().as_str())
            .collect();
        check_names(&actual, expected_names)?;

        let dim = expected_names.len();
        let mut rows = Vec::new();

        for batch in batches {
            let columns: Vec<&Float32Array> = (0..dim)
                .map(|c| {
                    batch
                        .column(c)
                        .as_any()
                        .downcast_ref::<Float32Array>()
                        .ok_or_else(|| StoreError::NotFloat32(expected_names[c].clone()))
                })
                .collect::<Result<_, _>>()?;

            for row in 0..batch.num_rows() {
                let mut v = Vec::with_capacity(dim);
                for col in &columns {
                    v.push(if col.is_null(row) { 0.0 } else { col.value(row) });
                }
                rows.push(v);
            }
        }

        if rows.is_empty() {
            return Err(StoreError::Empty);
        }
        Ok(Self { rows, dim })
    }

    pub fn rows(&self) -> &[Vec<f32>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }
}

fn check_names(actual: &[&str], expected: &[String]) -> Result<(), StoreError> {
    if actual.len() != expected.len() {
        return Err(claimlens_core::SchemaError::WrongWidth {
            expected: expected.len(),
            got: actual.len(),
        }
        .into());
    }
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        if *a != e.as_str() {
            return Err(claimlens_core::SchemaError::NameMismatch {
                index: i,
                expected: e.clone(),
                got: a.to_string(),
            }
            .into());
        }
    }
    Ok(())
}

/// Read a Parquet file into Arrow RecordBatches.
pub fn read_parquet(path: &Path) -> Result<Vec<RecordBatch>, StoreError> {
    let file = std::fs::File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let batches: Result<Vec<RecordBatch>, _> = reader.collect();
    Ok(batches?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::{DataType, Field, Schema};
    use parquet::arrow::ArrowWriter;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn small_names(dim: usize) -> Vec<String> {
        (0..dim).map(claimlens_core::feature_name).collect()
    }

    fn small_batch(rows: &[[f32; 3]]) -> RecordBatch {
        let schema = Schema::new(
            small_names(3)
                .into_iter()
                .map(|n| Field::new(n, DataType::Float32, false))
                .collect::<Vec<_>>(),
        );
        let columns: Vec<Arc<dyn Array>> = (0..3)
            .map(|c| {
                Arc::new(Float32Array::from(
                    rows.iter().map(|r| r[c]).collect::<Vec<f32>>(),
                )) as Arc<dyn Array>
            })
            .collect();
        RecordBatch::try_new(Arc::new(schema), columns).unwrap()
    }

    #[test]
    fn from_batches_materializes_rows() {
        let batch = small_batch(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        let data = BackgroundData::from_batches(&[batch], &small_names(3)).unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data.dim(), 3);
        assert_eq!(data.rows()[0], vec![1.0, 2.0, 3.0]);
        assert_eq!(data.rows()[1], vec![4.0, 5.0, 6.0]);
    }

    #[test]
    fn empty_batches_rejected() {
        match BackgroundData::from_batches(&[], &small_names(3)) {
            Err(StoreError::Empty) => {}
            other => panic!("expected Empty, got {:?}", other.map(|d| d.len())),
        }
    }

    #[test]
    fn misnamed_columns_rejected() {
        let batch = small_batch(&[[1.0, 2.0, 3.0]]);
        let wrong = vec!["nlp_0".to_string(), "emb_1".to_string(), "nlp_2".to_string()];
        match BackgroundData::from_batches(&[batch], &wrong) {
            Err(StoreError::Schema(_)) => {}
            other => panic!("expected Schema error, got {:?}", other.map(|d| d.len())),
        }
    }

    #[test]
    fn load_missing_file_is_parquet_not_found() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shap_background.parquet");
        match BackgroundData::load(&path) {
            Err(StoreError::ParquetNotFound(p)) => assert_eq!(p, path),
            other => panic!("expected ParquetNotFound, got {:?}", other.map(|d| d.len())),
        }
    }

    #[test]
    fn parquet_round_trip_full_width() {
        // Full 384-column file through the real load path.
        let schema = Arc::new(claimlens_core::schema::background_schema());
        let columns: Vec<Arc<dyn Array>> = (0..claimlens_core::EMBED_DIM)
            .map(|c| {
                Arc::new(Float32Array::from(vec![c as f32 * 0.5, -(c as f32)]))
                    as Arc<dyn Array>
            })
            .collect();
        let batch = RecordBatch::try_new(schema.clone(), columns).unwrap();

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shap_background.parquet");
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let data = BackgroundData::load(&path).unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data.dim(), claimlens_core::EMBED_DIM);
        assert_eq!(data.rows()[0][10], 5.0);
        assert_eq!(data.rows()[1][10], -10.0);
    }
}
