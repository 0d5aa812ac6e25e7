//! Embedding feature schema shared by the predictor, explainer, and store.
//!
//! The regression model was trained on a 384-column frame named
//! `nlp_0` … `nlp_383`, one column per embedding dimension. Both the model
//! artifact and the background reference table must match these names in
//! this exact order; the match is validated once at load time rather than
//! inferred per request.

use arrow::datatypes::{DataType, Field, Schema};
use thiserror::Error;

/// Embedding dimensionality of all-MiniLM-L6-v2.
pub const EMBED_DIM: usize = 384;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("expected {expected} features, got {got}")]
    WrongWidth { expected: usize, got: usize },

    #[error("feature {index}: expected name {expected:?}, got {got:?}")]
    NameMismatch {
        index: usize,
        expected: String,
        got: String,
    },
}

/// Column name for one embedding dimension.
pub fn feature_name(i: usize) -> String {
    format!("nlp_{i}")
}

/// The full ordered feature-name list the regressor was trained on.
pub fn feature_names() -> Vec<String> {
    (0..EMBED_DIM).map(feature_name).collect()
}

/// Check that `names` is exactly `nlp_0..nlp_383` in order.
pub fn validate_feature_names<S: AsRef<str>>(names: &[S]) -> Result<(), SchemaError> {
    if names.len() != EMBED_DIM {
        return Err(SchemaError::WrongWidth {
            expected: EMBED_DIM,
            got: names.len(),
        });
    }
    for (i, name) in names.iter().enumerate() {
        let expected = feature_name(i);
        if name.as_ref() != expected {
            return Err(SchemaError::NameMismatch {
                index: i,
                expected,
                got: name.as_ref().to_string(),
            });
        }
    }
    Ok(())
}

/// Arrow schema for the background reference table: 384 Float32 columns.
pub fn background_schema() -> Schema {
    let fields: Vec<Field> = (0..EMBED_DIM)
        .map(|i| Field::new(feature_name(i), DataType::Float32, false))
        .collect();
    Schema::new(fields)
}
