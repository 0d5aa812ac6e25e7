//! ONNX Runtime embedding pipeline for FNOL narratives.
//!
//! Maps a free-text accident description to the 384-dim mean-pooled vector
//! of all-MiniLM-L6-v2. The model directory must contain `model.onnx` and
//! `tokenizer.json`. Output is deliberately NOT length-normalized: the
//! downstream regressor was trained on raw mean-pooled encoder output, and
//! normalizing here would silently shift every prediction.

use std::path::Path;

use ort::session::Session;
use ort::value::Tensor;
use thiserror::Error;
use tokenizers::Tokenizer;
use tracing::info;

use claimlens_core::EMBED_DIM;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("model.onnx not found in {0}")]
    ModelNotFound(std::path::PathBuf),

    #[error("tokenizer.json not found in {0}")]
    TokenizerNotFound(std::path::PathBuf),

    #[error(
        "embedding model produces {got}-dim vectors but the feature schema is {expected}-wide"
    )]
    WrongDim { expected: usize, got: usize },

    #[error("tokenizer: {0}")]
    Tokenizer(String),

    #[error("unexpected model output shape {shape:?}")]
    OutputShape { shape: Vec<i64> },

    #[error("onnx runtime: {0}")]
    Ort(#[from] ort::Error),
}

/// Narrative embedder backed by ONNX Runtime.
#[derive(Debug)]
pub struct Embedder {
    session: Session,
    tokenizer: Tokenizer,
    dim: usize,
}

impl Embedder {
    /// Load the embedding model from a directory containing `model.onnx`
    /// and `tokenizer.json`.
    ///
    /// Rejects a model whose output dimension disagrees with the 384-wide
    /// feature schema, so a wrong encoder fails at load rather than at the
    /// predictor's schema check.
    pub fn load(model_dir: &Path) -> Result<Self, EmbedError> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        if !model_path.exists() {
            return Err(EmbedError::ModelNotFound(model_dir.to_path_buf()));
        }
        if !tokenizer_path.exists() {
            return Err(EmbedError::TokenizerNotFound(model_dir.to_path_buf()));
        }

        let session = Session::builder()?.commit_from_file(&model_path)?;

        let dim = infer_dim(session.outputs()[0].dtype()).unwrap_or(EMBED_DIM);
        if dim != EMBED_DIM {
            return Err(EmbedError::WrongDim {
                expected: EMBED_DIM,
                got: dim,
            });
        }

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| EmbedError::Tokenizer(format!("load tokenizer: {e}")))?;

        // MiniLM's max sequence length.
        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: 256,
                ..Default::default()
            }))
            .map_err(|e| EmbedError::Tokenizer(format!("set truncation: {e}")))?;

        // Pad all narratives in a batch to the same length.
        tokenizer.with_padding(Some(tokenizers::PaddingParams {
            ..Default::default()
        }));

        info!(dim, model = %model_path.display(), "loaded embedding model");
        Ok(Self {
            session,
            tokenizer,
            dim,
        })
    }

    /// Embedding dimensionality (384).
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Embed one narrative.
    pub fn embed(&mut self, narrative: &str) -> Result<Vec<f32>, EmbedError> {
        let mut results = self.embed_batch(&[narrative])?;
        Ok(results.pop().unwrap())
    }

    /// Embed a batch of narratives, one mean-pooled vector per input.
    pub fn embed_batch(&mut self, narratives: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if narratives.is_empty() {
            return Ok(vec![]);
        }

        let batch_size = narratives.len();

        let encodings = self
            .tokenizer
            .encode_batch(narratives.to_vec(), true)
            .map_err(|e| EmbedError::Tokenizer(format!("tokenize: {e}")))?;

        let seq_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);

        // Flat input tensors: [batch_size, seq_len].
        let mut input_ids = vec![0i64; batch_size * seq_len];
        let mut attention_mask = vec![0i64; batch_size * seq_len];
        let mut token_type_ids = vec![0i64; batch_size * seq_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let offset = i * seq_len;
            for (j, &id) in encoding.get_ids().iter().enumerate() {
                input_ids[offset + j] = id as i64;
            }
            for (j, &mask) in encoding.get_attention_mask().iter().enumerate() {
                attention_mask[offset + j] = mask as i64;
            }
            for (j, &tid) in encoding.get_type_ids().iter().enumerate() {
                token_type_ids[offset + j] = tid as i64;
            }
        }

        let shape = [batch_size as i64, seq_len as i64];

        let ids_tensor = Tensor::from_array((shape, input_ids.into_boxed_slice()))?;
        let mask_tensor = Tensor::from_array((shape, attention_mask.clone().into_boxed_slice()))?;
        let type_tensor = Tensor::from_array((shape, token_type_ids.into_boxed_slice()))?;

        let outputs = self.session.run(ort::inputs![
            "input_ids" => ids_tensor,
            "attention_mask" => mask_tensor,
            "token_type_ids" => type_tensor,
        ])?;

        // Token embeddings: [batch_size, seq_len, dim].
        let (output_shape, output_data) = outputs[0].try_extract_tensor::<f32>()?;
        let dims: &[i64] = output_shape;
        if dims.len() != 3 || dims[0] as usize != batch_size || dims[2] as usize != self.dim {
            return Err(EmbedError::OutputShape {
                shape: dims.to_vec(),
            });
        }

        let actual_seq_len = dims[1] as usize;

        // Mean pooling with attention mask; no normalization (see module doc).
        let mut embeddings = Vec::with_capacity(batch_size);
        for i in 0..batch_size {
            let mut pooled = vec![0.0f32; self.dim];
            let mut token_count = 0.0f32;

            for j in 0..actual_seq_len {
                let mask_val = attention_mask[i * seq_len + j] as f32;
                if mask_val > 0.0 {
                    let offset = (i * actual_seq_len + j) * self.dim;
                    for (d, p) in pooled.iter_mut().enumerate() {
                        *p += output_data[offset + d] * mask_val;
                    }
                    token_count += mask_val;
                }
            }

            if token_count > 0.0 {
                for p in &mut pooled {
                    *p /= token_count;
                }
            }
            embeddings.push(pooled);
        }

        Ok(embeddings)
    }
}

/// Try to infer the embedding dimension from the ONNX model output type.
fn infer_dim(output_type: &ort::value::ValueType) -> Option<usize> {
    match output_type {
        ort::value::ValueType::Tensor { shape, .. } => shape
            .last()
            .and_then(|&d| if d > 0 { Some(d as usize) } else { None }),
        _ => None,
    }
}
