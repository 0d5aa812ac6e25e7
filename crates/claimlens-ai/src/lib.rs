//! Inference layer: ONNX Runtime embeddings, gradient-boosted regression,
//! and TreeSHAP attribution.

mod booster;
mod explain;
mod sidecar;

pub use booster::{Booster, BoosterError};
pub use explain::{Attribution, ExplainError, TreeShap};
pub use sidecar::{ExplainerSidecar, SidecarError};

#[cfg(feature = "onnx")]
mod embedder;
#[cfg(feature = "onnx")]
pub use embedder::{EmbedError, Embedder};
