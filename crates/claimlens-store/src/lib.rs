//! Storage layer: the background reference dataset, read once from Parquet.

mod background;
mod error;

pub use background::{BackgroundData, read_parquet};
pub use error::StoreError;
