//! CSV batch ingestion: header/row tokenizing, foreign-key resolution,
//! per-resource row conversion and the row-by-row batch executor.

pub mod batch;
pub mod error;
pub mod resolve;
pub mod rows;
pub mod transform;

pub use batch::run_upload;
pub use transform::{EnumPolicy, RowImport};
