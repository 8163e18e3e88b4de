/// Record ingestion.
///
/// Submodules:
/// - `record`: raw tokenized rows, their self-validation, and JSON loading.

pub mod record;
