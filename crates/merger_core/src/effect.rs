use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StartMerge {
        sources: Vec<PathBuf>,
        destination: PathBuf,
        key_column_index: usize,
        chunk_size: usize,
    },
    CancelMerge,
}
