//! Writing results to plain-text files.

use std::path::{Path, PathBuf};

use humanize_core::export::{export_file_name, SINGLE_RESULT_FILE_NAME};

use crate::batch::CompletedOutput;
use crate::error::StorageError;

/// Write a single result to `dir/humanized_text.txt`.
pub async fn write_single(dir: &Path, text: &str) -> Result<PathBuf, StorageError> {
    write_file(dir, SINGLE_RESULT_FILE_NAME, text).await
}

/// Write one file per completed batch output, named after its source file.
pub async fn write_batch(
    dir: &Path,
    outputs: &[CompletedOutput],
) -> Result<Vec<PathBuf>, StorageError> {
    let mut written = Vec::with_capacity(outputs.len());
    for output in outputs {
        written.push(write_file(dir, &export_file_name(&output.name), &output.output).await?);
    }
    Ok(written)
}

async fn write_file(dir: &Path, file_name: &str, contents: &str) -> Result<PathBuf, StorageError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| StorageError::Io { path, source }
    };

    tokio::fs::create_dir_all(dir).await.map_err(io_err(dir))?;
    let path = dir.join(file_name);
    tokio::fs::write(&path, contents).await.map_err(io_err(&path))?;
    tracing::info!(path = %path.display(), bytes = contents.len(), "Exported result");
    Ok(path)
}
