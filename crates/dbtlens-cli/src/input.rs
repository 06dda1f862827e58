//! Reading model files, or stdin when the path is `-`.

use anyhow::{Context, Result};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Placeholder path meaning "read from stdin".
pub const STDIN_PATH: &str = "-";

/// A model read from disk or stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSource {
    /// Path as given on the command line.
    pub name: String,
    /// `file://` URI the engine knows the model by.
    pub uri: String,
    pub content: String,
}

pub fn read_models(files: &[PathBuf]) -> Result<Vec<ModelSource>> {
    files.iter().map(|path| read_model(path)).collect()
}

pub fn read_model(path: &Path) -> Result<ModelSource> {
    if path == Path::new(STDIN_PATH) {
        return read_from_stdin();
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    Ok(ModelSource {
        name: path.display().to_string(),
        uri: file_uri(path)?,
        content,
    })
}

fn read_from_stdin() -> Result<ModelSource> {
    let mut content = String::new();
    io::stdin()
        .read_to_string(&mut content)
        .context("Failed to read from stdin")?;

    Ok(ModelSource {
        name: "<stdin>".to_string(),
        uri: "file:///stdin.sql".to_string(),
        content,
    })
}

/// `file://` URI for `path`, made absolute against the working directory.
pub fn file_uri(path: &Path) -> Result<String> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .context("Failed to resolve working directory")?
            .join(path)
    };
    Ok(format!("file://{}", absolute.display()))
}
