use crate::errors::{AppError, AppResult};
use crate::models::TodoDocument;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Whole-document JSON store over a single backing file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the full document. A missing, empty, or `null` file is initialized
    /// to an empty collection and written back before returning.
    pub async fn load(&self) -> AppResult<TodoDocument> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => Some(bytes),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => None,
            Err(error) => return Err(AppError::Io(error.to_string())),
        };

        if let Some(document) = bytes.as_deref().map(parse_document).transpose()?.flatten() {
            return Ok(document);
        }

        tracing::info!(path = %self.path.display(), "initializing empty todo collection");
        let document = TodoDocument::default();
        self.save(&document).await?;
        Ok(document)
    }

    /// Replaces the backing file with `document`. Readers see either the old
    /// or the new content, never a partial write.
    pub async fn save(&self, document: &TodoDocument) -> AppResult<()> {
        let bytes = serde_json::to_vec_pretty(document)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&path, &bytes))
            .await
            .map_err(|error| AppError::Internal(error.to_string()))?
    }
}

fn parse_document(bytes: &[u8]) -> AppResult<Option<TodoDocument>> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let document: Option<TodoDocument> = serde_json::from_slice(bytes)
        .map_err(|error| AppError::Internal(format!("corrupt todo store: {}", error)))?;
    Ok(document)
}

fn write_atomically(path: &Path, bytes: &[u8]) -> AppResult<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut staged = tempfile::NamedTempFile::new_in(parent)?;
    staged.write_all(bytes)?;
    // keep the mode of the file being replaced
    if let Ok(existing) = std::fs::metadata(path) {
        staged.as_file().set_permissions(existing.permissions())?;
    }
    staged.as_file().sync_all()?;
    staged.persist(path)?;
    Ok(())
}
