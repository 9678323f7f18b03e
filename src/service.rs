use crate::db::JsonFileStore;
use crate::errors::{AppError, AppResult};
use crate::models::{CreateTodoPayload, SuccessResponse, Todo, TodoDocument, UpdateTodoPayload};
use chrono::{SecondsFormat, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;

/// CRUD over the todo collection. Every operation re-reads the backing file and
/// mutating operations write the whole document back, all under one lock so
/// concurrent requests cannot interleave their read-modify-write cycles.
#[derive(Clone)]
pub struct TodoService {
    store: Arc<Mutex<JsonFileStore>>,
}

impl TodoService {
    pub fn new(store: JsonFileStore) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
        }
    }

    /// Loads the store once so the backing file exists before the first request.
    pub async fn initialize(&self) -> AppResult<usize> {
        let store = self.store.lock().await;
        let document = store.load().await?;
        Ok(document.todos.len())
    }

    pub async fn list(&self) -> AppResult<Vec<Todo>> {
        let store = self.store.lock().await;
        Ok(store.load().await?.todos)
    }

    pub async fn create(&self, payload: CreateTodoPayload) -> AppResult<Todo> {
        let text = payload
            .text
            .ok_or_else(|| AppError::Validation("Todo text is required".to_string()))?;
        validate_text(&text)?;

        let store = self.store.lock().await;
        let mut document = store.load().await?;
        let now = Utc::now();
        let todo = Todo {
            id: next_id(&document, now.timestamp_millis())?,
            text,
            completed: false,
            created_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        document.todos.push(todo.clone());
        store.save(&document).await?;

        tracing::debug!(todo_id = todo.id, "todo created");
        Ok(todo)
    }

    pub async fn update(&self, id: u64, patch: UpdateTodoPayload) -> AppResult<Todo> {
        if let Some(text) = patch.text.as_deref() {
            validate_text(text)?;
        }

        let store = self.store.lock().await;
        let mut document = store.load().await?;
        let todo = document
            .todos
            .iter_mut()
            .find(|todo| todo.id == id)
            .ok_or_else(|| not_found(id))?;

        if let Some(text) = patch.text {
            todo.text = text;
        }
        if let Some(completed) = patch.completed {
            todo.completed = completed;
        }
        let updated = todo.clone();
        store.save(&document).await?;

        tracing::debug!(todo_id = id, completed = updated.completed, "todo updated");
        Ok(updated)
    }

    pub async fn delete(&self, id: u64) -> AppResult<SuccessResponse> {
        let store = self.store.lock().await;
        let mut document = store.load().await?;
        let index = document
            .todos
            .iter()
            .position(|todo| todo.id == id)
            .ok_or_else(|| not_found(id))?;
        document.todos.remove(index);
        store.save(&document).await?;

        tracing::debug!(todo_id = id, "todo deleted");
        Ok(SuccessResponse { success: true })
    }
}

fn validate_text(text: &str) -> AppResult<()> {
    if text.trim().is_empty() {
        return Err(AppError::Validation("Todo text cannot be empty".to_string()));
    }
    Ok(())
}

fn not_found(id: u64) -> AppError {
    AppError::NotFound(format!("Todo {} not found", id))
}

/// Millisecond clock, bumped past the largest existing id when the clock has
/// not advanced far enough to be unique.
fn next_id(document: &TodoDocument, now_millis: i64) -> AppResult<u64> {
    let candidate = u64::try_from(now_millis).unwrap_or(1).max(1);
    match document.todos.iter().map(|todo| todo.id).max() {
        Some(max_id) if candidate <= max_id => max_id
            .checked_add(1)
            .ok_or_else(|| AppError::Internal("Todo id space exhausted".to_string())),
        _ => Ok(candidate),
    }
}
