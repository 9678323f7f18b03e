use crate::models::{CreateTodoPayload, ErrorBody, SuccessResponse, Todo, UpdateTodoPayload};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("TRANSPORT: {0}")]
    Transport(String),
    #[error("HTTP_{status}: {message}")]
    Status { status: u16, message: String },
    #[error("DECODE: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            Self::Decode(value.to_string())
        } else {
            Self::Transport(value.to_string())
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

#[async_trait]
pub trait TodoApi: Send + Sync + 'static {
    async fn list(&self) -> ClientResult<Vec<Todo>>;
    async fn create(&self, payload: &CreateTodoPayload) -> ClientResult<Todo>;
    async fn update(&self, id: u64, patch: &UpdateTodoPayload) -> ClientResult<Todo>;
    async fn delete(&self, id: u64) -> ClientResult<SuccessResponse>;
}

/// `TodoApi` over the JSON HTTP endpoints.
#[derive(Debug, Clone)]
pub struct HttpTodoApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTodoApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    fn collection_url(&self) -> String {
        format!("{}/api/todos", self.base_url)
    }

    fn item_url(&self, id: u64) -> String {
        format!("{}/api/todos/{}", self.base_url, id)
    }
}

async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
    let status = response.status();
    if !status.is_success() {
        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.message,
            Err(_) => status.canonical_reason().unwrap_or("request failed").to_string(),
        };
        return Err(ClientError::Status {
            status: status.as_u16(),
            message,
        });
    }
    response.json::<T>().await.map_err(ClientError::from)
}

#[async_trait]
impl TodoApi for HttpTodoApi {
    async fn list(&self) -> ClientResult<Vec<Todo>> {
        let response = self.client.get(self.collection_url()).send().await?;
        decode(response).await
    }

    async fn create(&self, payload: &CreateTodoPayload) -> ClientResult<Todo> {
        let response = self.client.post(self.collection_url()).json(payload).send().await?;
        decode(response).await
    }

    async fn update(&self, id: u64, patch: &UpdateTodoPayload) -> ClientResult<Todo> {
        let response = self.client.put(self.item_url(id)).json(patch).send().await?;
        decode(response).await
    }

    async fn delete(&self, id: u64) -> ClientResult<SuccessResponse> {
        let response = self.client.delete(self.item_url(id)).send().await?;
        decode(response).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoState {
    pub todos: Vec<Todo>,
    pub is_loading: bool,
}

impl Default for TodoState {
    fn default() -> Self {
        Self {
            todos: Vec::new(),
            is_loading: true,
        }
    }
}

struct StoreInner<A> {
    api: A,
    state: watch::Sender<TodoState>,
    activated: AtomicBool,
}

/// Client-side mirror of the server collection. Every change is published
/// through a `watch` channel; API failures are logged and turned into
/// `None`/`false` rather than surfaced as errors.
pub struct TodoStore<A> {
    inner: Arc<StoreInner<A>>,
}

impl<A> Clone for TodoStore<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: TodoApi> TodoStore<A> {
    pub fn new(api: A) -> Self {
        let (state, _) = watch::channel(TodoState::default());
        Self {
            inner: Arc::new(StoreInner {
                api,
                state,
                activated: AtomicBool::new(false),
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<TodoState> {
        self.inner.state.subscribe()
    }

    pub fn snapshot(&self) -> TodoState {
        self.inner.state.borrow().clone()
    }

    pub fn todos(&self) -> Vec<Todo> {
        self.inner.state.borrow().todos.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().is_loading
    }

    /// Starts the initial load on first call; later calls return `None`.
    pub fn activate(&self) -> Option<JoinHandle<()>> {
        if self.inner.activated.swap(true, Ordering::SeqCst) {
            return None;
        }
        let store = self.clone();
        Some(tokio::spawn(async move { store.load_todos().await }))
    }

    pub async fn load_todos(&self) {
        self.inner.state.send_modify(|state| state.is_loading = true);
        let result = self.inner.api.list().await;
        self.inner.state.send_modify(|state| {
            match result {
                Ok(todos) => state.todos = todos,
                Err(error) => tracing::error!(error = %error, "failed to load todos"),
            }
            state.is_loading = false;
        });
    }

    pub async fn add_todo(&self, text: impl Into<String>) -> Option<Todo> {
        let payload = CreateTodoPayload::new(text);
        match self.inner.api.create(&payload).await {
            Ok(todo) => {
                self.inner.state.send_modify(|state| state.todos.push(todo.clone()));
                Some(todo)
            }
            Err(error) => {
                tracing::error!(error = %error, "failed to add todo");
                None
            }
        }
    }

    pub async fn update_todo(&self, id: u64, patch: UpdateTodoPayload) -> Option<Todo> {
        match self.inner.api.update(id, &patch).await {
            Ok(updated) => {
                self.inner.state.send_modify(|state| {
                    if let Some(entry) = state.todos.iter_mut().find(|todo| todo.id == id) {
                        *entry = updated.clone();
                    }
                });
                Some(updated)
            }
            Err(error) => {
                tracing::error!(todo_id = id, error = %error, "failed to update todo");
                None
            }
        }
    }

    /// Returns whether the server acknowledged the delete.
    pub async fn remove_todo(&self, id: u64) -> bool {
        match self.inner.api.delete(id).await {
            Ok(_) => {
                self.inner.state.send_modify(|state| state.todos.retain(|todo| todo.id != id));
                true
            }
            Err(error) => {
                tracing::error!(todo_id = id, error = %error, "failed to remove todo");
                false
            }
        }
    }

    pub async fn toggle_todo(&self, id: u64) -> Option<Todo> {
        let completed = self
            .inner
            .state
            .borrow()
            .todos
            .iter()
            .find(|todo| todo.id == id)
            .map(|todo| todo.completed)?;
        self.update_todo(id, UpdateTodoPayload::completed(!completed)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    /// In-memory API double; `offline` makes every call fail like a dropped
    /// connection.
    #[derive(Default)]
    struct FakeApi {
        todos: StdMutex<Vec<Todo>>,
        offline: AtomicBool,
    }

    impl FakeApi {
        fn seeded(todos: Vec<Todo>) -> Self {
            Self {
                todos: StdMutex::new(todos),
                offline: AtomicBool::new(false),
            }
        }

        fn check_online(&self) -> ClientResult<()> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(ClientError::Transport("connection refused".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl TodoApi for FakeApi {
        async fn list(&self) -> ClientResult<Vec<Todo>> {
            self.check_online()?;
            Ok(self.todos.lock().expect("lock").clone())
        }

        async fn create(&self, payload: &CreateTodoPayload) -> ClientResult<Todo> {
            self.check_online()?;
            let mut todos = self.todos.lock().expect("lock");
            let todo = sample(todos.len() as u64 + 1, payload.text.as_deref().unwrap_or_default(), false);
            todos.push(todo.clone());
            Ok(todo)
        }

        async fn update(&self, id: u64, patch: &UpdateTodoPayload) -> ClientResult<Todo> {
            self.check_online()?;
            let mut todos = self.todos.lock().expect("lock");
            let todo = todos.iter_mut().find(|todo| todo.id == id).ok_or(ClientError::Status {
                status: 404,
                message: "not found".to_string(),
            })?;
            if let Some(completed) = patch.completed {
                todo.completed = completed;
            }
            if let Some(text) = &patch.text {
                todo.text = text.clone();
            }
            Ok(todo.clone())
        }

        async fn delete(&self, id: u64) -> ClientResult<SuccessResponse> {
            self.check_online()?;
            let mut todos = self.todos.lock().expect("lock");
            let before = todos.len();
            todos.retain(|todo| todo.id != id);
            if todos.len() == before {
                return Err(ClientError::Status {
                    status: 404,
                    message: "not found".to_string(),
                });
            }
            Ok(SuccessResponse { success: true })
        }
    }

    fn sample(id: u64, text: &str, completed: bool) -> Todo {
        Todo {
            id,
            text: text.to_string(),
            completed,
            created_at: "2024-01-01T00:00:00.000Z".to_string(),
        }
    }

    #[tokio::test]
    async fn activation_loads_once_and_clears_loading() {
        let store = TodoStore::new(FakeApi::seeded(vec![sample(1, "a", false)]));
        assert!(store.is_loading());

        store.activate().expect("first activation").await.expect("join");
        assert!(store.activate().is_none());

        let state = store.snapshot();
        assert!(!state.is_loading);
        assert_eq!(state.todos, vec![sample(1, "a", false)]);
    }

    #[tokio::test]
    async fn failed_load_keeps_previous_state_and_clears_loading() {
        let store = TodoStore::new(FakeApi::seeded(vec![sample(1, "a", false)]));
        store.load_todos().await;
        store.inner.api.offline.store(true, Ordering::SeqCst);

        store.load_todos().await;
        assert_eq!(store.todos(), vec![sample(1, "a", false)]);
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn add_todo_failure_returns_none_and_keeps_state() {
        let store = TodoStore::new(FakeApi::seeded(vec![sample(1, "a", false)]));
        store.load_todos().await;
        store.inner.api.offline.store(true, Ordering::SeqCst);

        assert!(store.add_todo("buy milk").await.is_none());
        assert_eq!(store.todos().len(), 1);
    }

    #[tokio::test]
    async fn add_update_toggle_and_remove_mirror_server() {
        let store = TodoStore::new(FakeApi::default());
        let mut updates = store.subscribe();
        store.load_todos().await;

        let created = store.add_todo("buy milk").await.expect("created");
        assert!(updates.has_changed().expect("sender alive"));
        updates.mark_unchanged();
        assert_eq!(store.todos(), vec![created.clone()]);

        let toggled = store.toggle_todo(created.id).await.expect("toggled");
        assert!(toggled.completed);
        assert!(store.todos()[0].completed);

        let renamed = store
            .update_todo(created.id, UpdateTodoPayload::text("buy oat milk"))
            .await
            .expect("renamed");
        assert_eq!(store.todos(), vec![renamed]);

        assert!(store.remove_todo(created.id).await);
        assert!(store.todos().is_empty());
        assert!(updates.has_changed().expect("sender alive"));
    }

    #[tokio::test]
    async fn failures_leave_local_state_untouched() {
        let store = TodoStore::new(FakeApi::seeded(vec![sample(1, "a", false)]));
        store.load_todos().await;

        assert!(store.update_todo(99, UpdateTodoPayload::completed(true)).await.is_none());
        assert!(!store.remove_todo(99).await);
        assert!(store.toggle_todo(99).await.is_none());

        store.inner.api.offline.store(true, Ordering::SeqCst);
        assert!(!store.remove_todo(1).await);
        assert!(store.toggle_todo(1).await.is_none());
        assert_eq!(store.todos(), vec![sample(1, "a", false)]);
    }
}
