use crate::errors::AppError;
use crate::models::{CreateTodoPayload, ErrorBody, SuccessResponse, Todo, UpdateTodoPayload};
use crate::service::TodoService;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};

pub fn router(service: TodoService) -> Router {
    Router::new()
        .route(
            "/api/todos",
            get(list_todos)
                .post(create_todo)
                .fallback(method_not_allowed),
        )
        .route(
            "/api/todos/{id}",
            put(update_todo)
                .delete(delete_todo)
                .fallback(item_method_not_allowed),
        )
        .with_state(service)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::warn!(error = %self, "request failed with server fault");
        }
        let body = ErrorBody {
            status_code: status.as_u16(),
            message: self.message().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

async fn list_todos(State(service): State<TodoService>) -> Result<Json<Vec<Todo>>, AppError> {
    service.list().await.map(Json)
}

async fn create_todo(
    State(service): State<TodoService>,
    body: Result<Json<CreateTodoPayload>, JsonRejection>,
) -> Result<Json<Todo>, AppError> {
    let Json(payload) = body.map_err(invalid_body)?;
    service.create(payload).await.map(Json)
}

async fn update_todo(
    State(service): State<TodoService>,
    Path(raw_id): Path<String>,
    body: Result<Json<UpdateTodoPayload>, JsonRejection>,
) -> Result<Json<Todo>, AppError> {
    let id = parse_todo_id(&raw_id)?;
    let Json(patch) = body.map_err(invalid_body)?;
    service.update(id, patch).await.map(Json)
}

async fn delete_todo(
    State(service): State<TodoService>,
    Path(raw_id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    let id = parse_todo_id(&raw_id)?;
    service.delete(id).await.map(Json)
}

async fn method_not_allowed(method: Method) -> AppError {
    AppError::MethodNotAllowed(format!("Method {} is not supported", method))
}

/// A malformed id is reported before an unsupported method.
async fn item_method_not_allowed(Path(raw_id): Path<String>, method: Method) -> AppError {
    match parse_todo_id(&raw_id) {
        Ok(_) => method_not_allowed(method).await,
        Err(error) => error,
    }
}

fn parse_todo_id(raw: &str) -> Result<u64, AppError> {
    match raw.parse::<u64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(AppError::Validation(format!("Invalid todo id '{}'", raw))),
    }
}

fn invalid_body(rejection: JsonRejection) -> AppError {
    AppError::Validation(format!("Invalid request body: {}", rejection.body_text()))
}
