//! Sample business routes mounted on the test server

use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use keel_core::validation::Validator;
use keel_core::{AppError, DatabaseFailure, HttpError, RequestContext, StorageError, Validate};
use keel_server::{AppState, Dispatch, Empty, FileDownload};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CreateUser {
    #[serde(default)]
    email: String,
    #[serde(default)]
    name: String,
}

impl Validate for CreateUser {
    fn rules(&self, v: &mut Validator) {
        v.field("email", &self.email).required().email();
        v.field("name", &self.name).required().min_len(2);
    }
}

#[derive(Debug, Serialize)]
pub struct User {
    id: String,
    email: String,
    name: String,
}

#[derive(Debug, Deserialize)]
pub struct UserPath {
    id: String,
}

impl Validate for UserPath {
    fn rules(&self, v: &mut Validator) {
        v.field("id", &self.id).required();
    }
}

#[derive(Debug, Serialize)]
pub struct WhoAmI {
    user_id: String,
    role: String,
    request_id: String,
}

async fn create_user(_: AppState, _: RequestContext, input: CreateUser) -> Result<User, AppError> {
    if input.email == "taken@example.com" {
        let failure = DatabaseFailure::new("23505", "duplicate key value violates unique constraint \"users_email_key\"")
            .with_table("users")
            .with_column("email");
        return Err(StorageError::Database(failure).into());
    }

    Ok(User {
        id: "u_1".to_owned(),
        email: input.email,
        name: input.name,
    })
}

async fn get_user(_: AppState, _: RequestContext, input: UserPath) -> Result<User, AppError> {
    if input.id == "missing" {
        return Err(StorageError::NoRows.into());
    }

    Ok(User {
        email: format!("{}@example.com", input.id),
        name: input.id.clone(),
        id: input.id,
    })
}

async fn delete_user(_: AppState, _: RequestContext, _: UserPath) -> Result<(), AppError> {
    Ok(())
}

async fn whoami(_: AppState, ctx: RequestContext, _: Empty) -> Result<WhoAmI, AppError> {
    let identity = ctx
        .identity()
        .ok_or_else(|| HttpError::unauthorized("authentication required"))?;

    Ok(WhoAmI {
        user_id: identity.user_id.clone(),
        role: identity.role.clone(),
        request_id: ctx.request_id().to_owned(),
    })
}

async fn export_report(_: AppState, _: RequestContext, input: UserPath) -> Result<FileDownload, AppError> {
    Ok(FileDownload::new(
        format!("{}.csv", input.id),
        "text/csv",
        "month,total\njan,10\n",
    ))
}

async fn leak(_: AppState, _: RequestContext, _: Empty) -> Result<User, AppError> {
    Err(anyhow::anyhow!("connection to 10.0.0.5 refused, password=hunter2").into())
}

async fn slow(_: AppState, _: RequestContext, _: Empty) -> Result<User, AppError> {
    tokio::time::sleep(Duration::from_secs(5)).await;
    Err(HttpError::internal().into())
}

async fn explode(_: AppState, _: RequestContext, _: Empty) -> Result<User, AppError> {
    panic!("handler exploded");
}

/// Routes exercising every response shape and error path
pub fn app() -> Router<AppState> {
    Router::new()
        .route(
            "/users",
            post(Dispatch::json_with_status("create_user", StatusCode::CREATED, create_user)),
        )
        .route(
            "/users/{id}",
            get(Dispatch::json("get_user", get_user))
                .delete(Dispatch::no_content("delete_user", delete_user).permission("users:delete")),
        )
        .route("/me", get(Dispatch::json("whoami", whoami).authenticated()))
        .route(
            "/reports/{id}",
            get(Dispatch::file("export_report", export_report).permission("reports:read")),
        )
        .route("/leak", get(Dispatch::json("leak", leak)))
        .route("/slow", get(Dispatch::json("slow", slow)))
        .route("/explode", post(Dispatch::json("explode", explode)))
}
