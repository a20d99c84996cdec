use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use banquet_core::BanquetError;
use thiserror::Error;
use tracing::error;

use crate::models::{wants_json, Ack, PageContext};
use crate::templates::ErrorTemplate;

pub const APOLOGY: &str = "Sorry, something went wrong on our side. Please try again later.";

/// Unexpected failures while serving a request. Validation problems never
/// reach this type; they are answered with the form and its errors.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] BanquetError),

    #[error("Template rendering failed: {0}")]
    Template(#[from] askama::Error),
}

/// Marks a response produced by [`AppError`] so it can be re-shaped as JSON.
#[derive(Clone, Copy)]
struct Apology;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("Request failed: {}", self);

        let page = ErrorTemplate {
            ctx: PageContext::default(),
            title: "Something went wrong".to_string(),
            message: APOLOGY.to_string(),
        };
        let mut response = (StatusCode::INTERNAL_SERVER_ERROR, page).into_response();
        response.extensions_mut().insert(Apology);
        response
    }
}

/// Swap the apology page for a JSON body when the caller wants JSON.
pub async fn negotiate_apology(req: Request, next: Next) -> Response {
    let json = wants_json(req.headers());
    let response = next.run(req).await;
    if json && response.extensions().get::<Apology>().is_some() {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(Ack::failed(APOLOGY))).into_response();
    }
    response
}
