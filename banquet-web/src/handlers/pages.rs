use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use banquet_core::constants::{FUNCTION_TYPES, KANPUR_AREAS};
use banquet_core::domain::listing_query::ListingFilterParams;
use banquet_core::ListingQuery;
use serde_json::json;
use tracing::info;

use super::render;
use crate::error::AppError;
use crate::models::{ListingCard, PageContext, SelectOption};
use crate::session::Session;
use crate::state::AppState;
use crate::templates::{AboutTemplate, BanquetDetailTemplate, BanquetListTemplate, ErrorTemplate, LandingTemplate};

/// Landing page: every listing, narrowed by whichever filters were supplied.
pub async fn landing(
    State(state): State<AppState>,
    session: Session,
    params: Option<Query<ListingFilterParams>>,
) -> Result<Response, AppError> {
    let params = params.map(|Query(p)| p).unwrap_or_default();
    let query = ListingQuery::from_params(&params);
    let listings = state.storage.list_listings(&query).await?;

    if !query.is_unfiltered() {
        info!("Listing filter {:?} matched {} venues", query, listings.len());
    }

    let template = LandingTemplate {
        ctx: PageContext::from_session(&session),
        listings: listings.into_iter().map(ListingCard::from).collect(),
        areas: SelectOption::list(
            KANPUR_AREAS.iter().map(|a| (*a, *a)),
            params.area.as_deref().unwrap_or_default(),
        ),
        function_types: SelectOption::list(
            FUNCTION_TYPES.iter().map(|f| (*f, *f)),
            params.function_type.as_deref().unwrap_or_default(),
        ),
        location: params.location.unwrap_or_default(),
        guests: params.guests.unwrap_or_default(),
        ignored_guests: query.ignored_guests.clone(),
        filtered: !query.is_unfiltered(),
    };
    render(&template)
}

pub async fn about(session: Session) -> AboutTemplate {
    AboutTemplate {
        ctx: PageContext::from_session(&session),
    }
}

pub async fn banquet_index(State(state): State<AppState>, session: Session) -> Result<Response, AppError> {
    let listings = state.storage.list_listings(&ListingQuery::default()).await?;
    render(&BanquetListTemplate {
        ctx: PageContext::from_session(&session),
        listings: listings.into_iter().map(ListingCard::from).collect(),
    })
}

pub async fn banquet_detail(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let detail = match id.parse::<i64>() {
        Ok(id) => state.storage.get_listing(id).await?,
        Err(_) => None,
    };

    match detail {
        Some(detail) => render(&BanquetDetailTemplate {
            ctx: PageContext::from_session(&session),
            listing: ListingCard::from(detail),
        }),
        None => Ok(not_found(&session)),
    }
}

pub fn not_found(session: &Session) -> Response {
    let page = ErrorTemplate {
        ctx: PageContext::from_session(session),
        title: "Page not found".to_string(),
        message: "The page you were looking for does not exist.".to_string(),
    };
    (StatusCode::NOT_FOUND, page).into_response()
}

pub async fn fallback(session: Session) -> Response {
    not_found(&session)
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
