pub mod accounts;
pub mod enquiries;
pub mod listings;
pub mod pages;

use askama::Template;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Json;
use banquet_core::forms::FormErrors;

use crate::error::AppError;
use crate::models::{Ack, PageContext};
use crate::session::{FlashLevel, Session};

pub const FIX_ERRORS: &str = "Please correct the errors below.";

pub(crate) fn render<T: Template>(template: &T) -> Result<Response, AppError> {
    Ok(Html(template.render()?).into_response())
}

/// Answer a rejected form: JSON errors, or the page re-rendered with them.
pub(crate) fn form_invalid<T, F>(session: &Session, json: bool, errors: FormErrors, page: F) -> Result<Response, AppError>
where
    T: Template,
    F: FnOnce(PageContext, FormErrors) -> T,
{
    if json {
        return Ok(Json(Ack::invalid(errors)).into_response());
    }
    session.flash(FlashLevel::Error, FIX_ERRORS);
    render(&page(PageContext::from_session(session), errors))
}

/// Answer an accepted form: JSON acknowledgement, or a flash and a redirect.
pub(crate) fn form_accepted(session: &Session, json: bool, message: String, redirect_to: &str) -> Response {
    if json {
        return Json(Ack::ok(message)).into_response();
    }
    session.flash(FlashLevel::Success, message);
    Redirect::to(redirect_to).into_response()
}
