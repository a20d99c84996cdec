use axum::extract::{Form, State};
use axum::http::HeaderMap;
use axum::response::Response;
use banquet_core::constants::TIME_SLOTS;
use banquet_core::forms::{ContactForm, FormErrors, ScheduleCallForm};
use banquet_core::{CallReason, ContactSubject};
use tracing::info;

use super::{form_accepted, form_invalid, render};
use crate::error::AppError;
use crate::models::{wants_json, PageContext, SelectOption};
use crate::session::Session;
use crate::state::AppState;
use crate::templates::{ContactTemplate, ScheduleCallTemplate};

fn schedule_call_page(ctx: PageContext, form: ScheduleCallForm, errors: FormErrors) -> ScheduleCallTemplate {
    let time_slots = SelectOption::list(TIME_SLOTS.iter().map(|s| (*s, *s)), &form.time_slot);
    let reasons = SelectOption::list(
        CallReason::ALL.iter().map(|r| (r.as_str(), r.as_str())),
        &form.reason,
    );
    ScheduleCallTemplate {
        ctx,
        form,
        errors,
        time_slots,
        reasons,
    }
}

fn contact_page(ctx: PageContext, form: ContactForm, errors: FormErrors) -> ContactTemplate {
    let subjects = SelectOption::list(
        ContactSubject::ALL.iter().map(|s| (s.as_str(), s.label())),
        &form.subject,
    );
    ContactTemplate {
        ctx,
        form,
        errors,
        subjects,
    }
}

pub async fn schedule_call_form(session: Session) -> Result<Response, AppError> {
    render(&schedule_call_page(
        PageContext::from_session(&session),
        ScheduleCallForm::default(),
        FormErrors::new(),
    ))
}

pub async fn schedule_call(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<ScheduleCallForm>,
) -> Result<Response, AppError> {
    let json = wants_json(&headers);
    let call = match form.validate() {
        Ok(call) => call,
        Err(errors) => {
            return form_invalid(&session, json, errors, |ctx, errors| schedule_call_page(ctx, form, errors))
        }
    };

    let saved = state.storage.create_call_request(&call).await?;
    info!("Call request {} scheduled for {} {}", saved.id, saved.date, saved.time_slot);

    let message = format!(
        "Your call has been scheduled for {} at {}.",
        saved.date.format("%Y-%m-%d"),
        saved.time_slot
    );
    Ok(form_accepted(&session, json, message, "/"))
}

pub async fn contact_form(session: Session) -> Result<Response, AppError> {
    render(&contact_page(
        PageContext::from_session(&session),
        ContactForm::default(),
        FormErrors::new(),
    ))
}

pub async fn contact(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<ContactForm>,
) -> Result<Response, AppError> {
    let json = wants_json(&headers);
    let message = match form.validate() {
        Ok(message) => message,
        Err(errors) => return form_invalid(&session, json, errors, |ctx, errors| contact_page(ctx, form, errors)),
    };

    let saved = state.storage.create_contact_message(&message).await?;
    info!("Contact message {} received ({})", saved.id, saved.subject.as_str());

    Ok(form_accepted(
        &session,
        json,
        "Thank you for contacting us! We will get back to you soon.".to_string(),
        "/contact",
    ))
}
