use axum::extract::{Form, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use banquet_core::auth::{hash_password, verify_password};
use banquet_core::forms::{is_safe_redirect, FormErrors, LoginForm, SignupForm};
use banquet_core::{BanquetError, NewListing, NewUser};
use serde::Deserialize;
use tracing::{info, warn};

use super::{form_accepted, form_invalid, render};
use crate::error::AppError;
use crate::models::{wants_json, PageContext};
use crate::session::{FlashLevel, Session};
use crate::state::AppState;
use crate::templates::{LoginTemplate, SignupTemplate};

pub const USERNAME_TAKEN: &str = "A user with that username already exists.";
pub const BAD_CREDENTIALS: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";

#[derive(Debug, Default, Deserialize)]
pub struct NextParam {
    pub next: Option<String>,
}

pub async fn signup_page(session: Session) -> Result<Response, AppError> {
    render(&SignupTemplate {
        ctx: PageContext::from_session(&session),
        form: SignupForm::default(),
        errors: FormErrors::new(),
    })
}

pub async fn signup(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<SignupForm>,
) -> Result<Response, AppError> {
    let json = wants_json(&headers);
    let page = |form: SignupForm| move |ctx, errors| SignupTemplate { ctx, form, errors };

    let valid = match form.validate() {
        Ok(valid) => valid,
        Err(errors) => return form_invalid(&session, json, errors, page(form)),
    };

    let taken = |form: SignupForm| {
        let mut errors = FormErrors::new();
        errors.add("username", USERNAME_TAKEN);
        form_invalid(&session, json, errors, page(form))
    };

    if state.storage.get_user_by_username(&valid.username).await?.is_some() {
        return taken(form);
    }

    let new_user = NewUser {
        username: valid.username,
        password_hash: hash_password(&valid.password)?,
        first_name: valid.first_name,
        last_name: valid.last_name,
        email: valid.email,
    };
    let listing = valid.venue.map(|venue| NewListing {
        owner_id: 0,
        owner_name: String::new(),
        name: venue.name,
        email: new_user.email.clone(),
        phone: String::new(),
        capacity: venue.capacity,
        location: venue.address,
        google_link: None,
        services: None,
        price: venue.price,
    });
    let (user, detail) = match state.storage.create_account(&new_user, listing.as_ref()).await {
        Ok(created) => created,
        Err(BanquetError::UsernameTaken(_)) => return taken(form),
        Err(e) => return Err(e.into()),
    };
    info!("New account created: {}", user.username);

    let message = match detail {
        Some(_) => "Account created successfully! Your banquet has been listed too.",
        None => "Account created successfully! Welcome to Find My Banquet.",
    };

    session.login(&user);
    Ok(form_accepted(&session, json, message.to_string(), "/"))
}

pub async fn login_page(session: Session, params: Option<Query<NextParam>>) -> Result<Response, AppError> {
    let next = params.and_then(|Query(p)| p.next).unwrap_or_default();
    render(&LoginTemplate {
        ctx: PageContext::from_session(&session),
        form: LoginForm {
            next,
            ..Default::default()
        },
        errors: FormErrors::new(),
    })
}

pub async fn login(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    params: Option<Query<NextParam>>,
    Form(mut form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let json = wants_json(&headers);
    if form.next.trim().is_empty() {
        form.next = params.and_then(|Query(p)| p.next).unwrap_or_default();
    }

    let (username, password) = match form.validate() {
        Ok(credentials) => credentials,
        Err(errors) => {
            return form_invalid(&session, json, errors, |ctx, errors| LoginTemplate { ctx, form, errors })
        }
    };

    let user = match state.storage.get_user_by_username(&username).await? {
        Some(user) if verify_password(&password, &user.password_hash)? => user,
        _ => {
            warn!("Failed login attempt for {}", username);
            let mut errors = FormErrors::new();
            errors.add("__all__", BAD_CREDENTIALS);
            if json {
                return form_invalid(&session, json, errors, |ctx, errors| LoginTemplate { ctx, form, errors });
            }
            session.flash(FlashLevel::Error, "Invalid username or password.");
            return render(&LoginTemplate {
                ctx: PageContext::from_session(&session),
                form,
                errors,
            });
        }
    };

    session.login(&user);
    info!("User {} logged in", user.username);

    let target = form.next.trim();
    let target = if is_safe_redirect(target) { target } else { "/" };
    Ok(form_accepted(
        &session,
        json,
        format!("Welcome back, {}!", user.display_name()),
        target,
    ))
}

pub async fn logout(session: Session) -> Response {
    if let Some(user) = session.user() {
        info!("User {} logged out", user.username);
    }
    session.logout();
    session.flash(FlashLevel::Info, "You have been logged out.");
    Redirect::to("/").into_response()
}
