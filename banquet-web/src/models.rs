use axum::http::header::ACCEPT;
use axum::http::HeaderMap;
use banquet_core::forms::FormErrors;
use banquet_core::ListingDetail;
use serde::Serialize;

use crate::session::{Flash, Session, SessionUser};

/// True when the caller asked for a JSON acknowledgement instead of a page.
pub fn wants_json(headers: &HeaderMap) -> bool {
    let ajax = headers
        .get("x-requested-with")
        .and_then(|v| v.to_str().ok())
        .map_or(false, |v| v.eq_ignore_ascii_case("XMLHttpRequest"));
    let accepts_json = headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |v| v.contains("application/json"));
    ajax || accepts_json
}

/// `{ "success": ..., "message": ..., "errors": ... }`
#[derive(Debug, Clone, Serialize)]
pub struct Ack {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FormErrors>,
}

impl Ack {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            errors: None,
        }
    }

    pub fn invalid(errors: FormErrors) -> Self {
        Self {
            success: false,
            message: None,
            errors: Some(errors),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            errors: None,
        }
    }
}

/// Per-page data every template receives: who is signed in and pending flashes.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub user: Option<SessionUser>,
    pub flashes: Vec<Flash>,
}

impl PageContext {
    /// Reads the user and drains pending flashes.
    pub fn from_session(session: &Session) -> Self {
        Self {
            user: session.user(),
            flashes: session.take_flashes(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

impl SelectOption {
    pub fn list<'a, I>(choices: I, current: &str) -> Vec<SelectOption>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        choices
            .into_iter()
            .map(|(value, label)| SelectOption {
                value: value.to_string(),
                label: label.to_string(),
                selected: value == current.trim(),
            })
            .collect()
    }
}

/// A listing flattened for display.
#[derive(Debug, Clone)]
pub struct ListingCard {
    pub id: i64,
    pub name: String,
    pub owner_name: String,
    pub email: String,
    pub phone: String,
    pub capacity: i64,
    pub location: String,
    pub google_link: Option<String>,
    pub services: Vec<String>,
    pub price: Option<i64>,
    pub image_urls: Vec<String>,
}

impl ListingCard {
    pub fn cover_url(&self) -> Option<&str> {
        self.image_urls.first().map(String::as_str)
    }
}

impl From<ListingDetail> for ListingCard {
    fn from(detail: ListingDetail) -> Self {
        let listing = detail.listing;
        let services = listing
            .services
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            id: listing.id,
            name: listing.name,
            owner_name: listing.owner_name,
            email: listing.email,
            phone: listing.phone,
            capacity: listing.capacity,
            location: listing.location,
            google_link: listing.google_link,
            services,
            price: listing.price,
            image_urls: detail
                .images
                .into_iter()
                .map(|image| format!("/media/{}", image.image_key))
                .collect(),
        }
    }
}
