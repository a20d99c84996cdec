use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub mod listing_query;

pub use listing_query::ListingQuery;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub date_joined: DateTime<Utc>,
}

impl User {
    /// "First Last", or the username when both names are blank.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueListing {
    pub id: i64,
    pub owner_id: i64,
    pub owner_name: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub capacity: i64,
    pub location: String,
    pub google_link: Option<String>,
    pub services: Option<String>,
    pub price: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewListing {
    pub owner_id: i64,
    pub owner_name: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub capacity: i64,
    pub location: String,
    pub google_link: Option<String>,
    pub services: Option<String>,
    pub price: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueImage {
    pub id: i64,
    pub listing_id: i64,
    /// Key inside the blob store, e.g. `banquet_images/7/<uuid>.jpg`.
    pub image_key: String,
}

/// A listing together with its attached images.
#[derive(Debug, Clone, Serialize)]
pub struct ListingDetail {
    pub listing: VenueListing,
    pub images: Vec<VenueImage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallReason {
    Consultation,
    Support,
    Partnership,
    Other,
}

impl CallReason {
    pub const ALL: [CallReason; 4] = [
        CallReason::Consultation,
        CallReason::Support,
        CallReason::Partnership,
        CallReason::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CallReason::Consultation => "Consultation",
            CallReason::Support => "Support",
            CallReason::Partnership => "Partnership",
            CallReason::Other => "Other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == value.trim())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContactSubject {
    Booking,
    Partnership,
    Support,
    General,
    Feedback,
    Other,
}

impl ContactSubject {
    pub const ALL: [ContactSubject; 6] = [
        ContactSubject::Booking,
        ContactSubject::Partnership,
        ContactSubject::Support,
        ContactSubject::General,
        ContactSubject::Feedback,
        ContactSubject::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContactSubject::Booking => "Booking",
            ContactSubject::Partnership => "Partnership",
            ContactSubject::Support => "Support",
            ContactSubject::General => "General",
            ContactSubject::Feedback => "Feedback",
            ContactSubject::Other => "Other",
        }
    }

    /// Human-facing label shown in the subject dropdown.
    pub fn label(&self) -> &'static str {
        match self {
            ContactSubject::Booking => "Booking Inquiry",
            ContactSubject::Partnership => "Venue Partnership",
            ContactSubject::Support => "Technical Support",
            ContactSubject::General => "General Inquiry",
            ContactSubject::Feedback => "Feedback",
            ContactSubject::Other => "Other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value.trim())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRequest {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub date: NaiveDate,
    pub time_slot: String,
    pub reason: CallReason,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCallRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub date: NaiveDate,
    pub time_slot: String,
    pub reason: CallReason,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactMessage {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: ContactSubject,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewContactMessage {
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: ContactSubject,
    pub message: String,
}
