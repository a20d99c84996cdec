//! Form schemas and their validation.
//!
//! Every form arrives as raw strings (urlencoded or multipart text parts) and
//! validates into either a typed record ready for storage or a set of
//! field-level error messages. Validation never touches storage; checks that
//! need the database (username uniqueness) are layered on by the caller.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::auth::password_policy_errors;
use crate::domain::{CallReason, ContactSubject, NewCallRequest, NewContactMessage, NewListing};

pub const REQUIRED: &str = "This field is required.";
pub const MAX_MESSAGE_CHARS: usize = 500;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@.]+$").expect("valid email regex"));
static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?i)https?://[^\s/?#]+\.[^\s/?#]+(?:[/?#]\S*)?$").expect("valid url regex"));
static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9@.+_-]+$").expect("valid username regex"));

/// Field name -> messages. Serializes as a plain JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Messages for one field; empty when the field is valid.
    pub fn field(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    fn finish<T>(self, value: impl FnOnce() -> T) -> Result<T, FormErrors> {
        if self.is_empty() {
            Ok(value())
        } else {
            Err(self)
        }
    }
}

fn char_len(value: &str) -> usize {
    value.chars().count()
}

fn check_max(errors: &mut FormErrors, field: &str, value: &str, max: usize) {
    let len = char_len(value);
    if len > max {
        errors.add(
            field,
            format!("Ensure this value has at most {max} characters (it has {len})."),
        );
    }
}

fn required_text(errors: &mut FormErrors, field: &str, raw: &str, max: usize) -> String {
    let value = raw.trim();
    if value.is_empty() {
        errors.add(field, REQUIRED);
    } else {
        check_max(errors, field, value, max);
    }
    value.to_string()
}

fn optional_text(errors: &mut FormErrors, field: &str, raw: &str, max: usize) -> Option<String> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    check_max(errors, field, value, max);
    Some(value.to_string())
}

fn required_email(errors: &mut FormErrors, field: &str, raw: &str) -> String {
    let value = required_text(errors, field, raw, 254);
    if !value.is_empty() && !is_valid_email(&value) {
        errors.add(field, "Enter a valid email address.");
    }
    value
}

fn non_negative_int(errors: &mut FormErrors, field: &str, raw: &str) -> Option<i64> {
    match raw.trim().parse::<i64>() {
        Ok(n) if n < 0 => {
            errors.add(field, "Ensure this value is greater than or equal to 0.");
            None
        }
        Ok(n) => Some(n),
        Err(_) => {
            errors.add(field, "Enter a whole number.");
            None
        }
    }
}

fn required_non_negative_int(errors: &mut FormErrors, field: &str, raw: &str) -> i64 {
    if raw.trim().is_empty() {
        errors.add(field, REQUIRED);
        return 0;
    }
    non_negative_int(errors, field, raw).unwrap_or(0)
}

fn optional_non_negative_int(errors: &mut FormErrors, field: &str, raw: &str) -> Option<i64> {
    if raw.trim().is_empty() {
        None
    } else {
        non_negative_int(errors, field, raw)
    }
}

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value)
}

pub fn is_valid_url(value: &str) -> bool {
    URL_RE.is_match(value)
}

/// Local redirect targets only: `/path`, never `//host` or `scheme://`.
/// Browsers drop tabs and newlines from URLs, so `/\t/host` would read as
/// `//host`; only printable ASCII is accepted.
pub fn is_safe_redirect(target: &str) -> bool {
    target.starts_with('/')
        && !target.starts_with("//")
        && !target.contains('\\')
        && target.bytes().all(|b| b.is_ascii_graphic())
}

// ===== SIGNUP =====

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SignupForm {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password1: String,
    #[serde(skip_serializing)]
    pub password2: String,
    pub venue_name: String,
    pub venue_address: String,
    pub venue_capacity: String,
    pub venue_price: String,
}

/// Optional "list my venue" block submitted with a signup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupVenue {
    pub name: String,
    pub address: String,
    pub capacity: i64,
    pub price: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct ValidSignup {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub venue: Option<SignupVenue>,
}

impl SignupForm {
    pub fn validate(&self) -> Result<ValidSignup, FormErrors> {
        let mut errors = FormErrors::new();

        let username = required_text(&mut errors, "username", &self.username, 150);
        if !username.is_empty() && !USERNAME_RE.is_match(&username) {
            errors.add(
                "username",
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
            );
        }
        let first_name = required_text(&mut errors, "first_name", &self.first_name, 30);
        let last_name = required_text(&mut errors, "last_name", &self.last_name, 30);
        let email = required_email(&mut errors, "email", &self.email);

        if self.password1.is_empty() {
            errors.add("password1", REQUIRED);
        }
        if self.password2.is_empty() {
            errors.add("password2", REQUIRED);
        }
        if !self.password1.is_empty() && !self.password2.is_empty() {
            if self.password1 != self.password2 {
                errors.add("password2", "The two password fields didn't match.");
            } else {
                for message in password_policy_errors(&self.password1, &username) {
                    errors.add("password2", message);
                }
            }
        }

        let venue_name = optional_text(&mut errors, "venue_name", &self.venue_name, 100);
        let venue_address = optional_text(&mut errors, "venue_address", &self.venue_address, 255);
        let venue_capacity = optional_non_negative_int(&mut errors, "venue_capacity", &self.venue_capacity);
        let venue_price = optional_non_negative_int(&mut errors, "venue_price", &self.venue_price);

        let venue = match (venue_name, venue_address, venue_capacity) {
            (Some(name), Some(address), Some(capacity)) => Some(SignupVenue {
                name,
                address,
                capacity,
                price: venue_price,
            }),
            _ => None,
        };

        let password = self.password1.clone();
        errors.finish(|| ValidSignup {
            username,
            first_name,
            last_name,
            email,
            password,
            venue,
        })
    }
}

// ===== LOGIN =====

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    /// Where to go after a successful login; only honoured when it is a local path.
    pub next: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(String, String), FormErrors> {
        let mut errors = FormErrors::new();
        let username = required_text(&mut errors, "username", &self.username, 254);
        if self.password.is_empty() {
            errors.add("password", REQUIRED);
        }
        let password = self.password.clone();
        errors.finish(|| (username, password))
    }
}

// ===== BANQUET LISTING =====

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ListingForm {
    pub banquet_name: String,
    pub email: String,
    pub phone: String,
    pub capacity: String,
    pub location: String,
    pub google_link: String,
    pub services: String,
}

/// Validated listing fields, still waiting for an owner.
#[derive(Debug, Clone)]
pub struct ListingFields {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub capacity: i64,
    pub location: String,
    pub google_link: Option<String>,
    pub services: Option<String>,
}

impl ListingFields {
    pub fn into_new_listing(self, owner_id: i64, owner_name: String) -> NewListing {
        NewListing {
            owner_id,
            owner_name,
            name: self.name,
            email: self.email,
            phone: self.phone,
            capacity: self.capacity,
            location: self.location,
            google_link: self.google_link,
            services: self.services,
            price: None,
        }
    }
}

impl ListingForm {
    /// Sets one field by its form name; unknown names are ignored.
    pub fn set(&mut self, field: &str, value: String) {
        match field {
            "banquet_name" => self.banquet_name = value,
            "email" => self.email = value,
            "phone" => self.phone = value,
            "capacity" => self.capacity = value,
            "location" => self.location = value,
            "google_link" => self.google_link = value,
            "services" => self.services = value,
            _ => {}
        }
    }

    pub fn validate(&self) -> Result<ListingFields, FormErrors> {
        let mut errors = FormErrors::new();

        let name = required_text(&mut errors, "banquet_name", &self.banquet_name, 100);
        let email = required_email(&mut errors, "email", &self.email);
        let phone = required_text(&mut errors, "phone", &self.phone, 20);
        let capacity = required_non_negative_int(&mut errors, "capacity", &self.capacity);
        let location = required_text(&mut errors, "location", &self.location, 255);
        let google_link = optional_text(&mut errors, "google_link", &self.google_link, 200);
        if let Some(link) = &google_link {
            if !is_valid_url(link) {
                errors.add("google_link", "Enter a valid URL.");
            }
        }
        let services = optional_text(&mut errors, "services", &self.services, 100);

        errors.finish(|| ListingFields {
            name,
            email,
            phone,
            capacity,
            location,
            google_link,
            services,
        })
    }
}

// ===== SCHEDULE CALL =====

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ScheduleCallForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub date: String,
    pub time_slot: String,
    pub reason: String,
    pub notes: String,
}

impl ScheduleCallForm {
    pub fn validate(&self) -> Result<NewCallRequest, FormErrors> {
        let mut errors = FormErrors::new();

        let name = required_text(&mut errors, "name", &self.name, 100);
        let email = required_email(&mut errors, "email", &self.email);
        let phone = required_text(&mut errors, "phone", &self.phone, 20);

        let date = match self.date.trim() {
            "" => {
                errors.add("date", REQUIRED);
                None
            }
            raw => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
                Ok(date) => Some(date),
                Err(_) => {
                    errors.add("date", "Enter a valid date.");
                    None
                }
            },
        };

        let time_slot = required_text(&mut errors, "time_slot", &self.time_slot, 50);

        let reason = match self.reason.trim() {
            "" => {
                errors.add("reason", REQUIRED);
                None
            }
            raw => {
                let parsed = CallReason::parse(raw);
                if parsed.is_none() {
                    errors.add(
                        "reason",
                        format!("Select a valid choice. {raw} is not one of the available choices."),
                    );
                }
                parsed
            }
        };

        let notes = optional_text(&mut errors, "notes", &self.notes, 2000);

        match (date, reason) {
            (Some(date), Some(reason)) if errors.is_empty() => Ok(NewCallRequest {
                name,
                email,
                phone,
                date,
                time_slot,
                reason,
                notes,
            }),
            _ => Err(errors),
        }
    }
}

// ===== CONTACT US =====

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ContactForm {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub subject: String,
    pub message: String,
}

impl ContactForm {
    pub fn validate(&self) -> Result<NewContactMessage, FormErrors> {
        let mut errors = FormErrors::new();

        let full_name = required_text(&mut errors, "full_name", &self.full_name, 100);
        let email = required_email(&mut errors, "email", &self.email);
        let phone = optional_text(&mut errors, "phone", &self.phone, 20);

        let subject = match self.subject.trim() {
            "" => {
                errors.add("subject", REQUIRED);
                None
            }
            raw => {
                let parsed = ContactSubject::parse(raw);
                if parsed.is_none() {
                    errors.add(
                        "subject",
                        format!("Select a valid choice. {raw} is not one of the available choices."),
                    );
                }
                parsed
            }
        };

        let message = required_text(&mut errors, "message", &self.message, MAX_MESSAGE_CHARS);

        match subject {
            Some(subject) if errors.is_empty() => Ok(NewContactMessage {
                full_name,
                email,
                phone,
                subject,
                message,
            }),
            _ => Err(errors),
        }
    }
}
