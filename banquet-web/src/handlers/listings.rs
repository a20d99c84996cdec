use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use axum::response::Response;
use banquet_core::forms::{FormErrors, ListingForm};
use banquet_core::storage::ImageUpload;
use tracing::{info, warn};

use super::{form_accepted, form_invalid, render};
use crate::error::AppError;
use crate::models::{wants_json, PageContext};
use crate::session::RequireUser;
use crate::state::AppState;
use crate::templates::RegisterTemplate;

/// Field names accepted for image parts.
const IMAGE_FIELDS: &[&str] = &["images", "image"];

pub async fn register_page(RequireUser { session, .. }: RequireUser) -> Result<Response, AppError> {
    render(&RegisterTemplate {
        ctx: PageContext::from_session(&session),
        form: ListingForm::default(),
        errors: FormErrors::new(),
    })
}

/// Multipart body split into text fields, checked images and per-part errors.
struct ListingSubmission {
    form: ListingForm,
    images: Vec<ImageUpload>,
    errors: FormErrors,
}

async fn read_submission(mut multipart: Multipart, max_image_bytes: usize) -> ListingSubmission {
    let mut submission = ListingSubmission {
        form: ListingForm::default(),
        images: Vec::new(),
        errors: FormErrors::new(),
    };

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!("Unreadable multipart body: {}", e);
                submission
                    .errors
                    .add("__all__", "The submitted data could not be read. Please try again.");
                break;
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        if IMAGE_FIELDS.contains(&name.as_str()) {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let bytes = match field.bytes().await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("Failed to read image part {}: {}", file_name, e);
                    submission.errors.add("images", "An image could not be read. Please try again.");
                    break;
                }
            };
            // Browsers send an empty, unnamed part when no file was chosen.
            if file_name.is_empty() && bytes.is_empty() {
                continue;
            }
            match ImageUpload::from_bytes(&file_name, bytes.to_vec(), max_image_bytes) {
                Ok(image) => submission.images.push(image),
                Err(message) => submission.errors.add("images", message),
            }
        } else {
            match field.text().await {
                Ok(value) => submission.form.set(&name, value),
                Err(e) => {
                    warn!("Failed to read form field {}: {}", name, e);
                    submission.errors.add(&name, "This value could not be read.");
                }
            }
        }
    }

    submission
}

pub async fn register(
    State(state): State<AppState>,
    RequireUser { user, session }: RequireUser,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let json = wants_json(&headers);
    let ListingSubmission {
        form,
        images,
        mut errors,
    } = read_submission(multipart, state.config.max_upload_bytes).await;

    let fields = match form.validate() {
        Ok(fields) if errors.is_empty() => fields,
        Ok(_) => return form_invalid(&session, json, errors, |ctx, errors| RegisterTemplate { ctx, form, errors }),
        Err(field_errors) => {
            for (field, messages) in field_errors.iter() {
                for message in messages {
                    errors.add(field, message.clone());
                }
            }
            return form_invalid(&session, json, errors, |ctx, errors| RegisterTemplate { ctx, form, errors });
        }
    };

    let listing = fields.into_new_listing(user.id, user.display_name.clone());
    let detail = state.storage.create_listing(&listing, &images).await?;
    info!(
        "User {} registered listing {} with {} images",
        user.username,
        detail.listing.id,
        detail.images.len()
    );

    let message = if detail.images.is_empty() {
        "Banquet registered successfully!".to_string()
    } else {
        "Banquet registered successfully with images!".to_string()
    };
    Ok(form_accepted(
        &session,
        json,
        message,
        &format!("/banquet/{}", detail.listing.id),
    ))
}
