use super::blob::{BlobStore, ImageUpload};
use super::traits::Storage;
use crate::common::error::{BanquetError, Result};
use crate::database::DatabaseManager;
use crate::domain::*;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use libsql::{Connection, Row, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

const USER_COLUMNS: &str = "id, username, password_hash, first_name, last_name, email, date_joined";
const LISTING_COLUMNS: &str = "id, owner_id, owner_name, name, email, phone, capacity, location, \
                               google_link, services, price, created_at";
const CALL_COLUMNS: &str = "id, name, email, phone, date, time_slot, reason, notes, created_at";
const CONTACT_COLUMNS: &str = "id, full_name, email, phone, subject, message, created_at";

/// Storage implementation over libSQL, with image files kept in a blob store
pub struct LibsqlStorage {
    db: Arc<DatabaseManager>,
    blobs: Arc<dyn BlobStore>,
}

impl LibsqlStorage {
    pub fn new(db: Arc<DatabaseManager>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { db, blobs }
    }

    pub fn database(&self) -> &DatabaseManager {
        &self.db
    }

    /// Best-effort removal of blobs whose rows never committed or no longer exist.
    async fn discard_blobs(&self, keys: &[String]) {
        for key in keys {
            if let Err(e) = self.blobs.delete(key).await {
                warn!("Failed to remove blob {}: {}", key, e);
            }
        }
    }

    async fn insert_listing_with_images(
        &self,
        conn: &Connection,
        new: &NewListing,
        images: &[ImageUpload],
        written: &mut Vec<String>,
    ) -> Result<ListingDetail> {
        let created_at = Utc::now();
        let sql = format!(
            "INSERT INTO venue_listings (owner_id, owner_name, name, email, phone, capacity, location, \
             google_link, services, price, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             RETURNING {LISTING_COLUMNS}"
        );
        let listing = {
            let mut rows = conn
                .query(
                    &sql,
                    libsql::params![
                        new.owner_id,
                        new.owner_name.as_str(),
                        new.name.as_str(),
                        new.email.as_str(),
                        new.phone.as_str(),
                        new.capacity,
                        new.location.as_str(),
                        new.google_link.as_deref(),
                        normalize_services(new.services.as_deref()),
                        new.price,
                        created_at.to_rfc3339()
                    ],
                )
                .await
                .map_err(|e| BanquetError::database("Failed to insert listing", e))?;
            let row = rows
                .next()
                .await?
                .ok_or_else(|| BanquetError::database("Failed to insert listing", "no row returned"))?;
            row_to_listing(&row)?
        };

        let mut attached = Vec::with_capacity(images.len());
        for image in images {
            let key = image.key_for_listing(listing.id);
            self.blobs.put(&key, &image.bytes).await?;
            written.push(key.clone());

            let mut rows = conn
                .query(
                    "INSERT INTO venue_images (listing_id, image_key) VALUES (?, ?) RETURNING id",
                    libsql::params![listing.id, key.as_str()],
                )
                .await
                .map_err(|e| BanquetError::database("Failed to insert listing image", e))?;
            let row = rows.next().await?.ok_or_else(|| {
                BanquetError::database("Failed to insert listing image", "no row returned")
            })?;
            attached.push(VenueImage {
                id: row.get::<i64>(0)?,
                listing_id: listing.id,
                image_key: key,
            });
        }

        Ok(ListingDetail {
            listing,
            images: attached,
        })
    }

    async fn images_for(&self, conn: &Connection, listing_ids: &[i64]) -> Result<HashMap<i64, Vec<VenueImage>>> {
        let mut by_listing: HashMap<i64, Vec<VenueImage>> = HashMap::new();
        if listing_ids.is_empty() {
            return Ok(by_listing);
        }

        let placeholders = vec!["?"; listing_ids.len()].join(", ");
        let sql = format!(
            "SELECT id, listing_id, image_key FROM venue_images WHERE listing_id IN ({placeholders}) ORDER BY id"
        );
        let params: Vec<Value> = listing_ids.iter().map(|id| Value::Integer(*id)).collect();
        let mut rows = conn
            .query(&sql, params)
            .await
            .map_err(|e| BanquetError::database("Failed to query listing images", e))?;

        while let Some(row) = rows.next().await? {
            let image = VenueImage {
                id: row.get::<i64>(0)?,
                listing_id: row.get::<i64>(1)?,
                image_key: row.get::<String>(2)?,
            };
            by_listing.entry(image.listing_id).or_default().push(image);
        }
        Ok(by_listing)
    }

    async fn all_image_keys(&self, conn: &Connection, listing_id: Option<i64>) -> Result<Vec<String>> {
        let mut rows = match listing_id {
            Some(id) => {
                conn.query(
                    "SELECT image_key FROM venue_images WHERE listing_id = ?",
                    libsql::params![id],
                )
                .await
            }
            None => conn.query("SELECT image_key FROM venue_images", ()).await,
        }
        .map_err(|e| BanquetError::database("Failed to query image keys", e))?;

        let mut keys = Vec::new();
        while let Some(row) = rows.next().await? {
            keys.push(row.get::<String>(0)?);
        }
        Ok(keys)
    }
}

async fn insert_user(conn: &Connection, user: &NewUser) -> Result<User> {
    let sql = format!(
        "INSERT INTO users (username, password_hash, first_name, last_name, email, date_joined) \
         VALUES (?, ?, ?, ?, ?, ?) RETURNING {USER_COLUMNS}"
    );
    let mut rows = conn
        .query(
            &sql,
            libsql::params![
                user.username.as_str(),
                user.password_hash.as_str(),
                user.first_name.as_str(),
                user.last_name.as_str(),
                user.email.as_str(),
                Utc::now().to_rfc3339()
            ],
        )
        .await
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint failed") {
                BanquetError::UsernameTaken(user.username.clone())
            } else {
                BanquetError::database("Failed to insert user", e)
            }
        })?;

    let row = rows
        .next()
        .await?
        .ok_or_else(|| BanquetError::database("Failed to insert user", "no row returned"))?;
    row_to_user(&row)
}

/// SQL `WHERE` clause and its positional parameters for a listing query.
fn listing_filter(query: &ListingQuery) -> (String, Vec<Value>) {
    let mut clauses = Vec::new();
    let mut params = Vec::new();

    if let Some(area) = &query.area {
        clauses.push("LOWER(TRIM(location)) = LOWER(?)");
        params.push(Value::Text(area.clone()));
    }
    if let Some(fragment) = &query.location_contains {
        clauses.push("instr(LOWER(location), LOWER(?)) > 0");
        params.push(Value::Text(fragment.clone()));
    }
    if let Some(min) = query.min_capacity {
        clauses.push("capacity >= ?");
        params.push(Value::Integer(min));
    }
    if let Some(service) = &query.service {
        // services is stored as "Tag, Tag"; match one whole tag
        clauses.push("instr(',' || LOWER(REPLACE(services, ', ', ',')) || ',', ',' || LOWER(?) || ',') > 0");
        params.push(Value::Text(service.trim().to_string()));
    }

    if clauses.is_empty() {
        (String::new(), params)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), params)
    }
}

/// Comma-separated function tags with each tag trimmed and blanks dropped.
fn normalize_services(raw: Option<&str>) -> Option<String> {
    let tags: Vec<&str> = raw?
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .collect();
    (!tags.is_empty()).then(|| tags.join(", "))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| BanquetError::database("Invalid timestamp", e))
}

fn optional_text(row: &Row, idx: i32) -> Result<Option<String>> {
    match row.get_value(idx)? {
        Value::Null => Ok(None),
        Value::Text(s) => Ok(Some(s)),
        other => Err(BanquetError::database(
            "Unexpected column type",
            format!("expected text at column {idx}, got {other:?}"),
        )),
    }
}

fn optional_integer(row: &Row, idx: i32) -> Result<Option<i64>> {
    match row.get_value(idx)? {
        Value::Null => Ok(None),
        Value::Integer(n) => Ok(Some(n)),
        other => Err(BanquetError::database(
            "Unexpected column type",
            format!("expected integer at column {idx}, got {other:?}"),
        )),
    }
}

fn row_to_user(row: &Row) -> Result<User> {
    Ok(User {
        id: row.get::<i64>(0)?,
        username: row.get::<String>(1)?,
        password_hash: row.get::<String>(2)?,
        first_name: row.get::<String>(3)?,
        last_name: row.get::<String>(4)?,
        email: row.get::<String>(5)?,
        date_joined: parse_timestamp(&row.get::<String>(6)?)?,
    })
}

fn row_to_listing(row: &Row) -> Result<VenueListing> {
    Ok(VenueListing {
        id: row.get::<i64>(0)?,
        owner_id: row.get::<i64>(1)?,
        owner_name: row.get::<String>(2)?,
        name: row.get::<String>(3)?,
        email: row.get::<String>(4)?,
        phone: row.get::<String>(5)?,
        capacity: row.get::<i64>(6)?,
        location: row.get::<String>(7)?,
        google_link: optional_text(row, 8)?,
        services: optional_text(row, 9)?,
        price: optional_integer(row, 10)?,
        created_at: parse_timestamp(&row.get::<String>(11)?)?,
    })
}

fn row_to_call(row: &Row) -> Result<CallRequest> {
    let raw_date = row.get::<String>(4)?;
    let raw_reason = row.get::<String>(6)?;
    Ok(CallRequest {
        id: row.get::<i64>(0)?,
        name: row.get::<String>(1)?,
        email: row.get::<String>(2)?,
        phone: row.get::<String>(3)?,
        date: NaiveDate::parse_from_str(&raw_date, "%Y-%m-%d")
            .map_err(|e| BanquetError::database("Invalid call date", e))?,
        time_slot: row.get::<String>(5)?,
        reason: CallReason::parse(&raw_reason)
            .ok_or_else(|| BanquetError::database("Invalid call reason", &raw_reason))?,
        notes: optional_text(row, 7)?,
        created_at: parse_timestamp(&row.get::<String>(8)?)?,
    })
}

fn row_to_contact(row: &Row) -> Result<ContactMessage> {
    let raw_subject = row.get::<String>(4)?;
    Ok(ContactMessage {
        id: row.get::<i64>(0)?,
        full_name: row.get::<String>(1)?,
        email: row.get::<String>(2)?,
        phone: optional_text(row, 3)?,
        subject: ContactSubject::parse(&raw_subject)
            .ok_or_else(|| BanquetError::database("Invalid contact subject", &raw_subject))?,
        message: row.get::<String>(5)?,
        created_at: parse_timestamp(&row.get::<String>(6)?)?,
    })
}

#[async_trait]
impl Storage for LibsqlStorage {
    async fn create_user(&self, user: &NewUser) -> Result<User> {
        if self.get_user_by_username(&user.username).await?.is_some() {
            return Err(BanquetError::UsernameTaken(user.username.clone()));
        }

        let conn = self.db.get_connection().await?;
        let created = insert_user(&conn, user).await?;
        info!("Created user {} with id {}", created.username, created.id);
        Ok(created)
    }

    async fn create_account(
        &self,
        user: &NewUser,
        listing: Option<&NewListing>,
    ) -> Result<(User, Option<ListingDetail>)> {
        if self.get_user_by_username(&user.username).await?.is_some() {
            return Err(BanquetError::UsernameTaken(user.username.clone()));
        }

        let conn = self.db.get_connection().await?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| BanquetError::database("Failed to begin transaction", e))?;

        let mut written = Vec::new();
        let outcome = async {
            let created = insert_user(&tx, user).await?;
            let detail = match listing {
                Some(listing) => {
                    let owned = NewListing {
                        owner_id: created.id,
                        owner_name: created.display_name(),
                        ..listing.clone()
                    };
                    Some(self.insert_listing_with_images(&tx, &owned, &[], &mut written).await?)
                }
                None => None,
            };
            Ok::<_, BanquetError>((created, detail))
        }
        .await;

        match outcome {
            Ok((created, detail)) => {
                if let Err(e) = tx.commit().await {
                    self.discard_blobs(&written).await;
                    return Err(BanquetError::database("Failed to commit account", e));
                }
                info!("Created user {} with id {}", created.username, created.id);
                if let Some(detail) = &detail {
                    info!("Listing {} created at signup by {}", detail.listing.id, created.username);
                }
                Ok((created, detail))
            }
            Err(e) => {
                warn!("Rolling back account '{}': {}", user.username, e);
                if let Err(rollback_err) = tx.rollback().await {
                    warn!("Rollback failed: {}", rollback_err);
                }
                self.discard_blobs(&written).await;
                Err(e)
            }
        }
    }

    async fn get_user_by_id(&self, user_id: i64) -> Result<Option<User>> {
        let conn = self.db.get_connection().await?;
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        let mut rows = conn
            .query(&sql, libsql::params![user_id])
            .await
            .map_err(|e| BanquetError::database("Failed to query user", e))?;

        match rows.next().await? {
            Some(row) => Ok(Some(row_to_user(&row)?)),
            None => Ok(None),
        }
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.db.get_connection().await?;
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?");
        let mut rows = conn
            .query(&sql, libsql::params![username])
            .await
            .map_err(|e| BanquetError::database("Failed to query user", e))?;

        match rows.next().await? {
            Some(row) => Ok(Some(row_to_user(&row)?)),
            None => Ok(None),
        }
    }

    async fn create_listing(&self, listing: &NewListing, images: &[ImageUpload]) -> Result<ListingDetail> {
        let conn = self.db.get_connection().await?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| BanquetError::database("Failed to begin transaction", e))?;

        let mut written = Vec::new();
        let outcome = self
            .insert_listing_with_images(&tx, listing, images, &mut written)
            .await;
        match outcome {
            Ok(detail) => {
                if let Err(e) = tx.commit().await {
                    self.discard_blobs(&written).await;
                    return Err(BanquetError::database("Failed to commit listing", e));
                }
                info!(
                    "Created listing '{}' with id {} and {} image(s)",
                    detail.listing.name,
                    detail.listing.id,
                    detail.images.len()
                );
                Ok(detail)
            }
            Err(e) => {
                warn!("Rolling back listing '{}': {}", listing.name, e);
                if let Err(rollback_err) = tx.rollback().await {
                    warn!("Rollback failed: {}", rollback_err);
                }
                self.discard_blobs(&written).await;
                Err(e)
            }
        }
    }

    async fn get_listing(&self, listing_id: i64) -> Result<Option<ListingDetail>> {
        let conn = self.db.get_connection().await?;
        let sql = format!("SELECT {LISTING_COLUMNS} FROM venue_listings WHERE id = ?");
        let listing = {
            let mut rows = conn
                .query(&sql, libsql::params![listing_id])
                .await
                .map_err(|e| BanquetError::database("Failed to query listing", e))?;
            match rows.next().await? {
                Some(row) => row_to_listing(&row)?,
                None => return Ok(None),
            }
        };

        let mut images = self.images_for(&conn, &[listing.id]).await?;
        Ok(Some(ListingDetail {
            images: images.remove(&listing.id).unwrap_or_default(),
            listing,
        }))
    }

    async fn list_listings(&self, query: &ListingQuery) -> Result<Vec<ListingDetail>> {
        let conn = self.db.get_connection().await?;
        let (filter, params) = listing_filter(query);
        let sql = format!("SELECT {LISTING_COLUMNS} FROM venue_listings{filter} ORDER BY id");

        let mut listings = Vec::new();
        {
            let mut rows = conn
                .query(&sql, params)
                .await
                .map_err(|e| BanquetError::database("Failed to query listings", e))?;
            while let Some(row) = rows.next().await? {
                listings.push(row_to_listing(&row)?);
            }
        }
        debug!("Listing query {:?} matched {} listing(s)", query, listings.len());

        let ids: Vec<i64> = listings.iter().map(|l| l.id).collect();
        let mut images = self.images_for(&conn, &ids).await?;
        Ok(listings
            .into_iter()
            .map(|listing| ListingDetail {
                images: images.remove(&listing.id).unwrap_or_default(),
                listing,
            })
            .collect())
    }

    async fn delete_listing(&self, listing_id: i64) -> Result<bool> {
        let conn = self.db.get_connection().await?;
        let keys = self.all_image_keys(&conn, Some(listing_id)).await?;

        let deleted = conn
            .execute("DELETE FROM venue_listings WHERE id = ?", libsql::params![listing_id])
            .await
            .map_err(|e| BanquetError::database("Failed to delete listing", e))?;

        if deleted == 0 {
            return Ok(false);
        }
        self.discard_blobs(&keys).await;
        info!("Deleted listing {} and {} image(s)", listing_id, keys.len());
        Ok(true)
    }

    async fn create_call_request(&self, call: &NewCallRequest) -> Result<CallRequest> {
        let conn = self.db.get_connection().await?;
        let sql = format!(
            "INSERT INTO call_requests (name, email, phone, date, time_slot, reason, notes, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING {CALL_COLUMNS}"
        );
        let mut rows = conn
            .query(
                &sql,
                libsql::params![
                    call.name.as_str(),
                    call.email.as_str(),
                    call.phone.as_str(),
                    call.date.format("%Y-%m-%d").to_string(),
                    call.time_slot.as_str(),
                    call.reason.as_str(),
                    call.notes.as_deref(),
                    Utc::now().to_rfc3339()
                ],
            )
            .await
            .map_err(|e| BanquetError::database("Failed to insert call request", e))?;

        let row = rows
            .next()
            .await?
            .ok_or_else(|| BanquetError::database("Failed to insert call request", "no row returned"))?;
        let created = row_to_call(&row)?;
        info!("Scheduled call {} for {} at {}", created.id, created.date, created.time_slot);
        Ok(created)
    }

    async fn list_call_requests(&self) -> Result<Vec<CallRequest>> {
        let conn = self.db.get_connection().await?;
        let sql = format!("SELECT {CALL_COLUMNS} FROM call_requests ORDER BY id DESC");
        let mut rows = conn
            .query(&sql, ())
            .await
            .map_err(|e| BanquetError::database("Failed to query call requests", e))?;

        let mut calls = Vec::new();
        while let Some(row) = rows.next().await? {
            calls.push(row_to_call(&row)?);
        }
        Ok(calls)
    }

    async fn create_contact_message(&self, message: &NewContactMessage) -> Result<ContactMessage> {
        let conn = self.db.get_connection().await?;
        let sql = format!(
            "INSERT INTO contact_messages (full_name, email, phone, subject, message, created_at) \
             VALUES (?, ?, ?, ?, ?, ?) RETURNING {CONTACT_COLUMNS}"
        );
        let mut rows = conn
            .query(
                &sql,
                libsql::params![
                    message.full_name.as_str(),
                    message.email.as_str(),
                    message.phone.as_deref(),
                    message.subject.as_str(),
                    message.message.as_str(),
                    Utc::now().to_rfc3339()
                ],
            )
            .await
            .map_err(|e| BanquetError::database("Failed to insert contact message", e))?;

        let row = rows
            .next()
            .await?
            .ok_or_else(|| BanquetError::database("Failed to insert contact message", "no row returned"))?;
        let created = row_to_contact(&row)?;
        info!("Stored contact message {} ({})", created.id, created.subject.as_str());
        Ok(created)
    }

    async fn list_contact_messages(&self) -> Result<Vec<ContactMessage>> {
        let conn = self.db.get_connection().await?;
        let sql = format!("SELECT {CONTACT_COLUMNS} FROM contact_messages ORDER BY id DESC");
        let mut rows = conn
            .query(&sql, ())
            .await
            .map_err(|e| BanquetError::database("Failed to query contact messages", e))?;

        let mut messages = Vec::new();
        while let Some(row) = rows.next().await? {
            messages.push(row_to_contact(&row)?);
        }
        Ok(messages)
    }

    async fn clear_all_data(&self) -> Result<()> {
        let conn = self.db.get_connection().await?;
        let keys = self.all_image_keys(&conn, None).await?;

        // Children before parents (foreign key constraints)
        conn.execute_batch(
            "DELETE FROM venue_images;
             DELETE FROM venue_listings;
             DELETE FROM users;
             DELETE FROM call_requests;
             DELETE FROM contact_messages;",
        )
        .await
        .map_err(|e| BanquetError::database("Failed to clear data", e))?;

        self.discard_blobs(&keys).await;
        info!("Cleared all data from database");
        Ok(())
    }
}
