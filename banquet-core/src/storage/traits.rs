use crate::common::error::Result;
use crate::domain::*;
use crate::storage::blob::ImageUpload;
use async_trait::async_trait;

/// Repository over every persisted record. Handlers receive it explicitly
/// through application state; nothing reaches for a global connection.
#[async_trait]
pub trait Storage: Send + Sync {
    // User operations
    async fn create_user(&self, user: &NewUser) -> Result<User>;
    /// Create a user and, optionally, their first listing in one transaction.
    /// The listing's `owner_id` and `owner_name` are taken from the new user;
    /// if the listing cannot be stored the user is not created either.
    async fn create_account(
        &self,
        user: &NewUser,
        listing: Option<&NewListing>,
    ) -> Result<(User, Option<ListingDetail>)>;
    async fn get_user_by_id(&self, user_id: i64) -> Result<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;

    // Listing operations

    /// Insert a listing and attach `images` to it. Either the listing and
    /// every image commit together, or nothing is left behind.
    async fn create_listing(&self, listing: &NewListing, images: &[ImageUpload]) -> Result<ListingDetail>;
    async fn get_listing(&self, listing_id: i64) -> Result<Option<ListingDetail>>;
    /// Listings matching every predicate of `query`, in creation order.
    async fn list_listings(&self, query: &ListingQuery) -> Result<Vec<ListingDetail>>;
    /// Delete a listing together with its images. Returns false if it did not exist.
    async fn delete_listing(&self, listing_id: i64) -> Result<bool>;

    // Enquiry operations
    async fn create_call_request(&self, call: &NewCallRequest) -> Result<CallRequest>;
    async fn list_call_requests(&self) -> Result<Vec<CallRequest>>;
    async fn create_contact_message(&self, message: &NewContactMessage) -> Result<ContactMessage>;
    async fn list_contact_messages(&self) -> Result<Vec<ContactMessage>>;

    /// Remove every row (development aid).
    async fn clear_all_data(&self) -> Result<()>;
}
