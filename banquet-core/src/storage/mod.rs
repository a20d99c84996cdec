pub mod blob;
pub mod database;
pub mod traits;

pub use blob::{BlobStore, FsBlobStore, ImageKind, ImageUpload};
pub use database::LibsqlStorage;
pub use traits::Storage;
