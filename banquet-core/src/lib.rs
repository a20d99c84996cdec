pub mod auth;
pub mod common;
pub mod constants;
pub mod database;
pub mod domain;
pub mod forms;
pub mod storage;

pub use common::error::{BanquetError, Result};
pub use database::{DatabaseLocation, DatabaseManager};
pub use domain::*;
