//! Account credentials: password hashing and the password policy applied at signup.

pub mod password;

pub use password::{hash_password, password_policy_errors, verify_password};
