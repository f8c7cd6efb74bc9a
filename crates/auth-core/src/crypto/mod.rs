//! Cryptographic wrappers.

pub mod password;

pub use password::{BcryptHasher, HashError, PasswordHash, PasswordHasher, DEFAULT_COST, MIN_COST};
