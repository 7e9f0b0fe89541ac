//! User registration and login.

pub mod directory;
pub mod routes;

pub use directory::UserDirectory;
