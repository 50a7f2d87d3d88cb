pub mod config;
pub mod errors;
pub mod keys;
pub mod lifecycle;
pub mod manifest;
pub mod revision;
pub mod table;
