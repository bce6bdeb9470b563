pub mod auth;
pub mod media;
pub mod reservations;
pub mod sessions;
