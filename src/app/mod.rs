pub mod auth;
pub mod engagement;
pub mod media;
pub mod posts;
