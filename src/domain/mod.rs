pub mod engagement;
pub mod media;
pub mod post;
pub mod user;
