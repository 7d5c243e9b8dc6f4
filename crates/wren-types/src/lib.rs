pub mod forms;
pub mod models;

pub use models::{DEFAULT_HEADER_IMAGE_URL, DEFAULT_IMAGE_URL, Message, User};
