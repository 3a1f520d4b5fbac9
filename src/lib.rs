pub mod config;
pub mod conversation;
pub mod db;
pub mod handlers;
pub mod locale;
pub mod messenger;
pub mod model;
pub mod notify;
pub mod pagination;
pub mod session;
pub mod source;
pub mod sync;
