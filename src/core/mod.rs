pub mod app;
pub mod cases;
pub mod chat_stream;
pub mod config;
pub mod constants;
pub mod geolocation;
pub mod hashing;
pub mod message;
pub mod report;
pub mod response;
pub mod seal;
