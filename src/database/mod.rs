pub mod connection;
pub mod user_store;
