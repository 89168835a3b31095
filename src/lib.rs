pub mod app;
pub mod config;
pub mod state;
pub mod store;
pub mod users;
