// Library exports for Postdeck
// This allows integration tests and external code to use Postdeck modules

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod mapper;
pub mod models;
pub mod posts;
pub mod routes;
pub mod state;
pub mod store;
pub mod uploads;
