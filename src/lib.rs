//! TinyMQ administration: a REST API over the broker's database and a
//! desktop monitor that polls it.

pub mod api_client;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod rest_server;
pub mod routes;

#[cfg(feature = "gui")]
pub mod gui;
