pub mod config;
pub mod error;
pub mod gmail;
pub mod models;
pub mod oauth;
pub mod otp;
pub mod registry;
pub mod routes;
pub mod services;
pub mod telegram;
pub mod telemetry;
