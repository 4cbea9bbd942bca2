//! Google Play packaging job processor
//!
//! This library provides the background processor that turns queued PWA
//! packaging requests into Google Play packages: it polls a Redis job queue,
//! runs the package build command, uploads the result to R2, and keeps the
//! job record up to date, with capped retries for failed attempts.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;
pub mod worker;
