//! Checkout API Library
//!
//! Core services for converting checkout requests into durably recorded
//! orders: authoritative pricing, inventory reservation, coupon redemption,
//! payment tracking, and the post-checkout order lifecycle.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod migrator;
pub mod services;

use sea_orm::DatabaseConnection;
use std::sync::Arc;

pub use errors::{CouponRejection, ErrorResponse, ServiceError};
pub use events::{Event, EventSender};

/// Shared application state handed to the (out-of-crate) API layer.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<config::AppConfig>,
    pub event_sender: EventSender,
    pub services: services::AppServices,
}

impl AppState {
    /// Wires up application state from an established database connection.
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: Arc<config::AppConfig>,
        event_sender: EventSender,
    ) -> Self {
        let services = services::AppServices::build(db.clone(), config.clone(), event_sender.clone());

        Self {
            db,
            config,
            event_sender,
            services,
        }
    }
}
