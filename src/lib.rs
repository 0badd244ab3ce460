mod board;
mod config;
mod connection;
mod db;
mod error;
mod logging;
mod models;
pub mod schema;
mod utils;
pub mod validation;

use std::sync::Arc;

pub use board::EventBoard;
pub use config::{AppConfig, DATABASE_URI_VAR};
pub use connection::{ConnectionManager, Connector, SqliteConnector};
pub use db::Database;
pub use error::{ConnectionError, Error, Result, ValidationError};
pub use logging::init_tracing;
pub use models::{Booking, BookingDraft, BookingId, Event, EventCard, EventDraft, EventId};

pub async fn run() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    init_tracing(config.debug)?;

    let board = EventBoard::new(Arc::new(ConnectionManager::new(&config)));
    board.connections().get().await?;

    if config.seed_featured {
        board.seed_featured_if_empty().await?;
    }

    let cards = board.featured_events().await?;
    tracing::info!(count = cards.len(), "featured events");
    for card in &cards {
        tracing::info!(
            title = %card.title,
            slug = %card.slug,
            location = %card.location,
            date = %card.date,
            time = %card.time,
            "featured"
        );
    }
    Ok(())
}
