use std::sync::Arc;

use chrono::Utc;

use crate::connection::ConnectionManager;
use crate::error::{Error, Result, ValidationError};
use crate::models::{Booking, BookingDraft, Event, EventCard, EventDraft, EventId};
use crate::validation;

#[derive(Clone)]
pub struct EventBoard {
    connections: Arc<ConnectionManager>,
}

impl EventBoard {
    pub fn new(connections: Arc<ConnectionManager>) -> Self {
        Self { connections }
    }

    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.connections
    }

    pub async fn create_event(&self, draft: EventDraft) -> Result<Event> {
        let event = validation::prepare_event(draft, None, Utc::now()).map_err(rejected)?;
        let db = self.connections.get().await?;
        let event = db.insert_event(event).await?;
        tracing::info!(id = %event.id, slug = %event.slug, "event created");
        Ok(event)
    }

    /// The slug follows the title only if the title changed.
    pub async fn update_event(&self, id: EventId, draft: EventDraft) -> Result<Event> {
        let db = self.connections.get().await?;
        let previous = db
            .find_event(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("event {id}")))?;

        let event =
            validation::prepare_event(draft, Some(&previous), Utc::now()).map_err(rejected)?;
        let event = db.replace_event(event).await?;
        tracing::info!(id = %event.id, slug = %event.slug, "event updated");
        Ok(event)
    }

    pub async fn get_event(&self, id: EventId) -> Result<Option<Event>> {
        self.connections.get().await?.find_event(id).await
    }

    pub async fn get_event_by_slug(&self, slug: &str) -> Result<Option<Event>> {
        self.connections.get().await?.find_event_by_slug(slug).await
    }

    pub async fn list_events(&self) -> Result<Vec<Event>> {
        self.connections.get().await?.list_events().await
    }

    /// Cards for the landing page, soonest first.
    pub async fn featured_events(&self) -> Result<Vec<EventCard>> {
        let mut events = self.list_events().await?;
        events.sort_by(|a, b| (&a.date, &a.time, &a.title).cmp(&(&b.date, &b.time, &b.title)));
        Ok(events.iter().map(Event::card).collect())
    }

    pub async fn create_booking(&self, event_id: EventId, email: impl Into<String>) -> Result<Booking> {
        let draft = BookingDraft {
            event_id,
            email: email.into(),
        };
        let db = self.connections.get().await?;
        let booking = validation::prepare_booking(draft, &db, Utc::now()).await?;
        let booking = db.insert_booking(booking).await?;
        tracing::info!(id = %booking.id, event = %booking.event_id, "booking created");
        Ok(booking)
    }

    pub async fn bookings_for_event(&self, event_id: EventId) -> Result<Vec<Booking>> {
        self.connections
            .get()
            .await?
            .list_bookings_for_event(event_id)
            .await
    }

    pub async fn seed_featured_if_empty(&self) -> Result<usize> {
        self.connections.get().await?.seed_featured_if_empty().await
    }
}

fn rejected(err: ValidationError) -> Error {
    tracing::debug!(field = err.field(), %err, "event rejected");
    Error::Validation(err)
}
