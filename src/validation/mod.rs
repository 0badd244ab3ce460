pub mod booking;
pub mod event;

pub use booking::{prepare_booking, validate_email};
pub use event::{normalize_date, normalize_time, prepare_event, slugify};
