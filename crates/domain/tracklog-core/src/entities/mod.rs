//! Record types cached on the device and their wire shapes.
//!
//! Each entity has three forms: the local record (sync bookkeeping plus
//! relations), the inbound DTO read from the remote collection, and the
//! outbound payload written to it. DTO and payload field names match the
//! remote columns.

use crate::Incomplete;

mod activity;
mod agenda;
mod catalogue;
mod interaction;
mod trip;

pub use activity::{Activity, ActivityDto, ActivityPayload};
pub use agenda::{AgendaEntry, AgendaEntryDto, AgendaEntryPayload};
pub use catalogue::{Person, PersonDto, PersonPayload, Vehicle, VehicleDto, VehiclePayload};
pub use interaction::{Interaction, InteractionDto, InteractionPayload};
pub use trip::{Trip, TripDto, TripPayload};

/// Relation names shared across entity types.
pub mod rel {
    pub const INSTANCE: &str = "instance";
    pub const PERSON: &str = "person";
    pub const VEHICLE: &str = "vehicle";
}

pub(crate) fn require<T>(field: &str, value: Option<T>) -> Result<T, Incomplete> {
    value.ok_or_else(|| Incomplete::field(field))
}

pub(crate) fn require_text(field: &str, value: &str) -> Result<String, Incomplete> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Incomplete::field(field));
    }
    Ok(trimmed.to_string())
}
