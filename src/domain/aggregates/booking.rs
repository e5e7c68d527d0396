//! Demo bookings at physical locations

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::domain::events::{BookingEvent, DomainEvent};
use crate::domain::value_objects::{non_negative_amount, round_cents};
use crate::domain::TransitionError;
use crate::error::{CommerceError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Location {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub time_slots: Vec<String>,
    pub capacity_per_slot: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LocationDraft {
    #[validate(length(min = 1, max = 120, message = "must be between 1 and 120 characters"))]
    pub name: String,
    pub address: Option<String>,
    #[validate(length(min = 1, message = "at least one time slot is required"), custom = "time_slots")]
    pub time_slots: Vec<String>,
    #[validate(range(min = 1, max = 100, message = "must be between 1 and 100"))]
    #[serde(default = "default_capacity")]
    pub capacity_per_slot: i32,
}

fn default_capacity() -> i32 { 1 }

fn time_slots(slots: &Vec<String>) -> std::result::Result<(), ValidationError> {
    if slots.iter().all(|s| NaiveTime::parse_from_str(s, "%H:%M").is_ok()) { return Ok(()); }
    let mut err = ValidationError::new("time_slot");
    err.message = Some("time slots must use HH:MM".into());
    Err(err)
}

impl Location {
    pub fn create(tenant_id: Uuid, draft: LocationDraft) -> Result<Self> {
        draft.validate()?;
        let mut slots = draft.time_slots;
        slots.sort();
        slots.dedup();
        Ok(Self {
            id: Uuid::now_v7(),
            tenant_id,
            name: draft.name.trim().to_string(),
            address: draft.address,
            time_slots: slots,
            capacity_per_slot: draft.capacity_per_slot,
            is_active: true,
            created_at: Utc::now(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DemoBooking {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub location_id: Uuid,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub product_interest: Option<String>,
    pub booking_date: NaiveDate,
    pub time_slot: String,
    pub fee: Option<Decimal>,
    pub status: BookingStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BookingDraft {
    pub location_id: Uuid,
    #[validate(length(min = 1, max = 120, message = "must be between 1 and 120 characters"))]
    pub customer_name: String,
    #[validate(email(message = "must be a valid email address"))]
    pub customer_email: String,
    #[validate(length(max = 30, message = "must be at most 30 characters"))]
    pub customer_phone: Option<String>,
    #[validate(length(max = 200, message = "must be at most 200 characters"))]
    pub product_interest: Option<String>,
    pub booking_date: NaiveDate,
    pub time_slot: String,
    #[validate(length(max = 1000, message = "must be at most 1000 characters"))]
    pub notes: Option<String>,
}

/// Fee billed on the booking's invoice. `None` clears it.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct BookingFee {
    #[validate(custom = "non_negative_amount")]
    pub fee: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus { #[default] Pending, Confirmed, Completed, Cancelled, NoShow }

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::NoShow => "no_show",
        }
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!((*self, next), (Pending, Confirmed | Cancelled) | (Confirmed, Completed | Cancelled | NoShow))
    }

    /// Whether the booking still occupies its slot.
    pub fn holds_slot(&self) -> bool { !matches!(self, Self::Cancelled) }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SlotAvailability {
    pub time_slot: String,
    pub booked: i32,
    pub remaining: i32,
    pub available: bool,
}

/// Per-slot availability for `date`, counted by scanning `bookings`.
pub fn slot_availability(location: &Location, bookings: &[DemoBooking], date: NaiveDate, today: NaiveDate) -> Vec<SlotAvailability> {
    location.time_slots.iter().map(|slot| {
        let booked = bookings.iter()
            .filter(|b| b.location_id == location.id && b.booking_date == date && &b.time_slot == slot && b.status.holds_slot())
            .count() as i32;
        let remaining = if date < today || !location.is_active { 0 } else { (location.capacity_per_slot - booked).max(0) };
        SlotAvailability { time_slot: slot.clone(), booked, remaining, available: remaining > 0 }
    }).collect()
}

impl DemoBooking {
    /// Validates the draft and the requested slot against existing bookings for that day.
    pub fn create(tenant_id: Uuid, location: &Location, existing: &[DemoBooking], draft: BookingDraft, today: NaiveDate) -> Result<Self> {
        draft.validate()?;
        if !location.is_active { return Err(CommerceError::NotFound("location")); }
        if draft.booking_date < today {
            return Err(CommerceError::Validation("booking_date: cannot book a date in the past".into()));
        }
        let slots = slot_availability(location, existing, draft.booking_date, today);
        let slot = slots.iter().find(|s| s.time_slot == draft.time_slot)
            .ok_or_else(|| CommerceError::Validation(format!("time_slot: {} is not offered at {}", draft.time_slot, location.name)))?;
        if !slot.available {
            return Err(CommerceError::Conflict(format!("{} on {} is fully booked", draft.time_slot, draft.booking_date)));
        }

        let now = Utc::now();
        let mut booking = Self {
            id: Uuid::now_v7(),
            tenant_id,
            location_id: location.id,
            customer_name: draft.customer_name.trim().to_string(),
            customer_email: draft.customer_email.trim().to_lowercase(),
            customer_phone: draft.customer_phone,
            product_interest: draft.product_interest,
            booking_date: draft.booking_date,
            time_slot: draft.time_slot,
            fee: None,
            status: BookingStatus::Pending,
            notes: draft.notes,
            created_at: now,
            updated_at: now,
            events: vec![],
        };
        booking.events.push(DomainEvent::Booking(BookingEvent::Created { tenant_id, booking_id: booking.id, location_id: location.id }));
        Ok(booking)
    }

    pub fn transition(&mut self, next: BookingStatus) -> std::result::Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError::new("booking", self.status, next));
        }
        self.status = next;
        self.updated_at = Utc::now();
        self.events.push(DomainEvent::Booking(BookingEvent::StatusChanged { tenant_id: self.tenant_id, booking_id: self.id, to: next }));
        Ok(())
    }

    pub fn set_fee(&mut self, fee: BookingFee) -> Result<()> {
        fee.validate()?;
        self.fee = fee.fee.map(round_cents);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
}
