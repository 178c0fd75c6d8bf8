use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::engine::{
    BookingDraft, GuestInfo, Participants, ProductId, SelectionLine, Selections,
};

/// Reservation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    /// Paid through the payment gateway
    Confirmed,
    /// Booked without a payment intent; settled on site
    PayOnSite,
    Cancelled,
}

impl ReservationStatus {
    /// Convert status to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::PayOnSite => "pay_on_site",
            ReservationStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Finished reservation handed to persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationPayload {
    pub product_id: ProductId,
    pub tour_date: NaiveDate,
    pub channel_id: Option<String>,
    pub participants: Participants,
    pub guest: GuestInfo,
    /// Per-selection totals, required groups first
    pub selections: Vec<SelectionLine>,
    pub coupon_code: Option<String>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total_price: Decimal,
    pub currency: String,
    pub status: ReservationStatus,
    /// Opaque id returned by the payment gateway
    pub payment_transaction_id: Option<String>,
}

/// Reservation as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Reservation {
    pub id: Uuid,
    pub product_id: String,
    pub tour_date: NaiveDate,
    pub status: ReservationStatus,
    pub adults: i32,
    pub children: i32,
    pub infants: i32,
    pub customer_name: String,
    pub email: String,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total_price: Decimal,
    pub currency: String,
    pub payment_transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Request DTO for participant counts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate, ToSchema)]
pub struct ParticipantsRequest {
    #[validate(range(min = 1, max = 500, message = "Adults must be between 1 and 500"))]
    pub adults: u32,
    #[serde(default)]
    #[validate(range(max = 500, message = "Children must be at most 500"))]
    pub children: u32,
    #[serde(default)]
    #[validate(range(max = 500, message = "Infants must be at most 500"))]
    pub infants: u32,
}

impl From<ParticipantsRequest> for Participants {
    fn from(request: ParticipantsRequest) -> Self {
        Participants::new(request.adults, request.children, request.infants)
    }
}

/// Request DTO for a price quote
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct QuoteRequest {
    pub date: NaiveDate,
    #[validate]
    pub participants: ParticipantsRequest,
    pub selections: Option<Selections>,
    pub coupon_code: Option<String>,
    pub channel_id: Option<String>,
}

impl From<QuoteRequest> for BookingDraft {
    fn from(request: QuoteRequest) -> Self {
        BookingDraft {
            date: Some(request.date),
            participants: request.participants.into(),
            selections: request.selections,
            guest: None,
            coupon_code: request.coupon_code,
            channel_id: request.channel_id,
        }
    }
}

/// Request DTO for completing a booking
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ReservationRequest {
    pub date: NaiveDate,
    #[validate]
    pub participants: ParticipantsRequest,
    pub selections: Option<Selections>,
    #[validate]
    pub guest: GuestInfo,
    pub coupon_code: Option<String>,
    pub channel_id: Option<String>,
}

impl From<ReservationRequest> for BookingDraft {
    fn from(request: ReservationRequest) -> Self {
        BookingDraft {
            date: Some(request.date),
            participants: request.participants.into(),
            selections: request.selections,
            guest: Some(request.guest),
            coupon_code: request.coupon_code,
            channel_id: request.channel_id,
        }
    }
}

/// Response DTO for a completed booking
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReservationResponse {
    pub reservation: Reservation,
    pub selections: Vec<SelectionLine>,
    pub display_total: Decimal,
}
