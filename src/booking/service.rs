use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::booking::models::{
    ReservationPayload, ReservationRequest, ReservationResponse, ReservationStatus,
};
use crate::booking::payment::{PaymentCustomer, PaymentGateway, PaymentReceipt, PaymentRequest};
use crate::booking::repository::ReservationRepository;
use crate::booking::BookingError;
use crate::engine::{BookingDraft, BookingEngine, BookingState, ProductId, WizardStep};

/// Service for completing bookings
#[derive(Clone)]
pub struct BookingService {
    engine: BookingEngine,
    repository: Arc<dyn ReservationRepository>,
    gateway: Arc<dyn PaymentGateway>,
    currency: String,
}

impl BookingService {
    /// Create a new BookingService
    pub fn new(
        engine: BookingEngine,
        repository: Arc<dyn ReservationRepository>,
        gateway: Arc<dyn PaymentGateway>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            repository,
            gateway,
            currency: currency.into(),
        }
    }

    /// Build a wizard state from a reservation request and walk it to payment
    ///
    /// Each step's guard must hold on the way. A rejected coupon fails the
    /// request rather than silently dropping the discount.
    pub async fn prepare(
        &self,
        product_id: &ProductId,
        request: ReservationRequest,
    ) -> Result<BookingState, BookingError> {
        let draft = BookingDraft::from(request);
        let today = Utc::now().date_naive();
        let drafted = self.engine.draft_state(product_id, &draft, today).await?;

        if let Some(rejection) = drafted.coupon_rejection {
            return Err(BookingError::CouponRejected(rejection));
        }

        let mut state = drafted.state;
        while state.step() != WizardStep::Payment {
            state = state.advance()?;
        }
        Ok(state)
    }

    /// Validate, pay and persist a request in one call
    pub async fn book(
        &self,
        product_id: &ProductId,
        request: ReservationRequest,
    ) -> Result<ReservationResponse, BookingError> {
        let channel_id = request.channel_id.clone();
        let state = self.prepare(product_id, request).await?;
        self.complete(&state, channel_id.as_deref()).await
    }

    /// Complete a booking from a state at the payment step
    ///
    /// The state is only borrowed, so after a declined payment the caller can
    /// retry with the same state. Partial writes are logged and reported, not
    /// rolled back.
    pub async fn complete(
        &self,
        state: &BookingState,
        channel_id: Option<&str>,
    ) -> Result<ReservationResponse, BookingError> {
        if state.step() != WizardStep::Payment {
            return Err(BookingError::NotReady(state.step()));
        }
        state.check_through(WizardStep::Payment)?;

        let quote = state.quote()?;
        let session = state.session().ok_or(BookingError::NotReady(WizardStep::SelectDate))?;
        let guest = state.guest().clone();

        let receipt = if quote.total > Decimal::ZERO {
            let request = PaymentRequest {
                amount: quote.display_total(),
                currency: self.currency.clone(),
                customer: PaymentCustomer {
                    name: guest.name.trim().to_string(),
                    email: guest.email.trim().to_string(),
                    phone: guest.phone.trim().to_string(),
                },
                description: format!("{} {}", session.product.name, quote.date),
            };
            self.gateway
                .create_payment_intent(&request)
                .await
                .map_err(|e| {
                    warn!("Payment for product {} on {} failed: {}", session.product.id, quote.date, e);
                    BookingError::from(e)
                })?
        } else {
            PaymentReceipt { transaction_id: None }
        };

        let status = if self.gateway.collects_payment() || quote.total <= Decimal::ZERO {
            ReservationStatus::Confirmed
        } else {
            ReservationStatus::PayOnSite
        };

        let payload = ReservationPayload {
            product_id: session.product.id.clone(),
            tour_date: quote.date,
            channel_id: channel_id.map(str::to_string),
            participants: quote.participants,
            guest,
            selections: quote.selection_lines.clone(),
            coupon_code: state.coupon().map(|coupon| coupon.code.clone()),
            subtotal: quote.subtotal,
            discount: quote.discount,
            total_price: quote.total,
            currency: self.currency.clone(),
            status,
            payment_transaction_id: receipt.transaction_id,
        };

        let reservation = self.repository.insert_reservation(&payload).await.map_err(|e| {
            error!(
                "Failed to save reservation for product {} on {} (payment {:?}): {}",
                payload.product_id, payload.tour_date, payload.payment_transaction_id, e
            );
            BookingError::Persistence(e.to_string())
        })?;

        let mut failed_lines = 0;
        for line in &payload.selections {
            if let Err(e) = self.repository.insert_selection_line(reservation.id, line).await {
                error!(
                    "Failed to save selection {}/{} for reservation {}: {}",
                    line.group_id, line.option_id, reservation.id, e
                );
                failed_lines += 1;
            }
        }
        if failed_lines > 0 {
            return Err(BookingError::PartialWrite {
                reservation_id: reservation.id,
            });
        }

        info!(
            "Reservation {} created for product {} on {}: {} {} ({})",
            reservation.id, payload.product_id, payload.tour_date, payload.total_price, payload.currency, status
        );

        Ok(ReservationResponse {
            display_total: quote.display_total(),
            selections: payload.selections,
            reservation,
        })
    }
}
