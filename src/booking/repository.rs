use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::booking::models::{Reservation, ReservationPayload};
use crate::engine::store::memory::StoreTable;
use crate::engine::{EngineError, EngineResult, InMemoryStore, PgBookingStore, SelectionLine};

/// Write side of the relational store for completed bookings
///
/// The reservation row and its selection lines are written separately so a
/// caller can tell a partial write from a failed one.
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    /// Insert the reservation row
    async fn insert_reservation(&self, payload: &ReservationPayload) -> EngineResult<Reservation>;

    /// Insert one selection line of an existing reservation
    async fn insert_selection_line(&self, reservation_id: Uuid, line: &SelectionLine) -> EngineResult<()>;
}

fn count(value: u32, field: &str) -> EngineResult<i32> {
    i32::try_from(value).map_err(|_| EngineError::InvalidRecord(format!("{} out of range: {}", field, value)))
}

#[async_trait]
impl ReservationRepository for PgBookingStore {
    async fn insert_reservation(&self, payload: &ReservationPayload) -> EngineResult<Reservation> {
        let reservation = sqlx::query_as::<_, Reservation>(
            r#"
            INSERT INTO reservations
                (product_id, tour_date, channel_id, status, adults, children, infants,
                 customer_name, email, phone, country, native_language, coupon_code,
                 subtotal, discount, total_price, currency, payment_transaction_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            RETURNING id, product_id, tour_date, status, adults, children, infants, customer_name, email,
                      subtotal, discount, total_price, currency, payment_transaction_id, created_at
            "#,
        )
        .bind(payload.product_id.as_str())
        .bind(payload.tour_date)
        .bind(&payload.channel_id)
        .bind(payload.status)
        .bind(count(payload.participants.adults, "adults")?)
        .bind(count(payload.participants.children, "children")?)
        .bind(count(payload.participants.infants, "infants")?)
        .bind(payload.guest.name.trim())
        .bind(payload.guest.email.trim())
        .bind(payload.guest.phone.trim())
        .bind(payload.guest.country.trim())
        .bind(payload.guest.native_language.trim())
        .bind(&payload.coupon_code)
        .bind(payload.subtotal)
        .bind(payload.discount)
        .bind(payload.total_price)
        .bind(&payload.currency)
        .bind(&payload.payment_transaction_id)
        .fetch_one(self.pool())
        .await?;

        Ok(reservation)
    }

    async fn insert_selection_line(&self, reservation_id: Uuid, line: &SelectionLine) -> EngineResult<()> {
        sqlx::query(
            r#"
            INSERT INTO reservation_selections
                (reservation_id, group_id, option_id, option_name, is_required, line_total)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(reservation_id)
        .bind(&line.group_id)
        .bind(&line.option_id)
        .bind(&line.option_name)
        .bind(line.required)
        .bind(line.total)
        .execute(self.pool())
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ReservationRepository for InMemoryStore {
    async fn insert_reservation(&self, payload: &ReservationPayload) -> EngineResult<Reservation> {
        let mut state = self.state.write().await;
        state.check(StoreTable::Reservations)?;

        let reservation = Reservation {
            id: Uuid::new_v4(),
            product_id: payload.product_id.to_string(),
            tour_date: payload.tour_date,
            status: payload.status,
            adults: count(payload.participants.adults, "adults")?,
            children: count(payload.participants.children, "children")?,
            infants: count(payload.participants.infants, "infants")?,
            customer_name: payload.guest.name.trim().to_string(),
            email: payload.guest.email.trim().to_string(),
            subtotal: payload.subtotal,
            discount: payload.discount,
            total_price: payload.total_price,
            currency: payload.currency.clone(),
            payment_transaction_id: payload.payment_transaction_id.clone(),
            created_at: Utc::now(),
        };
        state.reservations.push(reservation.clone());

        Ok(reservation)
    }

    async fn insert_selection_line(&self, reservation_id: Uuid, line: &SelectionLine) -> EngineResult<()> {
        let mut state = self.state.write().await;
        state.check(StoreTable::ReservationSelections)?;
        state.reservation_lines.push((reservation_id, line.clone()));
        Ok(())
    }
}
