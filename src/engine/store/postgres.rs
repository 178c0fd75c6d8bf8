use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::collections::{BTreeMap, HashMap};

use crate::engine::{
    catalog::RawChoiceRow,
    content::{ChannelScope, ContentField, ContentOverrideRecord, ContentSection},
    coupon::Coupon,
    error::{EngineError, EngineResult},
    pricing_index::DatePricingRecord,
    store::BookingStore,
    types::{AgeBands, Product, ProductId},
};

#[derive(Debug, FromRow)]
struct ProductRow {
    id: String,
    name: String,
    base_price: Decimal,
    infant_max_age: i16,
    child_max_age: i16,
    min_participants: i32,
    max_participants: i32,
}

impl TryFrom<ProductRow> for Product {
    type Error = EngineError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let invalid = |field: &str| EngineError::InvalidRecord(format!("product {}: invalid {}", row.id, field));

        Ok(Product {
            age_bands: AgeBands {
                infant_max_age: u8::try_from(row.infant_max_age).map_err(|_| invalid("infant_max_age"))?,
                child_max_age: u8::try_from(row.child_max_age).map_err(|_| invalid("child_max_age"))?,
            },
            min_participants: u32::try_from(row.min_participants).map_err(|_| invalid("min_participants"))?,
            max_participants: u32::try_from(row.max_participants).map_err(|_| invalid("max_participants"))?,
            id: ProductId::new(&row.id),
            name: row.name,
            base_price: row.base_price,
        })
    }
}

#[derive(Debug, FromRow)]
struct DatePricingRow {
    sale_date: NaiveDate,
    adult_price: Option<Decimal>,
    child_price: Option<Decimal>,
    infant_price: Option<Decimal>,
    sale_available: bool,
    choice_availability: Option<Json<HashMap<String, bool>>>,
}

impl From<DatePricingRow> for DatePricingRecord {
    fn from(row: DatePricingRow) -> Self {
        DatePricingRecord {
            date: row.sale_date,
            adult_price: row.adult_price,
            child_price: row.child_price,
            infant_price: row.infant_price,
            sale_available: row.sale_available,
            choice_availability: row.choice_availability.map(|json| json.0).unwrap_or_default(),
        }
    }
}

#[derive(Debug, FromRow)]
struct ChoiceRow {
    group_id: String,
    group_name: String,
    group_description: Option<String>,
    is_required: bool,
    option_id: String,
    option_name: String,
    price_adjustment: Decimal,
    adult_adjustment: Option<Decimal>,
    child_adjustment: Option<Decimal>,
    infant_adjustment: Option<Decimal>,
    is_default: bool,
    image_url: Option<String>,
    sort_order: i32,
}

impl From<ChoiceRow> for RawChoiceRow {
    fn from(row: ChoiceRow) -> Self {
        RawChoiceRow {
            group_id: row.group_id,
            group_name: row.group_name,
            group_description: row.group_description,
            is_required: row.is_required,
            option_id: row.option_id,
            option_name: row.option_name,
            price_adjustment: row.price_adjustment,
            adult_adjustment: row.adult_adjustment,
            child_adjustment: row.child_adjustment,
            infant_adjustment: row.infant_adjustment,
            is_default: row.is_default,
            image_url: row.image_url,
            sort_order: row.sort_order,
        }
    }
}

#[derive(Debug, FromRow)]
struct ContentRow {
    product_id: String,
    section: String,
    channel_id: Option<String>,
    variant_key: String,
    language_code: String,
    fields: Json<BTreeMap<ContentField, String>>,
    tags: Vec<String>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ContentRow> for ContentOverrideRecord {
    type Error = EngineError;

    fn try_from(row: ContentRow) -> Result<Self, Self::Error> {
        Ok(ContentOverrideRecord {
            section: row.section.parse().map_err(EngineError::InvalidRecord)?,
            product_id: ProductId::new(&row.product_id),
            channel: ChannelScope::from_column(row.channel_id),
            variant_key: row.variant_key,
            language_code: row.language_code,
            fields: row.fields.0,
            tags: row.tags,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct CouponRow {
    code: String,
    discount_type: String,
    discount_value: Decimal,
    status: String,
    product_id: Option<String>,
    channel_id: Option<String>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
}

impl TryFrom<CouponRow> for Coupon {
    type Error = EngineError;

    fn try_from(row: CouponRow) -> Result<Self, Self::Error> {
        Ok(Coupon {
            discount_type: row.discount_type.parse().map_err(EngineError::InvalidRecord)?,
            status: row.status.parse().map_err(EngineError::InvalidRecord)?,
            code: row.code,
            discount_value: row.discount_value,
            product_id: row.product_id.map(ProductId::new),
            channel_id: row.channel_id,
            start_date: row.start_date,
            end_date: row.end_date,
        })
    }
}

/// PostgreSQL adapter for the booking store
#[derive(Clone)]
pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    /// Create a new PgBookingStore
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the database pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn fetch_product(&self, product_id: &ProductId) -> EngineResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, name, base_price, infant_max_age, child_max_age, min_participants, max_participants
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(product_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    async fn fetch_date_pricing(
        &self,
        product_id: &ProductId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> EngineResult<Vec<DatePricingRecord>> {
        let rows = sqlx::query_as::<_, DatePricingRow>(
            r#"
            SELECT sale_date, adult_price, child_price, infant_price, sale_available, choice_availability
            FROM product_date_pricing
            WHERE product_id = $1 AND sale_date BETWEEN $2 AND $3
            ORDER BY sale_date
            "#,
        )
        .bind(product_id.as_str())
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(DatePricingRecord::from).collect())
    }

    async fn fetch_choice_rows(&self, product_id: &ProductId) -> EngineResult<Vec<RawChoiceRow>> {
        let rows = sqlx::query_as::<_, ChoiceRow>(
            r#"
            SELECT group_id, group_name, group_description, is_required, option_id, option_name,
                   price_adjustment, adult_adjustment, child_adjustment, infant_adjustment,
                   is_default, image_url, sort_order
            FROM product_choices
            WHERE product_id = $1
            ORDER BY sort_order, id
            "#,
        )
        .bind(product_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(RawChoiceRow::from).collect())
    }

    async fn fetch_booked_participants(
        &self,
        product_id: &ProductId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> EngineResult<HashMap<NaiveDate, u32>> {
        let rows: Vec<(NaiveDate, i64)> = sqlx::query_as(
            r#"
            SELECT tour_date, COALESCE(SUM(adults + children + infants), 0)::BIGINT
            FROM reservations
            WHERE product_id = $1 AND tour_date BETWEEN $2 AND $3 AND status <> 'cancelled'
            GROUP BY tour_date
            "#,
        )
        .bind(product_id.as_str())
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(date, booked)| (date, u32::try_from(booked).unwrap_or(u32::MAX)))
            .collect())
    }

    async fn fetch_content_records(
        &self,
        product_id: &ProductId,
        section: ContentSection,
        language_code: &str,
    ) -> EngineResult<Vec<ContentOverrideRecord>> {
        let rows = sqlx::query_as::<_, ContentRow>(
            r#"
            SELECT product_id, section, channel_id, variant_key, language_code, fields, tags, updated_at
            FROM product_content_overrides
            WHERE product_id = $1 AND section = $2 AND language_code = $3
            "#,
        )
        .bind(product_id.as_str())
        .bind(section.to_string())
        .bind(language_code)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ContentOverrideRecord::try_from).collect()
    }

    async fn upsert_content_record(&self, record: &ContentOverrideRecord) -> EngineResult<()> {
        sqlx::query(
            r#"
            INSERT INTO product_content_overrides
                (product_id, section, channel_id, variant_key, language_code, fields, tags, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            ON CONFLICT (product_id, section, channel_key, variant_key, language_code)
            DO UPDATE SET
                fields = EXCLUDED.fields,
                tags = EXCLUDED.tags,
                updated_at = NOW()
            "#,
        )
        .bind(record.product_id.as_str())
        .bind(record.section.to_string())
        .bind(record.channel.column_value())
        .bind(&record.variant_key)
        .bind(&record.language_code)
        .bind(Json(&record.fields))
        .bind(&record.tags)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_coupon(&self, code: &str) -> EngineResult<Option<Coupon>> {
        let row = sqlx::query_as::<_, CouponRow>(
            r#"
            SELECT code, discount_type, discount_value, status, product_id, channel_id, start_date, end_date
            FROM coupons
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Coupon::try_from).transpose()
    }
}
