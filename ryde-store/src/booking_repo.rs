use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use ryde_core::repository::{BookingRepository, StoreResult};
use ryde_domain::{Booking, BookingCharges, BookingStatus, PaymentState};
use sqlx::PgPool;
use uuid::Uuid;

/// Postgres-backed booking store. Queries are bound at runtime so the
/// workspace builds without a live database; see schema.sql for the tables.
pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    car_id: Uuid,
    renter_id: Uuid,
    owner_id: Uuid,
    start_date: NaiveDate,
    end_date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
    status: String,
    payment_status: String,
    total_amount: i64,
    service_fee: i64,
    insurance: i64,
    cancel_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = Box<dyn std::error::Error + Send + Sync>;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let status = BookingStatus::parse(&row.status)
            .ok_or_else(|| format!("unknown booking status: {}", row.status))?;
        let payment_status = PaymentState::parse(&row.payment_status)
            .ok_or_else(|| format!("unknown payment state: {}", row.payment_status))?;

        Ok(Booking {
            id: row.id,
            car_id: row.car_id,
            renter_id: row.renter_id,
            owner_id: row.owner_id,
            start_date: row.start_date,
            end_date: row.end_date,
            start_time: row.start_time,
            end_time: row.end_time,
            status,
            payment_status,
            charges: BookingCharges {
                total_amount: row.total_amount,
                service_fee: row.service_fee,
                insurance: row.insurance,
            },
            cancel_reason: row.cancel_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_COLUMNS: &str = "id, car_id, renter_id, owner_id, start_date, end_date, start_time, \
     end_time, status, payment_status, total_amount, service_fee, insurance, cancel_reason, \
     created_at, updated_at";

#[async_trait]
impl BookingRepository for PgBookingStore {
    async fn insert(&self, booking: &Booking) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO bookings (id, car_id, renter_id, owner_id, start_date, end_date, \
             start_time, end_time, status, payment_status, total_amount, service_fee, insurance, \
             cancel_reason, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
        )
        .bind(booking.id)
        .bind(booking.car_id)
        .bind(booking.renter_id)
        .bind(booking.owner_id)
        .bind(booking.start_date)
        .bind(booking.end_date)
        .bind(booking.start_time)
        .bind(booking.end_time)
        .bind(booking.status.as_str())
        .bind(booking.payment_status.as_str())
        .bind(booking.charges.total_amount)
        .bind(booking.charges.service_fee)
        .bind(booking.charges.insurance)
        .bind(&booking.cancel_reason)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        let row: Option<BookingRow> = sqlx::query_as(&format!(
            "SELECT {} FROM bookings WHERE id = $1",
            SELECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Booking::try_from).transpose()
    }

    async fn update(&self, booking: &Booking) -> StoreResult<()> {
        // amounts and the window are immutable once created; only status,
        // payment state and the cancel reason move
        let result = sqlx::query(
            "UPDATE bookings SET status = $1, payment_status = $2, cancel_reason = $3, \
             updated_at = $4 WHERE id = $5",
        )
        .bind(booking.status.as_str())
        .bind(booking.payment_status.as_str())
        .bind(&booking.cancel_reason)
        .bind(booking.updated_at)
        .bind(booking.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(format!("booking not found: {}", booking.id).into());
        }
        Ok(())
    }

    async fn list_for_car(&self, car_id: Uuid, active_only: bool) -> StoreResult<Vec<Booking>> {
        let query = if active_only {
            format!(
                "SELECT {} FROM bookings WHERE car_id = $1 AND status <> 'CANCELLED' \
                 ORDER BY start_date, start_time",
                SELECT_COLUMNS
            )
        } else {
            format!(
                "SELECT {} FROM bookings WHERE car_id = $1 ORDER BY start_date, start_time",
                SELECT_COLUMNS
            )
        };

        let rows: Vec<BookingRow> = sqlx::query_as(&query)
            .bind(car_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Booking::try_from).collect()
    }

    async fn list_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Booking>> {
        let rows: Vec<BookingRow> = sqlx::query_as(&format!(
            "SELECT {} FROM bookings WHERE renter_id = $1 OR owner_id = $1 \
             ORDER BY created_at DESC",
            SELECT_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Booking::try_from).collect()
    }
}
