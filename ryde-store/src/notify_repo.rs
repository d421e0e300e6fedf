use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ryde_core::repository::{NotificationRepository, PushSubscriptionRepository, StoreResult};
use ryde_domain::{Notification, NotificationKind, Priority, PushSubscription, SubscriptionKeys};
use sqlx::PgPool;
use uuid::Uuid;

/// Postgres-backed notification log.
pub struct PgNotificationStore {
    pool: PgPool,
}

impl PgNotificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    user_id: Uuid,
    kind: String,
    title: String,
    message: String,
    priority: String,
    data: serde_json::Value,
    read: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = Box<dyn std::error::Error + Send + Sync>;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        let kind = NotificationKind::parse(&row.kind)
            .ok_or_else(|| format!("unknown notification kind: {}", row.kind))?;
        let priority = Priority::parse(&row.priority)
            .ok_or_else(|| format!("unknown priority: {}", row.priority))?;

        Ok(Notification {
            id: row.id,
            user_id: row.user_id,
            kind,
            title: row.title,
            message: row.message,
            priority,
            data: row.data,
            read: row.read,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl NotificationRepository for PgNotificationStore {
    async fn insert(&self, notification: &Notification) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO notifications (id, user_id, kind, title, message, priority, data, read, \
             created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(notification.id)
        .bind(notification.user_id)
        .bind(notification.kind.as_str())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.priority.as_str())
        .bind(&notification.data)
        .bind(notification.read)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Notification>> {
        let row: Option<NotificationRow> = sqlx::query_as(
            "SELECT id, user_id, kind, title, message, priority, data, read, created_at \
             FROM notifications WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Notification::try_from).transpose()
    }

    async fn set_read(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("UPDATE notifications SET read = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(format!("notification not found: {}", id).into());
        }
        Ok(())
    }

    async fn list_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Notification>> {
        let rows: Vec<NotificationRow> = sqlx::query_as(
            "SELECT id, user_id, kind, title, message, priority, data, read, created_at \
             FROM notifications WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Notification::try_from).collect()
    }

    async fn unread_count(&self, user_id: Uuid) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND read = FALSE",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count as u64)
    }
}

/// Postgres-backed push-subscription records, one row per user.
pub struct PgPushSubscriptionStore {
    pool: PgPool,
}

impl PgPushSubscriptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SubscriptionRow {
    user_id: Uuid,
    endpoint: String,
    p256dh: String,
    auth: String,
    created_at: DateTime<Utc>,
}

impl From<SubscriptionRow> for PushSubscription {
    fn from(row: SubscriptionRow) -> Self {
        PushSubscription {
            user_id: row.user_id,
            endpoint: row.endpoint,
            keys: SubscriptionKeys {
                p256dh: row.p256dh,
                auth: row.auth,
            },
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl PushSubscriptionRepository for PgPushSubscriptionStore {
    async fn upsert(&self, subscription: &PushSubscription) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO push_subscriptions (user_id, endpoint, p256dh, auth, created_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (user_id) DO UPDATE SET endpoint = EXCLUDED.endpoint, \
             p256dh = EXCLUDED.p256dh, auth = EXCLUDED.auth, created_at = EXCLUDED.created_at",
        )
        .bind(subscription.user_id)
        .bind(&subscription.endpoint)
        .bind(&subscription.keys.p256dh)
        .bind(&subscription.keys.auth)
        .bind(subscription.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, user_id: Uuid) -> StoreResult<Option<PushSubscription>> {
        let row: Option<SubscriptionRow> = sqlx::query_as(
            "SELECT user_id, endpoint, p256dh, auth, created_at FROM push_subscriptions \
             WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(PushSubscription::from))
    }

    async fn remove(&self, user_id: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM push_subscriptions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn user_ids(&self) -> StoreResult<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar("SELECT user_id FROM push_subscriptions")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }
}
