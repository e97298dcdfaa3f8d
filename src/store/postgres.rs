use std::sync::Arc;

use async_trait::async_trait;
use redis::{AsyncCommands, Client as RedisClient};
use sqlx::PgPool;
use uuid::Uuid;

use crate::geofence::{AlertKind, ProximityAlert};

use super::{
    AlertStore, GroupRecord, GroupStore, LocationSample, LocationStore, NewLocationSample,
    StoredAlert,
};

// 缓存相关常量
const GROUP_CACHE_EXPIRE: u64 = 600; // 群组缓存过期时间，单位秒
const GROUP_ID_CACHE_PREFIX: &str = "group:id:"; // 群组ID缓存前缀

/// sqlx/Postgres实现的持久化协作方
///
/// 群组读取走redis旁路缓存：位置上报每次都要查一遍群组记录，
/// 这是整个服务最热的读路径。缓存失败一律降级为直接查库。
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    redis: Arc<RedisClient>,
}

impl PgStore {
    pub fn new(pool: PgPool, redis: Arc<RedisClient>) -> Self {
        Self { pool, redis }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 群组记录变更后清除缓存
    pub async fn invalidate_group(&self, group_id: &str) {
        if let Ok(mut conn) = self.redis.get_multiplexed_async_connection().await {
            let cache_key = format!("{}{}", GROUP_ID_CACHE_PREFIX, group_id);
            let _: Result<(), redis::RedisError> = conn.del(&cache_key).await;
        }
    }
}

#[async_trait]
impl GroupStore for PgStore {
    async fn get_group(&self, group_id: &str) -> Result<Option<GroupRecord>, sqlx::Error> {
        // 尝试从缓存读取
        let cache_key = format!("{}{}", GROUP_ID_CACHE_PREFIX, group_id);

        if let Ok(mut conn) = self.redis.get_multiplexed_async_connection().await {
            let cached: redis::RedisResult<String> = conn.get(&cache_key).await;

            if let Ok(json_str) = cached {
                if let Ok(group) = serde_json::from_str::<GroupRecord>(&json_str) {
                    tracing::debug!("Get group from cache: {}", cache_key);
                    return Ok(Some(group));
                }
            }
        }

        // 从数据库查询
        let group = sqlx::query_as::<_, GroupRecord>(
            r#"
            SELECT group_id, name, leader_id, radius_meters, active, created_at, member_count
            FROM groups
            WHERE group_id = $1
            "#,
        )
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await?;

        // 缓存结果
        if let Some(ref g) = group {
            if let Ok(mut conn) = self.redis.get_multiplexed_async_connection().await {
                if let Ok(json_str) = serde_json::to_string(g) {
                    let _: Result<(), redis::RedisError> =
                        conn.set_ex(&cache_key, json_str, GROUP_CACHE_EXPIRE).await;
                    tracing::debug!("Set group to cache: {}", cache_key);
                }
            }
        }

        Ok(group)
    }

    async fn is_member(&self, group_id: &str, user_id: &str) -> Result<bool, sqlx::Error> {
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM group_members
                WHERE group_id = $1 AND user_id = $2
            )
            "#,
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}

#[async_trait]
impl LocationStore for PgStore {
    async fn create_location_sample(
        &self,
        sample: &NewLocationSample,
    ) -> Result<LocationSample, sqlx::Error> {
        let sample_id = Uuid::new_v4().to_string();

        sqlx::query_as::<_, LocationSample>(
            r#"
            INSERT INTO location_samples (
                sample_id, user_id, group_id, latitude, longitude,
                altitude, speed, captured_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING
                sample_id, user_id, group_id, latitude, longitude,
                altitude, speed, captured_at
            "#,
        )
        .bind(&sample_id)
        .bind(&sample.user_id)
        .bind(&sample.group_id)
        .bind(sample.coordinate.latitude)
        .bind(sample.coordinate.longitude)
        .bind(sample.altitude)
        .bind(sample.speed)
        .bind(sample.captured_at)
        .fetch_one(&self.pool)
        .await
    }

    async fn find_latest_location(
        &self,
        user_id: &str,
    ) -> Result<Option<LocationSample>, sqlx::Error> {
        sqlx::query_as::<_, LocationSample>(
            r#"
            SELECT
                sample_id, user_id, group_id, latitude, longitude,
                altitude, speed, captured_at
            FROM location_samples
            WHERE user_id = $1
            ORDER BY captured_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }
}

#[async_trait]
impl AlertStore for PgStore {
    async fn create_alert(&self, alert: &ProximityAlert) -> Result<StoredAlert, sqlx::Error> {
        let alert_id = Uuid::new_v4().to_string();

        sqlx::query_as::<_, StoredAlert>(
            r#"
            INSERT INTO proximity_alerts (
                alert_id, group_id, member_id, kind, distance_meters,
                latitude, longitude, resolved, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, FALSE, $8)
            RETURNING
                alert_id, group_id, member_id, kind, distance_meters,
                latitude, longitude, resolved, created_at
            "#,
        )
        .bind(&alert_id)
        .bind(&alert.group_id)
        .bind(&alert.member_id)
        .bind(alert.kind.as_str())
        .bind(alert.distance_meters)
        .bind(alert.last_known.latitude)
        .bind(alert.last_known.longitude)
        .bind(alert.created_at)
        .fetch_one(&self.pool)
        .await
    }

    async fn find_unresolved_alert(
        &self,
        member_id: &str,
        group_id: &str,
        kind: AlertKind,
    ) -> Result<Option<StoredAlert>, sqlx::Error> {
        sqlx::query_as::<_, StoredAlert>(
            r#"
            SELECT
                alert_id, group_id, member_id, kind, distance_meters,
                latitude, longitude, resolved, created_at
            FROM proximity_alerts
            WHERE member_id = $1 AND group_id = $2 AND kind = $3 AND resolved = FALSE
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(member_id)
        .bind(group_id)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await
    }
}
