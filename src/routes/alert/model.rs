use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::store::{GroupStore, PgStore, StoredAlert};

#[derive(Debug, Deserialize)]
pub struct ResolveAlertRequest {
    pub alert_id: String,
}

/// 告警的接口视图：展示文案在这里渲染，核心记录只有结构化字段
#[derive(Debug, Serialize)]
pub struct AlertInfo {
    pub alert_id: String,
    pub group_id: String,
    pub member_id: String,
    pub kind: String,
    pub message: String,
    pub distance_meters: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
}

impl From<StoredAlert> for AlertInfo {
    fn from(alert: StoredAlert) -> Self {
        let message = render_message(&alert);
        Self {
            alert_id: alert.alert_id,
            group_id: alert.group_id,
            member_id: alert.member_id,
            kind: alert.kind,
            message,
            distance_meters: alert.distance_meters,
            latitude: alert.latitude,
            longitude: alert.longitude,
            resolved: alert.resolved,
            created_at: alert.created_at,
        }
    }
}

fn render_message(alert: &StoredAlert) -> String {
    match alert.kind.as_str() {
        "OUT_OF_RANGE" => format!(
            "成员 {} 已离开安全区，距离中心约 {:.0} 米",
            alert.member_id, alert.distance_meters
        ),
        other => format!("成员 {} 触发告警 {}", alert.member_id, other),
    }
}

impl StoredAlert {
    pub async fn unresolved_for_group(
        pool: &PgPool,
        group_id: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, StoredAlert>(
            r#"
            SELECT
                alert_id, group_id, member_id, kind, distance_meters,
                latitude, longitude, resolved, created_at
            FROM proximity_alerts
            WHERE group_id = $1 AND resolved = FALSE
            ORDER BY created_at DESC
            "#,
        )
        .bind(group_id)
        .fetch_all(pool)
        .await
    }

    /// 只有所属群组的队长能解决告警；解决后同一成员再次越界会产生新告警
    pub async fn resolve(
        store: &PgStore,
        alert_id: &str,
        user_id: &str,
    ) -> Result<Self, sqlx::Error> {
        let alert = sqlx::query_as::<_, StoredAlert>(
            r#"
            SELECT
                alert_id, group_id, member_id, kind, distance_meters,
                latitude, longitude, resolved, created_at
            FROM proximity_alerts
            WHERE alert_id = $1
            "#,
        )
        .bind(alert_id)
        .fetch_optional(store.pool())
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;

        let group = store
            .get_group(&alert.group_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        if group.leader_id != user_id {
            return Err(sqlx::Error::Protocol(
                "Only the leader can resolve alerts".into(),
            ));
        }

        sqlx::query_as::<_, StoredAlert>(
            r#"
            UPDATE proximity_alerts
            SET resolved = TRUE
            WHERE alert_id = $1
            RETURNING
                alert_id, group_id, member_id, kind, distance_meters,
                latitude, longitude, resolved, created_at
            "#,
        )
        .bind(alert_id)
        .fetch_one(store.pool())
        .await
    }
}
