use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::geofence::Coordinate;
use crate::service::LocationReport;

/// 位置上报请求（队长和成员两个接口共用同一形状）
#[derive(Debug, Deserialize)]
pub struct ReportLocationRequest {
    pub group_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    pub speed: Option<f64>,
    /// 设备采样时刻，缺省按服务端收到的时间算
    pub captured_at: Option<DateTime<Utc>>,
}

impl ReportLocationRequest {
    pub fn to_report(&self) -> LocationReport {
        LocationReport {
            coordinate: Coordinate::new(self.latitude, self.longitude),
            altitude: self.altitude,
            speed: self.speed,
            captured_at: self.captured_at.unwrap_or_else(Utc::now),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReportLocationResponse {
    pub stored: bool,
    pub is_out_of_range: bool,
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct GroupQuery {
    pub group_id: String,
}

/// 群组地图视图用的成员最新位置
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct MemberLocation {
    pub user_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    pub speed: Option<f64>,
    pub captured_at: DateTime<Utc>,
}

impl MemberLocation {
    /// 每个成员只取最近一条样本
    pub async fn latest_for_group(
        pool: &PgPool,
        group_id: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, MemberLocation>(
            r#"
            SELECT DISTINCT ON (ls.user_id)
                ls.user_id,
                ls.latitude,
                ls.longitude,
                ls.altitude,
                ls.speed,
                ls.captured_at
            FROM location_samples ls
            JOIN group_members gm
                ON gm.group_id = ls.group_id AND gm.user_id = ls.user_id
            WHERE gm.group_id = $1
            ORDER BY ls.user_id, ls.captured_at DESC
            "#,
        )
        .bind(group_id)
        .fetch_all(pool)
        .await
    }
}
