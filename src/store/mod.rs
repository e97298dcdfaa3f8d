use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::geofence::{AlertKind, Coordinate, ProximityAlert};

mod postgres;

pub use postgres::PgStore;

/// 群组记录（groups表的一行）
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GroupRecord {
    pub group_id: String,
    pub name: String,
    pub leader_id: String,
    pub radius_meters: f64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub member_count: i32,
}

/// 已落库的位置样本，写入后不再修改
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LocationSample {
    pub sample_id: String,
    pub user_id: String,
    pub group_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    pub speed: Option<f64>,
    pub captured_at: DateTime<Utc>,
}

/// 待写入的位置样本
#[derive(Debug, Clone)]
pub struct NewLocationSample {
    pub user_id: String,
    pub group_id: String,
    pub coordinate: Coordinate,
    pub altitude: Option<f64>,
    pub speed: Option<f64>,
    pub captured_at: DateTime<Utc>,
}

/// 已落库的告警（proximity_alerts表的一行）
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StoredAlert {
    pub alert_id: String,
    pub group_id: String,
    pub member_id: String,
    pub kind: String,
    pub distance_meters: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
}

/// 位置存储协作方
#[async_trait]
pub trait LocationStore: Send + Sync {
    async fn create_location_sample(
        &self,
        sample: &NewLocationSample,
    ) -> Result<LocationSample, sqlx::Error>;

    async fn find_latest_location(
        &self,
        user_id: &str,
    ) -> Result<Option<LocationSample>, sqlx::Error>;
}

/// 群组存储协作方（上报链路只需要只读视图）
#[async_trait]
pub trait GroupStore: Send + Sync {
    async fn get_group(&self, group_id: &str) -> Result<Option<GroupRecord>, sqlx::Error>;

    async fn is_member(&self, group_id: &str, user_id: &str) -> Result<bool, sqlx::Error>;
}

/// 告警存储协作方
#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn create_alert(&self, alert: &ProximityAlert) -> Result<StoredAlert, sqlx::Error>;

    /// 查找某成员在某群组内尚未解决的告警，用于重复告警抑制
    async fn find_unresolved_alert(
        &self,
        member_id: &str,
        group_id: &str,
        kind: AlertKind,
    ) -> Result<Option<StoredAlert>, sqlx::Error>;
}
