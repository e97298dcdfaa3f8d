use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::geofence::{Coordinate, ProximityEvaluator, SafeZoneRegistry};
use crate::store::{AlertStore, GroupRecord, GroupStore, LocationStore, NewLocationSample};

/// 单次位置上报的结果
#[derive(Debug, Clone, Copy)]
pub struct IngestOutcome {
    pub stored: bool,
    pub out_of_range: bool,
}

/// 一次待入库的位置上报
#[derive(Debug, Clone)]
pub struct LocationReport {
    pub coordinate: Coordinate,
    pub altitude: Option<f64>,
    pub speed: Option<f64>,
    pub captured_at: DateTime<Utc>,
}

/// 上报入口的错误分类：校验失败 / 引用对象不存在 / 持久化失败
///
/// 接口层靠这三类区分映射到400、404、500，持久化错误原样向上传递，
/// 核心不做重试也不留下半提交状态。
#[derive(Debug)]
pub enum IngestError {
    InvalidCoordinate { latitude: f64, longitude: f64 },
    InvalidSpeed(f64),
    NotLeader { group_id: String, user_id: String },
    LeaderSelfReport { group_id: String, user_id: String },
    GroupNotFound(String),
    NotMember { group_id: String, user_id: String },
    Persistence(sqlx::Error),
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::InvalidCoordinate {
                latitude,
                longitude,
            } => write!(f, "坐标超出合法范围: ({}, {})", latitude, longitude),
            IngestError::InvalidSpeed(speed) => write!(f, "速度值非法: {}", speed),
            IngestError::NotLeader { group_id, user_id } => {
                write!(f, "用户 {} 不是群组 {} 的队长", user_id, group_id)
            }
            IngestError::LeaderSelfReport { group_id, user_id } => write!(
                f,
                "队长 {} 应使用队长上报接口（群组 {}）",
                user_id, group_id
            ),
            IngestError::GroupNotFound(group_id) => write!(f, "群组 {} 不存在", group_id),
            IngestError::NotMember { group_id, user_id } => {
                write!(f, "用户 {} 不在群组 {} 中", user_id, group_id)
            }
            IngestError::Persistence(e) => write!(f, "持久化失败: {}", e),
        }
    }
}

impl std::error::Error for IngestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IngestError::Persistence(e) => Some(e),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for IngestError {
    fn from(e: sqlx::Error) -> Self {
        IngestError::Persistence(e)
    }
}

/// 位置上报的编排入口
///
/// 队长和成员是两个独立操作，而不是一个带布尔开关的入口：
/// 队长路径根本不经过评估器，"队长不会对自己告警"由结构保证。
pub struct LocationIngestService {
    groups: Arc<dyn GroupStore>,
    locations: Arc<dyn LocationStore>,
    alerts: Arc<dyn AlertStore>,
    registry: Arc<SafeZoneRegistry>,
    evaluator: ProximityEvaluator,
}

impl LocationIngestService {
    pub fn new(
        groups: Arc<dyn GroupStore>,
        locations: Arc<dyn LocationStore>,
        alerts: Arc<dyn AlertStore>,
        registry: Arc<SafeZoneRegistry>,
    ) -> Self {
        let evaluator = ProximityEvaluator::new(Arc::clone(&registry));
        Self {
            groups,
            locations,
            alerts,
            registry,
            evaluator,
        }
    }

    /// 队长位置上报：落库并刷新安全区中心
    pub async fn report_leader_location(
        &self,
        group_id: &str,
        leader_id: &str,
        report: LocationReport,
    ) -> Result<IngestOutcome, IngestError> {
        validate_report(&report)?;

        let group = self.load_group(group_id).await?;
        if group.leader_id != leader_id {
            return Err(IngestError::NotLeader {
                group_id: group_id.to_string(),
                user_id: leader_id.to_string(),
            });
        }

        self.persist_sample(group_id, leader_id, &report).await?;

        // 行程已结束的群组只保留原始轨迹，不再移动安全区
        if group.active {
            self.registry
                .sync_group(group_id, &group.leader_id, group.radius_meters);
            self.registry
                .update_leader_location(group_id, report.coordinate);
        }

        Ok(IngestOutcome {
            stored: true,
            out_of_range: false,
        })
    }

    /// 成员位置上报：落库、评估，新越界时写入一条未解决告警
    pub async fn report_member_location(
        &self,
        group_id: &str,
        member_id: &str,
        report: LocationReport,
    ) -> Result<IngestOutcome, IngestError> {
        validate_report(&report)?;

        let group = self.load_group(group_id).await?;
        if group.leader_id == member_id {
            return Err(IngestError::LeaderSelfReport {
                group_id: group_id.to_string(),
                user_id: member_id.to_string(),
            });
        }
        if !self.groups.is_member(group_id, member_id).await? {
            return Err(IngestError::NotMember {
                group_id: group_id.to_string(),
                user_id: member_id.to_string(),
            });
        }

        self.persist_sample(group_id, member_id, &report).await?;

        if !group.active {
            return Ok(IngestOutcome {
                stored: true,
                out_of_range: false,
            });
        }

        // 先用权威群组记录对齐注册表（半径调整、进程重启后的惰性重建），
        // 再做本次样本的评估
        self.registry
            .sync_group(group_id, &group.leader_id, group.radius_meters);
        let evaluation = self
            .evaluator
            .evaluate(group_id, member_id, report.coordinate);

        let Some(alert) = evaluation.alert else {
            return Ok(IngestOutcome {
                stored: true,
                out_of_range: false,
            });
        };

        // 同一成员持续越界只保留一条未解决告警，解决后才会再次告警
        let existing = self
            .alerts
            .find_unresolved_alert(member_id, group_id, alert.kind)
            .await?;
        if existing.is_none() {
            self.alerts.create_alert(&alert).await?;
            tracing::warn!(
                "Member {} left the safe zone of group {} ({:.0}m from center)",
                member_id,
                group_id,
                alert.distance_meters
            );
        }

        Ok(IngestOutcome {
            stored: true,
            out_of_range: true,
        })
    }

    async fn load_group(&self, group_id: &str) -> Result<GroupRecord, IngestError> {
        self.groups
            .get_group(group_id)
            .await?
            .ok_or_else(|| IngestError::GroupNotFound(group_id.to_string()))
    }

    async fn persist_sample(
        &self,
        group_id: &str,
        user_id: &str,
        report: &LocationReport,
    ) -> Result<(), IngestError> {
        let sample = NewLocationSample {
            user_id: user_id.to_string(),
            group_id: group_id.to_string(),
            coordinate: report.coordinate,
            altitude: report.altitude,
            speed: report.speed,
            captured_at: report.captured_at,
        };
        self.locations.create_location_sample(&sample).await?;
        Ok(())
    }
}

fn validate_report(report: &LocationReport) -> Result<(), IngestError> {
    if !report.coordinate.in_valid_range() {
        return Err(IngestError::InvalidCoordinate {
            latitude: report.coordinate.latitude,
            longitude: report.coordinate.longitude,
        });
    }
    if let Some(speed) = report.speed {
        if !speed.is_finite() || speed < 0.0 {
            return Err(IngestError::InvalidSpeed(speed));
        }
    }
    Ok(())
}
