use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::geo::{self, Coordinate};
use super::registry::SafeZoneRegistry;

/// 告警类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertKind {
    OutOfRange,
}

impl AlertKind {
    /// 持久层存储用的标识
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::OutOfRange => "OUT_OF_RANGE",
        }
    }
}

/// 越界告警的结构化记录
///
/// 只保留结构化字段，展示文案由接口层按需渲染。
/// resolved标记由队长侧操作翻转，评估器永远不碰它。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProximityAlert {
    pub member_id: String,
    pub group_id: String,
    pub kind: AlertKind,
    pub last_known: Coordinate,
    pub distance_meters: f64,
    pub created_at: DateTime<Utc>,
}

/// 单个位置样本的评估结果
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub in_zone: bool,
    pub alert: Option<ProximityAlert>,
}

impl Evaluation {
    fn in_zone() -> Self {
        Self {
            in_zone: true,
            alert: None,
        }
    }
}

/// 判断单个位置样本是否在群组安全区内
///
/// 评估器本身无状态：它只回答“这一个样本是否越界”，同一成员持续
/// 越界时的重复告警抑制由上报编排方结合告警存储完成。
pub struct ProximityEvaluator {
    registry: Arc<SafeZoneRegistry>,
}

impl ProximityEvaluator {
    pub fn new(registry: Arc<SafeZoneRegistry>) -> Self {
        Self { registry }
    }

    pub fn evaluate(&self, group_id: &str, member_id: &str, coordinate: Coordinate) -> Evaluation {
        // 安全区尚未建立（队长还没上报过位置）时视为在区内，不做误报
        let Some(zone) = self.registry.get_zone(group_id) else {
            return Evaluation::in_zone();
        };

        let distance = geo::distance_meters(coordinate, zone.center);
        // 边界按包含处理：正好落在半径上算在区内
        if distance <= zone.radius_meters {
            return Evaluation::in_zone();
        }

        Evaluation {
            in_zone: false,
            alert: Some(ProximityAlert {
                member_id: member_id.to_string(),
                group_id: group_id.to_string(),
                kind: AlertKind::OutOfRange,
                last_known: coordinate,
                distance_meters: distance,
                created_at: Utc::now(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEADER_POS: Coordinate = Coordinate {
        latitude: 6.9271,
        longitude: 79.8612,
    };

    fn evaluator_with_zone(radius_meters: f64) -> ProximityEvaluator {
        let registry = Arc::new(SafeZoneRegistry::new());
        registry.register_group("g1", "leader", radius_meters);
        registry.update_leader_location("g1", LEADER_POS);
        ProximityEvaluator::new(registry)
    }

    #[test]
    fn no_zone_means_assumed_safe() {
        let registry = Arc::new(SafeZoneRegistry::new());
        registry.register_group("g1", "leader", 100.0);
        let evaluator = ProximityEvaluator::new(registry);

        // 队长还没上报过位置，任何坐标都不产生告警
        let eval = evaluator.evaluate("g1", "m1", Coordinate::new(55.0, 12.0));
        assert!(eval.in_zone);
        assert!(eval.alert.is_none());
    }

    #[test]
    fn nearby_member_is_in_zone() {
        let evaluator = evaluator_with_zone(100.0);
        // 约11米外
        let eval = evaluator.evaluate("g1", "m1", Coordinate::new(6.9271, 79.8613));
        assert!(eval.in_zone);
        assert!(eval.alert.is_none());
    }

    #[test]
    fn faraway_member_gets_an_alert() {
        let evaluator = evaluator_with_zone(100.0);
        // 约1.5公里外
        let eval = evaluator.evaluate("g1", "m1", Coordinate::new(6.9371, 79.8712));
        assert!(!eval.in_zone);

        let alert = eval.alert.expect("out-of-zone sample must carry an alert");
        assert_eq!(alert.member_id, "m1");
        assert_eq!(alert.group_id, "g1");
        assert_eq!(alert.kind, AlertKind::OutOfRange);
        assert_eq!(alert.last_known, Coordinate::new(6.9371, 79.8712));
        assert!(alert.distance_meters > 100.0);
    }

    #[test]
    fn exactly_at_radius_counts_as_in_zone() {
        let member = Coordinate::new(6.9280, 79.8612);
        let exact = super::geo::distance_meters(LEADER_POS, member);

        let evaluator = evaluator_with_zone(exact);
        let eval = evaluator.evaluate("g1", "m1", member);
        assert!(eval.in_zone, "boundary must be inclusive");
        assert!(eval.alert.is_none());
    }
}
