//! 位置上报链路的集成测试：真实的注册表和评估器，内存实现的存储协作方

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use tripsafe_backend::geofence::{AlertKind, Coordinate, ProximityAlert, SafeZoneRegistry};
use tripsafe_backend::service::{IngestError, LocationIngestService, LocationReport};
use tripsafe_backend::store::{
    AlertStore, GroupRecord, GroupStore, LocationSample, LocationStore, NewLocationSample,
    StoredAlert,
};

// 科伦坡市区的种子坐标：NEARBY约11米，FARAWAY约1.5公里
const LEADER_POS: (f64, f64) = (6.9271, 79.8612);
const NEARBY: (f64, f64) = (6.9271, 79.8613);
const FARAWAY: (f64, f64) = (6.9371, 79.8712);

#[derive(Default)]
struct MemoryStore {
    groups: Mutex<Vec<GroupRecord>>,
    members: Mutex<Vec<(String, String)>>,
    samples: Mutex<Vec<LocationSample>>,
    alerts: Mutex<Vec<StoredAlert>>,
}

impl MemoryStore {
    fn with_group(group: GroupRecord, member_ids: &[&str]) -> Arc<Self> {
        let store = Self::default();
        let group_id = group.group_id.clone();
        store.members.lock().push((group_id.clone(), group.leader_id.clone()));
        for member in member_ids {
            store.members.lock().push((group_id.clone(), member.to_string()));
        }
        store.groups.lock().push(group);
        Arc::new(store)
    }

    fn sample_count(&self) -> usize {
        self.samples.lock().len()
    }

    fn alert_count(&self) -> usize {
        self.alerts.lock().len()
    }

    fn resolve_all(&self) {
        for alert in self.alerts.lock().iter_mut() {
            alert.resolved = true;
        }
    }
}

#[async_trait]
impl GroupStore for MemoryStore {
    async fn get_group(&self, group_id: &str) -> Result<Option<GroupRecord>, sqlx::Error> {
        Ok(self
            .groups
            .lock()
            .iter()
            .find(|g| g.group_id == group_id)
            .cloned())
    }

    async fn is_member(&self, group_id: &str, user_id: &str) -> Result<bool, sqlx::Error> {
        Ok(self
            .members
            .lock()
            .iter()
            .any(|(g, u)| g == group_id && u == user_id))
    }
}

#[async_trait]
impl LocationStore for MemoryStore {
    async fn create_location_sample(
        &self,
        sample: &NewLocationSample,
    ) -> Result<LocationSample, sqlx::Error> {
        let mut samples = self.samples.lock();
        let stored = LocationSample {
            sample_id: format!("sample-{}", samples.len() + 1),
            user_id: sample.user_id.clone(),
            group_id: sample.group_id.clone(),
            latitude: sample.coordinate.latitude,
            longitude: sample.coordinate.longitude,
            altitude: sample.altitude,
            speed: sample.speed,
            captured_at: sample.captured_at,
        };
        samples.push(stored.clone());
        Ok(stored)
    }

    async fn find_latest_location(
        &self,
        user_id: &str,
    ) -> Result<Option<LocationSample>, sqlx::Error> {
        Ok(self
            .samples
            .lock()
            .iter()
            .rev()
            .find(|s| s.user_id == user_id)
            .cloned())
    }
}

#[async_trait]
impl AlertStore for MemoryStore {
    async fn create_alert(&self, alert: &ProximityAlert) -> Result<StoredAlert, sqlx::Error> {
        let mut alerts = self.alerts.lock();
        let stored = StoredAlert {
            alert_id: format!("alert-{}", alerts.len() + 1),
            group_id: alert.group_id.clone(),
            member_id: alert.member_id.clone(),
            kind: alert.kind.as_str().to_string(),
            distance_meters: alert.distance_meters,
            latitude: alert.last_known.latitude,
            longitude: alert.last_known.longitude,
            resolved: false,
            created_at: alert.created_at,
        };
        alerts.push(stored.clone());
        Ok(stored)
    }

    async fn find_unresolved_alert(
        &self,
        member_id: &str,
        group_id: &str,
        kind: AlertKind,
    ) -> Result<Option<StoredAlert>, sqlx::Error> {
        Ok(self
            .alerts
            .lock()
            .iter()
            .find(|a| {
                !a.resolved
                    && a.member_id == member_id
                    && a.group_id == group_id
                    && a.kind == kind.as_str()
            })
            .cloned())
    }
}

fn hiking_group(radius_meters: f64, active: bool) -> GroupRecord {
    GroupRecord {
        group_id: "g1".to_string(),
        name: "周末徒步".to_string(),
        leader_id: "leader".to_string(),
        radius_meters,
        active,
        created_at: Utc::now(),
        member_count: 2,
    }
}

fn service_with(store: &Arc<MemoryStore>) -> (LocationIngestService, Arc<SafeZoneRegistry>) {
    let registry = Arc::new(SafeZoneRegistry::new());
    let service = LocationIngestService::new(
        Arc::clone(store) as Arc<dyn GroupStore>,
        Arc::clone(store) as Arc<dyn LocationStore>,
        Arc::clone(store) as Arc<dyn AlertStore>,
        Arc::clone(&registry),
    );
    (service, registry)
}

fn report(pos: (f64, f64)) -> LocationReport {
    LocationReport {
        coordinate: Coordinate::new(pos.0, pos.1),
        altitude: None,
        speed: None,
        captured_at: Utc::now(),
    }
}

#[tokio::test]
async fn member_without_zone_is_assumed_safe() {
    let store = MemoryStore::with_group(hiking_group(100.0, true), &["m1"]);
    let (service, _) = service_with(&store);

    // 队长从未上报过位置，哪怕成员在天边也不告警
    let outcome = service
        .report_member_location("g1", "m1", report(FARAWAY))
        .await
        .unwrap();

    assert!(outcome.stored);
    assert!(!outcome.out_of_range);
    assert_eq!(store.alert_count(), 0);
}

#[tokio::test]
async fn nearby_member_stays_in_zone() {
    let store = MemoryStore::with_group(hiking_group(100.0, true), &["m1"]);
    let (service, _) = service_with(&store);

    service
        .report_leader_location("g1", "leader", report(LEADER_POS))
        .await
        .unwrap();
    let outcome = service
        .report_member_location("g1", "m1", report(NEARBY))
        .await
        .unwrap();

    assert!(outcome.stored);
    assert!(!outcome.out_of_range);
    assert_eq!(store.alert_count(), 0);
    assert_eq!(store.sample_count(), 2);
}

#[tokio::test]
async fn faraway_member_triggers_one_alert() {
    let store = MemoryStore::with_group(hiking_group(100.0, true), &["m1"]);
    let (service, _) = service_with(&store);

    service
        .report_leader_location("g1", "leader", report(LEADER_POS))
        .await
        .unwrap();
    let outcome = service
        .report_member_location("g1", "m1", report(FARAWAY))
        .await
        .unwrap();

    assert!(outcome.out_of_range);
    assert_eq!(store.alert_count(), 1);

    let alerts = store.alerts.lock();
    let alert = &alerts[0];
    assert_eq!(alert.member_id, "m1");
    assert_eq!(alert.group_id, "g1");
    assert_eq!(alert.kind, "OUT_OF_RANGE");
    assert!(alert.distance_meters > 100.0);
    assert!(!alert.resolved);
}

#[tokio::test]
async fn continuous_out_of_zone_dedupes_until_resolved() {
    let store = MemoryStore::with_group(hiking_group(100.0, true), &["m1"]);
    let (service, _) = service_with(&store);

    service
        .report_leader_location("g1", "leader", report(LEADER_POS))
        .await
        .unwrap();

    // 持续越界的两次上报只产生一条未解决告警
    for _ in 0..2 {
        let outcome = service
            .report_member_location("g1", "m1", report(FARAWAY))
            .await
            .unwrap();
        assert!(outcome.out_of_range);
    }
    assert_eq!(store.alert_count(), 1);

    // 告警被队长解决后，再次越界才会产生新告警
    store.resolve_all();
    service
        .report_member_location("g1", "m1", report(FARAWAY))
        .await
        .unwrap();
    assert_eq!(store.alert_count(), 2);
}

#[tokio::test]
async fn leader_never_alerts_against_themselves() {
    let store = MemoryStore::with_group(hiking_group(100.0, true), &["m1"]);
    let (service, registry) = service_with(&store);

    service
        .report_leader_location("g1", "leader", report(LEADER_POS))
        .await
        .unwrap();
    // 队长自己大幅移动：安全区中心跟着走，不会产生告警
    let outcome = service
        .report_leader_location("g1", "leader", report(FARAWAY))
        .await
        .unwrap();

    assert!(!outcome.out_of_range);
    assert_eq!(store.alert_count(), 0);

    let zone = registry.get_zone("g1").unwrap();
    assert_eq!(zone.center, Coordinate::new(FARAWAY.0, FARAWAY.1));
}

#[tokio::test]
async fn member_follows_moving_leader() {
    let store = MemoryStore::with_group(hiking_group(100.0, true), &["m1"]);
    let (service, _) = service_with(&store);

    service
        .report_leader_location("g1", "leader", report(LEADER_POS))
        .await
        .unwrap();
    // 队伍整体转移后，成员在新中心附近仍然在区内
    service
        .report_leader_location("g1", "leader", report(FARAWAY))
        .await
        .unwrap();
    let outcome = service
        .report_member_location("g1", "m1", report((FARAWAY.0, FARAWAY.1 + 0.0001)))
        .await
        .unwrap();

    assert!(!outcome.out_of_range);
    assert_eq!(store.alert_count(), 0);
}

#[tokio::test]
async fn leader_route_rejects_non_leader() {
    let store = MemoryStore::with_group(hiking_group(100.0, true), &["m1"]);
    let (service, _) = service_with(&store);

    let err = service
        .report_leader_location("g1", "m1", report(LEADER_POS))
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::NotLeader { .. }));
    assert_eq!(store.sample_count(), 0);
}

#[tokio::test]
async fn member_route_rejects_leader() {
    let store = MemoryStore::with_group(hiking_group(100.0, true), &["m1"]);
    let (service, _) = service_with(&store);

    let err = service
        .report_member_location("g1", "leader", report(NEARBY))
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::LeaderSelfReport { .. }));
    assert_eq!(store.sample_count(), 0);
    assert_eq!(store.alert_count(), 0);
}

#[tokio::test]
async fn invalid_coordinate_is_rejected_before_persistence() {
    let store = MemoryStore::with_group(hiking_group(100.0, true), &["m1"]);
    let (service, _) = service_with(&store);

    let err = service
        .report_member_location("g1", "m1", report((95.0, 79.8612)))
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::InvalidCoordinate { .. }));
    assert_eq!(store.sample_count(), 0);
}

#[tokio::test]
async fn negative_speed_is_rejected() {
    let store = MemoryStore::with_group(hiking_group(100.0, true), &["m1"]);
    let (service, _) = service_with(&store);

    let mut bad = report(NEARBY);
    bad.speed = Some(-3.0);
    let err = service
        .report_member_location("g1", "m1", bad)
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::InvalidSpeed(_)));
    assert_eq!(store.sample_count(), 0);
}

#[tokio::test]
async fn unknown_group_is_not_found() {
    let store = MemoryStore::with_group(hiking_group(100.0, true), &["m1"]);
    let (service, _) = service_with(&store);

    let err = service
        .report_member_location("nope", "m1", report(NEARBY))
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::GroupNotFound(_)));
}

#[tokio::test]
async fn stranger_is_rejected() {
    let store = MemoryStore::with_group(hiking_group(100.0, true), &["m1"]);
    let (service, _) = service_with(&store);

    service
        .report_leader_location("g1", "leader", report(LEADER_POS))
        .await
        .unwrap();
    let err = service
        .report_member_location("g1", "stranger", report(NEARBY))
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::NotMember { .. }));
    assert_eq!(store.alert_count(), 0);
}

#[tokio::test]
async fn inactive_group_archives_without_evaluation() {
    let store = MemoryStore::with_group(hiking_group(100.0, false), &["m1"]);
    let (service, registry) = service_with(&store);

    // 行程已结束：样本照常入库，但安全区不更新、不评估
    service
        .report_leader_location("g1", "leader", report(LEADER_POS))
        .await
        .unwrap();
    let outcome = service
        .report_member_location("g1", "m1", report(FARAWAY))
        .await
        .unwrap();

    assert!(outcome.stored);
    assert!(!outcome.out_of_range);
    assert_eq!(store.sample_count(), 2);
    assert_eq!(store.alert_count(), 0);
    assert!(registry.get_zone("g1").is_none());
}

#[tokio::test]
async fn radius_change_applies_to_next_evaluation() {
    let store = MemoryStore::with_group(hiking_group(100.0, true), &["m1"]);
    let (service, _) = service_with(&store);

    service
        .report_leader_location("g1", "leader", report(LEADER_POS))
        .await
        .unwrap();
    let outcome = service
        .report_member_location("g1", "m1", report(FARAWAY))
        .await
        .unwrap();
    assert!(outcome.out_of_range);
    store.resolve_all();

    // 队长把容忍半径放宽到5公里，同一位置的下一次上报回到区内
    store.groups.lock()[0].radius_meters = 5_000.0;
    let outcome = service
        .report_member_location("g1", "m1", report(FARAWAY))
        .await
        .unwrap();

    assert!(!outcome.out_of_range);
    assert_eq!(store.alert_count(), 1);
}

#[tokio::test]
async fn latest_location_is_queryable_after_ingest() {
    let store = MemoryStore::with_group(hiking_group(100.0, true), &["m1"]);
    let (service, _) = service_with(&store);

    service
        .report_leader_location("g1", "leader", report(LEADER_POS))
        .await
        .unwrap();
    service
        .report_member_location("g1", "m1", report(NEARBY))
        .await
        .unwrap();
    service
        .report_member_location("g1", "m1", report(FARAWAY))
        .await
        .unwrap();

    let latest = store.find_latest_location("m1").await.unwrap().unwrap();
    assert_eq!(latest.latitude, FARAWAY.0);
    assert_eq!(latest.longitude, FARAWAY.1);
}
