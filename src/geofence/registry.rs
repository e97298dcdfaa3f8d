use std::collections::HashMap;

use parking_lot::RwLock;

use super::geo::Coordinate;

/// 某个群组安全区的快照：中心是队长最近一次上报的位置
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafeZone {
    pub center: Coordinate,
    pub radius_meters: f64,
}

#[derive(Debug, Clone)]
struct ZoneState {
    leader_id: String,
    radius_meters: f64,
    center: Option<Coordinate>,
}

/// groupID到安全区状态的共享注册表
///
/// 这只是队长最近位置的内存缓存，可以随时从持久层的群组记录和
/// 最新位置样本重建。读写都在锁内完成且不跨越await点，读取方
/// 克隆出快照，保证不会看到中心和半径来自两次写入的撕裂状态。
#[derive(Debug, Default)]
pub struct SafeZoneRegistry {
    zones: RwLock<HashMap<String, ZoneState>>,
}

impl SafeZoneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 建立或替换群组的队长与半径；中心在队长上报位置前保持未知
    pub fn register_group(&self, group_id: &str, leader_id: &str, radius_meters: f64) {
        let mut zones = self.zones.write();
        zones.insert(
            group_id.to_string(),
            ZoneState {
                leader_id: leader_id.to_string(),
                radius_meters,
                center: None,
            },
        );
    }

    /// 按持久层的群组记录对齐注册表
    ///
    /// 进程重启后注册表是空的，上报链路每次都会带着权威的群组记录
    /// 调用这里，让安全区惰性重建。队长未变时只刷新半径、保留已知
    /// 中心；队长变更意味着旧中心失效，整条记录重置。
    pub fn sync_group(&self, group_id: &str, leader_id: &str, radius_meters: f64) {
        let mut zones = self.zones.write();
        match zones.get_mut(group_id) {
            Some(state) if state.leader_id == leader_id => {
                state.radius_meters = radius_meters;
            }
            _ => {
                zones.insert(
                    group_id.to_string(),
                    ZoneState {
                        leader_id: leader_id.to_string(),
                        radius_meters,
                        center: None,
                    },
                );
            }
        }
    }

    /// 只覆盖中心，半径保持注册时的值；未注册的群组直接忽略
    pub fn update_leader_location(&self, group_id: &str, coordinate: Coordinate) -> bool {
        let mut zones = self.zones.write();
        match zones.get_mut(group_id) {
            Some(state) => {
                state.center = Some(coordinate);
                true
            }
            None => false,
        }
    }

    /// 队长调整容忍半径时使用，已知中心不受影响
    pub fn update_radius(&self, group_id: &str, radius_meters: f64) {
        let mut zones = self.zones.write();
        if let Some(state) = zones.get_mut(group_id) {
            state.radius_meters = radius_meters;
        }
    }

    /// 行程结束后丢弃安全区
    pub fn remove_group(&self, group_id: &str) {
        self.zones.write().remove(group_id);
    }

    /// 队长从未上报过位置时返回None（安全区尚未建立）
    pub fn get_zone(&self, group_id: &str) -> Option<SafeZone> {
        let zones = self.zones.read();
        let state = zones.get(group_id)?;
        let center = state.center?;
        Some(SafeZone {
            center,
            radius_meters: state.radius_meters,
        })
    }
}
