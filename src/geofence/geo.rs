use serde::{Deserialize, Serialize};

/// 地球平均半径（米），球体模型
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// 经纬度坐标，不可变值类型
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// 纬度[-90,90]、经度[-180,180]的范围检查，NaN视为非法
    /// 距离计算本身不做校验，上报入口负责在计算前拒绝非法坐标
    pub fn in_valid_range(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

// 使用Haversine公式计算球面距离（基于经纬度）
// 对跖点附近是Haversine的已知精度边界，按球体模型处理即可
pub fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let delta_phi = (b.latitude - a.latitude).to_radians();
    let delta_lambda = (b.longitude - a.longitude).to_radians();

    let h = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c // 返回距离（米）
}
