// 地理围栏核心：球面距离、安全区注册表、越界评估
// 纯内存计算，所有I/O都留在上报编排层

pub mod evaluator;
pub mod geo;
pub mod registry;

pub use evaluator::{AlertKind, Evaluation, ProximityAlert, ProximityEvaluator};
pub use geo::{Coordinate, distance_meters};
pub use registry::{SafeZone, SafeZoneRegistry};
