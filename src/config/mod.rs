use std::env;
use std::time::Duration;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub api_base_uri: String,
    pub server_host: String,
    pub server_port: u16,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: u32,
    /// 安全区半径策略：下限/上限/创建时的默认值（米）
    /// 这是运营策略而不是核心不变量，所以放在配置里
    pub min_zone_radius_m: f64,
    pub max_zone_radius_m: f64,
    pub default_zone_radius_m: f64,
    pub plant_api_url: String,
    pub plant_api_key: String,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL")?,
            jwt_secret: env::var("JWT_SECRET")?,
            api_base_uri: env::var("API_BASE_URI").unwrap_or_else(|_| "/api".to_string()),
            server_host: env::var("SERVER_HOST")?,
            server_port: env::var("SERVER_PORT")?.parse().unwrap_or(3000),
            rate_limit_window_secs: env::var("RATE_LIMIT_WINDOW")?.parse().unwrap_or(60),
            rate_limit_requests: env::var("RATE_LIMIT_REQUESTS")?.parse().unwrap_or(100),
            min_zone_radius_m: env::var("MIN_ZONE_RADIUS")
                .unwrap_or_default()
                .parse()
                .unwrap_or(100.0),
            max_zone_radius_m: env::var("MAX_ZONE_RADIUS")
                .unwrap_or_default()
                .parse()
                .unwrap_or(10_000.0),
            default_zone_radius_m: env::var("DEFAULT_ZONE_RADIUS")
                .unwrap_or_default()
                .parse()
                .unwrap_or(500.0),
            plant_api_url: env::var("PLANT_API_URL")
                .unwrap_or_else(|_| "https://api.plant.id/v2/identify".to_string()),
            plant_api_key: env::var("PLANT_API_KEY").unwrap_or_default(),
        })
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    /// 把请求的半径收敛到策略允许的区间，缺省时用默认半径
    pub fn clamp_zone_radius(&self, requested: Option<f64>) -> f64 {
        requested
            .unwrap_or(self.default_zone_radius_m)
            .clamp(self.min_zone_radius_m, self.max_zone_radius_m)
    }
}
