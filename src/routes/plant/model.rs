use serde::{Deserialize, Serialize};

use crate::config::Config;

#[derive(Debug, Deserialize)]
pub struct IdentifyPlantRequest {
    /// base64编码的图片内容
    pub image_base64: String,
}

#[derive(Debug, Serialize)]
pub struct IdentifyPlantResponse {
    pub matches: Vec<PlantMatch>,
}

#[derive(Debug, Serialize)]
pub struct PlantMatch {
    pub name: String,
    pub probability: f64,
}

// 第三方识别服务的响应形状，只取需要的字段
#[derive(Debug, Deserialize)]
struct PlantApiResponse {
    #[serde(default)]
    suggestions: Vec<PlantSuggestion>,
}

#[derive(Debug, Deserialize)]
struct PlantSuggestion {
    plant_name: String,
    probability: f64,
}

/// 外部植物识别API的瘦客户端
/// 识别完全由第三方服务完成，这里只做转发和结果裁剪
#[derive(Clone)]
pub struct PlantIdClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl PlantIdClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: config.plant_api_url.clone(),
            api_key: config.plant_api_key.clone(),
        }
    }

    pub async fn identify(&self, image_base64: &str) -> Result<Vec<PlantMatch>, reqwest::Error> {
        let resp = self
            .http
            .post(&self.api_url)
            .header("Api-Key", &self.api_key)
            .json(&serde_json::json!({
                "images": [image_base64],
            }))
            .send()
            .await?
            .error_for_status()?;

        let body: PlantApiResponse = resp.json().await?;

        Ok(body
            .suggestions
            .into_iter()
            .map(|s| PlantMatch {
                name: s.plant_name,
                probability: s.probability,
            })
            .collect())
    }
}
