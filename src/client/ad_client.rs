// src/client/ad_client.rs

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

use crate::admin::form::CampaignForm;
use crate::error::{AdError, Result};
use crate::model::campaign::{media_url, Campaign, CampaignId};
use crate::model::placements::Platform;

/// `GET /advertisements` 的查询参数；None 表示不传
#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AdFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
}

impl AdFilter {
    /// 前台展示用：只取已激活的、指定平台的广告
    pub fn live(platform: Platform) -> Self {
        Self {
            active_only: Some(true),
            platform: Some(platform),
        }
    }

    /// 后台管理用：不过滤
    pub fn admin() -> Self {
        Self::default()
    }
}

/// 渲染引擎依赖的后端接口，测试中可替换为内存实现
#[async_trait]
pub trait AdBackend: Send + Sync {
    async fn list_advertisements(&self, filter: &AdFilter) -> Result<Vec<Campaign>>;
    async fn track_view(&self, id: CampaignId) -> Result<()>;
    async fn track_click(&self, id: CampaignId) -> Result<()>;
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// 广告 REST 客户端
#[derive(Clone, Debug)]
pub struct AdClient {
    client: Client,
    origin: String,
    base_url: String,
    request_timeout: Duration,
}

impl AdClient {
    pub fn new(origin: &str, request_timeout: Duration) -> Self {
        let origin = origin.trim().trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            base_url: format!("{}/api", origin),
            origin,
            request_timeout,
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn media_url(&self, file_url: &str) -> String {
        media_url(&self.origin, file_url)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// 发送请求；超时、非 2xx 均转换为 AdError
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let ms = self.request_timeout.as_millis() as u64;
        let response = timeout(self.request_timeout, request.send())
            .await
            .map_err(|_| AdError::Timeout { ms })??;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message);
        Err(AdError::Status { status, message })
    }

    pub async fn list(&self, filter: &AdFilter) -> Result<Vec<Campaign>> {
        let response = self
            .send(self.client.get(self.url("/advertisements")).query(filter))
            .await?;
        let body: Value = response.json().await?;
        Ok(parse_campaigns(body))
    }

    pub async fn create(&self, form: &CampaignForm) -> Result<Campaign> {
        let request = self
            .client
            .post(self.url("/advertisements"))
            .multipart(form.to_multipart());
        Ok(self.send(request).await?.json().await?)
    }

    pub async fn update(&self, id: CampaignId, form: &CampaignForm) -> Result<Campaign> {
        let request = self
            .client
            .put(self.url(&format!("/advertisements/{}", id)))
            .multipart(form.to_multipart());
        Ok(self.send(request).await?.json().await?)
    }

    pub async fn toggle_active(&self, id: CampaignId) -> Result<Campaign> {
        let request = self
            .client
            .patch(self.url(&format!("/advertisements/{}/toggle-active", id)));
        Ok(self.send(request).await?.json().await?)
    }

    pub async fn delete(&self, id: CampaignId) -> Result<()> {
        self.send(self.client.delete(self.url(&format!("/advertisements/{}", id))))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl AdBackend for AdClient {
    async fn list_advertisements(&self, filter: &AdFilter) -> Result<Vec<Campaign>> {
        self.list(filter).await
    }

    async fn track_view(&self, id: CampaignId) -> Result<()> {
        self.send(self.client.post(self.url(&format!("/advertisements/{}/track-view", id))))
            .await?;
        debug!(campaign_id = %id, "view reported");
        Ok(())
    }

    async fn track_click(&self, id: CampaignId) -> Result<()> {
        self.send(self.client.post(self.url(&format!("/advertisements/{}/track-click", id))))
            .await?;
        debug!(campaign_id = %id, "click reported");
        Ok(())
    }
}

/// 非数组响应视为空列表；单条记录解析失败只跳过该条
pub fn parse_campaigns(body: Value) -> Vec<Campaign> {
    let Value::Array(items) = body else {
        warn!("advertisement list response is not an array, treating as empty");
        return Vec::new();
    };
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<Campaign>(item) {
            Ok(campaign) => Some(campaign),
            Err(e) => {
                warn!(error = %e, "skipping malformed advertisement record");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn malformed_records_are_skipped_in_order() {
        let list = parse_campaigns(json!([
            {"id": 1, "placement": "Popup"},
            {"id": "oops", "placement": "Popup"},
            {"id": 3, "placement": "Banner"},
            {"id": 4, "placement": "PinnedFade", "position": "Center"}
        ]));
        let ids: Vec<_> = list.iter().map(|c| c.id.0).collect();
        assert_eq!(ids, vec![1, 4]);
    }

    #[test]
    fn non_array_body_is_empty() {
        assert!(parse_campaigns(json!({"items": []})).is_empty());
        assert!(parse_campaigns(Value::Null).is_empty());
    }

    #[test]
    fn filter_query_shape() {
        let query = serde_json::to_value(AdFilter::live(Platform::Web)).unwrap();
        assert_eq!(query, json!({"activeOnly": true, "platform": "Web"}));
        assert_eq!(serde_json::to_value(AdFilter::admin()).unwrap(), json!({}));
    }

    #[test]
    fn base_url_strips_trailing_slash() {
        let client = AdClient::new(" http://localhost:5071/ ", Duration::from_secs(1));
        assert_eq!(client.origin(), "http://localhost:5071");
        assert_eq!(client.url("/advertisements"), "http://localhost:5071/api/advertisements");
        assert_eq!(client.media_url("/uploads/x.png"), "http://localhost:5071/uploads/x.png");
    }
}
