use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::admin::form::CampaignForm;
use crate::error::AdError;
use crate::mock_backend::MockStore;
use crate::model::campaign::{Campaign, CampaignId};
use crate::model::placements::Platform;

/// 错误响应，body 为 `{"message": ...}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(id: u64) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: format!("Advertisement {} not found.", id),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<AdError> for ApiError {
    fn from(err: AdError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "message": self.message }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub active_only: Option<bool>,
    pub platform: Option<Platform>,
}

/// **GET /api/advertisements**
pub async fn list_advertisements(
    State(store): State<Arc<MockStore>>,
    Query(query): Query<ListQuery>,
) -> Json<Vec<Campaign>> {
    store.simulate_latency().await;
    let now = Utc::now();
    let list = store
        .list()
        .into_iter()
        .filter(|c| !query.active_only.unwrap_or(false) || (c.is_active && c.is_live_at(now)))
        .filter(|c| query.platform.map_or(true, |p| c.platform.serves(p)))
        .collect();
    Json(list)
}

/// multipart 表单：文本字段 + 可选的 `file`
async fn read_form(mut multipart: Multipart) -> ApiResult<(CampaignForm, Option<String>)> {
    let mut fields = HashMap::new();
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if name == "file" {
            let file_name = field.file_name().unwrap_or("upload.bin").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(e.body_text()))?;
            if !bytes.is_empty() {
                upload = Some(format!("/uploads/{}", file_name));
            }
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| ApiError::bad_request(e.body_text()))?;
            fields.insert(name, value);
        }
    }
    let form = CampaignForm::from_fields(&fields)?;
    if form.title.chars().count() > 120 {
        return Err(ApiError::bad_request("Title must be 120 characters or fewer."));
    }
    Ok((form, upload))
}

/// **POST /api/advertisements**
pub async fn create_advertisement(
    State(store): State<Arc<MockStore>>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Campaign>)> {
    let (form, upload) = read_form(multipart).await?;
    store.simulate_latency().await;
    let created = store.insert(|campaign| {
        form.apply_to(campaign);
        campaign.file_url = upload;
    });
    info!(campaign_id = %created.id, "advertisement created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// **PUT /api/advertisements/{id}**；未上传新文件时保留原媒体
pub async fn update_advertisement(
    State(store): State<Arc<MockStore>>,
    Path(id): Path<u64>,
    multipart: Multipart,
) -> ApiResult<Json<Campaign>> {
    let (form, upload) = read_form(multipart).await?;
    store.simulate_latency().await;
    let updated = store
        .modify(CampaignId(id), |campaign| {
            form.apply_to(campaign);
            if upload.is_some() {
                campaign.file_url = upload;
            }
        })
        .ok_or_else(|| ApiError::not_found(id))?;
    info!(campaign_id = %updated.id, "advertisement updated");
    Ok(Json(updated))
}

/// **PATCH /api/advertisements/{id}/toggle-active**
pub async fn toggle_active(State(store): State<Arc<MockStore>>, Path(id): Path<u64>) -> ApiResult<Json<Campaign>> {
    store.simulate_latency().await;
    let toggled = store
        .modify(CampaignId(id), |campaign| campaign.is_active = !campaign.is_active)
        .ok_or_else(|| ApiError::not_found(id))?;
    info!(campaign_id = %toggled.id, is_active = toggled.is_active, "advertisement toggled");
    Ok(Json(toggled))
}

/// **DELETE /api/advertisements/{id}**
pub async fn delete_advertisement(State(store): State<Arc<MockStore>>, Path(id): Path<u64>) -> ApiResult<StatusCode> {
    store.simulate_latency().await;
    if !store.remove(CampaignId(id)) {
        return Err(ApiError::not_found(id));
    }
    info!(campaign_id = id, "advertisement deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// **POST /api/advertisements/{id}/track-view**
pub async fn track_view(State(store): State<Arc<MockStore>>, Path(id): Path<u64>) -> ApiResult<StatusCode> {
    track(&store, id, false)
}

/// **POST /api/advertisements/{id}/track-click**
pub async fn track_click(State(store): State<Arc<MockStore>>, Path(id): Path<u64>) -> ApiResult<StatusCode> {
    track(&store, id, true)
}

fn track(store: &MockStore, id: u64, click: bool) -> ApiResult<StatusCode> {
    if store.record(CampaignId(id), click) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        warn!(campaign_id = id, click, "tracking for unknown advertisement");
        Err(ApiError::not_found(id))
    }
}
