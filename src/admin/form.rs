// src/admin/form.rs

use chrono::{DateTime, Utc};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{AdError, Result};
use crate::model::campaign::{Campaign, DEFAULT_FADE_SECONDS};
use crate::model::placements::{Placement, Platform, Position};

/// 上传的媒体文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// 后台创建/编辑广告的表单，以 multipart 提交
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CampaignForm {
    pub title: String,
    pub description: String,
    pub platform: Platform,
    pub placement: Placement,
    pub position: Position,
    pub fade_duration_seconds: f64,
    pub is_dismissible: bool,
    pub target_url: String,
    pub business_name: String,
    pub display_order: i32,
    pub is_active: bool,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub file: Option<MediaUpload>,
}

impl Default for CampaignForm {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            platform: Platform::Both,
            placement: Placement::Popup,
            position: Position::BottomRight,
            fade_duration_seconds: DEFAULT_FADE_SECONDS,
            is_dismissible: true,
            target_url: String::new(),
            business_name: String::new(),
            display_order: 0,
            is_active: true,
            start_date: None,
            end_date: None,
            file: None,
        }
    }
}

impl CampaignForm {
    /// 编辑已有广告：用记录预填表单，媒体文件不回填
    pub fn from_campaign(campaign: &Campaign) -> Self {
        let text = |value: &Option<String>| value.clone().unwrap_or_default();
        Self {
            title: text(&campaign.title),
            description: text(&campaign.description),
            platform: campaign.platform,
            placement: campaign.placement,
            position: campaign.position,
            fade_duration_seconds: campaign
                .fade_duration_seconds
                .filter(|secs| *secs != 0.0)
                .unwrap_or(DEFAULT_FADE_SECONDS),
            is_dismissible: campaign.is_dismissible,
            target_url: text(&campaign.target_url),
            business_name: text(&campaign.business_name),
            display_order: campaign.display_order,
            is_active: campaign.is_active,
            start_date: campaign.start_date,
            end_date: campaign.end_date,
            file: None,
        }
    }

    /// 文本字段，按提交顺序排列；日期为空时不提交
    pub fn text_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("title", self.title.clone()),
            ("description", self.description.clone()),
            ("platform", self.platform.to_string()),
            ("placement", self.placement.to_string()),
            ("position", self.position.to_string()),
            ("fadeDurationSeconds", self.fade_duration_seconds.to_string()),
            ("isDismissible", self.is_dismissible.to_string()),
            ("targetUrl", self.target_url.clone()),
            ("businessName", self.business_name.clone()),
            ("displayOrder", self.display_order.to_string()),
            ("isActive", self.is_active.to_string()),
        ];
        if let Some(start) = self.start_date {
            fields.push(("startDate", start.to_rfc3339()));
        }
        if let Some(end) = self.end_date {
            fields.push(("endDate", end.to_rfc3339()));
        }
        fields
    }

    pub fn to_multipart(&self) -> Form {
        let mut form = self
            .text_fields()
            .into_iter()
            .fold(Form::new(), |form, (name, value)| form.text(name, value));
        if let Some(upload) = &self.file {
            let part = Part::bytes(upload.bytes.clone()).file_name(upload.file_name.clone());
            form = form.part("file", part);
        }
        form
    }

    /// 服务端解析 multipart 文本字段（mock 后端使用）；缺省字段取默认值
    pub fn from_fields(fields: &HashMap<String, String>) -> Result<Self> {
        let defaults = Self::default();
        let get = |name: &str| fields.get(name).map(|v| v.trim()).filter(|v| !v.is_empty());
        let flag = |name: &'static str, default: bool| -> Result<bool> {
            get(name).map_or(Ok(default), |v| {
                v.parse::<bool>().map_err(|_| AdError::InvalidField {
                    field: name,
                    value: v.to_string(),
                })
            })
        };
        let date = |name: &'static str| -> Result<Option<DateTime<Utc>>> {
            get(name)
                .map(|v| {
                    DateTime::parse_from_rfc3339(v)
                        .map(|d| d.with_timezone(&Utc))
                        .map_err(|_| AdError::InvalidField {
                            field: name,
                            value: v.to_string(),
                        })
                })
                .transpose()
        };
        let text = |name: &str| fields.get(name).cloned().unwrap_or_default();

        Ok(Self {
            title: text("title"),
            description: text("description"),
            platform: get("platform").map_or(Ok(defaults.platform), str::parse)?,
            placement: get("placement").map_or(Ok(defaults.placement), str::parse)?,
            position: get("position").map_or(Ok(defaults.position), str::parse)?,
            fade_duration_seconds: get("fadeDurationSeconds").map_or(Ok(defaults.fade_duration_seconds), |v| {
                v.parse::<f64>().map_err(|_| AdError::InvalidField {
                    field: "fadeDurationSeconds",
                    value: v.to_string(),
                })
            })?,
            is_dismissible: flag("isDismissible", defaults.is_dismissible)?,
            target_url: text("targetUrl"),
            business_name: text("businessName"),
            display_order: get("displayOrder").map_or(Ok(defaults.display_order), |v| {
                v.parse::<i32>().map_err(|_| AdError::InvalidField {
                    field: "displayOrder",
                    value: v.to_string(),
                })
            })?,
            is_active: flag("isActive", defaults.is_active)?,
            start_date: date("startDate")?,
            end_date: date("endDate")?,
            file: None,
        })
    }

    /// 把表单内容写回广告记录（mock 后端创建/更新使用）
    pub fn apply_to(&self, campaign: &mut Campaign) {
        let optional = |value: &str| Some(value.trim().to_string()).filter(|v| !v.is_empty());
        campaign.title = optional(&self.title);
        campaign.description = optional(&self.description);
        campaign.platform = self.platform;
        campaign.placement = self.placement;
        campaign.position = self.position;
        campaign.fade_duration_seconds = Some(self.fade_duration_seconds);
        campaign.is_dismissible = self.is_dismissible;
        campaign.target_url = optional(&self.target_url);
        campaign.business_name = optional(&self.business_name);
        campaign.display_order = self.display_order;
        campaign.is_active = self.is_active;
        campaign.start_date = self.start_date;
        campaign.end_date = self.end_date;
    }
}
