use serde::{Deserialize, Serialize};
use chrono::Utc;

use crate::engine::preview::PreviewCard;
use crate::engine::renderer::RenderFrame;
use crate::engine::rotation::RotationState;

/// **渲染帧日志**：每次页面上应绘制的广告发生变化时记录一条
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FrameLog {
    pub timestamp: String,          // 记录时间
    pub log_type: String,           // "live_frame" 或 "preview_frame"
    pub slot: String,               // 广告位描述，如 "fixed" / "inline:JobsBelowSearch"
    pub popup_id: Option<u64>,      // 当前弹窗
    pub pinned_id: Option<u64>,     // 当前固定位广告
    pub pinned_visible: bool,       // 固定位是否处于可见（非淡出）
    pub status: String,             // 预览状态文案
}

impl FrameLog {
    /// **实时渲染帧**
    pub fn live(slot: &str, frame: &RenderFrame) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            log_type: "live_frame".to_string(),
            slot: slot.to_string(),
            popup_id: frame.popup.as_ref().map(|p| p.campaign.id.0),
            pinned_id: frame.pinned.as_ref().map(|p| p.campaign.id.0),
            pinned_visible: frame.pinned.as_ref().is_some_and(|p| p.is_visible),
            status: String::new(),
        }
    }

    /// **预览帧**
    pub fn preview(state: &RotationState, card: Option<&PreviewCard>) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            log_type: "preview_frame".to_string(),
            slot: "preview".to_string(),
            popup_id: card.map(|c| c.campaign.id.0),
            pinned_id: None,
            pinned_visible: false,
            status: state.status_message.clone(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
