// src/model/context.rs

use serde::{Deserialize, Serialize};

use crate::model::placements::Position;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PinnedMode {
    /// 通用页面：固定在屏幕锚点上
    #[default]
    Fixed,
    /// 页面指定了内容槽位
    Inline,
}

/// 页面外壳传入的渲染配置：当前页面启用哪些广告位
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct RendererConfig {
    pub show_popup: bool,
    pub show_pinned: bool,
    pub pinned_mode: PinnedMode,
    pub inline_slot: Option<Position>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            show_popup: true,
            show_pinned: true,
            pinned_mode: PinnedMode::Fixed,
            inline_slot: None,
        }
    }
}

impl RendererConfig {
    pub fn inline(slot: Position) -> Self {
        Self {
            show_popup: false,
            pinned_mode: PinnedMode::Inline,
            inline_slot: Some(slot),
            ..Self::default()
        }
    }

    /// 日志里用来区分同一页面上的多个渲染上下文
    pub fn slot_label(&self) -> String {
        match (self.pinned_mode, self.inline_slot) {
            (PinnedMode::Inline, Some(slot)) => format!("inline:{}", slot),
            (PinnedMode::Inline, None) => "inline:*".to_string(),
            (PinnedMode::Fixed, _) => "fixed".to_string(),
        }
    }
}
