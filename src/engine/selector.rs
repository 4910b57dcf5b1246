// src/engine/selector.rs

use crate::model::campaign::{Campaign, CampaignId};
use crate::model::context::PinnedMode;
use crate::model::placements::{Placement, Position};

/// 弹窗候选：按服务端顺序，第一个未被本会话关闭的 Popup 广告
pub fn popup_candidate<F>(campaigns: &[Campaign], is_dismissed: F) -> Option<&Campaign>
where
    F: Fn(CampaignId) -> bool,
{
    campaigns
        .iter()
        .filter(|c| c.placement == Placement::Popup)
        .find(|c| !is_dismissed(c.id))
}

/// 固定淡入淡出广告的候选集合
///
/// - `Fixed`：只取五个屏幕锚点位置的广告，内嵌槽位的广告排除在外
/// - `Inline` + 槽位：取该槽位的广告；若为空，退回到全部 PinnedFade 广告（任意位置），避免槽位空白
/// - `Inline` 无槽位：全部 PinnedFade 广告
pub fn pinned_candidates(campaigns: &[Campaign], mode: PinnedMode, inline_slot: Option<Position>) -> Vec<&Campaign> {
    let pinned = campaigns.iter().filter(|c| c.placement == Placement::PinnedFade);
    match (mode, inline_slot) {
        (PinnedMode::Fixed, _) => pinned.filter(|c| c.position.is_fixed_anchor()).collect(),
        (PinnedMode::Inline, Some(slot)) => {
            let all: Vec<&Campaign> = pinned.collect();
            let in_slot: Vec<&Campaign> = all.iter().copied().filter(|c| c.position == slot).collect();
            if in_slot.is_empty() {
                all
            } else {
                in_slot
            }
        }
        (PinnedMode::Inline, None) => pinned.collect(),
    }
}

/// 当前轮播到的广告：`index mod len`，空集合返回 None
pub fn active_pinned<'a>(candidates: &[&'a Campaign], index: usize) -> Option<&'a Campaign> {
    if candidates.is_empty() {
        return None;
    }
    Some(candidates[index % candidates.len()])
}
