// src/engine/dismissal.rs

use std::sync::Mutex;
use tracing::{info, warn};

use crate::model::adapters::SessionStore;
use crate::model::campaign::CampaignId;

/// 会话存储中保存已关闭弹窗 id 的键
pub const POPUP_DISMISSED_KEY: &str = "dismissed-popup-ads";

/// 本会话已关闭的弹窗广告
pub trait DismissalLedger: Send + Sync {
    fn is_dismissed(&self, id: CampaignId) -> bool;
    fn dismiss(&self, id: CampaignId);
    fn dismissed(&self) -> Vec<CampaignId>;
}

/// 基于 [`SessionStore`] 的实现：挂载时读取一次，之后在内存副本上追加并整体写回
pub struct SessionDismissalLedger<S: SessionStore> {
    store: S,
    ids: Mutex<Vec<CampaignId>>,
}

impl<S: SessionStore> SessionDismissalLedger<S> {
    pub fn load(store: S) -> Self {
        let ids = match store.get_item(POPUP_DISMISSED_KEY) {
            Some(raw) => serde_json::from_str::<Vec<CampaignId>>(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "unreadable dismissal ledger, starting empty");
                Vec::new()
            }),
            None => Vec::new(),
        };
        Self {
            store,
            ids: Mutex::new(ids),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: SessionStore> DismissalLedger for SessionDismissalLedger<S> {
    fn is_dismissed(&self, id: CampaignId) -> bool {
        self.ids
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(&id)
    }

    fn dismiss(&self, id: CampaignId) {
        // 读-追加-写在同一把锁内完成，多个广告位同时关闭也不会丢失更新
        let mut ids = self.ids.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if ids.contains(&id) {
            return;
        }
        ids.push(id);
        let persisted = serde_json::to_string(&*ids)
            .map_err(Into::into)
            .and_then(|encoded| self.store.set_item(POPUP_DISMISSED_KEY, encoded));
        match persisted {
            Ok(()) => info!(campaign_id = %id, "popup dismissed for this session"),
            Err(e) => warn!(campaign_id = %id, error = %e, "failed to persist popup dismissal"),
        }
    }

    fn dismissed(&self) -> Vec<CampaignId> {
        self.ids
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::selector::popup_candidate;
    use crate::model::adapters::MemorySessionStore;
    use crate::model::campaign::Campaign;
    use crate::model::placements::Placement;
    use std::sync::Arc;

    #[test]
    fn dismissals_persist_as_json_array() {
        let store = Arc::new(MemorySessionStore::new());
        let ledger = SessionDismissalLedger::load(store.clone());
        ledger.dismiss(CampaignId(3));
        ledger.dismiss(CampaignId(9));
        ledger.dismiss(CampaignId(3));
        assert_eq!(store.get_item(POPUP_DISMISSED_KEY).as_deref(), Some("[3,9]"));

        // 同一会话内重新挂载
        let remounted = SessionDismissalLedger::load(store);
        assert!(remounted.is_dismissed(CampaignId(9)));
        assert!(!remounted.is_dismissed(CampaignId(4)));
    }

    #[test]
    fn corrupt_storage_starts_empty() {
        let store = MemorySessionStore::new();
        store.set_item(POPUP_DISMISSED_KEY, "{not json".into()).unwrap();
        let ledger = SessionDismissalLedger::load(store);
        assert!(ledger.dismissed().is_empty());
    }

    #[test]
    fn dismissing_selected_popups_in_sequence() {
        let mut first = Campaign::new(1, Placement::Popup);
        first.is_dismissible = true;
        let snapshot = vec![first, Campaign::new(2, Placement::Popup)];

        let store = MemorySessionStore::new();
        store.set_item(POPUP_DISMISSED_KEY, "[1]".into()).unwrap();
        let ledger = SessionDismissalLedger::load(store);

        let selected = popup_candidate(&snapshot, |id| ledger.is_dismissed(id));
        assert_eq!(selected.map(|c| c.id), Some(CampaignId(2)));

        ledger.dismiss(CampaignId(2));
        assert_eq!(ledger.dismissed(), vec![CampaignId(1), CampaignId(2)]);
        assert!(popup_candidate(&snapshot, |id| ledger.is_dismissed(id)).is_none());
    }
}
