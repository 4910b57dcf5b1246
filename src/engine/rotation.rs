// src/engine/rotation.rs

use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::model::campaign::Campaign;

pub const PREVIEW_EMPTY_MESSAGE: &str = "No active popup ads to preview";
pub const TRANSITION_MESSAGE: &str = "Transitioning to next popup...";
pub const CYCLE_COMPLETE_MESSAGE: &str = "Completed cycle. Restarting...";

/// 每个候选的展示时长
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayTime {
    Fixed(Duration),
    /// 取广告自身的 `max(2, fadeDurationSeconds || 8)` 秒
    PerCampaign,
}

/// 定时轮播策略。实时渲染和后台预览是同一个状态机的两组参数。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPolicy {
    pub display: DisplayTime,
    /// 隐藏到切换下一个之间的间隔
    pub transition_gap: Duration,
    /// 手动关闭后等待多久显示下一个；None 表示不支持关闭
    pub on_skip_wait: Option<Duration>,
    /// 关闭最后一个后等待多久从头开始
    pub on_full_cycle_wait: Option<Duration>,
    /// 只有一个候选时是否也走隐藏/重新显示
    pub rotate_single: bool,
    /// 是否生成状态文案
    pub narrate: bool,
}

impl RotationPolicy {
    /// 页面上固定淡入淡出广告的轮播
    pub fn live_pinned() -> Self {
        Self {
            display: DisplayTime::PerCampaign,
            transition_gap: Duration::from_millis(320),
            on_skip_wait: None,
            on_full_cycle_wait: None,
            rotate_single: false,
            narrate: false,
        }
    }

    /// 后台弹窗预览：30 秒自动切换，关闭后等 1 分钟，整轮关闭后等 5 分钟
    pub fn preview() -> Self {
        Self {
            display: DisplayTime::Fixed(Duration::from_secs(30)),
            transition_gap: Duration::from_millis(300),
            on_skip_wait: Some(Duration::from_secs(60)),
            on_full_cycle_wait: Some(Duration::from_secs(300)),
            rotate_single: true,
            narrate: true,
        }
    }

    pub fn display_for(&self, campaign: &Campaign) -> Duration {
        match self.display {
            DisplayTime::Fixed(duration) => duration,
            DisplayTime::PerCampaign => campaign.effective_fade_duration(),
        }
    }

    pub fn displays_for<'a>(&self, campaigns: impl IntoIterator<Item = &'a Campaign>) -> Vec<Duration> {
        campaigns.into_iter().map(|c| self.display_for(c)).collect()
    }
}

/// 渲染上下文的轮播状态
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RotationState {
    pub current_index: usize,
    pub is_visible: bool,
    pub status_message: String,
    /// 第几次替换候选列表；订阅方据此判断状态是否已对应最新列表
    #[serde(skip)]
    pub candidates_epoch: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationAction {
    Show { message: Option<String> },
    Hide { message: Option<String> },
    Advance,
    SetIndex { index: usize, message: Option<String> },
}

/// (state, action) -> state；message 为 None 时保留原状态文案
pub fn reduce(state: &RotationState, action: RotationAction) -> RotationState {
    let mut next = state.clone();
    match action {
        RotationAction::Show { message } => {
            next.is_visible = true;
            if let Some(message) = message {
                next.status_message = message;
            }
        }
        RotationAction::Hide { message } => {
            next.is_visible = false;
            if let Some(message) = message {
                next.status_message = message;
            }
        }
        RotationAction::Advance => {
            next.is_visible = false;
            next.status_message = TRANSITION_MESSAGE.to_string();
        }
        RotationAction::SetIndex { index, message } => {
            next.current_index = index;
            if let Some(message) = message {
                next.status_message = message;
            }
        }
    }
    next
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// 展示时长到期
    Display,
    /// 隐藏后的过渡间隔到期
    Transition,
    /// 关闭后的等待到期，恢复到给定下标
    Resume(usize),
}

/// 状态机请求的下一个定时器。每次候选变更或关闭都会让旧请求失效。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerRequest {
    pub after: Duration,
    pub kind: TimerKind,
    generation: u64,
}

/// 带中断的定时轮播（纯状态机，不持有真实定时器）
#[derive(Debug, Clone)]
pub struct TimedRotation {
    policy: RotationPolicy,
    displays: Vec<Duration>,
    state: RotationState,
    generation: u64,
}

impl TimedRotation {
    pub fn new(policy: RotationPolicy) -> Self {
        Self {
            policy,
            displays: Vec::new(),
            state: RotationState::default(),
            generation: 0,
        }
    }

    pub fn state(&self) -> &RotationState {
        &self.state
    }

    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    pub fn len(&self) -> usize {
        self.displays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.displays.is_empty()
    }

    fn dispatch(&mut self, action: RotationAction) {
        self.state = reduce(&self.state, action);
    }

    fn narrate(&self, message: impl FnOnce() -> String) -> Option<String> {
        self.policy.narrate.then(message)
    }

    fn arm(&self, after: Duration, kind: TimerKind) -> Option<TimerRequest> {
        Some(TimerRequest {
            after,
            kind,
            generation: self.generation,
        })
    }

    fn show_current(&mut self) -> Option<TimerRequest> {
        let (index, len) = (self.state.current_index, self.len());
        let message = self.narrate(|| format!("Showing popup {} of {}", index + 1, len));
        self.dispatch(RotationAction::Show { message });
        self.arm(self.displays[index], TimerKind::Display)
    }

    /// 候选列表变更：取消所有挂起的定时器，回到第 0 个
    pub fn set_candidates(&mut self, displays: Vec<Duration>) -> Option<TimerRequest> {
        self.generation += 1;
        self.state.candidates_epoch += 1;
        self.displays = displays;
        self.dispatch(RotationAction::SetIndex { index: 0, message: None });
        if self.displays.is_empty() {
            let message = self.narrate(|| PREVIEW_EMPTY_MESSAGE.to_string());
            self.dispatch(RotationAction::Hide { message });
            return None;
        }
        self.show_current()
    }

    /// 定时器到期。过期（已被取消）的请求直接忽略。
    pub fn fire(&mut self, timer: TimerRequest) -> Option<TimerRequest> {
        if timer.generation != self.generation || self.displays.is_empty() {
            debug!(kind = ?timer.kind, "ignoring stale rotation timer");
            return None;
        }
        let len = self.len();
        match timer.kind {
            TimerKind::Display => {
                if len < 2 && !self.policy.rotate_single {
                    return None;
                }
                let action = if self.policy.narrate {
                    RotationAction::Advance
                } else {
                    RotationAction::Hide { message: None }
                };
                self.dispatch(action);
                self.arm(self.policy.transition_gap, TimerKind::Transition)
            }
            TimerKind::Transition => {
                let next = (self.state.current_index + 1) % len;
                let message = self.narrate(|| {
                    if next == 0 {
                        CYCLE_COMPLETE_MESSAGE.to_string()
                    } else {
                        String::new()
                    }
                });
                self.dispatch(RotationAction::SetIndex { index: next, message });
                self.dispatch(RotationAction::Show { message: None });
                self.arm(self.displays[next], TimerKind::Display)
            }
            TimerKind::Resume(index) => {
                self.dispatch(RotationAction::SetIndex {
                    index: index % len,
                    message: None,
                });
                self.show_current()
            }
        }
    }

    /// 手动关闭当前展示：取消自动切换，按策略等待后继续
    pub fn dismiss(&mut self) -> Option<TimerRequest> {
        if self.displays.is_empty() {
            return None;
        }
        self.generation += 1;
        let len = self.len();
        let next = (self.state.current_index + 1) % len;
        let wait = if next == 0 {
            self.policy.on_full_cycle_wait
        } else {
            self.policy.on_skip_wait
        };
        let Some(wait) = wait else {
            self.dispatch(RotationAction::Hide { message: None });
            return None;
        };
        let message = self.narrate(|| {
            if next == 0 {
                format!("All popups dismissed. Waiting {} before restart...", describe_wait(wait))
            } else {
                format!(
                    "Popup dismissed. Next popup in {}... ({} of {})",
                    describe_wait(wait),
                    next + 1,
                    len
                )
            }
        });
        self.dispatch(RotationAction::Hide { message });
        self.arm(wait, TimerKind::Resume(next))
    }
}

fn describe_wait(wait: Duration) -> String {
    let secs = wait.as_secs();
    match secs {
        60 => "1 minute".to_string(),
        s if s >= 60 && s % 60 == 0 => format!("{} minutes", s / 60),
        1 => "1 second".to_string(),
        s => format!("{} seconds", s),
    }
}
