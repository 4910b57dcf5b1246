// src/engine/scheduler.rs

use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use crate::engine::rotation::{RotationPolicy, RotationState, TimedRotation, TimerRequest};

enum RotationCommand {
    Candidates(Vec<Duration>),
    Dismiss,
}

/// 轮播调度器：一个后台任务独占状态机和定时器，状态通过 watch 广播。
/// 丢弃句柄即卸载，所有挂起的定时器随任务一起取消。
pub struct RotationHandle {
    commands: mpsc::UnboundedSender<RotationCommand>,
    state: watch::Receiver<RotationState>,
    task: JoinHandle<()>,
}

impl RotationHandle {
    pub fn spawn(policy: RotationPolicy, label: impl Into<String>) -> Self {
        let rotation = TimedRotation::new(policy);
        let (commands, receiver) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(rotation.state().clone());
        let task = tokio::spawn(run_rotation(rotation, receiver, state_tx, label.into()));
        Self { commands, state, task }
    }

    /// 替换候选列表（每个候选的展示时长）
    pub fn set_candidates(&self, displays: Vec<Duration>) {
        let _ = self.commands.send(RotationCommand::Candidates(displays));
    }

    pub fn dismiss(&self) {
        let _ = self.commands.send(RotationCommand::Dismiss);
    }

    pub fn state(&self) -> RotationState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RotationState> {
        self.state.clone()
    }
}

impl Drop for RotationHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

async fn run_rotation(
    mut rotation: TimedRotation,
    mut commands: mpsc::UnboundedReceiver<RotationCommand>,
    state_tx: watch::Sender<RotationState>,
    label: String,
) {
    // 同一时刻最多一个挂起的定时器；重新赋值即取消旧的
    let mut armed: Option<(Instant, TimerRequest)> = None;
    let arm = |request: Option<TimerRequest>| {
        let request = request?;
        match Instant::now().checked_add(request.after) {
            Some(at) => Some((at, request)),
            None => {
                // 时长超出计时器范围：停在当前状态，不再自动推进
                warn!(slot = %label, after = ?request.after, "rotation timer out of range, not armed");
                None
            }
        }
    };

    loop {
        let deadline = armed.as_ref().map(|(at, _)| *at);
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else { break };
                armed = match command {
                    RotationCommand::Candidates(displays) => {
                        debug!(slot = %label, candidates = displays.len(), "rotation candidates replaced");
                        arm(rotation.set_candidates(displays))
                    }
                    RotationCommand::Dismiss => {
                        debug!(slot = %label, index = rotation.state().current_index, "rotation dismissed");
                        arm(rotation.dismiss())
                    }
                };
            }
            _ = wait_until(deadline) => {
                if let Some((_, request)) = armed.take() {
                    armed = arm(rotation.fire(request));
                }
            }
        }

        let current = rotation.state();
        state_tx.send_if_modified(|published| {
            if published != current {
                *published = current.clone();
                true
            } else {
                false
            }
        });
    }
    debug!(slot = %label, "rotation task stopped");
}
