//! Per-node animation state machine.
//!
//! Each node id is in one of three states: no animation, a rotation (running
//! builds) or a flash (failed builds). [`AnimationScheduler::reconcile`] moves
//! a node to the state its status asks for and does nothing when the node is
//! already there, so the controller can call it on every update without
//! restarting effects that are already correct.
//!
//! At most one timer exists per node id. A timer is always cancelled and its
//! entry removed before a timer of another type is armed for the same id.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::effect::{
    ArcStyle, BASELINE_OPACITY, DIM_OPACITY, EffectHandle, Effects, Shared, Stage, Tween, Visual,
    lock,
};
use crate::record::NodeId;
use crate::status::Status;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AnimationType {
    Rotation,
    Flashing,
}

impl AnimationType {
    /// Animation a node with `status` should be running, if any.
    pub fn for_status(status: Status) -> Option<AnimationType> {
        match status {
            Status::Succeeded | Status::Inactive => None,
            Status::Running | Status::RunningButFailed => Some(AnimationType::Rotation),
            Status::Failed => Some(AnimationType::Flashing),
        }
    }
}

/// A running animation and the handle of its timer.
#[derive(Debug)]
pub struct AnimationEntry {
    pub node_id: NodeId,
    pub animation_type: AnimationType,
    token: u64,
    handle: EffectHandle,
}

pub struct AnimationScheduler {
    effects: Effects,
    rotation_period: Duration,
    flash_period: Duration,
    running: HashMap<NodeId, AnimationEntry>,
    stage: Shared<Stage>,
    armed: u64,
}

impl AnimationScheduler {
    /// # Panics
    /// If either period is zero.
    pub fn new(effects: Effects, rotation_period: Duration, flash_period: Duration) -> Self {
        assert!(!rotation_period.is_zero(), "rotation period must be non-zero");
        assert!(!flash_period.is_zero(), "flash period must be non-zero");

        Self {
            effects,
            rotation_period,
            flash_period,
            running: HashMap::new(),
            stage: Arc::default(),
            armed: 0,
        }
    }

    /// Bring the animation of `node_id` in line with `status`.
    pub fn reconcile(&mut self, node_id: &NodeId, status: Status) {
        let arcs = match status {
            Status::Running => Some(ArcStyle::Running),
            Status::RunningButFailed => Some(ArcStyle::RunningButFailed),
            _ => None,
        };

        // Arcs follow the status on every call, the timer only on change.
        lock(&self.stage)
            .visuals
            .entry(node_id.clone())
            .or_default()
            .arcs = arcs;

        let target = AnimationType::for_status(status);
        if self.animation_type(node_id) == target {
            return;
        }

        self.stop(node_id);

        match target {
            Some(AnimationType::Rotation) => self.rotate(node_id),
            Some(AnimationType::Flashing) => self.flash(node_id),
            None => {}
        }
    }

    fn rotate(&mut self, node_id: &NodeId) {
        let period = self.rotation_period;
        let token = self.armed;
        let stage = Arc::clone(&self.stage);
        let id = node_id.clone();

        let handle = self.effects.repeat(period, move |at| {
            let mut stage = lock(&stage);
            if stage.owners.get(&id) != Some(&token) {
                return;
            }
            let visual = stage.visuals.entry(id.clone()).or_default();
            visual.rotation = Some(Tween::new(0.0, 360.0, at, period));
        });

        self.arm(node_id, AnimationType::Rotation, token, handle);
    }

    fn flash(&mut self, node_id: &NodeId) {
        let period = self.flash_period;
        let token = self.armed;
        let stage = Arc::clone(&self.stage);
        let id = node_id.clone();
        let mut bright = true;

        let handle = self.effects.repeat(period, move |at| {
            let mut stage = lock(&stage);
            if stage.owners.get(&id) != Some(&token) {
                return;
            }
            let visual = stage.visuals.entry(id.clone()).or_default();
            let target = if bright { BASELINE_OPACITY } else { DIM_OPACITY };
            visual.opacity = Tween::new(visual.opacity.sample(at), target, at, period);
            bright = !bright;
        });

        self.arm(node_id, AnimationType::Flashing, token, handle);
    }

    fn arm(
        &mut self,
        node_id: &NodeId,
        animation_type: AnimationType,
        token: u64,
        handle: EffectHandle,
    ) {
        self.armed += 1;
        lock(&self.stage).owners.insert(node_id.clone(), token);

        tracing::trace!(node = %node_id, ?animation_type, "animation started");

        self.running.insert(
            node_id.clone(),
            AnimationEntry {
                node_id: node_id.clone(),
                animation_type,
                token,
                handle,
            },
        );
    }

    /// Cancel the animation of `node_id` and reset the node to its resting
    /// look. Returns whether an animation was running.
    pub fn stop(&mut self, node_id: &NodeId) -> bool {
        let Some(entry) = self.running.remove(node_id) else {
            return false;
        };

        entry.handle.cancel();

        let mut stage = lock(&self.stage);
        if stage.owners.get(node_id) == Some(&entry.token) {
            stage.owners.remove(node_id);
        }
        if let Some(visual) = stage.visuals.get_mut(node_id) {
            visual.opacity = Tween::hold(BASELINE_OPACITY);
            visual.rotation = None;
        }

        tracing::trace!(node = %node_id, animation_type = ?entry.animation_type, "animation stopped");
        true
    }

    /// Stop animations and drop visuals of every node for which `keep`
    /// returns false. Returns the number of animations stopped.
    pub fn retain(&mut self, mut keep: impl FnMut(&NodeId) -> bool) -> usize {
        let gone: Vec<NodeId> = self
            .running
            .keys()
            .filter(|&id| !keep(id))
            .cloned()
            .collect();

        for id in &gone {
            self.stop(id);
        }

        lock(&self.stage).visuals.retain(|id, _| keep(id));

        gone.len()
    }

    /// Cancel every timer and forget every node.
    pub fn stop_all(&mut self) {
        for (_, entry) in self.running.drain() {
            entry.handle.cancel();
        }

        let mut stage = lock(&self.stage);
        stage.owners.clear();
        stage.visuals.clear();
    }

    pub fn animation(&self, node_id: &NodeId) -> Option<&AnimationEntry> {
        self.running.get(node_id)
    }

    pub fn animation_type(&self, node_id: &NodeId) -> Option<AnimationType> {
        self.running.get(node_id).map(|entry| entry.animation_type)
    }

    pub fn animations(&self) -> impl Iterator<Item = &AnimationEntry> {
        self.running.values()
    }

    pub fn visual(&self, node_id: &NodeId) -> Visual {
        lock(&self.stage)
            .visuals
            .get(node_id)
            .copied()
            .unwrap_or_default()
    }

    pub fn visuals(&self) -> HashMap<NodeId, Visual> {
        lock(&self.stage).visuals.clone()
    }

    /// Number of timers armed since construction.
    pub fn armed(&self) -> u64 {
        self.armed
    }

    pub fn len(&self) -> usize {
        self.running.len()
    }

    pub fn is_empty(&self) -> bool {
        self.running.is_empty()
    }
}

impl std::fmt::Debug for AnimationScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationScheduler")
            .field("rotation_period", &self.rotation_period)
            .field("flash_period", &self.flash_period)
            .field("running", &self.running.len())
            .field("armed", &self.armed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler() -> AnimationScheduler {
        AnimationScheduler::new(
            Effects::current().unwrap(),
            Duration::from_millis(1500),
            Duration::from_millis(600),
        )
    }

    fn id(s: &str) -> NodeId {
        NodeId::from(s)
    }

    #[tokio::test(start_paused = true)]
    #[should_panic(expected = "flash period must be non-zero")]
    async fn test_zero_period_rejected_up_front() {
        AnimationScheduler::new(
            Effects::current().unwrap(),
            Duration::from_millis(1500),
            Duration::ZERO,
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_twice_starts_one_timer() {
        let mut s = scheduler();

        s.reconcile(&id("a"), Status::Running);
        s.reconcile(&id("a"), Status::Running);

        assert_eq!(s.armed(), 1);
        assert_eq!(s.len(), 1);
        assert_eq!(s.animation_type(&id("a")), Some(AnimationType::Rotation));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeded_stops_rotation() {
        let mut s = scheduler();

        s.reconcile(&id("a"), Status::Running);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(s.visual(&id("a")).rotation.is_some());

        s.reconcile(&id("a"), Status::Succeeded);
        assert!(s.animation(&id("a")).is_none());
        assert!(s.is_empty());

        tokio::time::sleep(Duration::from_secs(5)).await;
        let visual = s.visual(&id("a"));
        assert!(visual.rotation.is_none());
        assert!(visual.arcs.is_none());
        assert_eq!(visual.opacity.to, BASELINE_OPACITY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_but_failed_keeps_rotation() {
        let mut s = scheduler();

        s.reconcile(&id("a"), Status::Running);
        assert_eq!(s.visual(&id("a")).arcs, Some(ArcStyle::Running));

        s.reconcile(&id("a"), Status::RunningButFailed);
        assert_eq!(s.armed(), 1);
        assert_eq!(s.visual(&id("a")).arcs, Some(ArcStyle::RunningButFailed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_switches_to_flashing() {
        let mut s = scheduler();

        s.reconcile(&id("a"), Status::Running);
        s.reconcile(&id("a"), Status::Failed);

        assert_eq!(s.armed(), 2);
        assert_eq!(s.len(), 1);
        assert_eq!(s.animation_type(&id("a")), Some(AnimationType::Flashing));
        assert!(s.visual(&id("a")).arcs.is_none());

        s.reconcile(&id("a"), Status::Failed);
        assert_eq!(s.armed(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flash_alternates_opacity() {
        let mut s = scheduler();
        s.reconcile(&id("a"), Status::Failed);

        // ticks at 0 (bright), 600 (dim), 1200 (bright)
        tokio::time::sleep(Duration::from_millis(700)).await;
        assert_eq!(s.visual(&id("a")).opacity.to, DIM_OPACITY);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(s.visual(&id("a")).opacity.to, BASELINE_OPACITY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_then_inactive_clears_entry() {
        let mut s = scheduler();

        s.reconcile(&id("a"), Status::Failed);
        tokio::time::sleep(Duration::from_millis(700)).await;

        s.reconcile(&id("a"), Status::Inactive);
        assert!(s.animation(&id("a")).is_none());

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(s.visual(&id("a")).opacity.to, BASELINE_OPACITY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settled_is_idempotent() {
        let mut s = scheduler();

        s.reconcile(&id("a"), Status::Succeeded);
        s.reconcile(&id("a"), Status::Inactive);

        assert_eq!(s.armed(), 0);
        assert!(s.is_empty());
        assert!(!s.stop(&id("a")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_leak_over_many_transitions() {
        let mut s = scheduler();
        let statuses = [
            Status::Running,
            Status::Failed,
            Status::Running,
            Status::RunningButFailed,
            Status::Succeeded,
            Status::Failed,
            Status::Failed,
            Status::Inactive,
            Status::Running,
        ];

        for status in statuses {
            s.reconcile(&id("a"), status);
            assert!(s.len() <= 1);
            assert_eq!(
                s.animation_type(&id("a")),
                AnimationType::for_status(status)
            );
        }

        assert_eq!(s.armed(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retain_stops_missing_nodes() {
        let mut s = scheduler();

        s.reconcile(&id("a"), Status::Running);
        s.reconcile(&id("b"), Status::Failed);
        s.reconcile(&id("c"), Status::Succeeded);

        let stopped = s.retain(|id| id.as_str() == "a");

        assert_eq!(stopped, 1);
        assert_eq!(s.len(), 1);
        assert!(s.animation(&id("b")).is_none());
        assert!(!s.visuals().contains_key(&id("c")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_all() {
        let mut s = scheduler();

        s.reconcile(&id("a"), Status::Running);
        s.reconcile(&id("b"), Status::Failed);
        s.stop_all();

        assert!(s.is_empty());
        assert!(s.visuals().is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(s.visuals().is_empty());
    }
}
