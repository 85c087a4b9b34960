//! Timers behind every moving part of the view.
//!
//! Effects are plain tokio tasks: repeating effects tick on an
//! [`tokio::time::interval`], one-shot effects (the end of a fade) sleep and
//! then run a callback. Each task is owned by an [`EffectHandle`], and
//! cancelling or dropping the handle aborts the task, so whoever owns the
//! handle owns the timer.
//!
//! Effects never draw anything. They describe what the node should look like
//! as [`Tween`]s, linear transitions that a renderer samples at draw time.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::ViewError;
use crate::record::NodeId;

/// Opacity of a node or info box at rest.
pub const BASELINE_OPACITY: f32 = 0.8;
/// Low point of a flashing node.
pub const DIM_OPACITY: f32 = 0.2;
pub const FADE_DURATION: Duration = Duration::from_millis(200);

pub(crate) type Shared<T> = Arc<Mutex<T>>;

/// Tables behind a [`Shared`] are updated in a single step, a poisoned lock
/// still holds a consistent value.
pub(crate) fn lock<T>(shared: &Mutex<T>) -> MutexGuard<'_, T> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Linear transition of a single value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tween {
    pub from: f32,
    pub to: f32,
    pub start: Instant,
    pub duration: Duration,
}

impl Tween {
    pub fn new(from: f32, to: f32, start: Instant, duration: Duration) -> Self {
        Self {
            from,
            to,
            start,
            duration,
        }
    }

    /// A value that does not move.
    pub fn hold(value: f32) -> Self {
        Self::new(value, value, Instant::now(), Duration::ZERO)
    }

    pub fn sample(&self, at: Instant) -> f32 {
        if at <= self.start {
            return self.from;
        }

        let elapsed = at - self.start;
        if elapsed >= self.duration {
            return self.to;
        }

        let t = elapsed.as_secs_f32() / self.duration.as_secs_f32();
        self.from + (self.to - self.from) * t
    }

    pub fn is_done(&self, at: Instant) -> bool {
        at >= self.start + self.duration
    }
}

/// Arcs drawn around a node whose build is still executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ArcStyle {
    Running,
    RunningButFailed,
}

/// What a single node should look like.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Visual {
    pub opacity: Tween,
    /// Rotation of the running arcs in degrees.
    pub rotation: Option<Tween>,
    pub arcs: Option<ArcStyle>,
}

impl Default for Visual {
    fn default() -> Self {
        Self {
            opacity: Tween::hold(BASELINE_OPACITY),
            rotation: None,
            arcs: None,
        }
    }
}

impl Visual {
    pub fn opacity_at(&self, at: Instant) -> f32 {
        self.opacity.sample(at)
    }

    pub fn rotation_at(&self, at: Instant) -> f32 {
        self.rotation.map_or(0.0, |rotation| rotation.sample(at))
    }
}

/// Spawns effect timers on the runtime that was current at construction.
#[derive(Debug, Clone)]
pub struct Effects {
    runtime: Handle,
}

impl Effects {
    pub fn current() -> Result<Self, ViewError> {
        Ok(Self {
            runtime: Handle::try_current()?,
        })
    }

    /// Call `tick` right away and then once every `period`.
    ///
    /// # Panics
    /// If `period` is zero.
    pub fn repeat<F>(&self, period: Duration, mut tick: F) -> EffectHandle
    where
        F: FnMut(Instant) + Send + 'static,
    {
        assert!(!period.is_zero(), "effect period must be non-zero");

        let task = self.runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                let at = interval.tick().await;
                tick(at);
            }
        });

        EffectHandle(task.abort_handle())
    }

    /// Call `done` once, after `delay`.
    pub fn after<F>(&self, delay: Duration, done: F) -> EffectHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            done();
        });

        EffectHandle(task.abort_handle())
    }
}

/// Owner of a running effect. Dropping the handle cancels the effect.
#[derive(Debug)]
pub struct EffectHandle(AbortHandle);

impl EffectHandle {
    /// Stop the effect. It will not be polled again after this returns.
    pub fn cancel(&self) {
        self.0.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.0.is_finished()
    }
}

impl Drop for EffectHandle {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Per-node visuals plus the token of the effect allowed to write them.
///
/// A tick only writes while its token is still registered, which keeps a
/// tick that raced with a cancellation from undoing a reset.
#[derive(Debug, Default)]
pub(crate) struct Stage {
    pub visuals: HashMap<NodeId, Visual>,
    pub owners: HashMap<NodeId, u64>,
}
