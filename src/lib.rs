#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod animation;
mod config;
mod controller;
mod effect;
mod error;
pub mod feed;
mod index;
#[cfg(feature = "logging")]
pub mod logging;
mod record;
pub mod render;
mod status;
mod tooltip;
mod tree;

pub use crate::animation::{AnimationEntry, AnimationScheduler, AnimationType};
pub use crate::config::Config;
pub use crate::controller::{GraphController, UpdateSummary};
pub use crate::effect::{
    ArcStyle, BASELINE_OPACITY, DIM_OPACITY, EffectHandle, Effects, FADE_DURATION, Tween, Visual,
};
pub use crate::error::*;
pub use crate::index::NodeIndex;
pub use crate::record::{NodeId, NodeRecord};
pub use crate::render::{Frame, Renderer};
pub use crate::status::{Classification, Status, TEXT_NOT_STARTED, TEXT_PARENT_FAILED, classify};
pub use crate::tooltip::{InfoBoxContents, InfoBoxState, TooltipReconciler};
pub use crate::tree::{Tree, TreeIx, TreeNode};
