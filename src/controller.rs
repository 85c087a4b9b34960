use tracing::Level;

use crate::animation::AnimationScheduler;
use crate::config::Config;
use crate::effect::Effects;
use crate::error::{SnapshotError, ViewError};
use crate::record::{NodeId, NodeRecord};
use crate::render::Frame;
use crate::tooltip::TooltipReconciler;
use crate::tree::Tree;

/// What a successful [`GraphController::update`] changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateSummary {
    /// Nodes in the new tree.
    pub nodes: usize,
    /// Records left out because the root doesn't reach them.
    pub omitted: usize,
    /// Animations stopped because their node is gone.
    pub removed: usize,
    /// Animations running after the update.
    pub animated: usize,
}

/// Owns the displayed tree and every per-node effect table.
///
/// Snapshots are applied with [`GraphController::update`], one at a time.
/// An update either replaces the tree and reconciles every node, or fails
/// and changes nothing at all.
#[derive(Debug)]
pub struct GraphController {
    config: Config,
    tree: Option<Tree>,
    animations: AnimationScheduler,
    tooltips: TooltipReconciler,
}

impl GraphController {
    /// Create a view. Effect timers run on the tokio runtime that is current
    /// when this is called.
    pub fn new(config: Config) -> Result<Self, ViewError> {
        config.validate()?;
        let effects = Effects::current()?;

        Ok(Self {
            animations: AnimationScheduler::new(
                effects.clone(),
                config.rotation_period(),
                config.flash_period(),
            ),
            tooltips: TooltipReconciler::new(effects),
            tree: None,
            config,
        })
    }

    /// Apply a snapshot. The first call doubles as initialization.
    pub fn update(&mut self, records: &[NodeRecord]) -> Result<UpdateSummary, SnapshotError> {
        let span = tracing::span!(Level::INFO, "update", records = records.len());
        let _enter = span.enter();

        let tree = match Tree::build(records, &self.config.root_id) {
            Ok(tree) => tree,
            Err(e) => {
                tracing::error!("Snapshot rejected, keeping the displayed tree: {e}");
                return Err(e);
            }
        };

        let removed = self.animations.retain(|id| tree.contains(id));
        self.tooltips.retain(|id| tree.contains(id));

        // Every animation settles before any info box moves.
        for node in tree.iter() {
            self.animations.reconcile(node.id(), node.status);
        }
        for node in tree.iter() {
            self.tooltips.reconcile(node);
        }

        let summary = UpdateSummary {
            nodes: tree.len(),
            omitted: records.len() - tree.len(),
            removed,
            animated: self.animations.len(),
        };

        self.tree = Some(tree);

        tracing::debug!(
            nodes = summary.nodes,
            omitted = summary.omitted,
            removed = summary.removed,
            animated = summary.animated,
            "snapshot applied"
        );

        Ok(summary)
    }

    /// Pointer entered or left the node `id`. Returns whether an info box
    /// reacted to it.
    pub fn hover(&mut self, id: &NodeId, entered: bool) -> bool {
        let Some(node) = self.tree.as_ref().and_then(|tree| tree.find(id)) else {
            return false;
        };

        self.tooltips.hover(node, entered)
    }

    /// Everything a renderer needs to draw the current state, or `None`
    /// before the first successful update.
    pub fn frame(&self) -> Option<Frame<'_>> {
        let tree = self.tree.as_ref()?;
        Some(Frame::capture(tree, &self.animations, &self.tooltips))
    }

    /// Stop every timer and forget every node.
    pub fn teardown(&mut self) {
        self.animations.stop_all();
        self.tooltips.clear();
        self.tree = None;
    }

    pub fn tree(&self) -> Option<&Tree> {
        self.tree.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn animations(&self) -> &AnimationScheduler {
        &self.animations
    }

    pub fn tooltips(&self) -> &TooltipReconciler {
        &self.tooltips
    }
}

impl Drop for GraphController {
    fn drop(&mut self) {
        self.teardown();
    }
}
