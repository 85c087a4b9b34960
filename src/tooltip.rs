//! Info boxes shown next to nodes that need attention.
//!
//! Every node gets at most one info box, keyed by id so it survives tree
//! rebuilds. Visibility changes are 200ms fades. When a node settles, a
//! visible box fades out *before* its contents flip to the settled text, so
//! the old "running" box is what the user sees disappear.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::time::Instant;

use crate::effect::{BASELINE_OPACITY, EffectHandle, Effects, FADE_DURATION, Shared, Tween, lock};
use crate::record::NodeId;
use crate::status::Status;
use crate::tree::TreeNode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoBoxContents {
    pub status: Status,
    pub text: String,
    /// Percentage completed, only while the build is running.
    pub progress: Option<u8>,
    pub log_url: Option<String>,
}

impl InfoBoxContents {
    pub fn of(node: &TreeNode) -> Self {
        Self {
            status: node.status,
            text: node.status_text.clone(),
            progress: node
                .status
                .is_running()
                .then_some(node.record.percentage_completed),
            log_url: node.record.log_url.clone(),
        }
    }

    pub fn css_class(&self) -> String {
        format!("infoBox_{}", self.status)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InfoBoxState {
    pub node_id: NodeId,
    /// Where the box is headed; a box that is fading out is not visible.
    pub visible: bool,
    pub contents: InfoBoxContents,
    pub opacity: Tween,
}

struct Panel {
    state: InfoBoxState,
    /// Contents to apply once the running fade-out completes.
    pending: Option<InfoBoxContents>,
    fade: Option<(u64, EffectHandle)>,
}

pub struct TooltipReconciler {
    effects: Effects,
    panels: Shared<HashMap<NodeId, Panel>>,
    fades: u64,
}

impl TooltipReconciler {
    pub fn new(effects: Effects) -> Self {
        Self {
            effects,
            panels: Arc::default(),
            fades: 0,
        }
    }

    /// Bring the info box of `node` in line with its status.
    pub fn reconcile(&mut self, node: &TreeNode) {
        let id = node.id();
        let contents = InfoBoxContents::of(node);

        if node.status.is_settled() {
            let fade_out = {
                let mut panels = lock(&self.panels);
                match panels.get_mut(id) {
                    Some(panel) if panel.state.visible => {
                        panel.pending = Some(contents);
                        true
                    }
                    // Still fading out, the newest contents win.
                    Some(panel) if panel.pending.is_some() => {
                        panel.pending = Some(contents);
                        false
                    }
                    Some(panel) => {
                        panel.state.contents = contents;
                        false
                    }
                    None => {
                        panels.insert(id.clone(), Panel::hidden(id.clone(), contents));
                        false
                    }
                }
            };

            if fade_out {
                self.fade(id, false);
            }
            return;
        }

        {
            let mut panels = lock(&self.panels);
            let panel = panels
                .entry(id.clone())
                .or_insert_with(|| Panel::hidden(id.clone(), contents.clone()));
            panel.state.contents = contents;
            panel.pending = None;
        }

        // Only the build that failed shows its box, not every dependent.
        if node.record.failed_dependency {
            self.hide(id);
        } else {
            self.show(id);
        }
    }

    /// Pointer entered or left `node`. Boxes of nodes that are not asking
    /// for attention only show while hovered. Returns whether the hover was
    /// handled.
    pub fn hover(&mut self, node: &TreeNode, entered: bool) -> bool {
        if !(node.status.is_settled() || node.record.failed_dependency) {
            return false;
        }

        if entered {
            self.show(node.id())
        } else {
            self.hide(node.id())
        }

        true
    }

    pub fn show(&mut self, node_id: &NodeId) {
        if self.is_visible(node_id) == Some(false) {
            self.fade(node_id, true);
        }
    }

    pub fn hide(&mut self, node_id: &NodeId) {
        if self.is_visible(node_id) == Some(true) {
            self.fade(node_id, false);
        }
    }

    fn is_visible(&self, node_id: &NodeId) -> Option<bool> {
        lock(&self.panels)
            .get(node_id)
            .map(|panel| panel.state.visible)
    }

    fn fade(&mut self, node_id: &NodeId, visible: bool) {
        self.fades += 1;
        let token = self.fades;
        let target = if visible { BASELINE_OPACITY } else { 0.0 };

        let mut panels = lock(&self.panels);
        let Some(panel) = panels.get_mut(node_id) else {
            return;
        };

        let now = Instant::now();
        panel.state.visible = visible;
        panel.state.opacity = Tween::new(panel.state.opacity.sample(now), target, now, FADE_DURATION);
        // Fading back in shows the newest contents straight away.
        if visible && let Some(contents) = panel.pending.take() {
            panel.state.contents = contents;
        }

        let shared = Arc::clone(&self.panels);
        let id = node_id.clone();
        let handle = self.effects.after(FADE_DURATION, move || {
            let mut panels = lock(&shared);
            let Some(panel) = panels.get_mut(&id) else {
                return;
            };
            if !matches!(panel.fade, Some((current, _)) if current == token) {
                return;
            }

            panel.state.opacity = Tween::hold(target);
            if let Some(contents) = panel.pending.take() {
                panel.state.contents = contents;
            }
        });

        // Replacing the handle cancels a fade that was still running.
        panel.fade = Some((token, handle));

        tracing::trace!(node = %node_id, visible, "info box fade");
    }

    /// Drop boxes of every node for which `keep` returns false.
    pub fn retain(&mut self, mut keep: impl FnMut(&NodeId) -> bool) -> usize {
        let mut panels = lock(&self.panels);
        let before = panels.len();
        panels.retain(|id, _| keep(id));
        before - panels.len()
    }

    pub fn clear(&mut self) {
        lock(&self.panels).clear();
    }

    pub fn info_box(&self, node_id: &NodeId) -> Option<InfoBoxState> {
        lock(&self.panels)
            .get(node_id)
            .map(|panel| panel.state.clone())
    }

    pub fn info_boxes(&self) -> HashMap<NodeId, InfoBoxState> {
        lock(&self.panels)
            .iter()
            .map(|(id, panel)| (id.clone(), panel.state.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.panels).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.panels).is_empty()
    }
}

impl std::fmt::Debug for TooltipReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TooltipReconciler")
            .field("panels", &self.len())
            .field("fades", &self.fades)
            .finish()
    }
}

impl Panel {
    fn hidden(node_id: NodeId, contents: InfoBoxContents) -> Self {
        Self {
            state: InfoBoxState {
                node_id,
                visible: false,
                contents,
                opacity: Tween::hold(0.0),
            },
            pending: None,
            fade: None,
        }
    }
}
