//! Drawing the current state of a view.
//!
//! Renderers are read-only: they get a [`Frame`], a snapshot of the tree and
//! of every effect table taken after an update finished reconciling, and
//! turn it into something a person can look at.

use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::io::Write;

use tokio::time::Instant;

use crate::animation::{AnimationEntry, AnimationScheduler, AnimationType};
use crate::effect::{BASELINE_OPACITY, Visual};
use crate::error::RuntimeError;
use crate::record::NodeId;
#[cfg(feature = "console")]
use crate::status::Status;
use crate::tooltip::{InfoBoxState, TooltipReconciler};
#[cfg(feature = "console")]
use crate::tree::TreeIx;
use crate::tree::{Tree, TreeNode};

/// Fully reconciled state of a view at one instant.
#[derive(Debug)]
pub struct Frame<'a> {
    pub tree: &'a Tree,
    /// Instant the tweens should be sampled at.
    pub at: Instant,
    pub animations: HashMap<NodeId, &'a AnimationEntry>,
    pub visuals: HashMap<NodeId, Visual>,
    pub info_boxes: HashMap<NodeId, InfoBoxState>,
}

impl<'a> Frame<'a> {
    pub(crate) fn capture(
        tree: &'a Tree,
        animations: &'a AnimationScheduler,
        tooltips: &TooltipReconciler,
    ) -> Self {
        Self {
            tree,
            at: Instant::now(),
            animations: animations
                .animations()
                .map(|entry| (entry.node_id.clone(), entry))
                .collect(),
            visuals: animations.visuals(),
            info_boxes: tooltips.info_boxes(),
        }
    }

    pub fn root(&self) -> &'a TreeNode {
        self.tree.root()
    }

    pub fn animation_type(&self, id: &NodeId) -> Option<AnimationType> {
        self.animations.get(id).map(|entry| entry.animation_type)
    }

    pub fn visual(&self, id: &NodeId) -> Visual {
        self.visuals.get(id).copied().unwrap_or_default()
    }

    pub fn opacity(&self, id: &NodeId) -> f32 {
        self.visual(id).opacity_at(self.at)
    }

    /// Rotation of the running arcs in degrees.
    pub fn rotation(&self, id: &NodeId) -> f32 {
        self.visual(id).rotation_at(self.at)
    }

    pub fn info_box(&self, id: &NodeId) -> Option<&InfoBoxState> {
        self.info_boxes.get(id)
    }
}

/// Something that can draw frames.
pub trait Renderer {
    fn draw(&mut self, frame: &Frame<'_>) -> Result<(), RuntimeError>;
}

impl<F> Renderer for F
where
    F: FnMut(&Frame<'_>) -> Result<(), RuntimeError>,
{
    fn draw(&mut self, frame: &Frame<'_>) -> Result<(), RuntimeError> {
        self(frame)
    }
}

/// Mermaid flowchart of a frame, one class per status.
pub struct Mermaid<'f, 'a>(pub &'f Frame<'a>);

impl Display for Mermaid<'_, '_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let frame = self.0;
        let tree = frame.tree;

        writeln!(f, "graph LR")?;
        writeln!(f, "    classDef inactive fill:#E5E7EB,color:#6B7280")?;
        writeln!(f, "    classDef failed fill:#FCA5A5")?;
        writeln!(f, "    classDef runningButFailed fill:#FDBA74")?;
        writeln!(f, "    classDef running fill:#93C5FD")?;
        writeln!(f, "    classDef succeeded fill:#86EFAC")?;

        for ix in tree.preorder() {
            let node = &tree[ix];
            let name = node.name().replace('"', "#quot;");

            let mut label = name;
            if !node.status_text.is_empty() {
                label.push_str("<br/>");
                label.push_str(&node.status_text.replace('"', "#quot;"));
            }
            if node.status.is_running() {
                label.push_str(&format!("<br/>{}%", node.record.percentage_completed));
            }

            writeln!(f, "    n{}[\"{}\"]:::{}", ix.index(), label, node.status)?;

            let opacity = frame.opacity(node.id());
            if (opacity - BASELINE_OPACITY).abs() > 0.01 {
                writeln!(f, "    style n{} opacity:{:.2}", ix.index(), opacity)?;
            }
        }

        for ix in tree.preorder() {
            for &child in &tree[ix].children {
                writeln!(f, "    n{} --> n{}", ix.index(), child.index())?;
            }
        }

        Ok(())
    }
}

pub fn render_mermaid(frame: &Frame<'_>) -> String {
    Mermaid(frame).to_string()
}

/// Writes every frame as a Mermaid flowchart.
#[derive(Debug)]
pub struct MermaidRenderer<W> {
    out: W,
}

impl<W: Write> MermaidRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Renderer for MermaidRenderer<W> {
    fn draw(&mut self, frame: &Frame<'_>) -> Result<(), RuntimeError> {
        write!(self.out, "{}", Mermaid(frame))?;
        self.out.flush()?;
        Ok(())
    }
}

/// Indented tree for terminals.
#[cfg(feature = "console")]
#[derive(Debug)]
pub struct TextRenderer<W> {
    out: W,
    colors: bool,
}

#[cfg(feature = "console")]
impl<W: Write> TextRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            colors: console::colors_enabled(),
        }
    }

    #[must_use]
    pub fn with_colors(mut self, colors: bool) -> Self {
        self.colors = colors;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&self, frame: &Frame<'_>, ix: TreeIx) -> String {
        use console::style;

        let node = &frame.tree[ix];
        let marker = match frame.animation_type(node.id()) {
            Some(AnimationType::Rotation) => '~',
            Some(AnimationType::Flashing) => '!',
            None => '-',
        };

        let status = style(node.status.as_str()).force_styling(self.colors);
        let status = match node.status {
            Status::Inactive => status.dim(),
            Status::Failed => status.red(),
            Status::RunningButFailed => status.magenta(),
            Status::Running => status.yellow(),
            Status::Succeeded => status.green(),
        };

        let mut line = format!(
            "{:indent$}{marker} {} [{status}]",
            "",
            node.name(),
            indent = node.depth * 2
        );
        if node.status.is_running() {
            line.push_str(&format!(" {}%", node.record.percentage_completed));
        }
        if !node.status_text.is_empty() {
            line.push_str(&format!(" {}", node.status_text));
        }
        line
    }
}

#[cfg(feature = "console")]
impl<W: Write> Renderer for TextRenderer<W> {
    fn draw(&mut self, frame: &Frame<'_>) -> Result<(), RuntimeError> {
        for ix in frame.tree.preorder() {
            let line = self.line(frame, ix);
            writeln!(self.out, "{line}")?;
        }
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}
