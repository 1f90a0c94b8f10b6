//! Dialog layering for rendering
//!
//! Turns the stack into a list of rectangles in paint order. Nested dialogs are
//! shifted down and right of the dialog that owns them so both stay visible.

use super::types::DialogId;
use ratatui::layout::Rect;

/// Size request of a dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogSize {
    /// Fit content with a minimum size
    FitContent { min_width: u16, min_height: u16 },
    /// Full screen
    FullScreen,
}

impl Default for DialogSize {
    fn default() -> Self {
        Self::FitContent {
            min_width: 30,
            min_height: 5,
        }
    }
}

/// Helper struct for dialog layout calculations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogLayout {
    /// Dialog area (including border)
    pub dialog_area: Rect,
    /// Content area (excluding border)
    pub content_area: Rect,
}

impl DialogLayout {
    /// Centre a dialog of the requested size in `available`, then shift it by
    /// `nesting` steps.
    pub fn calculate(
        size: DialogSize,
        available: Rect,
        content_size: (u16, u16),
        nesting: u16,
    ) -> Self {
        let (width, height) = match size {
            DialogSize::FullScreen => (available.width, available.height),
            DialogSize::FitContent {
                min_width,
                min_height,
            } => {
                let width = content_size.0.max(min_width).saturating_add(2);
                let height = content_size.1.max(min_height).saturating_add(2);
                (width.min(available.width), height.min(available.height))
            }
        };

        let shift = nesting.saturating_mul(2);
        let x = available.x
            + (available.width.saturating_sub(width) / 2)
                .saturating_add(shift)
                .min(available.width.saturating_sub(width));
        let y = available.y
            + (available.height.saturating_sub(height) / 2)
                .saturating_add(shift / 2)
                .min(available.height.saturating_sub(height));

        let dialog_area = Rect {
            x,
            y,
            width,
            height,
        };
        let content_area = Rect {
            x: dialog_area.x + 1,
            y: dialog_area.y + 1,
            width: dialog_area.width.saturating_sub(2),
            height: dialog_area.height.saturating_sub(2),
        };

        Self {
            dialog_area,
            content_area,
        }
    }
}

/// Represents a dialog layer for rendering
#[derive(Debug, Clone)]
pub struct DialogLayer {
    dialog_id: DialogId,
    layout: DialogLayout,
    is_focused: bool,
    z_index: i32,
}

impl DialogLayer {
    pub fn new(dialog_id: DialogId, layout: DialogLayout, is_focused: bool, z_index: i32) -> Self {
        Self {
            dialog_id,
            layout,
            is_focused,
            z_index,
        }
    }

    pub fn dialog_id(&self) -> &DialogId {
        &self.dialog_id
    }

    pub fn layout(&self) -> &DialogLayout {
        &self.layout
    }

    /// Whether this is the topmost dialog, the one Esc would close.
    pub fn is_focused(&self) -> bool {
        self.is_focused
    }

    /// Higher values paint later
    pub fn z_index(&self) -> i32 {
        self.z_index
    }
}
