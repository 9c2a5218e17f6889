use crate::canvas::{DisplayRect, ImagePoint, Region, RegionModel, screen_to_image};
use crate::io::AssetError;
use crate::ops::mask::{Mask, rasterize};
use crate::ops::overlay::render_overlay;

// ============================================================================
// GESTURE STATE MACHINE
// ============================================================================

/// Active pointer gesture of the region tool.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum GestureState {
    #[default]
    Idle,
    /// Rubber-banding a new region from `anchor`. `candidate` is the live
    /// preview and is not part of the model until pointer-up.
    Drawing {
        anchor: ImagePoint,
        candidate: Option<Region>,
    },
    /// Moving region `index`; `offset` is pointer minus region origin at
    /// gesture start.
    Dragging { index: usize, offset: ImagePoint },
}

/// What a pointer event did, so the owner knows which refresh to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolOutcome {
    /// Nothing changed.
    Ignored,
    /// Only the transient preview moved; the model is unchanged.
    Preview,
    /// The region model (regions or selection) changed.
    ModelChanged,
}

/// Create/select/drag tool for rectangular regions. One gesture at a time.
#[derive(Clone, Debug, Default)]
pub struct RegionTool {
    state: GestureState,
}

impl RegionTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == GestureState::Idle
    }

    /// Region being rubber-banded, if any.
    pub fn preview(&self) -> Option<Region> {
        match self.state {
            GestureState::Drawing { candidate, .. } => candidate,
            _ => None,
        }
    }

    /// Starts a gesture: drag when `pos` hits a region, draw otherwise.
    /// A second pointer-down during an active gesture is ignored.
    pub fn pointer_down(&mut self, model: &mut RegionModel, pos: ImagePoint) -> ToolOutcome {
        if !self.is_idle() || !pos.is_finite() {
            return ToolOutcome::Ignored;
        }
        match model.hit_test(pos) {
            Some(index) => {
                let origin = model.get(index).map(Region::origin).unwrap_or(pos);
                model.select(Some(index));
                self.state = GestureState::Dragging {
                    index,
                    offset: ImagePoint::new(pos.x - origin.x, pos.y - origin.y),
                };
            }
            None => {
                model.select(None);
                self.state = GestureState::Drawing {
                    anchor: pos,
                    candidate: None,
                };
            }
        }
        ToolOutcome::ModelChanged
    }

    pub fn pointer_move(&mut self, model: &mut RegionModel, pos: ImagePoint) -> ToolOutcome {
        if !pos.is_finite() {
            return ToolOutcome::Ignored;
        }
        match self.state {
            GestureState::Idle => ToolOutcome::Ignored,
            GestureState::Dragging { index, offset } => {
                let Some(region) = model.get(index).copied() else {
                    // Region vanished under the gesture; abandon it.
                    self.state = GestureState::Idle;
                    return ToolOutcome::Ignored;
                };
                let origin = ImagePoint::new(pos.x - offset.x, pos.y - offset.y);
                model.update_at(index, region.moved_to(origin));
                ToolOutcome::ModelChanged
            }
            GestureState::Drawing { anchor, .. } => {
                self.state = GestureState::Drawing {
                    anchor,
                    candidate: Some(Region::from_corners(anchor, pos)),
                };
                ToolOutcome::Preview
            }
        }
    }

    /// Ends the gesture. A finished draw commits its candidate.
    pub fn pointer_up(&mut self, model: &mut RegionModel) -> ToolOutcome {
        let state = std::mem::take(&mut self.state);
        match state {
            GestureState::Drawing {
                candidate: Some(region),
                ..
            } => {
                model.add(region);
                ToolOutcome::ModelChanged
            }
            // A bare click in empty space still leaves the preview to clear.
            GestureState::Drawing { candidate: None, .. } => ToolOutcome::Preview,
            GestureState::Dragging { .. } | GestureState::Idle => ToolOutcome::Ignored,
        }
    }

    /// Pointer left the surface: treated exactly like pointer-up.
    pub fn pointer_leave(&mut self, model: &mut RegionModel) -> ToolOutcome {
        self.pointer_up(model)
    }

    /// Abandons any gesture without touching the model.
    pub fn cancel(&mut self) {
        self.state = GestureState::Idle;
    }
}

// ============================================================================
// REGION EDITOR
// ============================================================================

/// Whether the editor is showing the image or collecting regions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum EditMode {
    #[default]
    View,
    Draw,
}

/// Snapshot handed to the change hook after every refresh.
pub struct EditorView<'a> {
    pub model: &'a RegionModel,
    pub preview: Option<Region>,
    pub mask: &'a Mask,
}

pub type ChangeHook = Box<dyn FnMut(&EditorView<'_>) + Send>;

/// One editor instance bound to one image: region set, gesture tool and the
/// derived mask, plus an explicit post-mutation hook for the render pass.
///
/// An unbound editor (0×0, no image decoded yet) ignores pointer input.
pub struct RegionEditor {
    width: u32,
    height: u32,
    model: RegionModel,
    tool: RegionTool,
    mask: Mask,
    mode: EditMode,
    on_change: Option<ChangeHook>,
}

impl Default for RegionEditor {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl std::fmt::Debug for RegionEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionEditor")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("regions", &self.model.len())
            .field("state", &self.tool.state())
            .field("mode", &self.mode)
            .finish()
    }
}

impl RegionEditor {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            model: RegionModel::new(),
            tool: RegionTool::new(),
            mask: Mask::blank(width, height),
            mode: EditMode::View,
            on_change: None,
        }
    }

    /// Installs the callback run after every model change or preview update.
    pub fn set_on_change(&mut self, hook: impl FnMut(&EditorView<'_>) + Send + 'static) {
        self.on_change = Some(Box::new(hook));
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn is_bound(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn model(&self) -> &RegionModel {
        &self.model
    }

    pub fn tool_state(&self) -> GestureState {
        self.tool.state()
    }

    pub fn preview(&self) -> Option<Region> {
        self.tool.preview()
    }

    pub fn mask(&self) -> &Mask {
        &self.mask
    }

    pub fn mode(&self) -> EditMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: EditMode) {
        self.mode = mode;
    }

    /// Mask as a transferable asset, `None` when no pixel is selected.
    pub fn mask_asset(&self) -> Result<Option<crate::io::ImageAsset>, AssetError> {
        self.mask.to_asset()
    }

    /// Switches to a new image: regions, gesture and mask all reset.
    pub fn reset_for_image(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.model.clear();
        self.tool.cancel();
        self.mode = EditMode::View;
        self.refresh(true);
    }

    // -- Pointer input (display coordinates) --------------------------------

    pub fn pointer_down(&mut self, x: f32, y: f32, rect: Option<DisplayRect>) -> ToolOutcome {
        let Some(pos) = self.map_pointer(x, y, rect) else {
            return ToolOutcome::Ignored;
        };
        let outcome = self.tool.pointer_down(&mut self.model, pos);
        if outcome != ToolOutcome::Ignored {
            self.mode = EditMode::Draw;
        }
        self.apply(outcome)
    }

    pub fn pointer_move(&mut self, x: f32, y: f32, rect: Option<DisplayRect>) -> ToolOutcome {
        let Some(pos) = self.map_pointer(x, y, rect) else {
            return ToolOutcome::Ignored;
        };
        let outcome = self.tool.pointer_move(&mut self.model, pos);
        self.apply(outcome)
    }

    pub fn pointer_up(&mut self) -> ToolOutcome {
        let outcome = self.tool.pointer_up(&mut self.model);
        self.apply(outcome)
    }

    pub fn pointer_leave(&mut self) -> ToolOutcome {
        let outcome = self.tool.pointer_leave(&mut self.model);
        self.apply(outcome)
    }

    // -- Direct region edits -------------------------------------------------

    /// Adds a region directly in image coordinates (scripted input).
    pub fn add_region(&mut self, region: Region) -> usize {
        let index = self.model.add(region);
        self.refresh(true);
        index
    }

    /// Deletes the selected region, if any.
    pub fn remove_selected(&mut self) -> Option<Region> {
        let index = self.model.selected()?;
        self.remove_at(index)
    }

    pub fn remove_at(&mut self, index: usize) -> Option<Region> {
        self.tool.cancel();
        let removed = self.model.remove_at(index)?;
        self.refresh(true);
        Some(removed)
    }

    /// "Clear all": every region, the selection and the preview go away.
    pub fn clear_all(&mut self) {
        self.tool.cancel();
        self.model.clear();
        self.refresh(true);
    }

    /// Renders the current regions and preview over `base`.
    pub fn render(&self, base: &image::RgbaImage) -> image::RgbaImage {
        render_overlay(base, &self.model, self.tool.preview())
    }

    // -- Internals -----------------------------------------------------------

    fn map_pointer(&self, x: f32, y: f32, rect: Option<DisplayRect>) -> Option<ImagePoint> {
        if !self.is_bound() || rect.is_none() || !x.is_finite() || !y.is_finite() {
            return None;
        }
        Some(screen_to_image(x, y, rect, self.width, self.height))
    }

    fn apply(&mut self, outcome: ToolOutcome) -> ToolOutcome {
        match outcome {
            ToolOutcome::ModelChanged => self.refresh(true),
            ToolOutcome::Preview => self.refresh(false),
            ToolOutcome::Ignored => {}
        }
        outcome
    }

    /// Post-mutation hook: recompute the mask from scratch when the model
    /// changed, then notify the render pass.
    fn refresh(&mut self, model_changed: bool) {
        if model_changed {
            self.mask = rasterize(self.model.regions(), self.width, self.height);
        }
        if let Some(hook) = self.on_change.as_mut() {
            let view = EditorView {
                model: &self.model,
                preview: self.tool.preview(),
                mask: &self.mask,
            };
            hook(&view);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn full_rect(w: f32, h: f32) -> Option<DisplayRect> {
        Some(DisplayRect::new(0.0, 0.0, w, h))
    }

    fn draw(editor: &mut RegionEditor, from: (f32, f32), to: (f32, f32)) {
        let (w, h) = editor.dimensions();
        let rect = full_rect(w as f32, h as f32);
        editor.pointer_down(from.0, from.1, rect);
        editor.pointer_move(to.0, to.1, rect);
        editor.pointer_up();
    }

    #[test]
    fn test_draw_direction_does_not_matter() {
        let mut a = RegionEditor::new(100, 100);
        draw(&mut a, (50.0, 50.0), (10.0, 10.0));
        let mut b = RegionEditor::new(100, 100);
        draw(&mut b, (10.0, 10.0), (50.0, 50.0));

        let expected = Region { x: 10.0, y: 10.0, width: 40.0, height: 40.0 };
        assert_eq!(a.model().regions(), &[expected]);
        assert_eq!(b.model().regions(), &[expected]);
        assert_eq!(a.mask(), b.mask());
        assert_eq!(a.mask().selected_pixels(), 1600);
    }

    #[test]
    fn test_preview_not_committed_until_pointer_up() {
        let mut editor = RegionEditor::new(100, 100);
        let rect = full_rect(100.0, 100.0);
        editor.pointer_down(10.0, 10.0, rect);
        assert_eq!(editor.pointer_move(30.0, 40.0, rect), ToolOutcome::Preview);
        assert!(editor.model().is_empty());
        assert!(editor.mask().is_empty());
        assert_eq!(editor.preview(), Some(Region::new(10.0, 10.0, 20.0, 30.0)));

        editor.pointer_up();
        assert_eq!(editor.model().len(), 1);
        assert_eq!(editor.preview(), None);
        assert_eq!(editor.tool_state(), GestureState::Idle);
    }

    #[test]
    fn test_click_without_move_adds_nothing() {
        let mut editor = RegionEditor::new(100, 100);
        editor.pointer_down(10.0, 10.0, full_rect(100.0, 100.0));
        editor.pointer_up();
        assert!(editor.model().is_empty());
    }

    #[test]
    fn test_drag_moves_without_resizing() {
        let mut editor = RegionEditor::new(200, 200);
        let rect = full_rect(200.0, 200.0);
        draw(&mut editor, (10.0, 10.0), (50.0, 30.0));

        // Grab the region 5px inside its corner and move the pointer
        assert_eq!(editor.pointer_down(15.0, 15.0, rect), ToolOutcome::ModelChanged);
        assert_eq!(editor.model().selected(), Some(0));
        editor.pointer_move(115.0, 65.0, rect);
        editor.pointer_up();

        assert_eq!(editor.model().regions(), &[Region::new(110.0, 60.0, 40.0, 20.0)]);
        assert!(editor.mask().is_selected(110, 60));
        assert!(!editor.mask().is_selected(10, 10));
    }

    #[test]
    fn test_drag_uses_mapped_coordinates() {
        // 100x100 display showing a 400x400 image
        let mut editor = RegionEditor::new(400, 400);
        let rect = full_rect(100.0, 100.0);
        editor.pointer_down(10.0, 10.0, rect);
        editor.pointer_move(20.0, 30.0, rect);
        editor.pointer_up();
        assert_eq!(editor.model().regions(), &[Region::new(40.0, 40.0, 40.0, 80.0)]);
    }

    #[test]
    fn test_leave_ends_drag_without_mutation() {
        let mut editor = RegionEditor::new(100, 100);
        let rect = full_rect(100.0, 100.0);
        draw(&mut editor, (10.0, 10.0), (20.0, 20.0));

        editor.pointer_down(15.0, 15.0, rect);
        editor.pointer_move(25.0, 25.0, rect);
        let before = editor.model().clone();
        assert_eq!(editor.pointer_leave(), ToolOutcome::Ignored);
        assert_eq!(editor.model(), &before);
        assert_eq!(editor.pointer_move(90.0, 90.0, rect), ToolOutcome::Ignored);
        assert_eq!(editor.model(), &before);
    }

    #[test]
    fn test_second_pointer_down_is_ignored() {
        let mut editor = RegionEditor::new(100, 100);
        let rect = full_rect(100.0, 100.0);
        editor.pointer_down(10.0, 10.0, rect);
        assert_eq!(editor.pointer_down(80.0, 80.0, rect), ToolOutcome::Ignored);
        editor.pointer_move(30.0, 30.0, rect);
        editor.pointer_up();
        assert_eq!(editor.model().regions(), &[Region::new(10.0, 10.0, 20.0, 20.0)]);
    }

    #[test]
    fn test_missing_surface_is_noop() {
        let mut editor = RegionEditor::new(100, 100);
        assert_eq!(editor.pointer_down(10.0, 10.0, None), ToolOutcome::Ignored);
        assert_eq!(editor.pointer_down(f32::NAN, 10.0, full_rect(100.0, 100.0)), ToolOutcome::Ignored);
        assert_eq!(editor.tool_state(), GestureState::Idle);

        let mut unbound = RegionEditor::default();
        assert_eq!(unbound.pointer_down(1.0, 1.0, full_rect(10.0, 10.0)), ToolOutcome::Ignored);
    }

    #[test]
    fn test_remove_selected_and_clear() {
        let mut editor = RegionEditor::new(100, 100);
        let rect = full_rect(100.0, 100.0);
        draw(&mut editor, (0.0, 0.0), (20.0, 20.0));
        draw(&mut editor, (60.0, 60.0), (80.0, 80.0));

        editor.pointer_down(70.0, 70.0, rect);
        editor.pointer_up();
        assert_eq!(editor.remove_selected(), Some(Region::new(60.0, 60.0, 20.0, 20.0)));
        assert_eq!(editor.model().selected(), None);
        assert_eq!(editor.model().hit_test(ImagePoint::new(70.0, 70.0)), None);
        assert!(!editor.mask().is_selected(70, 70));
        assert_eq!(editor.remove_selected(), None);

        editor.clear_all();
        assert!(editor.mask().is_empty());
        assert_eq!(editor.mask().width(), 100);
    }

    #[test]
    fn test_hook_runs_after_each_change() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut editor = RegionEditor::new(50, 50);
        editor.set_on_change(move |view| {
            sink.lock().unwrap().push((view.model.len(), view.preview.is_some(), view.mask.selected_pixels()));
        });

        draw(&mut editor, (0.0, 0.0), (10.0, 10.0));
        let log = seen.lock().unwrap().clone();
        assert_eq!(log, vec![(0, false, 0), (0, true, 0), (1, false, 100)]);
    }

    fn assert_model_consistent(editor: &RegionEditor) {
        let model = editor.model();
        for r in model.iter() {
            assert!(r.width >= 0.0 && r.height >= 0.0, "negative size in {:?}", r);
            assert_eq!(*r, r.normalized(), "origin is not top-left in {:?}", r);
        }
        if let Some(i) = model.selected() {
            assert!(i < model.len(), "selection {} out of {}", i, model.len());
        }
        assert_eq!(editor.mask(), &rasterize(model.regions(), 100, 100));
    }

    #[test]
    fn test_mixed_edit_sequence_keeps_model_consistent() {
        let mut editor = RegionEditor::new(100, 100);
        let rect = full_rect(100.0, 100.0);

        // One region per drag direction
        for (from, to) in [
            ((5.0, 5.0), (20.0, 20.0)),
            ((45.0, 45.0), (30.0, 30.0)),
            ((60.0, 20.0), (80.0, 5.0)),
            ((95.0, 60.0), (70.0, 90.0)),
        ] {
            draw(&mut editor, from, to);
            assert_model_consistent(&editor);
        }
        assert_eq!(editor.model().get(2), Some(&Region::new(60.0, 5.0, 20.0, 15.0)));
        assert_eq!(editor.model().get(3), Some(&Region::new(70.0, 60.0, 25.0, 30.0)));

        // Drag the second region partly off the top-left edge
        editor.pointer_down(35.0, 35.0, rect);
        assert_model_consistent(&editor);
        editor.pointer_move(0.0, 0.0, rect);
        assert_model_consistent(&editor);
        editor.pointer_up();
        let moved = Region::new(-5.0, -5.0, 15.0, 15.0);
        assert_eq!(editor.model().selected_region(), Some(&moved));
        assert_model_consistent(&editor);

        // Removing a region below the selection keeps it on the same region
        assert_eq!(editor.remove_at(0), Some(Region::new(5.0, 5.0, 15.0, 15.0)));
        assert_eq!(editor.model().selected(), Some(0));
        assert_eq!(editor.model().selected_region(), Some(&moved));
        assert_model_consistent(&editor);

        editor.remove_selected();
        assert_eq!(editor.model().selected(), None);
        assert_eq!(editor.model().len(), 2);
        assert_model_consistent(&editor);

        editor.clear_all();
        assert!(editor.model().is_empty());
        assert_eq!(editor.model().selected(), None);
        assert_model_consistent(&editor);
    }

    #[test]
    fn test_reset_for_image_empties_everything() {
        let mut editor = RegionEditor::new(100, 100);
        draw(&mut editor, (0.0, 0.0), (20.0, 20.0));
        assert_eq!(editor.mode(), EditMode::Draw);

        editor.reset_for_image(64, 32);
        assert!(editor.model().is_empty());
        assert_eq!((editor.mask().width(), editor.mask().height()), (64, 32));
        assert!(editor.mask().is_empty());
        assert_eq!(editor.mode(), EditMode::View);
    }
}
