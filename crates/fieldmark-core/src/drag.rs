//! Drag-and-drop of placed fields
//!
//! `Idle → Dragging → Released`. Only a dragging controller wants pointer-move
//! events, so the move subscription has exactly one owner at a time.

use crate::field::FieldId;
use crate::placement::{place_local, ContainerGeometry, Placement, ScreenPoint};
use crate::store::FieldStore;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum DragState {
    Idle,
    /// `grab_x/grab_y` is the pointer's offset from the field's top-left.
    #[serde(rename_all = "camelCase")]
    Dragging {
        field_id: FieldId,
        grab_x: f64,
        grab_y: f64,
    },
    #[serde(rename_all = "camelCase")]
    Released { field_id: FieldId },
}

#[derive(Debug, Clone)]
pub struct DragController {
    state: DragState,
}

impl Default for DragController {
    fn default() -> Self {
        Self::new()
    }
}

impl DragController {
    pub fn new() -> Self {
        Self {
            state: DragState::Idle,
        }
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    pub fn wants_pointer_moves(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    pub fn reset(&mut self) {
        self.state = DragState::Idle;
    }

    /// Start dragging `field_id`. Returns `false` (and goes idle) when the
    /// field does not exist or its page is not in the stack.
    pub fn pointer_down(
        &mut self,
        store: &FieldStore,
        field_id: FieldId,
        pointer: ScreenPoint,
        geometry: &ContainerGeometry,
    ) -> bool {
        self.state = DragState::Idle;
        let Some(field) = store.get(field_id) else {
            return false;
        };
        let Some(page_top) = geometry.pages.page_top(field.page_number) else {
            return false;
        };
        let local_x = pointer.x - geometry.left;
        let local_y = pointer.y - geometry.top;
        self.state = DragState::Dragging {
            field_id,
            grab_x: local_x - field.x,
            grab_y: local_y - (page_top + field.y),
        };
        true
    }

    /// Follow the pointer on the field's current page. Ignored unless dragging.
    pub fn pointer_move(
        &mut self,
        store: &mut FieldStore,
        pointer: ScreenPoint,
        geometry: &ContainerGeometry,
    ) -> bool {
        let DragState::Dragging {
            field_id,
            grab_x,
            grab_y,
        } = self.state
        else {
            return false;
        };
        let Some(page_number) = store.get(field_id).map(|f| f.page_number) else {
            self.state = DragState::Idle;
            return false;
        };
        let Some(page_top) = geometry.pages.page_top(page_number) else {
            return false;
        };
        let x = pointer.x - geometry.left - grab_x;
        let y = pointer.y - geometry.top - grab_y - page_top;
        if !x.is_finite() || !y.is_finite() {
            return false;
        }
        store.relocate(field_id, Placement { page_number, x, y })
    }

    /// Drop the field. Its new top-left is re-placed through the page stack,
    /// so a drop over another page moves the field to that page.
    pub fn pointer_up(
        &mut self,
        store: &mut FieldStore,
        pointer: ScreenPoint,
        geometry: &ContainerGeometry,
    ) -> Option<Placement> {
        let DragState::Dragging {
            field_id,
            grab_x,
            grab_y,
        } = self.state
        else {
            return None;
        };
        self.state = DragState::Released { field_id };

        let local_x = pointer.x - geometry.left - grab_x;
        let local_y = pointer.y - geometry.top - grab_y;
        let placement = place_local(local_x, local_y, &geometry.pages)?;
        if store.relocate(field_id, placement) {
            tracing::debug!(field_id, page = placement.page_number, "Dropped field");
            Some(placement)
        } else {
            None
        }
    }
}
