//! Placement scripts: a recorded editing session replayed through the editor
//!
//! ```json
//! {
//!   "geometry": { "top": 0, "left": 0,
//!                 "pages": { "type": "uniform", "containerHeight": 1584, "totalPages": 2 } },
//!   "actions": [
//!     { "action": "place", "kind": "checkbox", "x": 20, "y": 20 },
//!     { "action": "place", "kind": "text", "x": 30, "y": 1492, "value": "Sign here" },
//!     { "action": "move", "fieldId": 1, "from": { "x": 25, "y": 25 }, "to": { "x": 45, "y": 25 } },
//!     { "action": "remove", "fieldId": 1 }
//!   ]
//! }
//! ```
//!
//! Without `geometry`, pages are stacked at their media box heights times the
//! configured screen scale, with the container at the viewport origin.

use anyhow::{bail, Result};
use fieldmark_core::{
    ContainerGeometry, Editor, FieldId, FieldKind, PageBox, PageStack, ScreenPoint,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub geometry: Option<ContainerGeometry>,
    pub actions: Vec<Action>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Action {
    /// Arm `kind`, click at `(x, y)`, and fill in `value` if given
    Place {
        kind: FieldKind,
        x: f64,
        y: f64,
        #[serde(default)]
        value: Option<String>,
    },
    /// Drag a field from one viewport point to another
    #[serde(rename_all = "camelCase")]
    Move {
        field_id: FieldId,
        from: ScreenPoint,
        to: ScreenPoint,
    },
    #[serde(rename_all = "camelCase")]
    Remove { field_id: FieldId },
}

/// Stack the rendered pages at their natural size
pub fn natural_geometry(pages: &[PageBox], scale: f64) -> ContainerGeometry {
    ContainerGeometry::new(
        0.0,
        0.0,
        PageStack::Measured {
            page_heights: pages.iter().map(|p| p.height * scale).collect(),
        },
    )
}

/// Replay the actions, returning how many of them took effect.
pub fn replay(editor: &mut Editor, script: &Script, geometry: &ContainerGeometry) -> Result<usize> {
    let mut applied = 0;
    for (index, action) in script.actions.iter().enumerate() {
        let took_effect = match action {
            Action::Place { kind, x, y, value } => {
                editor.arm(*kind);
                match editor.click(ScreenPoint::new(*x, *y), geometry) {
                    Some(field) => {
                        if let Some(value) = value {
                            editor.update_value(field.id, value.as_str());
                        }
                        true
                    }
                    None => {
                        editor.disarm();
                        false
                    }
                }
            }
            Action::Move { field_id, from, to } => {
                if editor.pointer_down(*field_id, *from, geometry) {
                    editor.pointer_move(*to, geometry);
                    editor.pointer_up(*to, geometry).is_some()
                } else {
                    false
                }
            }
            Action::Remove { field_id } => editor.remove_field(*field_id),
        };

        if took_effect {
            applied += 1;
        } else {
            tracing::warn!(index, ?action, "Script action had no effect");
        }
    }

    if applied == 0 && !script.actions.is_empty() {
        bail!("none of the {} script actions took effect", script.actions.len());
    }
    Ok(applied)
}
