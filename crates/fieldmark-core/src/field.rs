//! Placed field records

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type FieldId = u64;

/// The kind of annotation a field draws on export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Checkbox,
    Radio,
    #[serde(alias = "esign")]
    Signature,
}

impl FieldKind {
    pub const ALL: [FieldKind; 4] = [
        FieldKind::Text,
        FieldKind::Checkbox,
        FieldKind::Radio,
        FieldKind::Signature,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Checkbox => "checkbox",
            FieldKind::Radio => "radio",
            FieldKind::Signature => "signature",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldKind {
    type Err = String;

    /// Accepts the lowercase names plus `esign`, the name older front ends used
    /// for signature fields.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(FieldKind::Text),
            "checkbox" => Ok(FieldKind::Checkbox),
            "radio" => Ok(FieldKind::Radio),
            "signature" | "esign" => Ok(FieldKind::Signature),
            other => Err(format!("Invalid field kind: {}", other)),
        }
    }
}

/// One placed annotation.
///
/// `x`/`y` are screen pixels relative to the top-left corner of the page the
/// field sits on, y growing downward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: FieldId,
    pub kind: FieldKind,
    #[serde(default)]
    pub value: String,
    pub page_number: u32,
    pub x: f64,
    pub y: f64,
}

impl Field {
    pub fn new(id: FieldId, kind: FieldKind, x: f64, y: f64, page_number: u32) -> Self {
        Self {
            id,
            kind,
            value: String::new(),
            page_number,
            x,
            y,
        }
    }
}
