//! Label model representing a Gmail label/folder

use serde::{Deserialize, Serialize};

/// Whether a label is built into Gmail or created by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelKind {
    System,
    User,
}

impl LabelKind {
    /// Map Gmail's `type` field; anything but "user" is treated as system
    pub fn from_api(kind: Option<&str>) -> Self {
        match kind {
            Some(k) if k.eq_ignore_ascii_case("user") => Self::User,
            _ => Self::System,
        }
    }
}

/// A mailbox label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
    pub kind: LabelKind,
}

/// Sort labels by name, case-insensitively
pub fn sort_labels(labels: &mut [Label]) {
    labels.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.id.cmp(&b.id))
    });
}
