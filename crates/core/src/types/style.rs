//! Style templates offered in the studio.

use serde::{Deserialize, Serialize};

use super::id::StyleId;

/// A visual style a user can apply to their photo.
///
/// Serialized with camelCase names so exported catalogs can be re-imported
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleTemplate {
    pub id: StyleId,
    pub name: String,
    /// Preview image shown in the style picker.
    pub image_url: String,
    /// Base prompt sent to the image provider.
    pub prompt: String,
    #[serde(default)]
    pub description: String,
    /// Sort key, ascending.
    #[serde(default)]
    pub display_order: i32,
    /// Generate a preview as soon as a photo is uploaded.
    #[serde(default)]
    pub auto_generate: bool,
}

impl StyleTemplate {
    /// Whether the template can be sent to a provider at all.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        !self.name.trim().is_empty() && !self.prompt.trim().is_empty()
    }
}
