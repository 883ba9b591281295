//! The user-editable projection of one analyzed item.

use serde::{Deserialize, Serialize};
use stitch_core::{Category, ClothesAttributes};

/// Editable fields for one clothing item under review.
///
/// AI suggestions only ever seed fields that are currently empty; a value the
/// user has set is never overwritten by a later poll. A field the user edits
/// and then clears back to empty counts as empty and may be re-seeded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemForm {
    pub product_name: String,
    pub brand: String,
    pub price: String,
    pub size: String,
    pub purchase_year: Option<u16>,
    pub purchase_month: Option<u8>,
    pub category: Option<Category>,
    pub materials: Vec<String>,
    pub colors: Vec<String>,
    /// AI-derived, not user-editable; always seeded from the suggestion.
    pub style_tags: Vec<String>,
}

impl ItemForm {
    /// Seed empty fields from an AI suggestion. Non-empty fields are left
    /// untouched in both directions: the suggestion never clears anything.
    pub fn seed_from(&mut self, suggestion: &ClothesAttributes) {
        if self.category.is_none() {
            self.category = suggestion.category;
        }
        if self.materials.is_empty() {
            self.materials = suggestion.materials.clone();
        }
        if self.colors.is_empty() {
            self.colors = suggestion.colors.clone();
        }
        if self.style_tags.is_empty() {
            self.style_tags = suggestion.style_tags.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suggestion() -> ClothesAttributes {
        ClothesAttributes {
            category: Some(Category::Top),
            materials: vec!["cotton".into(), "polyester".into()],
            colors: vec!["white".into()],
            style_tags: vec!["#casual".into(), "#basic".into()],
        }
    }

    #[test]
    fn seeds_empty_fields() {
        let mut form = ItemForm::default();
        form.seed_from(&suggestion());
        assert_eq!(form.category, Some(Category::Top));
        assert_eq!(form.materials, vec!["cotton", "polyester"]);
        assert_eq!(form.colors, vec!["white"]);
        assert_eq!(form.style_tags, vec!["#casual", "#basic"]);
    }

    #[test]
    fn user_values_survive_reseeding() {
        let mut form = ItemForm {
            materials: vec!["wool".into()],
            category: Some(Category::Etc),
            ..ItemForm::default()
        };
        form.seed_from(&suggestion());
        assert_eq!(form.materials, vec!["wool"]);
        assert_eq!(form.category, Some(Category::Etc));
        // Empty fields still get seeded.
        assert_eq!(form.colors, vec!["white"]);
    }

    #[test]
    fn cleared_field_is_reseedable() {
        let mut form = ItemForm::default();
        form.seed_from(&suggestion());
        form.materials.clear();

        let later = ClothesAttributes {
            materials: vec!["linen".into()],
            ..suggestion()
        };
        form.seed_from(&later);
        assert_eq!(form.materials, vec!["linen"]);
    }
}
