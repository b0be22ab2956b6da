//! Priced-item selection from an estimate's sections.

use crate::model::Amount;
use crate::tree::{flatten_into, FlatRecord, Node};

/// Material-code prefix marking price-tag priced materials.
pub const PRICE_TAG_PREFIX: &str = "ТЦ_";

/// One retained cost item with its section identity.
#[derive(Debug, Clone, PartialEq)]
pub struct CostItem {
    pub section_code: String,
    pub section_name: String,
    /// `SectionCode`, `SectionName`, then the item's own flattened fields.
    pub fields: FlatRecord,
}

/// Walk `Sections.Section[].Items.Item[]` and keep items whose
/// `Material.Code` starts with `prefix`. Missing sections, sections without
/// items and items without a material code are skipped.
pub fn select_priced_items(estimate: &Node, prefix: &str) -> Vec<CostItem> {
    let Some(sections) = estimate.get("Sections") else {
        return Vec::new();
    };

    let mut items = Vec::new();
    for section in sections.children("Section") {
        let section_code = section.text_at(&["Code"]);
        let section_name = section.text_at(&["Name"]);

        let section_items = section
            .get("Items")
            .into_iter()
            .flat_map(|list| list.children("Item"))
            .filter(|item| has_material_prefix(item, prefix));

        for item in section_items {
            let mut fields = FlatRecord::new();
            fields.insert("SectionCode", section_code);
            fields.insert("SectionName", section_name);
            flatten_into(item, "", &mut fields);
            items.push(CostItem {
                section_code: section_code.to_string(),
                section_name: section_name.to_string(),
                fields,
            });
        }
    }
    items
}

fn has_material_prefix(item: &Node, prefix: &str) -> bool {
    item.get("Material")
        .and_then(|m| m.get("Code"))
        .and_then(Node::text)
        .is_some_and(|code| code.starts_with(prefix))
}

/// Sum one field across the retained items. `None` when nothing was retained,
/// so callers can tell "no item-level data" from "items summing to zero".
pub fn sum_items(items: &[CostItem], field: &str) -> Option<Amount> {
    if items.is_empty() {
        return None;
    }
    Some(
        items
            .iter()
            .map(|item| item.fields.amount(field).unwrap_or_default())
            .sum(),
    )
}
