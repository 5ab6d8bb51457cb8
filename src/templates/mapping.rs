use crate::models::CiCategory;
use std::collections::BTreeMap;

/// Default template for a category, or `None` when the category has no process
pub fn default_template_id(category: CiCategory) -> Option<&'static str> {
    match category {
        CiCategory::System | CiCategory::Subsystem | CiCategory::Equipment => {
            Some("arp4754a-system")
        }
        CiCategory::Software => Some("do178c-software"),
        CiCategory::Hardware => Some("do254-hardware"),
        CiCategory::Assembly | CiCategory::PhysicalProduct => Some("product-development"),
        CiCategory::Component | CiCategory::Part => Some("component-part"),
        CiCategory::Document => None,
    }
}

/// Category to template id lookup table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMapping {
    table: BTreeMap<CiCategory, String>,
}

impl Default for CategoryMapping {
    fn default() -> Self {
        let table = CiCategory::ALL
            .iter()
            .filter_map(|&c| default_template_id(c).map(|id| (c, id.to_string())))
            .collect();
        Self { table }
    }
}

impl CategoryMapping {
    /// A table with no entries at all
    pub fn empty() -> Self {
        Self {
            table: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, category: CiCategory, template_id: impl Into<String>) {
        self.table.insert(category, template_id.into());
    }

    pub fn remove(&mut self, category: CiCategory) {
        self.table.remove(&category);
    }

    pub fn template_for(&self, category: CiCategory) -> Option<&str> {
        self.table.get(&category).map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = (CiCategory, &str)> {
        self.table.iter().map(|(c, id)| (*c, id.as_str()))
    }
}
