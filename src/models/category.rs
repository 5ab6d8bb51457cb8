use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Category of a configuration item; selects the default process template
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CiCategory {
    System,
    Subsystem,
    Equipment,
    Software,
    Hardware,
    Assembly,
    Component,
    Part,
    Document,
    PhysicalProduct,
}

impl CiCategory {
    pub const ALL: [CiCategory; 10] = [
        CiCategory::System,
        CiCategory::Subsystem,
        CiCategory::Equipment,
        CiCategory::Software,
        CiCategory::Hardware,
        CiCategory::Assembly,
        CiCategory::Component,
        CiCategory::Part,
        CiCategory::Document,
        CiCategory::PhysicalProduct,
    ];

    /// Wire name (e.g. "PHYSICAL_PRODUCT")
    pub fn as_str(&self) -> &'static str {
        match self {
            CiCategory::System => "SYSTEM",
            CiCategory::Subsystem => "SUBSYSTEM",
            CiCategory::Equipment => "EQUIPMENT",
            CiCategory::Software => "SOFTWARE",
            CiCategory::Hardware => "HARDWARE",
            CiCategory::Assembly => "ASSEMBLY",
            CiCategory::Component => "COMPONENT",
            CiCategory::Part => "PART",
            CiCategory::Document => "DOCUMENT",
            CiCategory::PhysicalProduct => "PHYSICAL_PRODUCT",
        }
    }

}

impl fmt::Display for CiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CiCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace(['-', ' '], "_");
        CiCategory::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| format!("unknown configuration item category '{}'", s))
    }
}

/// Assurance / criticality level (e.g. "DAL_A", "SIL_2")
///
/// Levels are opaque tokens compared by exact string equality after trimming.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(from = "String", into = "String")]
pub struct AssuranceLevel(String);

impl AssuranceLevel {
    pub fn new(level: impl Into<String>) -> Self {
        let level = level.into();
        Self(level.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssuranceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssuranceLevel {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for AssuranceLevel {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<AssuranceLevel> for String {
    fn from(level: AssuranceLevel) -> Self {
        level.0
    }
}
