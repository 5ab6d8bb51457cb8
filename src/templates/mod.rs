//! Process Template Repository
//!
//! Loads immutable process templates from:
//! - templates compiled into the binary
//! - directories of YAML/JSON definition files
//! - documents supplied in memory

mod mapping;
mod repository;
mod source;

pub use mapping::{default_template_id, CategoryMapping};
pub use repository::TemplateRepository;
pub use source::{BuiltinSource, DirectorySource, InlineSource, TemplateDocument, TemplateSource};
