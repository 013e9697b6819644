//! Import definitions and the batch driver.

pub mod definition;
pub mod driver;
pub mod naming;

pub use definition::{
    example_definition, load_definition, DefinitionFile, ImportDefinition, ImportDefinitionBuilder,
    DEFAULT_PAGE_SIZE,
};
pub use driver::{plan_for, Importer};
pub use naming::{ordinal, pluralize, snake_case, table_name_for};
