pub mod catalog;
pub mod skill;
pub mod sqlite_store;
pub mod store;
pub mod tag;

pub use catalog::{SkillCatalog, TagCatalog};
pub use skill::*;
pub use sqlite_store::SqliteCatalogStore;
pub use store::*;
pub use tag::*;
