pub mod notion;

pub use notion::{NotionStore, PropertyNames};
