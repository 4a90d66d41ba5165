pub mod constants;
pub mod hash;
pub mod store;
pub mod types;
pub mod validation;
pub mod watcher;

pub use store::{load, save, ConfigIoError};
pub use types::ConfigDocument;
pub use validation::{validate, ValidationOptions, ValidationResult};
