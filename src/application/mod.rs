pub mod dependencies;
pub mod errors;
pub mod fine;
pub mod loan;
pub mod member;
mod notifications;
pub mod reservation;
pub mod settings;
pub mod sweep;

pub use dependencies::ServiceDependencies;
pub use errors::{LibraryApplicationError, Result};
