pub mod commands;
pub mod eligibility;
pub mod errors;
pub mod events;
pub mod fine;
pub mod loan;
pub mod policy;
pub mod reservation;
pub mod subscription;
pub mod value_objects;

pub use eligibility::*;
pub use errors::*;
pub use events::*;
pub use fine::*;
pub use loan::*;
pub use policy::*;
pub use reservation::*;
pub use subscription::*;
pub use value_objects::*;
