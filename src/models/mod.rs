mod customer;
mod family;
mod policy;
mod quotation;
mod status;

pub use customer::*;
pub use family::*;
pub use policy::*;
pub use quotation::*;
pub use status::*;
