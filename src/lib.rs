pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod family;
pub mod models;
pub mod premium;

pub use db::Database;
pub use error::{Error, Result};
pub use family::FamilyManager;
