// src/config/mod.rs
pub mod crm;

pub use crm::{AuthConfig, CalendarConfig, CrmConfig, ScrapeConfig};
