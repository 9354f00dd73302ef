//! Page handlers

pub mod home;
pub mod machines;

pub use home::home_handler;
pub use machines::{collect_machines, machines_handler, CombinedInfo};
