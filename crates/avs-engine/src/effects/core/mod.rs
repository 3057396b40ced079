pub mod composite;
pub mod scripted;
pub mod unknown;
