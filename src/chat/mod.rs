pub mod broadcast;
pub mod events;
pub mod gateway;
pub mod registry;
