pub mod card;
pub mod config;
pub mod connector;
pub mod delivery;
pub mod form;
pub mod telemetry;
