//! Closed value sets used by the schema layer

pub mod providers;

pub use providers::ProviderType;
