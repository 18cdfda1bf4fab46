pub mod cache;
pub mod gateway;
pub mod places_client;

pub use gateway::{GatewayResult, ProviderGateway};
pub use places_client::{PlacesApi, PlacesClient, ProviderError};
