pub mod context;
pub mod event_bus;
pub mod meter;
pub mod services;

pub use context::GraphContextManager;
pub use event_bus::{create_event_channel, ChainEvent, EventEmitter};
pub use meter::TokenMeter;
pub use services::ServiceLocator;
