pub mod chain_error;
pub mod node_error;

pub use chain_error::ChainError;
pub use node_error::NodeError;

pub type ChainResult<T> = Result<T, ChainError>;
