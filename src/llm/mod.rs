//! Model integration: the invoker boundary and its local and hosted backends

pub mod hosted;
pub mod invoker;
pub mod local;
pub mod model_manager;
pub mod prompts;

pub use invoker::{InferenceConfig, InferenceResult, ModelBackend, ModelInvoker};
