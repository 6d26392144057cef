//! Model collaborator: conversation types, the model trait and providers.

pub mod errors;
mod openai;
pub mod types;

pub use errors::ModelError;
pub use openai::{DEFAULT_TEMPERATURE, OpenAiModel, OpenAiModelBuilder};
pub use types::{Message, Model, Role};
