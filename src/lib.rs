pub mod ai;
pub mod settings;
pub mod state_machine;
pub mod utils;

#[cfg(test)]
mod tests;

pub use ai::{
    GenerationConfig, GenerationError, GenerationParams, GenerationResult, HealthStatus,
    MessageLength, MessageSource, MessageTemplateGenerator, Tone,
};
