mod claude;
mod message;
mod opencode;
mod output;
pub mod scripted;
mod spawner;
mod traits;

pub use claude::ClaudeCodeGenerator;
pub use message::{render_transcript, Message, Role};
pub use opencode::OpenCodeGenerator;
pub use output::ProcessOutput;
pub use scripted::{ScriptedGenerator, ScriptedReply};
pub use spawner::ProcessSpawner;
pub use traits::{GenerationConfig, GenerationError, Generator, GeneratorType};

/// Create a generator by type
pub fn create_generator(generator_type: GeneratorType) -> Box<dyn Generator> {
    match generator_type {
        GeneratorType::ClaudeCode => Box::new(ClaudeCodeGenerator::new()),
        GeneratorType::OpenCode => Box::new(OpenCodeGenerator::new()),
    }
}
