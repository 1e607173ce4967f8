mod extractor;
mod model;
mod orchestrator;
mod strategy;
mod ytdlp;

pub use extractor::*;
pub use model::*;
pub use orchestrator::*;
pub use strategy::*;
pub use ytdlp::*;
