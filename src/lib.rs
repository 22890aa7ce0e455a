pub mod cli;
pub mod config;
pub mod extract;
pub mod labs;
pub mod llm;
pub mod narrative;
pub mod pipeline;
pub mod prompt;
pub mod report;
pub mod server;
pub mod util;
