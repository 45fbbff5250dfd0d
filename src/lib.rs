pub mod cli;
pub mod config;
pub mod index;
pub mod lock;
pub mod parser;
pub mod runtime;
pub mod scheduler;
pub mod source;
pub mod stream;
