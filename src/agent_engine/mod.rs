pub mod action;
pub mod engine;
pub mod history;
pub mod literal;
pub mod loop_control;
pub mod parser;
pub mod prompt;
pub mod state;
