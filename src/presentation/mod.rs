// Presentation layer - Console output, status board and operator input
pub mod app_state;
pub mod board;
pub mod console;
pub mod format;
pub mod handlers;
pub mod operator;
