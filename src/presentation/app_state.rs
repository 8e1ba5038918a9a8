// Application state for HTTP handlers
use crate::presentation::board::StatusBoard;

#[derive(Clone)]
pub struct AppState {
    pub board: StatusBoard,
}
