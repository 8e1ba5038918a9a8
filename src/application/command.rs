// Operator commands and their validation errors
use crate::domain::unit::{UnitId, UnitListing};
use crate::domain::window::{TimeWindow, WindowError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum OperatorCommand {
    /// Tick a unit: open its channel straight away.
    Select(UnitId),
    /// Untick a unit: close its channel and drop its contribution.
    Deselect(UnitId),
    /// Restart collection for exactly these units.
    Start(Vec<UnitId>),
    SetWindow(TimeWindow),
    Shift(String),
    /// Re-send the selected window on every channel.
    Refresh,
    UnitsLoaded(UnitListing),
    /// The unit lookup itself failed; distinct from an empty listing.
    UnitsFailed(String),
    ShowUnits,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("select at least one production unit")]
    NoUnitSelected,
    #[error("select a valid time window first")]
    NoWindow,
    #[error("unknown production unit '{0}'")]
    UnknownUnit(UnitId),
    #[error("invalid time window: {0}")]
    Window(#[from] WindowError),
    #[error("cannot parse '{input}': {reason}")]
    Parse { input: String, reason: String },
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
}
