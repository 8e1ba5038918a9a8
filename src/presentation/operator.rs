// Operator command line parser
use crate::application::command::{InputError, OperatorCommand};
use crate::domain::unit::UnitId;
use crate::domain::window::TimeWindow;
use chrono::NaiveDateTime;

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

pub const HELP: &str = "commands: select <unit> | deselect <unit> | start <unit>... | \
window <start> <end> | shift <name> | refresh | units | quit";

/// Parse one line of operator input. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<OperatorCommand>, InputError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match verb.to_ascii_lowercase().as_str() {
        "select" => OperatorCommand::Select(single_unit(line, &args)?),
        "deselect" => OperatorCommand::Deselect(single_unit(line, &args)?),
        "start" => OperatorCommand::Start(args.iter().map(|u| UnitId::new(*u)).collect()),
        "window" => OperatorCommand::SetWindow(parse_window(line, &args)?),
        "shift" => match args.as_slice() {
            [name] => OperatorCommand::Shift((*name).to_string()),
            _ => return Err(parse_error(line, "expected: shift <name>")),
        },
        "refresh" => OperatorCommand::Refresh,
        "units" => OperatorCommand::ShowUnits,
        "quit" | "exit" => OperatorCommand::Quit,
        other => return Err(InputError::UnknownCommand(other.to_string())),
    };
    Ok(Some(command))
}

fn single_unit(line: &str, args: &[&str]) -> Result<UnitId, InputError> {
    match args {
        [unit] => Ok(UnitId::new(*unit)),
        _ => Err(parse_error(line, "expected exactly one unit")),
    }
}

/// Accepts `<start> <end>` with `T`-joined timestamps, or four words when the
/// date and time are separated by a space.
fn parse_window(line: &str, args: &[&str]) -> Result<TimeWindow, InputError> {
    let (start, end) = match args {
        [start, end] => (parse_timestamp(line, start)?, parse_timestamp(line, end)?),
        [start_date, start_time, end_date, end_time] => (
            parse_timestamp(line, &format!("{start_date} {start_time}"))?,
            parse_timestamp(line, &format!("{end_date} {end_time}"))?,
        ),
        _ => return Err(parse_error(line, "expected: window <start> <end>")),
    };
    Ok(TimeWindow::new(start, end)?)
}

pub fn parse_timestamp(line: &str, text: &str) -> Result<NaiveDateTime, InputError> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .ok_or_else(|| parse_error(line, &format!("'{text}' is not a date and time")))
}

fn parse_error(line: &str, reason: &str) -> InputError {
    InputError::Parse {
        input: line.trim().to_string(),
        reason: reason.to_string(),
    }
}
