//! Terminal output for the CLI
//!
//! Colored status lines plus the single-line indicator redrawn while the
//! notebook job is starting.

use crossterm::cursor::MoveToColumn;
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use crossterm::terminal::{Clear, ClearType};

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix
///
/// Outputs to stderr with red coloring for error feedback to the user.
pub fn print_error(msg: &str) {
    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow with a warning symbol prefix
pub fn print_warning(msg: &str) {
    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan with an info symbol prefix
pub fn print_info(msg: &str) {
    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Text of the waiting indicator after `iteration` polls
pub fn waiting_line(iteration: u64) -> String {
    let dots = ((iteration.saturating_sub(1)) % 3 + 1) as usize;
    format!("Waiting for the notebook server{:<3}", ".".repeat(dots))
}

/// Redraw the waiting indicator in place
pub fn print_waiting(iteration: u64) {
    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        MoveToColumn(0),
        Clear(ClearType::CurrentLine),
        SetForegroundColor(Color::Cyan),
        Print("+ "),
        ResetColor,
        Print(waiting_line(iteration))
    );
}

/// Move past the waiting indicator so the next message starts on a clean line
pub fn finish_waiting() {
    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(stdout, MoveToColumn(0), Clear(ClearType::CurrentLine));
}
