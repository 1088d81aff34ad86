//! Terminal screen size source.

use glowup_env::{EnvError, ScreenSize, ScreenSource};

/// Size used when the terminal cannot be measured.
pub const FALLBACK_SIZE: ScreenSize = ScreenSize::new(80, 24);

/// Measures the controlling terminal, in character cells.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalScreen;

impl ScreenSource for TerminalScreen {
    fn screen_size(&self) -> Result<ScreenSize, EnvError> {
        let (cols, rows) = crossterm::terminal::size()
            .map_err(|e| EnvError::command("terminal size query", e))?;
        let size = ScreenSize::new(cols.into(), rows.into());
        if size.is_empty() {
            return Err(EnvError::parse(format!("terminal reported {size}")));
        }
        Ok(size)
    }
}
