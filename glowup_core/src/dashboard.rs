//! Glow Up Terminal Dashboard
//! ==========================
//!
//! Terminal render driver for the saver. Uses Ratatui for rendering and
//! Crossterm for input, focus and mouse events.
//!
//! Enable with the `dashboard` feature flag.
//!
//! The driver is read-only with respect to the simulation: every render
//! interval it asks the coordinator for a [`FrameView`] and draws it. The
//! only thing it ever sends back is termination requests:
//! - Ctrl+C (raw mode swallows SIGINT) -> `InterruptSource::Signal`
//! - key press, paste or mouse activity -> `InterruptSource::Input`
//! - terminal focus lost -> `InterruptSource::FocusLost`
//! - terminal setup or I/O failure -> `InterruptSource::WindowClosed`

use std::io::{self, Stdout};
use std::sync::Arc;

use crossterm::{
    cursor::Show,
    event::{
        self, DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture,
        Event, KeyCode, KeyEventKind, KeyModifiers,
    },
    execute,
    terminal::{
        disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen, SetTitle,
    },
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Paragraph},
    Frame, Terminal,
};

use crate::config::LayoutConfig;
use crate::coordinator::{FrameView, InterruptSource, LifecycleCoordinator};
use crate::grid::BlockState;
use crate::layout::GridLayout;
use glowup_env::GlowContext;
use tracing::warn;

const BALL: &str = "●";

// =============================================================================
// PALETTE
// =============================================================================

/// Colours used by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub background: Color,
    pub idle: Color,
    pub completed: Color,
    pub countdown: Color,
    /// Active blocks fade from `gradient_start` (left) to `gradient_end` (right)
    pub gradient_start: (u8, u8, u8),
    pub gradient_end: (u8, u8, u8),
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            background: Color::Rgb(0, 0, 0),
            idle: Color::Rgb(61, 61, 61),        // #3d3d3d
            completed: Color::Rgb(19, 163, 181), // #13a3b5
            countdown: Color::Rgb(255, 255, 0),
            gradient_start: (12, 196, 204), // #0cc4cc
            gradient_end: (125, 42, 232),   // #7d2ae8
        }
    }
}

impl Palette {
    /// Colour of an active block in column `col` of `cols`.
    pub fn gradient(&self, col: usize, cols: usize) -> Color {
        let t = if cols <= 1 {
            0.0
        } else {
            col as f32 / (cols - 1) as f32
        };
        let lerp = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        let (r0, g0, b0) = self.gradient_start;
        let (r1, g1, b1) = self.gradient_end;
        Color::Rgb(lerp(r0, r1), lerp(g0, g1), lerp(b0, b1))
    }

    fn block_color(&self, state: BlockState, col: usize, cols: usize) -> Color {
        match state {
            BlockState::Idle => self.idle,
            BlockState::Active => self.gradient(col, cols),
            BlockState::Completed => self.completed,
        }
    }
}

// =============================================================================
// TERMINAL DASHBOARD
// =============================================================================

/// Terminal render driver bound to a coordinator.
pub struct TerminalDashboard<Ctx: GlowContext> {
    coordinator: Arc<LifecycleCoordinator<Ctx>>,
    layout: GridLayout,
    palette: Palette,
}

impl<Ctx: GlowContext> TerminalDashboard<Ctx> {
    pub fn new(coordinator: Arc<LifecycleCoordinator<Ctx>>, layout: GridLayout) -> Self {
        Self {
            coordinator,
            layout,
            palette: Palette::default(),
        }
    }

    /// Run the render loop (blocks until the coordinator terminates).
    ///
    /// Any terminal failure, during setup or while rendering, is treated as
    /// the window closing: termination is requested before the error is
    /// returned, so nothing is left waiting on a saver nobody can see.
    pub fn run(&mut self) -> io::Result<()> {
        let result = match enable_raw_mode() {
            Ok(()) => {
                let result = self.enter_and_render();
                restore_terminal();
                result
            }
            Err(e) => Err(e),
        };
        self.finish(result)
    }

    fn finish(&self, result: io::Result<()>) -> io::Result<()> {
        if let Err(e) = &result {
            warn!(error = %e, "Terminal failed, closing the saver");
            self.coordinator
                .request_termination(InterruptSource::WindowClosed);
        }
        result
    }

    fn enter_and_render(&mut self) -> io::Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            EnterAlternateScreen,
            EnableMouseCapture,
            EnableFocusChange,
            SetTitle(self.coordinator.config().title.as_str())
        )?;
        let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        terminal.hide_cursor()?;
        self.render_loop(&mut terminal)
    }

    fn render_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> io::Result<()> {
        let interval = self.coordinator.config().render_interval();

        loop {
            let view = self.coordinator.view();
            if view == FrameView::Terminated {
                return Ok(());
            }

            terminal.draw(|f| self.ui(f, &view))?;

            if event::poll(interval)? {
                if let Some(source) = interrupt_for(&event::read()?) {
                    self.coordinator.request_termination(source);
                }
            }
        }
    }

    /// Render one frame
    fn ui(&self, f: &mut Frame, view: &FrameView) {
        let area = f.area();
        f.render_widget(
            Block::default().style(Style::default().bg(self.palette.background)),
            area,
        );

        match view {
            FrameView::Downloading(blocks) => {
                let lines = grid_lines(
                    blocks,
                    &self.layout,
                    &self.coordinator.config().layout,
                    &self.palette,
                );
                f.render_widget(Paragraph::new(lines), area);
            }
            FrameView::Countdown(seconds) => {
                let row = Rect::new(
                    area.x,
                    area.y + area.height / 2,
                    area.width,
                    area.height.min(1),
                );
                let text = Paragraph::new(format!("Restarting in {seconds}"))
                    .alignment(Alignment::Center)
                    .style(
                        Style::default()
                            .fg(self.palette.countdown)
                            .add_modifier(Modifier::BOLD),
                    );
                f.render_widget(text, row);
            }
            FrameView::Terminated => {}
        }
    }
}

/// Best-effort terminal restore; a failing step must not skip the others.
fn restore_terminal() {
    if let Err(e) = disable_raw_mode() {
        warn!(error = %e, "Failed to leave raw mode");
    }
    if let Err(e) = execute!(
        io::stdout(),
        DisableFocusChange,
        DisableMouseCapture,
        LeaveAlternateScreen,
        Show
    ) {
        warn!(error = %e, "Failed to restore the terminal screen");
    }
}

/// Maps a terminal event to the interrupt it represents, if any.
pub fn interrupt_for(event: &Event) -> Option<InterruptSource> {
    match event {
        Event::Key(key)
            if key.kind == KeyEventKind::Press
                && key.code == KeyCode::Char('c')
                && key.modifiers.contains(KeyModifiers::CONTROL) =>
        {
            Some(InterruptSource::Signal)
        }
        Event::Key(key) if key.kind == KeyEventKind::Press => Some(InterruptSource::Input),
        Event::Mouse(_) | Event::Paste(_) => Some(InterruptSource::Input),
        Event::FocusLost => Some(InterruptSource::FocusLost),
        _ => None,
    }
}

/// Lays the blocks out row-major as coloured balls.
fn grid_lines(
    blocks: &[BlockState],
    layout: &GridLayout,
    cell: &LayoutConfig,
    palette: &Palette,
) -> Vec<Line<'static>> {
    let ball = BALL.repeat(cell.ball_size.clamp(1, 8) as usize);
    let gap = " ".repeat(cell.ball_padding.min(8) as usize);

    let mut rows: Vec<Vec<Span<'static>>> = vec![Vec::new(); layout.rows];
    for (index, state) in blocks.iter().enumerate() {
        let Some((row, col)) = layout.position(index) else {
            break;
        };
        let color = palette.block_color(*state, col, layout.cols);
        rows[row].push(Span::styled(ball.clone(), Style::default().fg(color)));
        if !gap.is_empty() {
            rows[row].push(Span::raw(gap.clone()));
        }
    }

    let padding = cell.ball_padding.min(8) as usize;
    let mut lines = Vec::with_capacity(layout.rows * (1 + padding));
    let last = layout.rows.saturating_sub(1);
    for (row, spans) in rows.into_iter().enumerate() {
        lines.push(Line::from(spans));
        if row < last {
            lines.extend((0..padding).map(|_| Line::default()));
        }
    }
    lines
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SaverConfig;
    use crossterm::event::KeyEvent;
    use glowup_env::{NoopSession, TokioContext};
    use std::time::Duration;

    fn coordinator() -> Arc<LifecycleCoordinator<TokioContext>> {
        LifecycleCoordinator::shared(
            TokioContext::shared(),
            SaverConfig::default(),
            12,
            Arc::new(NoopSession),
        )
    }

    #[test]
    fn test_gradient_endpoints() {
        let palette = Palette::default();
        assert_eq!(palette.gradient(0, 10), Color::Rgb(12, 196, 204));
        assert_eq!(palette.gradient(9, 10), Color::Rgb(125, 42, 232));
        assert_eq!(palette.gradient(0, 1), Color::Rgb(12, 196, 204));
    }

    #[test]
    fn test_interrupt_mapping() {
        let press = Event::Key(KeyEvent::new(KeyCode::Char('x'), KeyModifiers::NONE));
        assert_eq!(interrupt_for(&press), Some(InterruptSource::Input));

        let plain_c = Event::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::NONE));
        assert_eq!(interrupt_for(&plain_c), Some(InterruptSource::Input));

        let ctrl_c = Event::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert_eq!(interrupt_for(&ctrl_c), Some(InterruptSource::Signal));

        assert_eq!(interrupt_for(&Event::FocusLost), Some(InterruptSource::FocusLost));
        assert_eq!(interrupt_for(&Event::FocusGained), None);
        assert_eq!(interrupt_for(&Event::Resize(80, 24)), None);
    }

    #[test]
    fn test_ctrl_c_terminates_during_grace() {
        let coordinator = coordinator();
        assert!(coordinator.in_grace_period());

        let ctrl_c = Event::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        let source = interrupt_for(&ctrl_c).unwrap();
        assert_eq!(
            coordinator.request_termination(source),
            crate::coordinator::TerminationRequest::Executed
        );
    }

    #[test]
    fn test_failed_terminal_closes_the_saver() {
        let coordinator = coordinator();
        let dashboard = TerminalDashboard::new(coordinator.clone(), GridLayout::default());

        let err = io::Error::new(io::ErrorKind::NotFound, "no tty");
        assert!(dashboard.finish(Err(err)).is_err());
        assert!(coordinator.is_terminated());
        assert!(!coordinator.current_engine().is_running());
    }

    #[test]
    fn test_run_without_terminal_terminates() {
        let coordinator = coordinator();

        // Backstop for runs that do have a terminal attached.
        let backstop = {
            let coordinator = coordinator.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(500));
                coordinator.terminate();
            })
        };

        let layout = GridLayout { rows: 3, cols: 4 };
        let result = TerminalDashboard::new(coordinator.clone(), layout).run();

        assert!(coordinator.is_terminated(), "run() returned {result:?}");
        backstop.join().unwrap();
    }

    #[test]
    fn test_grid_lines_shape() {
        let blocks = vec![
            BlockState::Completed,
            BlockState::Active,
            BlockState::Idle,
            BlockState::Idle,
            BlockState::Idle,
            BlockState::Idle,
        ];
        let layout = GridLayout { rows: 2, cols: 3 };
        let lines = grid_lines(&blocks, &layout, &LayoutConfig::default(), &Palette::default());

        // Two ball rows with one padding line between them
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].spans.len(), 6);
        assert_eq!(lines[0].spans[0].style.fg, Some(Color::Rgb(19, 163, 181)));
        assert_eq!(lines[2].spans[4].style.fg, Some(Color::Rgb(61, 61, 61)));
        assert!(lines[1].spans.is_empty());
    }

    #[test]
    fn test_grid_lines_ignore_blocks_past_the_layout() {
        let blocks = vec![BlockState::Idle; 5];
        let layout = GridLayout { rows: 1, cols: 2 };
        let lines = grid_lines(&blocks, &layout, &LayoutConfig::default(), &Palette::default());

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].spans.len(), 4);
    }
}
