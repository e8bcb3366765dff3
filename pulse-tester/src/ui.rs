//! Full-screen terminal front-end.
//!
//! Two indicators flash for the configured width whenever their channel
//! pulses. Status and rate lines sit under each indicator, and a single input
//! line at the bottom accepts the operator commands.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use crossterm::terminal::{
    self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::{execute, queue};
use pulse_core::channel::ChannelId;

use crate::dashboard::Dashboard;
use crate::session::{Reply, Session};

/// Upper bound between redraws when nothing else wakes the loop.
const FRAME_PERIOD: Duration = Duration::from_millis(16);

const INDICATOR_WIDTH: u16 = 12;
const INDICATOR_HEIGHT: u16 = 5;
const COLUMN_WIDTH: u16 = 40;
const MAX_NOTICE_LINES: usize = 8;

/// Restores the terminal when dropped, including on early returns.
struct TerminalGuard;

impl TerminalGuard {
    fn enter(out: &mut impl Write) -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        execute!(out, EnterAlternateScreen, Hide)?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(io::stdout(), Show, LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

struct Screen {
    dashboard: Dashboard,
    input: String,
    notices: Vec<String>,
}

impl Screen {
    fn new() -> Self {
        Self {
            dashboard: Dashboard::new(),
            input: String::new(),
            notices: vec!["Type `help` for commands, `start` to begin.".to_string()],
        }
    }

    fn push_notices(&mut self, lines: &[String]) {
        self.notices.extend(lines.iter().cloned());
        let excess = self.notices.len().saturating_sub(MAX_NOTICE_LINES);
        self.notices.drain(..excess);
    }
}

pub fn run(mut session: Session) -> io::Result<()> {
    let mut out = io::stdout();
    let _guard = TerminalGuard::enter(&mut out)?;

    let mut screen = Screen::new();

    loop {
        let now = Instant::now();
        let pending: Vec<_> = session.notifications().try_iter().collect();
        for notification in pending {
            screen.dashboard.apply(notification, now);
        }

        draw(&mut out, &screen, &session, now)?;

        let wait = screen
            .dashboard
            .next_expiry(now)
            .map_or(FRAME_PERIOD, |expiry| {
                expiry.saturating_duration_since(now).min(FRAME_PERIOD)
            });
        if !event::poll(wait)? {
            continue;
        }

        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        if handle_key(&mut screen, &mut session, key) {
            break;
        }
    }

    Ok(())
}

/// Applies one key press. Returns `true` when the front-end should exit.
fn handle_key(screen: &mut Screen, session: &mut Session, key: KeyEvent) -> bool {
    let reply = if let Some(line) = edit_input(&mut screen.input, key) {
        session.handle_command(&line)
    } else if is_interrupt(key) {
        Reply::Quit(session.stop())
    } else {
        return false;
    };

    screen.push_notices(reply.lines());
    matches!(reply, Reply::Quit(_))
}

fn is_interrupt(key: KeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(key.code, KeyCode::Char('c' | 'd'))
}

/// Applies a key press to the input buffer. Returns the submitted line on Enter.
fn edit_input(input: &mut String, key: KeyEvent) -> Option<String> {
    match key.code {
        KeyCode::Enter => Some(std::mem::take(input)),
        KeyCode::Backspace => {
            input.pop();
            None
        }
        KeyCode::Esc => {
            input.clear();
            None
        }
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            input.push(ch);
            None
        }
        _ => None,
    }
}

fn channel_color(channel: ChannelId) -> Color {
    match channel {
        ChannelId::One => Color::Red,
        ChannelId::Two => Color::Blue,
    }
}

fn draw(out: &mut impl Write, screen: &Screen, session: &Session, now: Instant) -> io::Result<()> {
    queue!(out, Clear(ClearType::All), MoveTo(2, 0))?;
    queue!(out, Print("Dual Target Power Pulse Tester"))?;

    let settings = session.settings();
    queue!(
        out,
        MoveTo(2, 1),
        Print(format!(
            "width {} ms   {}",
            settings.pulse_width_ms(),
            if session.is_running() { "RUNNING" } else { "idle" }
        ))
    )?;

    for channel in ChannelId::ALL {
        let view = screen.dashboard.channel(channel);
        let left = 2 + COLUMN_WIDTH * u16::from(channel.number() - 1);
        let lit = view.is_lit(now);

        queue!(out, SetForegroundColor(channel_color(channel)))?;
        queue!(out, MoveTo(left, 3), Print(channel.label()))?;
        if lit {
            queue!(out, SetForegroundColor(Color::White))?;
        }
        for row in 0..INDICATOR_HEIGHT {
            let cells = if lit || row == 0 || row == INDICATOR_HEIGHT - 1 {
                "█".repeat(usize::from(INDICATOR_WIDTH))
            } else {
                format!("█{}█", " ".repeat(usize::from(INDICATOR_WIDTH - 2)))
            };
            queue!(out, MoveTo(left, 4 + row), Print(cells))?;
        }
        queue!(out, ResetColor)?;

        queue!(
            out,
            MoveTo(left, 5 + INDICATOR_HEIGHT),
            Print(&view.status_line),
            MoveTo(left, 6 + INDICATOR_HEIGHT),
            Print(&view.rate_line),
            MoveTo(left, 7 + INDICATOR_HEIGHT),
            Print(format!("flashes: {}", view.flashes))
        )?;
    }

    let notices_top = 9 + INDICATOR_HEIGHT;
    for (row, notice) in (notices_top..).zip(&screen.notices) {
        queue!(out, MoveTo(2, row), Print(notice))?;
    }

    let (_, rows) = terminal::size()?;
    let prompt_row = rows.saturating_sub(1).max(notices_top + 1);
    queue!(out, MoveTo(0, prompt_row), Print("> "), Print(&screen.input))?;
    out.flush()
}
