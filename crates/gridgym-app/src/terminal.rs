//! Live terminal view built on ratatui and crossterm.
//!
//! Setting `GRIDGYM_HEADLESS` (or asking for headless mode explicitly) draws
//! every frame into an off-screen test backend instead and prints the final
//! frame as plain text.

use std::{
    io::{self, Stdout},
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use gridgym_render::TextRenderer;
use ratatui::{
    Frame, Terminal,
    backend::{CrosstermBackend, TestBackend},
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, Paragraph},
};
use tracing::info;

use crate::Session;

pub const HEADLESS_ENV: &str = "GRIDGYM_HEADLESS";
const HEADLESS_SIZE: (u16, u16) = (100, 40);
const MAX_FPS: f32 = 120.0;

pub struct TerminalView {
    renderer: TextRenderer,
    frame_interval: Duration,
    max_ticks: u32,
    headless: bool,
}

impl TerminalView {
    #[must_use]
    pub fn new(renderer: TextRenderer, fps: f32, max_ticks: u32, headless: bool) -> Self {
        let fps = fps.clamp(0.5, MAX_FPS);
        Self {
            renderer,
            frame_interval: Duration::from_secs_f32(1.0 / fps),
            max_ticks,
            headless: headless || std::env::var_os(HEADLESS_ENV).is_some(),
        }
    }

    #[must_use]
    pub const fn is_headless(&self) -> bool {
        self.headless
    }

    /// Runs until the episode ends, the tick budget is spent, or the user quits.
    pub fn run(&self, session: &mut Session) -> Result<()> {
        if self.headless {
            let text = self.run_headless(session)?;
            print!("{text}");
            return Ok(());
        }

        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enable raw mode")?;
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to build terminal backend")?;
        terminal.hide_cursor().ok();

        let result = self.event_loop(&mut terminal, session);

        terminal.show_cursor().ok();
        if let Err(err) = disable_raw_mode() {
            tracing::error!(?err, "failed to disable raw mode");
        }
        if let Err(err) = execute!(terminal.backend_mut(), LeaveAlternateScreen) {
            tracing::error!(?err, "failed to leave alternate screen");
        }
        result
    }

    /// Steps through the whole run off-screen; returns the final text frame.
    pub fn run_headless(&self, session: &mut Session) -> Result<String> {
        let (width, height) = HEADLESS_SIZE;
        let mut terminal =
            Terminal::new(TestBackend::new(width, height)).context("failed to build test backend")?;
        let mut frames = 0;
        terminal.draw(|frame| self.draw(frame, session, false))?;
        while frames < self.max_ticks && session.advance()? {
            frames += 1;
            terminal.draw(|frame| self.draw(frame, session, false))?;
        }
        info!(
            frames,
            tick = session.world().tick().0,
            terminated = session.world().is_terminated(),
            "headless run completed"
        );
        Ok(self.renderer.render(session.world()))
    }

    fn event_loop(
        &self,
        terminal: &mut Terminal<CrosstermBackend<Stdout>>,
        session: &mut Session,
    ) -> Result<()> {
        let mut state = LoopState::default();
        let mut last_tick = Instant::now();

        loop {
            let interval = self.frame_interval.div_f32(state.speed);
            if !state.paused && last_tick.elapsed() >= interval && state.ticks < self.max_ticks {
                if session.advance()? {
                    state.ticks += 1;
                }
                last_tick = Instant::now();
            }
            terminal.draw(|frame| self.draw(frame, session, state.paused))?;

            let timeout = interval.saturating_sub(last_tick.elapsed());
            if event::poll(timeout).unwrap_or(false)
                && let Event::Key(key) = event::read()?
                && state.handle_key(key, session)?
            {
                break;
            }
        }
        Ok(())
    }

    fn draw(&self, frame: &mut Frame<'_>, session: &Session, paused: bool) {
        let snapshot = self.renderer.frame(session.world());
        let outer = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0)])
            .split(frame.area());

        let status = if snapshot.terminated {
            Span::styled(" ENDED ", Style::default().fg(Color::Black).bg(Color::Red))
        } else if session.is_done() {
            Span::styled(" TRUNCATED ", Style::default().fg(Color::Black).bg(Color::Yellow))
        } else if paused {
            Span::styled(" PAUSED ", Style::default().fg(Color::Black).bg(Color::DarkGray))
        } else {
            Span::styled(" RUNNING ", Style::default().fg(Color::Black).bg(Color::Green))
        };
        let header = Paragraph::new(Line::from(vec![
            status,
            Span::raw(format!(
                "  tick {}  episode {}  ",
                snapshot.tick.0,
                session.env().episode()
            )),
            Span::styled(
                "q quit  space pause  s step  +/- speed  r restart",
                Style::default().fg(Color::DarkGray),
            ),
        ]))
        .block(
            Block::default()
                .title(Span::styled(
                    snapshot.title.clone(),
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL),
        );
        frame.render_widget(header, outer[0]);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(outer[1]);
        let grid: Vec<Line> = snapshot.grid.iter().map(|row| Line::raw(row.clone())).collect();
        frame.render_widget(
            Paragraph::new(Text::from(grid))
                .block(Block::default().title("World").borders(Borders::ALL)),
            body[0],
        );

        let sidebar = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(40), Constraint::Min(3)])
            .split(body[1]);
        self.draw_agents(frame, sidebar[0], session);
        let console: Vec<ListItem> = snapshot
            .console
            .iter()
            .map(|line| ListItem::new(line.as_str()))
            .collect();
        frame.render_widget(
            List::new(console).block(Block::default().title("Console").borders(Borders::ALL)),
            sidebar[1],
        );
    }

    fn draw_agents(&self, frame: &mut Frame<'_>, area: Rect, session: &Session) {
        let world = session.world();
        let rows: Vec<ListItem> = session
            .env()
            .agents()
            .iter()
            .map(|agent| {
                let alive = world.is_alive(agent.id);
                let total = session.returns().get(&agent.uid).copied().unwrap_or(0.0);
                let flags = session
                    .flags()
                    .get(&agent.uid)
                    .map(|flags| flags.join(","))
                    .unwrap_or_default();
                let style = if alive {
                    Style::default()
                } else {
                    Style::default().fg(Color::DarkGray)
                };
                ListItem::new(Span::styled(
                    format!("{} {:>3}  return {total:>8.1}  {flags}", agent.tag, agent.uid),
                    style,
                ))
            })
            .collect();
        frame.render_widget(
            List::new(rows).block(Block::default().title("Agents").borders(Borders::ALL)),
            area,
        );
    }
}

struct LoopState {
    paused: bool,
    speed: f32,
    ticks: u32,
}

impl Default for LoopState {
    fn default() -> Self {
        Self {
            paused: false,
            speed: 1.0,
            ticks: 0,
        }
    }
}

impl LoopState {
    /// Returns `true` when the user asked to quit.
    fn handle_key(&mut self, key: KeyEvent, session: &mut Session) -> Result<bool> {
        match (key.code, key.modifiers) {
            (KeyCode::Esc | KeyCode::Char('q' | 'Q'), _)
            | (KeyCode::Char('c'), KeyModifiers::CONTROL) => return Ok(true),
            (KeyCode::Char(' '), _) => self.paused = !self.paused,
            (KeyCode::Char('s'), _) => {
                self.paused = true;
                if session.advance()? {
                    self.ticks += 1;
                }
            }
            (KeyCode::Char('+' | '='), _) => self.speed = (self.speed * 2.0).min(16.0),
            (KeyCode::Char('-' | '_'), _) => self.speed = (self.speed / 2.0).max(0.125),
            (KeyCode::Char('r'), _) => {
                session.restart()?;
                self.ticks = 0;
            }
            _ => {}
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridgym_brain::{EnvConfig, GridEnv};
    use gridgym_core::{Scenario, WorldConfig};
    use std::collections::BTreeMap;

    fn session(scenario: Scenario) -> Session {
        let env = GridEnv::new(EnvConfig {
            world: WorldConfig {
                rng_seed: Some(12),
                ..WorldConfig::default()
            },
            max_steps: Some(20),
            ..EnvConfig::for_scenario(scenario)
        })
        .expect("env");
        Session::new(env, BTreeMap::new()).expect("session")
    }

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn draw_shows_title_grid_and_agents() {
        let view = TerminalView::new(TextRenderer::for_scenario(Scenario::Zzt), 10.0, 5, true);
        let mut session = session(Scenario::Zzt);
        session.advance().expect("step");
        let mut terminal = Terminal::new(TestBackend::new(100, 40)).expect("terminal");
        terminal
            .draw(|frame| view.draw(frame, &session, false))
            .expect("draw");
        let text = buffer_text(&terminal);
        assert!(text.contains("gridgym -- rangers, lions and a diamond"));
        assert!(text.contains("tick 1"));
        assert!(text.contains("Agents"));
        assert!(text.contains("Ranger"));
    }

    #[test]
    fn headless_run_respects_the_tick_budget() {
        let view = TerminalView::new(TextRenderer::for_scenario(Scenario::Goal), 10.0, 4, true);
        assert!(view.is_headless());
        let mut session = session(Scenario::Goal);
        let text = view.run_headless(&mut session).expect("headless");
        assert!(session.world().tick().0 <= 4);
        assert!(text.starts_with("gridgym -- the mouse and the cheese\n"));
        assert!(text.contains(">>> console <<<"));
    }
}
