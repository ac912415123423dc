use crate::client::AppSnapshot;
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use crossterm::{
    event::{
        self,
        Event,
        KeyCode,
        KeyEvent,
        KeyEventKind,
        KeyModifiers,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use ratatui::{
    prelude::*,
    widgets::*,
};
use stacks_arcade::{
    contract::Direction as Heading,
    reflex::ReflexPhase,
    wallets::Prompter,
};
use std::{
    io::{
        Write,
        stdout,
    },
    time::Duration,
};

const TICK: Duration = Duration::from_millis(50);
const MAX_QUEUED_MOVES: usize = 12;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum UserEvent {
    Quit,
    Redraw,
    Tick,
    Connect,
    Disconnect,
    ReflexClick,
    SubmitScore,
    RecordActivity,
    StartGame,
    Move(Heading),
    SubmitMoves(Vec<Heading>),
    Refresh,
}

#[derive(Debug, Default)]
pub struct UiState {
    mode: Mode,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
enum Mode {
    #[default]
    Normal,
    MoveQueue(Vec<Heading>),
    QuitModal,
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::EnterAlternateScreen)?;
    // Create a single persistent Terminal to preserve buffers across draws
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen)?;
    Ok(())
}

/// Forces a full repaint after a prompt has written to the screen.
pub fn reset_terminal(state: &mut UiState) -> Result<()> {
    if let Some(term) = state.terminal.as_mut() {
        term.clear()?;
    }
    Ok(())
}

pub fn draw(state: &mut UiState, snap: &AppSnapshot) -> Result<()> {
    if let Some(mut term) = state.terminal.take() {
        term.draw(|f| ui(f, state, snap))?;
        state.terminal = Some(term);
    }
    Ok(())
}

/// Waits one tick for input. Returns `Tick` when nothing was pressed.
pub async fn next_event(state: &mut UiState) -> Result<UserEvent> {
    loop {
        if !event::poll(Duration::ZERO)? {
            tokio::time::sleep(TICK).await;
            if !event::poll(Duration::ZERO)? {
                return Ok(UserEvent::Tick);
            }
        }
        if let Event::Key(k) = event::read()? {
            if k.kind != KeyEventKind::Press {
                continue;
            }
            if let Some(ev) = interpret_key(state, k) {
                return Ok(ev);
            }
        }
    }
}

fn interpret_key(state: &mut UiState, k: KeyEvent) -> Option<UserEvent> {
    if k.modifiers.contains(KeyModifiers::CONTROL) && k.code == KeyCode::Char('c') {
        return Some(UserEvent::Quit);
    }
    match &mut state.mode {
        Mode::QuitModal => match k.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => return Some(UserEvent::Quit),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                state.mode = Mode::Normal;
                return Some(UserEvent::Redraw);
            }
            _ => return None,
        },
        Mode::MoveQueue(queue) => {
            match k.code {
                KeyCode::Esc => state.mode = Mode::Normal,
                KeyCode::Enter => {
                    let moves = std::mem::take(queue);
                    state.mode = Mode::Normal;
                    return Some(UserEvent::SubmitMoves(moves));
                }
                KeyCode::Backspace => {
                    queue.pop();
                }
                code => {
                    let heading = heading_for(code)?;
                    if queue.len() < MAX_QUEUED_MOVES {
                        queue.push(heading);
                    }
                }
            }
            return Some(UserEvent::Redraw);
        }
        Mode::Normal => {}
    }
    Some(match k.code {
        KeyCode::Char('q') | KeyCode::Esc => {
            state.mode = Mode::QuitModal;
            UserEvent::Redraw
        }
        KeyCode::Char('w') => UserEvent::Connect,
        KeyCode::Char('x') => UserEvent::Disconnect,
        KeyCode::Char(' ') => UserEvent::ReflexClick,
        KeyCode::Char('s') => UserEvent::SubmitScore,
        KeyCode::Char('a') => UserEvent::RecordActivity,
        KeyCode::Char('g') => UserEvent::StartGame,
        KeyCode::Char('r') => UserEvent::Refresh,
        KeyCode::Char('m') => {
            state.mode = Mode::MoveQueue(Vec::new());
            UserEvent::Redraw
        }
        code => UserEvent::Move(heading_for(code)?),
    })
}

fn heading_for(code: KeyCode) -> Option<Heading> {
    match code {
        KeyCode::Up | KeyCode::Char('k') => Some(Heading::Up),
        KeyCode::Right | KeyCode::Char('l') => Some(Heading::Right),
        KeyCode::Down | KeyCode::Char('j') => Some(Heading::Down),
        KeyCode::Left | KeyCode::Char('h') => Some(Heading::Left),
        _ => None,
    }
}

/// Approval and password prompts on the plain terminal. The TUI is suspended
/// while the prompt is up.
#[derive(Clone, Copy, Debug, Default)]
pub struct TerminalPrompt;

impl Prompter for TerminalPrompt {
    fn confirm(&self, summary: &str) -> Result<bool> {
        with_suspended_terminal(|| {
            let mut out = stdout();
            writeln!(out, "Contract call requested:\n  {summary}")?;
            write!(out, "Approve and broadcast? [y/N]: ")?;
            out.flush()?;
            let mut answer = String::new();
            std::io::stdin()
                .read_line(&mut answer)
                .wrap_err("Failed to read approval")?;
            Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
        })
    }

    fn password(&self, prompt: &str) -> Result<String> {
        with_suspended_terminal(|| {
            rpassword::prompt_password(prompt).wrap_err("Failed to read wallet password")
        })
    }
}

fn with_suspended_terminal<T>(f: impl FnOnce() -> Result<T>) -> Result<T> {
    terminal_exit()?;
    let result = f();
    enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::EnterAlternateScreen)?;
    result
}

fn ui(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // wallet
            Constraint::Length(7), // reflex + snake
            Constraint::Min(8),    // leaderboard + activity
            Constraint::Length(5), // status
            Constraint::Length(3), // help
        ])
        .split(f.area());

    draw_wallet_panel(f, chunks[0], snap);
    draw_games(f, chunks[1], snap);
    draw_lower(f, chunks[2], snap);
    draw_status(f, chunks[3], snap);
    draw_help(f, chunks[4]);
    draw_modals(f, state);
}

fn draw_wallet_panel(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let text = match (&snap.address, snap.network) {
        (Some(address), Some(network)) => format!(
            "Wallet: {} | Address: {} | Network: {}",
            snap.wallet_name,
            shorten(address),
            network
        ),
        _ => format!(
            "Wallet: {} | Not connected | Reads from {}",
            snap.wallet_name, snap.fallback_network
        ),
    };
    let widget = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("Wallet"));
    f.render_widget(widget, area);
}

fn draw_games(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let (line, style) = match snap.reflex {
        ReflexPhase::Idle => (
            String::from("Press SPACE to start a round"),
            Style::default(),
        ),
        ReflexPhase::Waiting { .. } => (
            String::from("Wait for green..."),
            Style::default().fg(Color::Yellow),
        ),
        ReflexPhase::Go { .. } => (
            String::from("GO! Press SPACE"),
            Style::default()
                .fg(Color::Black)
                .bg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ),
        ReflexPhase::Done { reaction_ms } => (
            format!("{reaction_ms} ms | s submit | SPACE again"),
            Style::default().fg(Color::Cyan),
        ),
    };
    let best = match snap.best_score {
        Some(best) if best > 0 => format!("Best on chain: {best} ms"),
        Some(_) => String::from("Best on chain: none yet"),
        None => String::from("Best on chain: -"),
    };
    let reflex = Paragraph::new(vec![
        Line::from(Span::styled(line, style)),
        Line::from(""),
        Line::from(best),
    ])
    .block(Block::default().borders(Borders::ALL).title("Reflex"));
    f.render_widget(reflex, cols[0]);

    let snake_lines = match snap.game_state {
        Some(state) => vec![
            Line::from(format!("Position: ({}, {})", state.x, state.y)),
            Line::from(format!("Score: {}", state.score)),
            Line::from(if state.alive {
                Span::styled("Alive", Style::default().fg(Color::Green))
            } else {
                Span::styled("Game over", Style::default().fg(Color::Red))
            }),
        ],
        None => vec![Line::from("No game state")],
    };
    let snake = Paragraph::new(snake_lines)
        .block(Block::default().borders(Borders::ALL).title("Snake"));
    f.render_widget(snake, cols[1]);
}

fn draw_lower(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let board_items: Vec<ListItem> = if snap.leaderboard.is_empty() {
        vec![ListItem::new("No entries")]
    } else {
        snap.leaderboard
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let mine = snap.address.as_deref() == Some(entry.who.as_str());
                let style = if mine {
                    Style::default().fg(Color::Cyan)
                } else {
                    Style::default()
                };
                ListItem::new(Line::from(Span::styled(
                    format!("{:>2}. {}  {} ms", i + 1, shorten(&entry.who), entry.score),
                    style,
                )))
            })
            .collect()
    };
    let board = List::new(board_items)
        .block(Block::default().borders(Borders::ALL).title("Leaderboard"));
    f.render_widget(board, cols[0]);

    let activity_items: Vec<ListItem> = if snap.activity.is_empty() {
        vec![ListItem::new("No transactions yet")]
    } else {
        snap.activity
            .iter()
            .map(|record| {
                ListItem::new(format!(
                    "{} {} {}",
                    record.submitted_at.format("%H:%M:%S"),
                    record.label,
                    shorten(record.tx_id.as_str())
                ))
            })
            .collect()
    };
    let activity = List::new(activity_items)
        .block(Block::default().borders(Borders::ALL).title("Activity"));
    f.render_widget(activity, cols[1]);
}

fn draw_status(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let mut lines = vec![Line::from(Span::styled(
        if snap.status.trim().is_empty() {
            String::from("Ready")
        } else {
            snap.status.clone()
        },
        Style::default().fg(Color::Green),
    ))];
    for notice in &snap.notices {
        lines.push(Line::from(Span::styled(
            notice.clone(),
            Style::default().fg(Color::Red),
        )));
    }
    let widget = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(widget, area);
}

fn draw_help(f: &mut Frame, area: Rect) {
    let help = Paragraph::new(
        "w connect | x disconnect | SPACE reflex | s submit | a check in | g new game | arrows move | m queue moves | r refresh | q quit",
    )
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, area);
}

fn draw_modals(f: &mut Frame, state: &UiState) {
    match &state.mode {
        Mode::MoveQueue(queue) => {
            let area = centered_rect(50, 25, f.area());
            let block = Block::default().borders(Borders::ALL).title("Queue Moves");
            let moves: String = queue.iter().map(|h| h.arrow()).collect();
            let p = Paragraph::new(vec![
                Line::from(format!(
                    "Moves ({}/{}): {}",
                    queue.len(),
                    MAX_QUEUED_MOVES,
                    moves
                )),
                Line::from(""),
                Line::from("arrows add | Backspace remove | Enter submit | Esc cancel"),
            ]);
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::QuitModal => {
            let area = centered_rect(40, 20, f.area());
            let block = Block::default().borders(Borders::ALL).title("Confirm Quit");
            let p = Paragraph::new("Quit the arcade? (Y/N)");
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::Normal => {}
    }
}

fn shorten(s: &str) -> String {
    if s.chars().count() <= 12 {
        return s.to_string();
    }
    let head: String = s.chars().take(6).collect();
    let tail: String = s
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("{head}…{tail}")
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1]);

    horizontal[1]
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    fn press(state: &mut UiState, code: KeyCode) -> Option<UserEvent> {
        interpret_key(state, KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn interpret_key__maps_normal_mode_actions() {
        let mut state = UiState::default();
        assert_eq!(press(&mut state, KeyCode::Char(' ')), Some(UserEvent::ReflexClick));
        assert_eq!(press(&mut state, KeyCode::Char('g')), Some(UserEvent::StartGame));
        assert_eq!(
            press(&mut state, KeyCode::Left),
            Some(UserEvent::Move(Heading::Left))
        );
        assert_eq!(press(&mut state, KeyCode::Char('z')), None);
    }

    #[test]
    fn interpret_key__move_queue_collects_then_submits() {
        // given
        let mut state = UiState::default();
        press(&mut state, KeyCode::Char('m'));

        // when
        press(&mut state, KeyCode::Up);
        press(&mut state, KeyCode::Right);
        press(&mut state, KeyCode::Right);
        press(&mut state, KeyCode::Backspace);
        let submitted = press(&mut state, KeyCode::Enter);

        // then
        assert_eq!(
            submitted,
            Some(UserEvent::SubmitMoves(vec![Heading::Up, Heading::Right]))
        );
        assert_eq!(state.mode, Mode::Normal);
    }

    #[test]
    fn interpret_key__quit_needs_confirmation() {
        let mut state = UiState::default();
        assert_eq!(press(&mut state, KeyCode::Char('q')), Some(UserEvent::Redraw));
        assert_eq!(press(&mut state, KeyCode::Char('n')), Some(UserEvent::Redraw));
        assert_eq!(state.mode, Mode::Normal);
        press(&mut state, KeyCode::Esc);
        assert_eq!(press(&mut state, KeyCode::Char('y')), Some(UserEvent::Quit));
    }

    #[test]
    fn shorten__keeps_head_and_tail() {
        assert_eq!(
            shorten("SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7"),
            "SP2J6Z…9EJ7"
        );
        assert_eq!(shorten("0xabc"), "0xabc");
    }
}
