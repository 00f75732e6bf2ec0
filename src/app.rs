//! Terminal front end for the reader.
//!
//! # Architecture
//!
//! [`Reader`] owns the [`ModeCoordinator`] and drives it from one control
//! flow that multiplexes two channels:
//!
//! * `commands` — [`ReaderCommand`]s parsed from stdin by the
//!   [`StdinCommands`] thread.
//! * `events`   — [`ModeEvent`]s from engines, fetches and the audio sink.
//!
//! Every state change therefore happens on the task running
//! [`Reader::run`]; nothing else touches the sessions.
//!
//! # Commands
//!
//! | Input | Effect |
//! |-------|--------|
//! | `play` / `p` | start (device: from the top, remote: from the selection) |
//! | `pause` / `resume` | pause or continue the current segment |
//! | `stop` / `s` | stop and clear the highlight |
//! | `restart` | stop, then read again from the first segment |
//! | `seek N` / `N` | jump to segment N (1-based) |
//! | `mode device\|remote` | switch synthesis mode (not while playing) |
//! | `voices` / `voice ID` | list or pick a voice |
//! | `rate R` | device speaking rate, 0.5 – 2.0 |
//! | `status`, `segments`, `help`, `quit` | |

use std::fmt::Write as _;
use std::io::BufRead;
use std::str::FromStr;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::playback::{Mode, ModeCoordinator, ModeEvent, PlayState, SessionSnapshot};

/// Longest segment preview printed by `segments`.
const PREVIEW_CHARS: usize = 60;

pub const HELP: &str = "\
commands:
  play | p            start reading
  pause | resume      pause or continue
  stop | s            stop reading
  restart             read again from the first segment
  seek N | N          jump to segment N
  mode device|remote  switch synthesis mode
  voices              list voices for the current mode
  voice ID            select a voice
  rate R              speaking rate (device mode, 0.5-2.0)
  status              show playback state
  segments            list segments
  quit | q            exit";

// ---------------------------------------------------------------------------
// ReaderCommand
// ---------------------------------------------------------------------------

/// One user command.  Segment numbers are stored 0-based.
#[derive(Debug, Clone, PartialEq)]
pub enum ReaderCommand {
    Play,
    Pause,
    Resume,
    Stop,
    Restart,
    Seek(usize),
    Mode(Mode),
    Voice(String),
    Voices,
    Rate(f32),
    Status,
    Segments,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandParseError {
    #[error("empty command")]
    Empty,

    #[error("unknown command '{0}' (type 'help')")]
    Unknown(String),

    #[error("'{command}' needs {expected}")]
    MissingArgument {
        command: &'static str,
        expected: &'static str,
    },

    #[error("invalid {what}: '{value}'")]
    InvalidArgument { what: &'static str, value: String },
}

impl FromStr for ReaderCommand {
    type Err = CommandParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let head = words.next().ok_or(CommandParseError::Empty)?;
        let arg = words.next();

        let command = match head.to_ascii_lowercase().as_str() {
            "play" | "p" => ReaderCommand::Play,
            "pause" => ReaderCommand::Pause,
            "resume" | "r" => ReaderCommand::Resume,
            "stop" | "s" => ReaderCommand::Stop,
            "restart" => ReaderCommand::Restart,
            "seek" | "goto" => ReaderCommand::Seek(parse_segment_number(arg.ok_or(
                CommandParseError::MissingArgument {
                    command: "seek",
                    expected: "a segment number",
                },
            )?)?),
            "mode" => {
                let value = arg.ok_or(CommandParseError::MissingArgument {
                    command: "mode",
                    expected: "device or remote",
                })?;
                ReaderCommand::Mode(value.parse().map_err(|_| {
                    CommandParseError::InvalidArgument {
                        what: "mode",
                        value: value.to_string(),
                    }
                })?)
            }
            "voice" => ReaderCommand::Voice(
                arg.ok_or(CommandParseError::MissingArgument {
                    command: "voice",
                    expected: "a voice id",
                })?
                .to_string(),
            ),
            "voices" => ReaderCommand::Voices,
            "rate" => {
                let value = arg.ok_or(CommandParseError::MissingArgument {
                    command: "rate",
                    expected: "a number",
                })?;
                ReaderCommand::Rate(value.parse().map_err(|_| {
                    CommandParseError::InvalidArgument {
                        what: "rate",
                        value: value.to_string(),
                    }
                })?)
            }
            "status" => ReaderCommand::Status,
            "segments" | "list" => ReaderCommand::Segments,
            "help" | "?" => ReaderCommand::Help,
            "quit" | "q" | "exit" => ReaderCommand::Quit,
            number if number.chars().all(|c| c.is_ascii_digit()) => {
                ReaderCommand::Seek(parse_segment_number(number)?)
            }
            other => return Err(CommandParseError::Unknown(other.to_string())),
        };
        Ok(command)
    }
}

/// 1-based segment number → 0-based index.
fn parse_segment_number(value: &str) -> Result<usize, CommandParseError> {
    value
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .ok_or_else(|| CommandParseError::InvalidArgument {
            what: "segment number",
            value: value.to_string(),
        })
}

// ---------------------------------------------------------------------------
// StdinCommands
// ---------------------------------------------------------------------------

/// Dedicated OS thread that reads commands from stdin.
///
/// Stdin reads block, so they live on their own thread and are forwarded
/// with `blocking_send`.  Parse errors are reported directly; the thread
/// ends at EOF or when the receiver is gone.
pub struct StdinCommands {
    _thread: std::thread::JoinHandle<()>,
}

impl StdinCommands {
    pub fn start(tx: mpsc::Sender<ReaderCommand>) -> std::io::Result<Self> {
        let thread = std::thread::Builder::new()
            .name("stdin-commands".into())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    let line = match line {
                        Ok(line) => line,
                        Err(e) => {
                            log::warn!("stdin read failed: {e}");
                            break;
                        }
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    match line.parse::<ReaderCommand>() {
                        Ok(command) => {
                            if tx.blocking_send(command).is_err() {
                                break;
                            }
                        }
                        Err(e) => println!("{e}"),
                    }
                }
                // EOF: ask the reader to exit.
                let _ = tx.blocking_send(ReaderCommand::Quit);
            })?;
        Ok(Self { _thread: thread })
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Whether the run loop should keep going after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Reader {
    coordinator: ModeCoordinator,
    last_shown: Option<(Mode, PlayState, Option<usize>)>,
}

impl Reader {
    pub fn new(coordinator: ModeCoordinator) -> Self {
        Self {
            coordinator,
            last_shown: None,
        }
    }

    pub fn coordinator(&self) -> &ModeCoordinator {
        &self.coordinator
    }

    /// Apply one command; returns the text to show and whether to go on.
    pub fn apply(&mut self, command: ReaderCommand) -> (String, Flow) {
        let c = &mut self.coordinator;
        let result = match command {
            ReaderCommand::Quit => return (String::from("bye"), Flow::Quit),
            ReaderCommand::Help => return (HELP.to_string(), Flow::Continue),
            ReaderCommand::Status => return (status_line(&c.snapshot()), Flow::Continue),
            ReaderCommand::Segments => return (self.segment_list(), Flow::Continue),
            ReaderCommand::Voices => return (self.voice_list(), Flow::Continue),
            ReaderCommand::Play => c.play().map_err(|e| e.to_string()),
            ReaderCommand::Pause => c.pause().map_err(|e| e.to_string()),
            ReaderCommand::Resume => c.resume().map_err(|e| e.to_string()),
            ReaderCommand::Stop => {
                c.stop();
                Ok(())
            }
            ReaderCommand::Restart => c.restart().map_err(|e| e.to_string()),
            ReaderCommand::Seek(index) => c.seek(index).map_err(|e| e.to_string()),
            ReaderCommand::Mode(mode) => c.switch_mode(mode).map_err(|e| e.to_string()),
            ReaderCommand::Voice(id) => c.select_voice(&id).map_err(|e| e.to_string()),
            ReaderCommand::Rate(rate) => c.set_rate(rate).map_err(|e| e.to_string()),
        };

        let text = match result {
            Ok(()) => self.status_now(),
            Err(message) => format!("error: {message}"),
        };
        (text, Flow::Continue)
    }

    /// Apply a completion event; returns a line to show when something the
    /// user can see changed.
    pub fn on_event(&mut self, event: ModeEvent) -> Option<String> {
        if let Err(e) = self.coordinator.handle_event(event) {
            return Some(format!("error: {e}"));
        }
        let snapshot = self.coordinator.snapshot();
        let key = (snapshot.mode, snapshot.state, snapshot.position);
        if self.last_shown == Some(key) {
            return None;
        }
        Some(self.status_now())
    }

    fn status_now(&mut self) -> String {
        let snapshot = self.coordinator.snapshot();
        self.last_shown = Some((snapshot.mode, snapshot.state, snapshot.position));
        status_line(&snapshot)
    }

    fn segment_list(&self) -> String {
        let highlighted = self.coordinator.highlighted_index();
        let segments = self.coordinator.segments();
        if segments.is_empty() {
            return String::from("(no segments)");
        }
        let mut out = String::new();
        for (i, segment) in segments.iter().enumerate() {
            let marker = if Some(i) == highlighted { '>' } else { ' ' };
            let _ = writeln!(out, "{marker}{:>4}  {}", i + 1, preview(segment));
        }
        out.trim_end().to_string()
    }

    fn voice_list(&self) -> String {
        let mode = self.coordinator.active_mode();
        let voices = self.coordinator.session(mode).voices();
        if voices.is_empty() {
            return format!("no {mode} voices available yet");
        }
        let mut out = String::new();
        for voice in voices {
            let marker = if voice.selected { '*' } else { ' ' };
            let _ = writeln!(out, "{marker} {:<20} {}", voice.id, voice.label);
        }
        out.trim_end().to_string()
    }

    /// Drive the reader until `quit` or until the command channel closes.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<ReaderCommand>,
        mut events: mpsc::UnboundedReceiver<ModeEvent>,
    ) {
        println!("{}", self.status_now());

        loop {
            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else { break };
                    let (text, flow) = self.apply(command);
                    println!("{text}");
                    if flow == Flow::Quit {
                        break;
                    }
                }
                Some(event) = events.recv() => {
                    if let Some(line) = self.on_event(event) {
                        println!("{line}");
                    }
                }
            }
        }

        self.coordinator.stop_all();
        log::info!("reader stopped");
    }
}

/// One-line description of a session.
pub fn status_line(snapshot: &SessionSnapshot) -> String {
    let mut line = format!("[{}] {}", snapshot.mode, snapshot.state);

    match snapshot.position {
        Some(position) if snapshot.highlight || snapshot.state != PlayState::Idle => {
            let _ = write!(line, " - segment {} of {}", position + 1, snapshot.segment_count);
        }
        Some(_) => {
            let _ = write!(line, " - {} segment(s)", snapshot.segment_count);
        }
        None => line.push_str(" - nothing loaded"),
    }
    if let Some(voice) = &snapshot.voice {
        let _ = write!(line, " | voice {voice}");
    }
    if snapshot.loading {
        line.push_str(" | loading audio");
    }
    if snapshot.prefetching > 0 {
        let _ = write!(line, " | prefetch {}", snapshot.prefetching);
    }
    if let Some(error) = &snapshot.error {
        let _ = write!(line, " | last error: {error}");
    }
    line
}

fn preview(segment: &str) -> String {
    if segment.chars().count() <= PREVIEW_CHARS {
        return segment.to_string();
    }
    let cut: String = segment.chars().take(PREVIEW_CHARS).collect();
    format!("{cut}…")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
