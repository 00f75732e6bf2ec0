//! Local speech engine used by device playback.
//!
//! [`VoiceEngine`] is the seam between [`DeviceSession`](super::DeviceSession)
//! and whatever actually produces sound.  [`CommandVoiceEngine`] drives an
//! espeak-ng compatible program: one child process per utterance, text fed
//! on stdin, completion reported as a [`SessionEvent`].

use std::process::Stdio;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::oneshot;

use super::event::{EventSender, SessionEvent};
use crate::config::DeviceVoiceConfig;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A voice offered by the local engine.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceVoice {
    /// Stable identifier, `"{name}-{lang}-{ordinal}"`.
    pub id: String,
    pub name: String,
    pub lang: String,
    /// The engine's own default voice.
    pub is_default: bool,
}

/// One segment to speak, with everything resolved at dispatch time.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub voice: Option<DeviceVoice>,
    /// Language tag used when no voice is available.
    pub lang: String,
    pub rate: f32,
    pub pitch: f32,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to start {program}: {message}")]
    Spawn { program: String, message: String },
}

// ---------------------------------------------------------------------------
// VoiceEngine trait
// ---------------------------------------------------------------------------

/// Speaks one utterance at a time.
///
/// `speak` returns as soon as the utterance has been queued; the end is
/// reported later as `UtteranceEnded` / `UtteranceFailed` with the given
/// `generation`.  `cancel` must guarantee that no completion is reported
/// for the cancelled utterance, or that it is reported with its old
/// generation.
pub trait VoiceEngine {
    fn speak(&mut self, utterance: Utterance, generation: u64) -> Result<(), EngineError>;
    fn cancel(&mut self);
    fn pause(&mut self);
    fn resume(&mut self);
}

/// Pick the default voice for `preferred_language`.
///
/// First a voice whose language equals `fallback_tag` or starts with
/// `preferred_language`, then the engine's default, then the first voice.
pub fn choose_default_voice<'a>(
    voices: &'a [DeviceVoice],
    preferred_language: &str,
    fallback_tag: &str,
) -> Option<&'a DeviceVoice> {
    let preferred = preferred_language.to_ascii_lowercase();
    voices
        .iter()
        .find(|v| {
            v.lang.eq_ignore_ascii_case(fallback_tag)
                || v.lang.to_ascii_lowercase().starts_with(&preferred)
        })
        .or_else(|| voices.iter().find(|v| v.is_default))
        .or_else(|| voices.first())
}

// ---------------------------------------------------------------------------
// CommandVoiceEngine
// ---------------------------------------------------------------------------

/// Engine backed by an external espeak-ng style program.
///
/// Pause and resume stop and continue the child process (Unix only; on
/// other platforms they are no-ops and the utterance keeps playing).
pub struct CommandVoiceEngine {
    program: String,
    base_words_per_minute: u32,
    events: EventSender,
    current: Option<RunningUtterance>,
}

struct RunningUtterance {
    pid: Option<u32>,
    cancel: oneshot::Sender<()>,
}

impl CommandVoiceEngine {
    pub fn new(config: &DeviceVoiceConfig, events: EventSender) -> Self {
        Self {
            program: config.program.clone(),
            base_words_per_minute: config.base_words_per_minute,
            events,
            current: None,
        }
    }

    /// List the program's voices in the background.
    ///
    /// The catalog arrives as [`SessionEvent::VoicesChanged`]; a failure is
    /// logged and leaves the catalog empty, in which case utterances fall
    /// back to the language tag.
    pub fn discover_voices(&self) {
        let program = self.program.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            match Command::new(&program).arg("--voices").output().await {
                Ok(output) if output.status.success() => {
                    let voices = parse_voice_list(&String::from_utf8_lossy(&output.stdout));
                    log::info!("{program}: {} voice(s) available", voices.len());
                    events.send(SessionEvent::VoicesChanged(voices));
                }
                Ok(output) => {
                    log::warn!("{program} --voices exited with {}", output.status);
                }
                Err(e) => {
                    log::warn!("could not list voices from {program}: {e}");
                }
            }
        });
    }

    fn words_per_minute(&self, rate: f32) -> u32 {
        (self.base_words_per_minute as f32 * rate).round().clamp(80.0, 500.0) as u32
    }

    #[cfg(unix)]
    fn signal_current(&self, sig: nix::sys::signal::Signal) {
        use nix::sys::signal;
        use nix::unistd::Pid;

        if let Some(pid) = self.current.as_ref().and_then(|c| c.pid) {
            if let Err(e) = signal::kill(Pid::from_raw(pid as i32), sig) {
                log::debug!("could not send {sig:?} to speech process {pid}: {e}");
            }
        }
    }
}

impl VoiceEngine for CommandVoiceEngine {
    fn speak(&mut self, utterance: Utterance, generation: u64) -> Result<(), EngineError> {
        self.cancel();

        let voice = utterance
            .voice
            .as_ref()
            .map_or(utterance.lang.as_str(), |v| v.lang.as_str());
        let pitch = (50.0 * utterance.pitch).round().clamp(0.0, 99.0) as u32;

        let mut child = Command::new(&self.program)
            .arg("-v")
            .arg(voice)
            .arg("-s")
            .arg(self.words_per_minute(utterance.rate).to_string())
            .arg("-p")
            .arg(pitch.to_string())
            .arg("--stdin")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::Spawn {
                program: self.program.clone(),
                message: e.to_string(),
            })?;

        let pid = child.id();
        let stdin = child.stdin.take();
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let events = self.events.clone();
        let text = utterance.text;

        tokio::spawn(async move {
            if let Some(mut stdin) = stdin {
                if let Err(e) = stdin.write_all(text.as_bytes()).await {
                    log::warn!("failed to write utterance to speech process: {e}");
                }
                // Closing stdin tells the program the input is complete.
                stdin.shutdown().await.ok();
            }

            tokio::select! {
                status = child.wait() => match status {
                    Ok(status) if status.success() => {
                        events.send(SessionEvent::UtteranceEnded { generation });
                    }
                    Ok(status) => {
                        events.send(SessionEvent::UtteranceFailed {
                            generation,
                            message: format!("speech process exited with {status}"),
                        });
                    }
                    Err(e) => {
                        events.send(SessionEvent::UtteranceFailed {
                            generation,
                            message: e.to_string(),
                        });
                    }
                },
                _ = cancel_rx => {
                    if let Err(e) = child.kill().await {
                        log::debug!("speech process already gone: {e}");
                    }
                }
            }
        });

        log::debug!("speaking segment (generation {generation}, pid {pid:?})");
        self.current = Some(RunningUtterance {
            pid,
            cancel: cancel_tx,
        });
        Ok(())
    }

    fn cancel(&mut self) {
        if let Some(current) = self.current.take() {
            let _ = current.cancel.send(());
        }
    }

    fn pause(&mut self) {
        #[cfg(unix)]
        self.signal_current(nix::sys::signal::Signal::SIGSTOP);
    }

    fn resume(&mut self) {
        #[cfg(unix)]
        self.signal_current(nix::sys::signal::Signal::SIGCONT);
    }
}

impl Drop for CommandVoiceEngine {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Parse the table printed by `espeak-ng --voices`.
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  5  af              --/M      Afrikaans          gmw/af
///  5  th              --/M      Thai               sit/th
/// ```
///
/// The engine's default voice is the English one.
pub fn parse_voice_list(output: &str) -> Vec<DeviceVoice> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut columns = line.split_whitespace();
            let _priority = columns.next()?;
            let lang = columns.next()?;
            let _age_gender = columns.next()?;
            let name = columns.next()?;
            Some((name.to_string(), lang.to_string()))
        })
        .enumerate()
        .map(|(ordinal, (name, lang))| DeviceVoice {
            id: format!("{name}-{lang}-{ordinal}"),
            is_default: lang == "en",
            name,
            lang,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::{event_channel, Mode};

    fn voice(name: &str, lang: &str, is_default: bool) -> DeviceVoice {
        DeviceVoice {
            id: format!("{name}-{lang}-0"),
            name: name.into(),
            lang: lang.into(),
            is_default,
        }
    }

    #[test]
    fn thai_voice_wins() {
        let voices = vec![
            voice("English", "en-US", true),
            voice("Thai", "th", false),
        ];
        let chosen = choose_default_voice(&voices, "th", "th-TH").unwrap();
        assert_eq!(chosen.name, "Thai");
    }

    #[test]
    fn exact_fallback_tag_matches_case_insensitively() {
        let voices = vec![voice("A", "en", true), voice("Narisa", "TH-th", false)];
        assert_eq!(
            choose_default_voice(&voices, "th", "th-TH").unwrap().name,
            "Narisa"
        );
    }

    #[test]
    fn engine_default_is_second_choice() {
        let voices = vec![voice("German", "de", false), voice("English", "en", true)];
        assert_eq!(
            choose_default_voice(&voices, "th", "th-TH").unwrap().name,
            "English"
        );
    }

    #[test]
    fn first_voice_is_last_resort() {
        let voices = vec![voice("German", "de", false), voice("French", "fr", false)];
        assert_eq!(
            choose_default_voice(&voices, "th", "th-TH").unwrap().name,
            "German"
        );
        assert!(choose_default_voice(&[], "th", "th-TH").is_none());
    }

    #[test]
    fn parses_espeak_voice_table() {
        let output = "Pty Language       Age/Gender VoiceName          File                 Other Languages\n \
             5  af              --/M      Afrikaans          gmw/af\n \
             5  en              --/M      English            gmw/en\n \
             5  th              --/M      Thai               sit/th\n";
        let voices = parse_voice_list(output);

        assert_eq!(voices.len(), 3);
        assert_eq!(voices[2].id, "Thai-th-2");
        assert_eq!(voices[2].lang, "th");
        assert!(voices[1].is_default);
        assert!(!voices[0].is_default);
    }

    #[test]
    fn rate_scales_words_per_minute() {
        let (bus, _rx) = event_channel();
        let engine = CommandVoiceEngine::new(
            &DeviceVoiceConfig::default(),
            bus.sender(Mode::Device),
        );
        assert_eq!(engine.words_per_minute(1.0), 175);
        assert_eq!(engine.words_per_minute(2.0), 350);
        assert_eq!(engine.words_per_minute(0.1), 80);
    }

    #[tokio::test]
    async fn missing_program_fails_to_spawn() {
        let (bus, _rx) = event_channel();
        let config = DeviceVoiceConfig {
            program: "definitely-not-a-speech-program".into(),
            ..DeviceVoiceConfig::default()
        };
        let mut engine =
            CommandVoiceEngine::new(&config, bus.sender(Mode::Device));
        let utterance = Utterance {
            text: "hello".into(),
            voice: None,
            lang: "th-TH".into(),
            rate: 1.0,
            pitch: 1.0,
        };
        assert!(matches!(
            engine.speak(utterance, 1),
            Err(EngineError::Spawn { .. })
        ));
    }
}
