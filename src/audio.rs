//! Poem clip playback
//!
//! The chat screen only needs to start a clip, stop it, and learn when it ran
//! out on its own. `CommandPlayer` does that by driving an external player
//! process, the same way clipboard copies are handed to a helper command.

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

pub trait Playback {
    /// Start the clip from the beginning.
    fn start(&mut self) -> Result<()>;
    /// Stop and rewind. Safe to call when nothing is playing.
    fn stop(&mut self);
    /// Report, once, that a started clip is over. `Ok` for a natural end,
    /// `Err` when the player failed part way. `None` while playing or idle.
    fn poll_end(&mut self) -> Option<Result<()>>;
}

/// Player command used when none is configured.
pub fn default_player_command() -> Vec<String> {
    let command = if cfg!(target_os = "macos") {
        "afplay"
    } else {
        "ffplay -nodisp -autoexit -loglevel quiet"
    };
    command.split_whitespace().map(str::to_string).collect()
}

pub struct CommandPlayer {
    program: String,
    args: Vec<String>,
    clip: PathBuf,
    child: Option<Child>,
    /// Killed players not yet reaped
    stopping: Vec<Child>,
}

impl CommandPlayer {
    /// `command` is the program followed by its arguments; the clip path is appended.
    pub fn new(command: Vec<String>, clip: PathBuf) -> Self {
        let mut parts = command.into_iter();
        let program = parts.next().unwrap_or_default();
        Self {
            program,
            args: parts.collect(),
            clip,
            child: None,
            stopping: Vec::new(),
        }
    }

    /// Collect stopped players that have exited, without blocking.
    fn reap(&mut self) {
        self.stopping.retain_mut(|child| matches!(child.try_wait(), Ok(None)));
    }
}

impl Playback for CommandPlayer {
    fn start(&mut self) -> Result<()> {
        self.stop();

        if self.program.is_empty() {
            return Err(anyhow!("No audio player command configured"));
        }
        if !self.clip.exists() {
            return Err(anyhow!("Audio clip not found: {}", self.clip.display()));
        }

        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(&self.clip)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to launch audio player '{}'", self.program))?;

        log::info!("Playing {} with {}", self.clip.display(), self.program);
        self.child = Some(child);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            self.stopping.push(child);
            log::debug!("Playback stopped");
        }
        self.reap();
    }

    fn poll_end(&mut self) -> Option<Result<()>> {
        self.reap();
        let child = self.child.as_mut()?;

        let end = match child.try_wait() {
            Ok(None) => return None,
            Ok(Some(status)) if status.success() => {
                log::debug!("Audio player exited with {}", status);
                Ok(())
            }
            Ok(Some(status)) => Err(anyhow!("audio player '{}' {}", self.program, status)),
            Err(e) => Err(anyhow!(e).context("Lost track of audio player")),
        };
        self.child = None;
        Some(end)
    }
}

impl Drop for CommandPlayer {
    fn drop(&mut self) {
        if let Some(child) = self.child.take() {
            self.stopping.push(child);
        }
        for child in &mut self.stopping {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
