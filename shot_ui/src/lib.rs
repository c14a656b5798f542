#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Text renderer for the shot controller.
//!
//! Draws each `DisplaySnapshot` as a small block of text (weight, target,
//! shot time, flow sparkline, paddle and battery) and, when a snapshot asks
//! for it, saves that frame into a directory for the web page to pick up.
pub mod atomic;
pub mod frame;

use std::io::Write;
use std::path::{Path, PathBuf};

use shot_core::{DisplaySnapshot, Renderer};

pub use frame::{render_frame, sparkline};

const CLEAR: &str = "\x1b[H\x1b[2J";

/// Save `text` as `<dir>/<local time>.txt`. A missing or non-directory
/// `dir` is logged and skipped.
pub fn save_frame(dir: &Path, text: &str) -> std::io::Result<Option<PathBuf>> {
    if !dir.exists() {
        tracing::error!(dir = %dir.display(), "skipping frame save, directory does not exist");
        return Ok(None);
    }
    if !dir.is_dir() {
        tracing::error!(dir = %dir.display(), "skipping frame save, not a directory");
        return Ok(None);
    }
    let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
    let path = dir.join(format!("{stamp}.txt"));
    atomic::write_atomic(&path, text.as_bytes())?;
    tracing::info!(path = %path.display(), "frame saved");
    Ok(Some(path))
}

/// Renderer that writes frames to any `Write` sink (stdout in the CLI).
pub struct TerminalRenderer<W: Write + Send> {
    out: W,
    width: usize,
    ansi: bool,
    save_dir: Option<PathBuf>,
}

impl<W: Write + Send> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            width: 40,
            ansi: false,
            save_dir: None,
        }
    }

    /// Sparkline width in characters.
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width.max(8);
        self
    }

    /// Clear the screen before each frame.
    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }

    pub fn with_save_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.save_dir = dir;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Renderer for TerminalRenderer<W> {
    fn power(&mut self, on: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.ansi {
            write!(self.out, "{CLEAR}")?;
        }
        if !on {
            writeln!(self.out, "[display off]")?;
        }
        self.out.flush()?;
        Ok(())
    }

    fn draw(
        &mut self,
        snapshot: &DisplaySnapshot,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let text = render_frame(snapshot, self.width);
        if snapshot.save_requested {
            match &self.save_dir {
                Some(dir) => {
                    if let Err(e) = save_frame(dir, &text) {
                        tracing::error!(error = %e, "failed to save frame");
                    }
                }
                None => tracing::info!("no directory set to save frame"),
            }
        }
        if self.ansi {
            write!(self.out, "{CLEAR}")?;
        }
        self.out.write_all(text.as_bytes())?;
        self.out.flush()?;
        Ok(())
    }
}
