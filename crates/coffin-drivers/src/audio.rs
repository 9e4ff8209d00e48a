//! Audio playback through an external player process

use crate::{AudioDriver, DriverError, DriverResult};
use async_trait::async_trait;
use coffin_core::AudioConfig;
use std::path::Path;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// One clip at a time; starting a clip stops the previous one
pub struct ProcessAudioPlayer {
    config: AudioConfig,
    current: Mutex<Option<Child>>,
}

impl ProcessAudioPlayer {
    pub fn new(config: AudioConfig) -> Self {
        Self {
            config,
            current: Mutex::new(None),
        }
    }

    fn command_for(&self, file: &Path, volume: f32) -> Command {
        let mut command = Command::new(&self.config.player.program);
        command.args(render_args(&self.config.player.args, file, volume));
        command
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .kill_on_drop(true);
        command
    }
}

/// Substitute placeholders in the player argument template
fn render_args(template: &[String], file: &Path, volume: f32) -> Vec<String> {
    let volume = volume.clamp(0.0, 1.0);
    let file = file.to_string_lossy();
    let percent = format!("{}", (volume * 100.0).round() as u32);
    let scale = format!("{}", (volume * 32768.0).round() as u32);
    let volume = format!("{volume:.2}");

    template
        .iter()
        .map(|arg| {
            arg.replace("{file}", &file)
                .replace("{volume}", &volume)
                .replace("{percent}", &percent)
                .replace("{scale}", &scale)
        })
        .collect()
}

async fn kill_child(child: &mut Child) {
    if let Err(e) = child.kill().await {
        // Already exited on its own
        debug!(error = %e, "Audio player was not running");
    }
}

#[async_trait]
impl AudioDriver for ProcessAudioPlayer {
    async fn play(&self, file_key: &str, volume: f32) -> DriverResult<()> {
        let file = self
            .config
            .resolve(file_key)
            .ok_or_else(|| DriverError::UnknownClip(file_key.to_string()))?;

        if !file.exists() {
            warn!(clip = %file_key, path = %file.display(), "Audio file missing on disk");
        }

        let mut current = self.current.lock().await;
        if let Some(mut previous) = current.take() {
            kill_child(&mut previous).await;
        }

        let child = self
            .command_for(&file, volume)
            .spawn()
            .map_err(|e| DriverError::io("audio", e))?;

        debug!(clip = %file_key, volume, pid = ?child.id(), "Audio playback started");
        *current = Some(child);
        Ok(())
    }

    async fn stop(&self) -> DriverResult<()> {
        let mut current = self.current.lock().await;
        if let Some(mut child) = current.take() {
            kill_child(&mut child).await;
            debug!("Audio playback stopped");
        }
        Ok(())
    }
}
