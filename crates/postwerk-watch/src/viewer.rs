// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Deferred viewer launcher — opens (or prints) a generated document with the
// configured command after a startup delay.
//
// Launches are fire-and-forget: the pipeline never waits for them and a
// failure is only logged. Each launch still gets its own cancellation token
// and a one-shot outcome channel that nobody is required to read.

use std::path::Path;
use std::time::Duration;

use postwerk_core::DocumentKind;
use postwerk_core::error::PostwerkError;
use tokio::process::Command;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, info, instrument, warn};

/// Token replaced with the quoted absolute path of the document.
pub const FILENAME_TOKEN: &str = "%filename%";

/// The command line for `path`: substitute the token, or append the path.
pub fn build_command_line(template: &str, path: &Path) -> String {
    let quoted = format!("\"{}\"", path.display());
    if template.contains(FILENAME_TOKEN) {
        template.replace(FILENAME_TOKEN, &quoted)
    } else {
        format!("{template} {quoted}")
    }
}

/// How a deferred launch ended.
#[derive(Debug)]
pub enum LaunchOutcome {
    Launched,
    Cancelled,
    Failed(PostwerkError),
}

/// Handle to one pending or finished launch.
pub struct ViewerHandle {
    token: CancellationToken,
    outcome: oneshot::Receiver<LaunchOutcome>,
}

impl ViewerHandle {
    /// Cancel the launch if its delay has not elapsed yet.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Wait for the launch to finish.
    pub async fn outcome(self) -> LaunchOutcome {
        self.outcome.await.unwrap_or(LaunchOutcome::Cancelled)
    }
}

/// Spawns viewer commands on a tokio runtime after a fixed delay.
#[derive(Clone)]
pub struct ViewerLauncher {
    runtime: Handle,
    delay: Duration,
}

impl ViewerLauncher {
    pub fn new(runtime: Handle, delay: Duration) -> Self {
        Self { runtime, delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `template` for `path`. An empty template means "do not
    /// open" and schedules nothing.
    #[instrument(skip(self, template), fields(kind = %kind, path = %path.display()))]
    pub fn launch(&self, kind: DocumentKind, template: &str, path: &Path) -> Option<ViewerHandle> {
        if template.trim().is_empty() {
            info!("No viewer configured, not opening");
            return None;
        }

        let command_line = build_command_line(template, path);
        let token = CancellationToken::new();
        let (tx, rx) = oneshot::channel();
        let delay = self.delay;
        let cancelled = token.clone();

        debug!(command = %command_line, delay_secs = delay.as_secs(), "Scheduling viewer");
        self.runtime.spawn(
            async move {
                let outcome = tokio::select! {
                    _ = cancelled.cancelled() => {
                        debug!("Viewer launch cancelled");
                        LaunchOutcome::Cancelled
                    }
                    _ = tokio::time::sleep(delay) => run(&command_line),
                };
                // The receiver may have been dropped; nobody has to listen.
                let _ = tx.send(outcome);
            }
            .instrument(Span::current()),
        );

        Some(ViewerHandle { token, outcome: rx })
    }
}

fn run(command_line: &str) -> LaunchOutcome {
    match shell(command_line).spawn() {
        Ok(child) => {
            info!(pid = child.id(), "Viewer started");
            LaunchOutcome::Launched
        }
        Err(err) => {
            let err = PostwerkError::Viewer(format!("{command_line}: {err}"));
            warn!(error = %err, "Viewer launch failed");
            LaunchOutcome::Failed(err)
        }
    }
}

#[cfg(windows)]
fn shell(command_line: &str) -> Command {
    let mut command = Command::new("cmd");
    command.arg("/C").arg(command_line);
    command
}

#[cfg(not(windows))]
fn shell(command_line: &str) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg(command_line);
    command
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_replaced_with_the_quoted_path() {
        let path = Path::new("/store/a b.pdf");
        assert_eq!(
            build_command_line("xdg-open %filename%", path),
            "xdg-open \"/store/a b.pdf\""
        );
        assert_eq!(build_command_line("lp -n 2", path), "lp -n 2 \"/store/a b.pdf\"");
    }

    #[tokio::test]
    async fn empty_template_schedules_nothing() {
        let launcher = ViewerLauncher::new(Handle::current(), Duration::ZERO);
        assert!(launcher.launch(DocumentKind::Labels, "  ", Path::new("/x.pdf")).is_none());
    }

    #[tokio::test]
    async fn cancelled_before_the_delay() {
        let launcher = ViewerLauncher::new(Handle::current(), Duration::from_secs(3600));
        let handle = launcher
            .launch(DocumentKind::ProofOfPostage, "true", Path::new("/x.pdf"))
            .expect("scheduled");
        handle.cancel();
        assert!(matches!(handle.outcome().await, LaunchOutcome::Cancelled));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_is_started_after_the_delay() {
        let launcher = ViewerLauncher::new(Handle::current(), Duration::from_millis(10));
        let handle = launcher
            .launch(DocumentKind::PackingSlip, "true", Path::new("/x.pdf"))
            .expect("scheduled");
        assert!(matches!(handle.outcome().await, LaunchOutcome::Launched));
    }
}
