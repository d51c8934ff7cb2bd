// SPDX-License-Identifier: GPL-3.0-only

//! Scanner screen task
//!
//! Each scanner screen instance runs one cooperative tokio task that owns
//! the [`ScanOrchestrator`] (and through it the camera). The UI talks to it
//! with [`ScanCommand`]s and watches [`ScanView`] updates. Dropping the
//! [`ScanScreenHandle`] aborts the task, which drops the orchestrator and
//! releases the camera.

use super::{ScanOrchestrator, ScanOutcome, ScanView};
use crate::barcode::DecodedCode;
use crate::pipelines::PreviewStream;
use futures::FutureExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// User actions on the scanner screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanCommand {
    Capture,
    SwitchLens,
    /// Bind the current lens again after a bind failure
    Retry,
    Dismiss,
}

/// How a scanner screen finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanExit {
    Scanned(DecodedCode),
    Dismissed,
    /// The handle went away without dismissing
    Abandoned,
}

/// UI side of a running scanner screen
pub struct ScanScreenHandle {
    commands: mpsc::UnboundedSender<ScanCommand>,
    view: watch::Receiver<ScanView>,
    previews: mpsc::UnboundedReceiver<PreviewStream>,
    task: Option<JoinHandle<ScanExit>>,
}

impl ScanScreenHandle {
    /// Send a command; `false` once the screen has finished
    pub fn send(&self, command: ScanCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    /// Latest UI state
    pub fn view(&self) -> ScanView {
        self.view.borrow().clone()
    }

    /// Receiver for UI state changes
    pub fn watch(&self) -> watch::Receiver<ScanView> {
        self.view.clone()
    }

    /// Preview stream of a new binding, if one was made since the last call
    pub fn next_preview(&mut self) -> Option<PreviewStream> {
        let mut latest = None;
        while let Ok(stream) = self.previews.try_recv() {
            latest = Some(stream);
        }
        latest
    }

    /// The exit value, if the task has finished; does not block
    pub fn try_finish(&mut self) -> Option<ScanExit> {
        let task = self.task.as_mut()?;
        if !task.is_finished() {
            return None;
        }
        let exit = task.now_or_never()?;
        self.task = None;
        Some(exit.unwrap_or(ScanExit::Abandoned))
    }

    /// Wait for the screen to finish
    pub async fn finished(mut self) -> ScanExit {
        match self.task.take() {
            Some(task) => task.await.unwrap_or(ScanExit::Abandoned),
            None => ScanExit::Abandoned,
        }
    }
}

impl Drop for ScanScreenHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            debug!("Scanner screen dropped, aborting its task");
            task.abort();
        }
    }
}

/// Start the task behind a scanner screen
///
/// Must be called from within a tokio runtime.
pub fn spawn_scan_screen(orchestrator: ScanOrchestrator) -> ScanScreenHandle {
    let (commands, command_rx) = mpsc::unbounded_channel();
    let (preview_tx, previews) = mpsc::unbounded_channel();
    let view = orchestrator.subscribe();

    let task = tokio::spawn(run_screen(orchestrator, command_rx, preview_tx));

    ScanScreenHandle {
        commands,
        view,
        previews,
        task: Some(task),
    }
}

fn forward_preview(
    orchestrator: &mut ScanOrchestrator,
    previews: &mpsc::UnboundedSender<PreviewStream>,
) {
    if let Some(stream) = orchestrator.preview_stream() {
        // The UI may not render previews (CLI scan)
        let _ = previews.send(stream);
    }
}

async fn run_screen(
    mut orchestrator: ScanOrchestrator,
    mut commands: mpsc::UnboundedReceiver<ScanCommand>,
    previews: mpsc::UnboundedSender<PreviewStream>,
) -> ScanExit {
    info!(lens = %orchestrator.lens(), "Scanner screen opened");
    // Bind failures are shown as notices; the user can retry, switch lens or leave
    let _ = orchestrator.show();
    forward_preview(&mut orchestrator, &previews);

    loop {
        let Some(command) = commands.recv().await else {
            orchestrator.dismiss();
            return ScanExit::Abandoned;
        };

        match command {
            ScanCommand::Capture => {
                let mut closed = false;
                let outcome = {
                    let capture = orchestrator.capture();
                    tokio::pin!(capture);
                    loop {
                        tokio::select! {
                            outcome = &mut capture => break outcome,
                            command = commands.recv() => match command {
                                Some(ScanCommand::Dismiss) => break ScanOutcome::Dismissed,
                                None => {
                                    closed = true;
                                    break ScanOutcome::Dismissed;
                                }
                                Some(other) => debug!(command = ?other, "Ignored while capturing"),
                            },
                        }
                    }
                };

                match outcome {
                    ScanOutcome::Success(code) => {
                        info!(code = %code.value, "Scanner screen finished with a code");
                        return ScanExit::Scanned(code);
                    }
                    ScanOutcome::Dismissed => {
                        debug!("Capture cancelled by dismissal");
                        orchestrator.dismiss();
                        return if closed {
                            ScanExit::Abandoned
                        } else {
                            ScanExit::Dismissed
                        };
                    }
                    ScanOutcome::NoMatch | ScanOutcome::Failed(_) => {
                        forward_preview(&mut orchestrator, &previews);
                    }
                }
            }
            ScanCommand::SwitchLens => {
                if let Err(e) = orchestrator.switch_lens() {
                    debug!(error = %e, "Lens switch failed");
                }
                forward_preview(&mut orchestrator, &previews);
            }
            ScanCommand::Retry => {
                if let Err(e) = orchestrator.retry() {
                    debug!(error = %e, "Retry failed");
                }
                forward_preview(&mut orchestrator, &previews);
            }
            ScanCommand::Dismiss => {
                orchestrator.dismiss();
                info!("Scanner screen dismissed");
                return ScanExit::Dismissed;
            }
        }
    }
}
