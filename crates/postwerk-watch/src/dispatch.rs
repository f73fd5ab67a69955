// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Watch loop / event dispatcher.
//
// Blocks until a file event arrives, drains whatever else is already queued,
// lets each event settle, filters it by name, optionally asks the operator,
// and runs the pipeline for it. Files are processed one at a time: the next
// event is not looked at until the current run has finished or failed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use postwerk_core::error::{PostwerkError, Result};
use postwerk_core::{BeforeRun, RunChoice, Settings};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, instrument, warn};

use crate::filter::{FileEvent, eligible_file_name};
use crate::pipeline::{Pipeline, RunOutcome};
use crate::prompt::Prompter;
use crate::settle::{SETTLE_DELAY, SettleQueue};
use crate::watcher::{FolderWatcher, WatchMessage};

/// Why watching stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// `BeforeRun=stop` and a file was processed.
    StoppedAfterFirstRun,
    /// The event source went away.
    WatchEnded,
}

enum Step {
    Continue,
    Stop,
}

pub struct WatchLoop {
    settings: Arc<Settings>,
    pipeline: Arc<Pipeline>,
    prompter: Arc<dyn Prompter>,
    settle: SettleQueue,
}

impl WatchLoop {
    pub fn new(settings: Arc<Settings>, pipeline: Arc<Pipeline>, prompter: Arc<dyn Prompter>) -> Self {
        Self {
            settings,
            pipeline,
            prompter,
            settle: SettleQueue::new(SETTLE_DELAY),
        }
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle = SettleQueue::new(delay);
        self
    }

    /// Consume events until the source closes, a watch error arrives, or
    /// the stop policy fires.
    pub async fn run(mut self, mut events: UnboundedReceiver<WatchMessage>) -> Result<WatchOutcome> {
        loop {
            if self.settle.is_empty() {
                match events.recv().await {
                    Some(message) => self.enqueue(message)?,
                    None => {
                        info!("Event source closed, watching ended");
                        return Ok(WatchOutcome::WatchEnded);
                    }
                }
            }
            while let Ok(message) = events.try_recv() {
                self.enqueue(message)?;
            }

            if let Some(deadline) = self.settle.next_deadline() {
                tokio::time::sleep_until(deadline.into()).await;
            }
            while let Some(event) = self.settle.pop_ready(Instant::now()) {
                if let Step::Stop = self.handle(event).await? {
                    info!("Stopping after the first processed file");
                    return Ok(WatchOutcome::StoppedAfterFirstRun);
                }
            }
        }
    }

    fn enqueue(&mut self, message: WatchMessage) -> Result<()> {
        let event = message.inspect_err(|err| error!(error = %err, "Folder watch failed"))?;
        debug!(path = %event.path.display(), "File appeared");
        self.settle.push(event, Instant::now());
        Ok(())
    }

    #[instrument(skip_all, fields(path = %event.path.display()))]
    async fn handle(&self, event: FileEvent) -> Result<Step> {
        let Some(file_name) = eligible_file_name(&self.settings, &event).map(str::to_owned) else {
            return Ok(Step::Continue);
        };

        let choice = self.choose(&file_name).await?;
        if choice == RunChoice::Ignore {
            info!(file = %file_name, "Ignored by operator");
            return Ok(Step::Continue);
        }

        let pipeline = Arc::clone(&self.pipeline);
        let name = file_name.clone();
        let result = match tokio::task::spawn_blocking(move || pipeline.process(&name, choice)).await {
            Ok(result) => result,
            Err(err) => {
                error!(file = %file_name, error = %err, "Pipeline task did not finish");
                return Ok(Step::Continue);
            }
        };

        match result {
            Ok(RunOutcome::Processed(report)) => {
                info!(
                    file = %file_name,
                    run_id = %report.run_id,
                    outputs = report.outputs.len(),
                    "File processed"
                );
                if self.settings.before_run == BeforeRun::Stop {
                    return Ok(Step::Stop);
                }
            }
            Ok(RunOutcome::Unrecognized) => {
                info!(file = %file_name, "No postage details found, file skipped");
            }
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                error!(file = %file_name, error = %err, "Processing failed, file abandoned");
            }
        }
        Ok(Step::Continue)
    }

    async fn choose(&self, file_name: &str) -> Result<RunChoice> {
        if self.settings.before_run != BeforeRun::Prompt {
            return Ok(RunChoice::Create);
        }
        let prompter = Arc::clone(&self.prompter);
        let name = file_name.to_owned();
        let print_available = self.settings.print_available();
        let choice = tokio::task::spawn_blocking(move || prompter.ask(&name, print_available))
            .await
            .map_err(|err| PostwerkError::Watch(format!("prompt did not finish: {err}")))?;
        if choice == RunChoice::CreateAndPrint && !print_available {
            warn!("Print requested but no print commands are configured, viewing instead");
        }
        Ok(choice)
    }
}

/// Watch the configured folder until the loop ends.
pub async fn watch(
    settings: Arc<Settings>,
    pipeline: Arc<Pipeline>,
    prompter: Arc<dyn Prompter>,
) -> Result<WatchOutcome> {
    let (watcher, events) = FolderWatcher::start(&settings.watch_folder)?;
    let outcome = WatchLoop::new(settings, pipeline, prompter).run(events).await;
    info!(folder = %watcher.folder().display(), "Stopped watching");
    outcome
}

#[cfg(test)]
mod tests {
    use postwerk_document::fixtures::{FixturePage, document_bytes, source_bytes};
    use tokio::sync::mpsc::unbounded_channel;

    use super::*;
    use crate::prompt::{AlwaysCreate, ScriptedPrompter};
    use crate::testing::Workspace;

    fn event(workspace: &Workspace, name: &str) -> WatchMessage {
        Ok(FileEvent::new(workspace.settings.watch_folder.join(name)))
    }

    async fn run(
        workspace: &Workspace,
        prompter: Arc<dyn Prompter>,
        messages: Vec<WatchMessage>,
    ) -> Result<WatchOutcome> {
        let (tx, rx) = unbounded_channel();
        for message in messages {
            tx.send(message).expect("send");
        }
        drop(tx);
        WatchLoop::new(
            Arc::new(workspace.settings.clone()),
            Arc::new(workspace.pipeline()),
            prompter,
        )
        .with_settle_delay(Duration::ZERO)
        .run(rx)
        .await
    }

    fn produced_from(workspace: &Workspace, source: &str) -> usize {
        let stem = source.trim_end_matches(".pdf");
        workspace
            .stored_names()
            .iter()
            .filter(|name| name.contains(stem))
            .count()
    }

    #[tokio::test]
    async fn processes_matching_files_and_skips_the_rest() {
        let workspace = Workspace::new();
        workspace.drop_file("order-1.pdf", &source_bytes(2, 1));
        workspace.drop_file("invoice-1.pdf", &source_bytes(2, 1));

        let messages = vec![event(&workspace, "invoice-1.pdf"), event(&workspace, "order-1.pdf")];
        let outcome = run(&workspace, Arc::new(AlwaysCreate), messages).await.expect("run");

        assert_eq!(outcome, WatchOutcome::WatchEnded);
        assert_eq!(produced_from(&workspace, "order-1.pdf"), 3);
        assert_eq!(produced_from(&workspace, "invoice-1.pdf"), 0);
    }

    #[tokio::test]
    async fn stop_policy_ends_after_the_first_processed_file() {
        let mut workspace = Workspace::new();
        workspace.settings.before_run = BeforeRun::Stop;
        let packing: Vec<FixturePage> = (0..2).map(FixturePage::packing).collect();
        workspace.drop_file("order-0.pdf", &document_bytes(&packing));
        workspace.drop_file("order-1.pdf", &source_bytes(1, 0));
        workspace.drop_file("order-2.pdf", &source_bytes(1, 0));

        let messages = ["order-0.pdf", "order-1.pdf", "order-2.pdf"]
            .into_iter()
            .map(|name| event(&workspace, name))
            .collect();
        let outcome = run(&workspace, Arc::new(AlwaysCreate), messages).await.expect("run");

        // The unrecognized file does not count as processed.
        assert_eq!(outcome, WatchOutcome::StoppedAfterFirstRun);
        assert!(produced_from(&workspace, "order-1.pdf") > 0);
        assert_eq!(produced_from(&workspace, "order-2.pdf"), 0);
    }

    #[tokio::test]
    async fn prompt_answers_decide_per_file() {
        let mut workspace = Workspace::new();
        workspace.settings.before_run = BeforeRun::Prompt;
        workspace.drop_file("order-1.pdf", &source_bytes(1, 0));
        workspace.drop_file("order-2.pdf", &source_bytes(1, 0));
        let prompter = Arc::new(ScriptedPrompter::new([RunChoice::Ignore, RunChoice::Create]));

        let messages = vec![event(&workspace, "order-1.pdf"), event(&workspace, "order-2.pdf")];
        run(&workspace, prompter.clone(), messages).await.expect("run");

        assert_eq!(prompter.asked(), vec!["order-1.pdf", "order-2.pdf"]);
        assert_eq!(produced_from(&workspace, "order-1.pdf"), 0);
        assert!(produced_from(&workspace, "order-2.pdf") > 0);
    }

    #[tokio::test]
    async fn a_failed_run_does_not_stop_watching() {
        let workspace = Workspace::new();
        workspace.drop_file("order-bad.pdf", b"not a pdf at all");
        workspace.drop_file("order-good.pdf", &source_bytes(1, 0));

        let messages = vec![
            event(&workspace, "order-missing.pdf"),
            event(&workspace, "order-bad.pdf"),
            event(&workspace, "order-good.pdf"),
        ];
        let outcome = run(&workspace, Arc::new(AlwaysCreate), messages).await.expect("run");

        assert_eq!(outcome, WatchOutcome::WatchEnded);
        assert!(produced_from(&workspace, "order-good.pdf") > 0);
    }

    #[tokio::test]
    async fn watch_errors_end_the_loop() {
        let workspace = Workspace::new();
        let messages = vec![Err(PostwerkError::Watch("watch descriptor lost".into()))];
        let result = run(&workspace, Arc::new(AlwaysCreate), messages).await;
        assert!(matches!(result, Err(PostwerkError::Watch(_))));
    }
}
