//! One reset run: stop the application, then rewrite its telemetry IDs.

use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::display::Display;
use crate::error::{Error, Result};
use crate::ids::{EntropySource, IdGenerator, OsEntropy};
use crate::process::{ProcessSource, ProcessTerminator, StopOutcome, SystemProcessSource};
use crate::storage::{ConfigDocument, ConfigStore, TelemetryIds};

/// Fresh identifiers for a write. `sqmId` is carried over from `previous`
/// when it holds a non-empty value.
pub fn build_identifiers<E: EntropySource>(
    generator: &IdGenerator<E>,
    previous: Option<&ConfigDocument>,
) -> Result<TelemetryIds> {
    let sqm_id = match previous.and_then(|doc| doc.sqm_id()).filter(|id| !id.is_empty()) {
        Some(existing) => {
            debug!("Keeping existing sqmId");
            existing.to_string()
        }
        None => generator.sqm_id()?,
    };

    Ok(TelemetryIds {
        mac_machine_id: generator.mac_machine_id()?,
        machine_id: generator.machine_id()?,
        dev_device_id: generator.device_id()?,
        sqm_id,
    })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResetOptions {
    /// Leave storage.json read-only (0444) after writing.
    pub read_only: bool,
    /// Do not look for running instances first.
    pub skip_kill: bool,
}

#[derive(Debug)]
pub struct ResetReport {
    pub config_path: PathBuf,
    pub ids: TelemetryIds,
    pub sqm_preserved: bool,
    /// `None` when process handling was skipped.
    pub stop: Option<StopOutcome>,
    pub document: ConfigDocument,
}

pub struct Reset<'a, S = SystemProcessSource, E = OsEntropy> {
    terminator: &'a ProcessTerminator<S>,
    store: &'a ConfigStore,
    generator: &'a IdGenerator<E>,
    display: &'a Display,
    options: ResetOptions,
}

impl<'a, S: ProcessSource, E: EntropySource> Reset<'a, S, E> {
    pub fn new(
        terminator: &'a ProcessTerminator<S>,
        store: &'a ConfigStore,
        generator: &'a IdGenerator<E>,
        display: &'a Display,
        options: ResetOptions,
    ) -> Self {
        Self {
            terminator,
            store,
            generator,
            display,
            options,
        }
    }

    pub async fn run(&self) -> Result<ResetReport> {
        let texts = self.display.texts();

        let stop = if self.options.skip_kill {
            debug!("Skipping process shutdown");
            None
        } else {
            Some(self.stop_processes().await?)
        };

        let progress = self.display.progress(texts.reading_config);
        let previous = match self.store.read() {
            Ok(doc) => doc,
            Err(e) => {
                warn!(error = %e, "Failed to read existing config");
                None
            }
        };
        progress.stop();

        let progress = self.display.progress(texts.generating_ids);
        let ids = build_identifiers(self.generator, previous.as_ref())?;
        progress.stop();
        let sqm_preserved = previous
            .as_ref()
            .and_then(|doc| doc.sqm_id())
            .is_some_and(|id| id == ids.sqm_id);

        let progress = self.display.progress(texts.saving_config);
        let document = self.store.write(&ids, self.options.read_only)?;
        progress.stop();
        info!(path = %self.store.path().display(), read_only = self.options.read_only, "Telemetry identifiers reset");

        self.display.success(&[texts.success, texts.restart_hint]);
        println!();
        self.display.info(&format!(
            "{} {}",
            texts.config_location,
            self.store.path().display()
        ));
        if self.options.read_only {
            self.display.warning(texts.read_only_warning);
        }
        self.display.info(texts.completed);

        Ok(ResetReport {
            config_path: self.store.path().to_path_buf(),
            ids,
            sqm_preserved,
            stop,
            document,
        })
    }

    async fn stop_processes(&self) -> Result<StopOutcome> {
        let texts = self.display.texts();
        let progress = self.display.progress(texts.closing_processes);
        let outcome = self.terminator.stop_all().await?;
        progress.stop();

        if !outcome.stopped {
            self.display.error(texts.close_failed);
            return Err(Error::StillRunning {
                count: outcome.residual.len(),
            });
        }
        if outcome.attempts > 0 {
            self.display.info(texts.processes_closed);
        }
        Ok(outcome)
    }
}
