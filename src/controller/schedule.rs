use std::str::FromStr;
use std::time::Duration;

use chrono::Utc;
use cron::Schedule;
use log::{debug, error, info, warn};
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tokio::time::sleep;
use uuid::Uuid;

use crate::common::ProcessModel;
use crate::errors::{Error, Result};
use crate::unit::contract::{ControllerInit, ExecContext, Params, ProcessController};

const DEFAULT_INTERVAL_SEC: u64 = 60;

/// Cadence of one scheduled process: a cron expression or a fixed interval.
#[derive(Debug, Clone)]
enum Cadence {
    Cron(Box<Schedule>),
    Interval(Duration),
}

impl Cadence {
    /// Time to wait before the next tick. `None` when the schedule is
    /// exhausted.
    fn next_wait(&self) -> Option<Duration> {
        match self {
            Cadence::Interval(d) => Some(*d),
            Cadence::Cron(schedule) => {
                let now = Utc::now();
                let next = schedule.after(&now).next()?;
                Some((next - now).to_std().unwrap_or(Duration::ZERO))
            }
        }
    }
}

/// Built-in controller: one tokio loop per active process, instantiating
/// and running the processor unit on every tick.
///
/// A process-level `schedule` (cron expression) takes precedence over the
/// controller's own resolved params; without either, ticks run every
/// `interval_sec` seconds (default 60).
pub struct ScheduleController {
    context: ExecContext,
    processes: Vec<ProcessModel>,
    params: Params,
    verbose: u8,
    shutdown_tx: broadcast::Sender<()>,
}

impl ScheduleController {
    pub fn new(init: ControllerInit) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            context: init.context,
            processes: init.processes,
            params: init.params,
            verbose: init.verbose,
            shutdown_tx,
        }
    }

    fn cadence_for(&self, process: &ProcessModel) -> Result<Cadence> {
        let expr = process
            .schedule
            .as_deref()
            .or_else(|| self.params.get("schedule").and_then(Value::as_str));
        if let Some(expr) = expr {
            let schedule = Schedule::from_str(expr).map_err(|e| {
                Error::controller(format!(
                    "process '{}' has invalid cron expression '{expr}': {e}",
                    process.name
                ))
            })?;
            return Ok(Cadence::Cron(Box::new(schedule)));
        }
        let secs = self
            .params
            .get("interval_sec")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_INTERVAL_SEC);
        Ok(Cadence::Interval(Duration::from_secs(secs)))
    }

    async fn run_process(
        context: ExecContext,
        process: ProcessModel,
        cadence: Cadence,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        info!("scheduling process {}/{}", process.tier, process.name);
        loop {
            let wait = match cadence.next_wait() {
                Some(w) => w,
                None => {
                    warn!(
                        "schedule of process {}/{} is exhausted",
                        process.tier, process.name
                    );
                    break;
                }
            };
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("process {}/{} loop stopped", process.tier, process.name);
                    break;
                }
                _ = sleep(wait) => {}
            }

            let run_id = Uuid::new_v4();
            let mut extra = Params::new();
            extra.insert("process_name".into(), json!(process.name));
            extra.insert("run_id".into(), json!(run_id.to_string()));

            let loader = context.loader();
            match loader.new_base_unit(&process.processor, extra) {
                Ok(unit) => {
                    debug!(
                        "tick {run_id}: running {} for {}/{}",
                        unit.name(),
                        process.tier,
                        process.name
                    );
                    if let Err(e) = unit.run() {
                        error!(
                            "tick {run_id}: processor of {}/{} failed: {e}",
                            process.tier, process.name
                        );
                    }
                }
                Err(e) => {
                    error!(
                        "tick {run_id}: cannot instantiate processor of {}/{}: {e}",
                        process.tier, process.name
                    );
                }
            }
        }
    }
}

impl ProcessController for ScheduleController {
    fn schedule_processes(&self) -> Result<()> {
        for process in &self.processes {
            if !process.active {
                debug!(
                    "process {}/{} is inactive, not scheduled",
                    process.tier, process.name
                );
                continue;
            }
            let cadence = self.cadence_for(process)?;
            if self.verbose > 0 {
                debug!(
                    "process {}/{} cadence: {cadence:?}",
                    process.tier, process.name
                );
            }
            let shutdown_rx = self.shutdown_tx.subscribe();
            let context = self.context.clone();
            let process = process.clone();
            tokio::spawn(Self::run_process(context, process, cadence, shutdown_rx));
        }
        Ok(())
    }

    fn can_stop(&self) -> bool {
        true
    }

    fn stop(&self) -> Result<()> {
        // No receivers means no loop was ever scheduled; nothing to stop.
        if self.shutdown_tx.receiver_count() > 0 {
            self.shutdown_tx
                .send(())
                .map_err(|_| Error::controller("all process loops already gone"))?;
        }
        Ok(())
    }
}
