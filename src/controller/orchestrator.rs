use serde_json::{json, Value};

use log::{error, info, warn};
use regex::Regex;

use crate::common::{ProcessModel, Tier};
use crate::config::ConfigTree;
use crate::errors::Result;
use crate::unit::{ProcessController, UnitLoader};
use crate::utils::mappings::fingerprint;

/// Process selection filters for one orchestration run.
#[derive(Debug, Default, Clone)]
pub struct RunOptions {
    /// Restrict selection to one tier. All numeric tiers when unset; the
    /// ops tier only participates when explicitly requested.
    pub tier: Option<Tier>,
    /// Inclusion filters on process names. Empty means include everything.
    pub include: Vec<Regex>,
    /// Exclusion filters on process names, applied after inclusion.
    pub exclude: Vec<Regex>,
    /// Restrict to processes driven by these controller units.
    pub controllers: Vec<String>,
}

impl RunOptions {
    fn accepts(&self, name: &str) -> bool {
        if !self.include.is_empty() && !self.include.iter().any(|re| re.is_match(name)) {
            return false;
        }
        !self.exclude.iter().any(|re| re.is_match(name))
    }

    fn tiers(&self) -> Vec<Tier> {
        match self.tier {
            Some(t) => vec![t],
            None => Tier::NUMERIC.to_vec(),
        }
    }
}

/// Per-controller shutdown result. Failures are captured here instead of
/// propagating, so one stuck controller never hides the others' outcomes.
#[derive(Debug, Clone, PartialEq)]
pub enum StopOutcome {
    Stopped,
    /// The controller exposes no stop capability and was skipped.
    Unsupported,
    Failed(String),
}

struct ControllerGroup {
    /// Controller unit name, kept for log identity.
    unit: String,
    fingerprint: String,
    processes: usize,
    instance: Box<dyn ProcessController>,
}

/// Groups selected processes by controller fingerprint and drives one
/// controller instance per group.
pub struct ProcessOrchestrator {
    groups: Vec<ControllerGroup>,
}

impl ProcessOrchestrator {
    /// Selects processes per `opts` and instantiates one controller per
    /// fingerprint group.
    pub fn new(loader: &UnitLoader, opts: &RunOptions, verbose: u8) -> Result<Self> {
        let processes = Self::get_processes(loader.config(), opts);
        let grouped = Self::group_processes(loader, processes)?;

        let mut groups = Vec::with_capacity(grouped.len());
        for (fp, procs) in grouped {
            let model = procs[0].controller.clone();
            info!(
                "controller group {} ({}): {} process(es)",
                model.unit,
                &fp[..12],
                procs.len()
            );
            let count = procs.len();
            let instance = loader.new_controller(&model, procs, verbose)?;
            groups.push(ControllerGroup {
                unit: model.unit,
                fingerprint: fp,
                processes: count,
                instance,
            });
        }
        Ok(Self { groups })
    }

    /// Selects process models from the tree.
    ///
    /// Malformed documents are logged and dropped; selection continues with
    /// the remaining candidates. Order follows the tree's own section order.
    pub fn get_processes(config: &ConfigTree, opts: &RunOptions) -> Vec<ProcessModel> {
        let mut out = Vec::new();
        for tier in opts.tiers() {
            let section = match config.get(&format!("process.{tier}")) {
                Some(Value::Object(m)) => m,
                Some(other) => {
                    warn!("process section of tier {tier} is not a mapping: {other}");
                    continue;
                }
                None => continue,
            };
            for (name, doc) in section {
                if !opts.accepts(name) {
                    continue;
                }
                let model = match ProcessModel::from_doc(doc, tier) {
                    Ok(m) => m,
                    Err(e) => {
                        error!("dropping process {tier}/{name}: {e}; document: {doc}");
                        continue;
                    }
                };
                if !opts.controllers.is_empty()
                    && !opts.controllers.contains(&model.controller.unit)
                {
                    continue;
                }
                out.push(model);
            }
        }
        out
    }

    /// Groups processes by controller identity: unit name plus fully
    /// resolved controller config, canonicalized and hashed so equivalent
    /// declarations land in one group regardless of key order or aliasing.
    /// Group order preserves first discovery.
    fn group_processes(
        loader: &UnitLoader,
        processes: Vec<ProcessModel>,
    ) -> Result<Vec<(String, Vec<ProcessModel>)>> {
        let mut groups: Vec<(String, Vec<ProcessModel>)> = Vec::new();
        for p in processes {
            let params = loader.resolve_init_params(&p.controller)?;
            let fp = fingerprint(&json!({
                "unit": p.controller.unit,
                "config": params,
            }));
            match groups.iter_mut().find(|(key, _)| *key == fp) {
                Some((_, members)) => members.push(p),
                None => groups.push((fp, vec![p])),
            }
        }
        Ok(groups)
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Hands each controller its scheduling loop. Fails on the first
    /// controller refusing to start; nothing is rolled back.
    pub fn start(&self) -> Result<()> {
        for g in &self.groups {
            info!("starting controller {} ({})", g.unit, &g.fingerprint[..12]);
            g.instance.schedule_processes()?;
        }
        Ok(())
    }

    /// Best-effort shutdown: every controller is asked to stop, and every
    /// result is reported instead of short-circuiting on the first failure.
    pub fn stop(&self) -> Vec<StopOutcome> {
        self.groups
            .iter()
            .map(|g| {
                if !g.instance.can_stop() {
                    warn!(
                        "controller {} ({} process(es)) has no stop capability",
                        g.unit, g.processes
                    );
                    return StopOutcome::Unsupported;
                }
                match g.instance.stop() {
                    Ok(()) => {
                        info!("controller {} stopped", g.unit);
                        StopOutcome::Stopped
                    }
                    Err(e) => {
                        error!("controller {} failed to stop: {e}", g.unit);
                        StopOutcome::Failed(e.to_string())
                    }
                }
            })
            .collect()
    }
}
