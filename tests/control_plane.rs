//! End-to-end checks over the aggregation, resolution and orchestration
//! layers wired together the way the daemon wires them.

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::NamedTempFile;

use stratum::prelude::*;
use stratum::config::pwd;
use stratum::unit::contract::{BaseInit, ControllerInit};

struct Processor {
    params: stratum::unit::contract::Params,
}

impl BaseUnit for Processor {
    fn name(&self) -> &str {
        "Processor"
    }
    fn run(&self) -> Result<()> {
        Ok(())
    }
}

fn registry() -> Arc<UnitRegistry> {
    let mut b = UnitRegistryBuilder::new();
    register_builtins(&mut b).unwrap();
    b.register_base("Processor", vec![], |init: BaseInit| {
        Ok(Box::new(Processor {
            params: init.params,
        }) as Box<dyn BaseUnit>)
    })
    .unwrap();
    Arc::new(b.build())
}

fn frozen(root: Value) -> Arc<ConfigTree> {
    let mut tree = ConfigTree::new(root).unwrap();
    tree.freeze();
    Arc::new(tree)
}

#[test]
fn builder_to_loader_alias_override_scenario() {
    // One tier-0 alias, one process referencing it with an override:
    // resolved init parameters must read {"threshold": 7}.
    let mut b = ConfigBuilder::new(false);
    b.add_alias(Tier::T0, "default", json!({"threshold": 5}));
    b.add_process(
        Tier::T0,
        json!({
            "name": "hu_random",
            "controller": {"unit": "ScheduleController"},
            "processor": {"unit": "Processor", "config": "default",
                          "override": {"threshold": 7}}
        }),
    );
    assert!(!b.has_nested_error());

    let mut tree = b.build();
    tree.freeze();
    let loader = UnitLoader::new(Arc::new(tree), registry());

    let selected =
        ProcessOrchestrator::get_processes(loader.config(), &RunOptions::default());
    assert_eq!(selected.len(), 1);
    let params = loader.resolve_init_params(&selected[0].processor).unwrap();
    assert_eq!(params.get("threshold"), Some(&json!(7)));
}

#[test]
fn validation_gates_the_daemon_startup_path() {
    let tree = ConfigTree::new(json!({
        "process": {"t0": {"p": {
            "name": "p",
            "controller": {"unit": "ScheduleController"},
            "processor": {"unit": "NoSuchUnit"}
        }}}
    }))
    .unwrap();
    let err = ConfigValidator::new(tree, registry())
        .validate(ValidateOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::BadConfig { offenses: 1 }));
}

#[test]
fn grouping_is_stable_under_process_permutation() {
    let docs = [
        ("a", json!({"interval_sec": 5})),
        ("b", json!({"interval_sec": 9})),
        ("c", json!({"interval_sec": 5})),
    ];

    for perm in [[0, 1, 2], [2, 1, 0], [1, 2, 0]] {
        let mut section = serde_json::Map::new();
        for i in perm {
            let (name, cfg) = &docs[i];
            section.insert(
                name.to_string(),
                json!({
                    "name": name,
                    "controller": {"unit": "ScheduleController", "config": cfg},
                    "processor": {"unit": "Processor"}
                }),
            );
        }
        let tree = frozen(json!({"process": {"t0": Value::Object(section)}}));
        let loader = UnitLoader::new(tree, registry());
        let orch = ProcessOrchestrator::new(&loader, &RunOptions::default(), 0).unwrap();
        // Two distinct controller configs means two groups, whatever the
        // declaration order was.
        assert_eq!(orch.len(), 2);
    }
}

#[test]
fn encrypted_leaf_round_trips_through_load() {
    let secret = pwd::encrypt_value("s3cret-uri", "hunter2").unwrap();
    let root = json!({
        "resource": {"archive": secret},
        "pwd": ["hunter2"]
    });
    let mut f = NamedTempFile::new().unwrap();
    write!(f, "{root}").unwrap();

    let tree = ConfigTree::load(f.path(), &[], true).unwrap();
    assert!(tree.is_frozen());
    assert_eq!(tree.get("resource.archive"), Some(&json!("s3cret-uri")));
}

#[test]
fn frozen_tree_rejects_mutation_everywhere() {
    let mut tree = ConfigTree::new(json!({"resource": {}})).unwrap();
    tree.freeze();
    let before = tree.clone();
    tree.freeze();
    assert_eq!(tree, before);
    assert!(matches!(
        tree.set("resource.x", json!(1)),
        Err(Error::ImmutabilityViolation)
    ));
}

#[tokio::test]
async fn orchestrator_runs_and_stops_builtin_controller() {
    static TICKS: AtomicU64 = AtomicU64::new(0);

    let mut b = UnitRegistryBuilder::new();
    register_builtins(&mut b).unwrap();
    b.register_base("Ticker", vec![], |_: BaseInit| {
        struct Ticker;
        impl BaseUnit for Ticker {
            fn name(&self) -> &str {
                "Ticker"
            }
            fn run(&self) -> Result<()> {
                TICKS.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }
        Ok(Box::new(Ticker) as Box<dyn BaseUnit>)
    })
    .unwrap();
    let registry = Arc::new(b.build());

    let tree = frozen(json!({
        "process": {"t0": {"tick": {
            "name": "tick",
            "controller": {"unit": "ScheduleController",
                           "config": {"interval_sec": 0}},
            "processor": {"unit": "Ticker"}
        }}}
    }));
    let loader = UnitLoader::new(tree, registry);
    let orch = ProcessOrchestrator::new(&loader, &RunOptions::default(), 0).unwrap();
    assert_eq!(orch.len(), 1);

    orch.start().unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(TICKS.load(Ordering::SeqCst) > 0);

    assert_eq!(orch.stop(), vec![StopOutcome::Stopped]);
}

#[test]
fn controller_init_carries_assigned_processes() {
    // A custom controller sees exactly the processes of its group.
    let mut b = UnitRegistryBuilder::new();
    b.register_base("Processor", vec![], |init: BaseInit| {
        Ok(Box::new(Processor {
            params: init.params,
        }) as Box<dyn BaseUnit>)
    })
    .unwrap();
    b.register_controller("Counter", |init: ControllerInit| {
        struct Counter(usize);
        impl ProcessController for Counter {
            fn schedule_processes(&self) -> Result<()> {
                assert_eq!(self.0, 2);
                Ok(())
            }
        }
        Ok(Box::new(Counter(init.processes.len())) as Box<dyn ProcessController>)
    })
    .unwrap();
    let registry = Arc::new(b.build());

    let tree = frozen(json!({
        "process": {"t2": {
            "a": {"name": "a", "controller": {"unit": "Counter"},
                  "processor": {"unit": "Processor"}},
            "b": {"name": "b", "controller": {"unit": "Counter"},
                  "processor": {"unit": "Processor"}}
        }}
    }));
    let loader = UnitLoader::new(tree, registry);
    let opts = RunOptions {
        tier: Some(Tier::T2),
        ..Default::default()
    };
    let orch = ProcessOrchestrator::new(&loader, &opts, 0).unwrap();
    orch.start().unwrap();
    assert_eq!(orch.stop(), vec![StopOutcome::Unsupported]);
}
