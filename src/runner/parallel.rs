//! Parallel execution of independent tasks
//!
//! The calling thread owns scheduling and the run record. Workers run one task
//! each and send a single [`TaskOutcome`] back, so the ledger is only ever
//! written by one thread.

use crate::runner::orchestrator::{execute_task, gate, settle, FailurePolicy, Gate};
use crate::runner::record::{RunRecord, TaskOutcome, TaskStatus};
use crate::runner::{Context, Task};
use crossbeam_channel::unbounded;
use std::collections::HashMap;
use std::thread;
use tracing::debug;

/// Run `order` on up to `jobs` worker threads
///
/// A task starts once every dependency has reached a terminal state. Tasks are
/// picked in plan order, so with a single ready task at a time the result is
/// identical to sequential execution.
pub(crate) fn execute(
    tasks: &HashMap<String, Task>,
    order: &[String],
    ctx: &Context,
    policy: FailurePolicy,
    jobs: usize,
    run: &mut RunRecord,
) {
    let (tx, rx) = unbounded::<TaskOutcome>();
    let mut pending: Vec<&Task> = order.iter().filter_map(|n| tasks.get(n)).collect();
    let mut statuses: HashMap<String, TaskStatus> = HashMap::new();
    let mut in_flight = 0usize;
    let mut halted = false;

    thread::scope(|s| loop {
        let mut progressed = false;

        let mut i = 0;
        while i < pending.len() {
            let task = pending[i];
            let ready = task
                .dependency_names()
                .all(|dep| statuses.get(dep).is_some_and(TaskStatus::is_terminal));
            if !ready && !halted {
                i += 1;
                continue;
            }

            match gate(task, &statuses, halted) {
                Gate::Run if in_flight < jobs => {
                    pending.remove(i);
                    statuses.insert(task.name.clone(), TaskStatus::Running);
                    in_flight += 1;
                    debug!(task = %task.name, in_flight, "dispatching task");

                    let tx = tx.clone();
                    s.spawn(move || {
                        let _ = tx.send(execute_task(task, ctx));
                    });
                    progressed = true;
                }
                Gate::Run => i += 1,
                other => {
                    pending.remove(i);
                    let outcome = settle(task, other);
                    statuses.insert(task.name.clone(), outcome.record.status.clone());
                    run.append(outcome);
                    progressed = true;
                }
            }
        }

        if progressed {
            continue;
        }
        if in_flight == 0 {
            break;
        }

        let Ok(outcome) = rx.recv() else {
            break;
        };
        in_flight -= 1;
        if outcome.record.status == TaskStatus::Failed && policy == FailurePolicy::FailFast {
            halted = true;
        }
        statuses.insert(outcome.record.name.clone(), outcome.record.status.clone());
        run.append(outcome);
    });
}
