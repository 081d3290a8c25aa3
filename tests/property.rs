//! Property tests for execution order resolution

mod common;

use buildrun::error::OrchestratorError;
use buildrun::runner::{resolve_order, Orchestrator, Task};
use common::Recorder;
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};

fn name(i: usize) -> String {
    format!("t{}", i)
}

/// Random acyclic graph: task `i` may only depend on tasks with a lower index
fn acyclic_graph() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1usize..12).prop_flat_map(|n| {
        (0..n)
            .map(|i| proptest::collection::vec(0..i.max(1), 0..=i.min(4)))
            .collect::<Vec<_>>()
            .prop_map(|deps| {
                deps.into_iter()
                    .enumerate()
                    .map(|(i, d)| d.into_iter().filter(|&j| j < i).collect())
                    .collect()
            })
    })
}

fn registry(graph: &[Vec<usize>]) -> HashMap<String, Task> {
    graph
        .iter()
        .enumerate()
        .map(|(i, deps)| {
            (
                name(i),
                Task::new(name(i)).depends_on(deps.iter().map(|&d| name(d))),
            )
        })
        .collect()
}

fn closure(graph: &[Vec<usize>], target: usize) -> HashSet<usize> {
    let mut seen = HashSet::new();
    let mut stack = vec![target];
    while let Some(i) = stack.pop() {
        if seen.insert(i) {
            stack.extend(graph[i].iter().copied());
        }
    }
    seen
}

proptest! {
    #[test]
    fn order_places_dependencies_first(graph in acyclic_graph()) {
        let tasks = registry(&graph);
        let target = graph.len() - 1;
        let order = resolve_order(&tasks, &name(target)).unwrap();

        let unique: HashSet<&String> = order.iter().collect();
        prop_assert_eq!(unique.len(), order.len());

        let expected: HashSet<String> = closure(&graph, target).into_iter().map(name).collect();
        let planned: HashSet<String> = order.iter().cloned().collect();
        prop_assert_eq!(planned, expected);

        let position: HashMap<&str, usize> =
            order.iter().enumerate().map(|(p, n)| (n.as_str(), p)).collect();
        for (i, deps) in graph.iter().enumerate() {
            if let Some(&pi) = position.get(name(i).as_str()) {
                for &d in deps {
                    prop_assert!(position[name(d).as_str()] < pi);
                }
            }
        }
        prop_assert_eq!(order.last(), Some(&name(target)));
    }

    #[test]
    fn every_task_runs_exactly_once(graph in acyclic_graph(), jobs in 1usize..4) {
        let rec = Recorder::new();
        let mut orch = Orchestrator::new();
        orch.settings_mut().jobs = jobs;
        for (i, deps) in graph.iter().enumerate() {
            orch.register(rec.task(&name(i)).depends_on(deps.iter().map(|&d| name(d)))).unwrap();
        }

        let target = graph.len() - 1;
        let summary = orch.run(Some(&name(target)), HashMap::new()).unwrap();
        prop_assert!(summary.success);

        let expected = closure(&graph, target);
        prop_assert_eq!(rec.entries().len(), expected.len());
        for i in expected {
            prop_assert_eq!(rec.count(&name(i)), 1);
        }
    }

    #[test]
    fn cycle_members_are_reported(len in 1usize..8) {
        // t0 -> t1 -> ... -> t(len-1) -> t0, entered through an extra task
        let mut tasks: HashMap<String, Task> = (0..len)
            .map(|i| (name(i), Task::new(name(i)).depends_on([name((i + 1) % len)])))
            .collect();
        tasks.insert("entry".to_string(), Task::new("entry").depends_on([name(0)]));

        let err = resolve_order(&tasks, "entry").unwrap_err();
        prop_assert!(matches!(err, OrchestratorError::CyclicDependency { .. }), "unexpected error");

        let mut members = err.cycle_members().to_vec();
        members.sort();
        let mut expected: Vec<String> = (0..len).map(name).collect();
        expected.sort();
        prop_assert_eq!(members, expected);
    }
}
