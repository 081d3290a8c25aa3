//! Execution order resolution
//!
//! Post-order depth-first walk from the target: every dependency is placed
//! before its dependent and each task appears once however many paths reach
//! it. Nodes are coloured unvisited/visiting/done; reaching a node that is
//! still being visited means the walk closed a cycle.

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::runner::Task;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Resolve `target` into the order its dependency closure must run in
pub fn resolve_order(tasks: &HashMap<String, Task>, target: &str) -> OrchestratorResult<Vec<String>> {
    if !tasks.contains_key(target) {
        return Err(OrchestratorError::UnknownTask(target.to_string()));
    }

    let mut walk = Walk {
        tasks,
        marks: HashMap::new(),
        path: Vec::new(),
        order: Vec::new(),
    };
    walk.visit(target)?;
    Ok(walk.order)
}

struct Walk<'a> {
    tasks: &'a HashMap<String, Task>,
    marks: HashMap<&'a str, Mark>,
    /// Tasks currently being visited, outermost first
    path: Vec<&'a str>,
    order: Vec<String>,
}

impl<'a> Walk<'a> {
    fn visit(&mut self, name: &'a str) -> OrchestratorResult<()> {
        match self.marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => return Err(self.cycle_error(name)),
            None => {}
        }

        let tasks = self.tasks;
        let task = tasks
            .get(name)
            .ok_or_else(|| OrchestratorError::UnknownTask(name.to_string()))?;

        self.marks.insert(name, Mark::Visiting);
        self.path.push(name);

        for dep in &task.depends {
            if !tasks.contains_key(&dep.name) {
                return Err(OrchestratorError::MissingDependency {
                    task: name.to_string(),
                    dependency: dep.name.clone(),
                });
            }
            self.visit(&dep.name)?;
        }

        self.path.pop();
        self.marks.insert(name, Mark::Done);
        self.order.push(name.to_string());
        Ok(())
    }

    fn cycle_error(&self, reentered: &str) -> OrchestratorError {
        let start = self
            .path
            .iter()
            .position(|n| *n == reentered)
            .unwrap_or(0);
        let mut cycle: Vec<String> = self.path[start..].iter().map(|n| n.to_string()).collect();
        cycle.push(reentered.to_string());
        OrchestratorError::CyclicDependency { cycle }
    }
}
