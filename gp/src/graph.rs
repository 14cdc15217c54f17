//! Dependency ordering for a batch of generation tasks
//!
//! Tasks whose outputs feed other tasks have to run first. The graph is
//! built over canonical artifact paths: an edge goes from every input or
//! prompt to the output it helps produce. A task reading and rewriting the
//! same file is legal, so self-edges are dropped rather than rejected.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::path::{Path, PathBuf};

use eyre::{Result, eyre};
use genframe::GenerationTask;
use thiserror::Error;
use tracing::debug;

/// Reports one node involved in a dependency cycle, not the whole cycle.
#[derive(Debug, Error)]
#[error("cycle detected involving {node:?}")]
pub struct CycleError<T: fmt::Debug> {
    pub node: T,
}

/// Topological sort over edges added one by one.
pub struct TopoSort<T> {
    edges: Vec<(T, T)>,
}

impl<T> Default for TopoSort<T> {
    fn default() -> Self {
        TopoSort { edges: Vec::new() }
    }
}

impl<T: Clone + Eq + Hash + fmt::Debug> TopoSort<T> {
    pub fn new() -> Self {
        TopoSort { edges: Vec::new() }
    }

    pub fn add_edge(&mut self, from: T, to: T) {
        self.edges.push((from, to));
    }

    /// Sorted list of nodes: if there is an edge from A to B, A appears
    /// before B.
    pub fn sort(&self) -> Result<Vec<T>, CycleError<T>> {
        let mut result = Vec::new();
        let mut visited = HashSet::new();
        let mut visiting = HashSet::new();
        for (_, to) in &self.edges {
            if !visited.contains(to) {
                self.visit(to, &mut visited, &mut visiting, &mut result)?;
            }
        }
        Ok(result)
    }

    fn visit(
        &self,
        node: &T,
        visited: &mut HashSet<T>,
        visiting: &mut HashSet<T>,
        result: &mut Vec<T>,
    ) -> Result<(), CycleError<T>> {
        if visiting.contains(node) {
            return Err(CycleError { node: node.clone() });
        }
        if !visited.contains(node) {
            visiting.insert(node.clone());
            for (from, to) in &self.edges {
                if to == node {
                    self.visit(from, visited, visiting, result)?;
                }
            }
            visiting.remove(node);
            visited.insert(node.clone());
            result.push(node.clone());
        }
        Ok(())
    }
}

fn task_output_id(task: &GenerationTask) -> Result<PathBuf> {
    task.output()
        .and_then(|output| output.canonical())
        .map(Path::to_owned)
        .ok_or_else(|| eyre!("task without an output file cannot be ordered"))
}

/// The order in which the given tasks have to be executed, as indices into
/// the input slice.
///
/// Tasks sharing an output are grouped at that output's sorted position, in
/// input order; tasks not connected to any other task are appended at the
/// end, also in input order. Every task appears exactly once.
pub fn execution_order(tasks: &[GenerationTask]) -> Result<Vec<usize>> {
    let mut sort: TopoSort<PathBuf> = TopoSort::new();
    for task in tasks {
        let out_id = task_output_id(task)?;
        for input in task.inputs() {
            if let Some(canonical) = input.canonical() {
                if canonical != out_id {
                    sort.add_edge(canonical.to_owned(), out_id.clone());
                }
            }
        }
        for prompt in task.prompt_inputs() {
            if let Some(canonical) = prompt.canonical() {
                if canonical != out_id {
                    sort.add_edge(canonical.to_owned(), out_id.clone());
                }
            }
        }
    }
    let sorted = sort
        .sort()
        .map_err(|e| eyre!("dependency cycle detected involving file {}", e.node.display()))?;

    let mut by_output: HashMap<PathBuf, Vec<usize>> = HashMap::new();
    for (index, task) in tasks.iter().enumerate() {
        by_output.entry(task_output_id(task)?).or_default().push(index);
    }
    let mut order = Vec::with_capacity(tasks.len());
    for id in &sorted {
        if let Some(indices) = by_output.remove(id) {
            order.extend(indices);
        }
    }
    // tasks whose output is not connected to anything keep input order
    let mut isolated: Vec<usize> = by_output.into_values().flatten().collect();
    isolated.sort_unstable();
    order.extend(isolated);
    debug!(tasks = tasks.len(), ?order, "execution order");
    Ok(order)
}

/// A Mermaid `graph TD` diagram of the task dependencies. Prompt files get
/// rounded nodes, inputs and outputs rectangular ones.
pub fn dep_diagram(tasks: &[GenerationTask], root: &Path) -> Result<String> {
    let mut ids: HashMap<PathBuf, String> = HashMap::new();
    let mut next_id = 1;
    let mut id_for = |path: &Path, ids: &mut HashMap<PathBuf, String>| {
        ids.entry(path.to_owned())
            .or_insert_with(|| {
                let id = format!("F{next_id:03}");
                next_id += 1;
                id
            })
            .clone()
    };
    let label_for = |path: &Path| {
        path.strip_prefix(root)
            .unwrap_or(path)
            .display()
            .to_string()
    };
    let mut out = String::from("graph TD\n");
    for task in tasks {
        let output = task
            .output()
            .and_then(|o| o.canonical())
            .ok_or_else(|| eyre!("task without an output file cannot be drawn"))?;
        let out_id = id_for(output, &mut ids);
        let out_label = label_for(output);
        for input in task.inputs() {
            if let Some(path) = input.canonical() {
                let in_id = id_for(path, &mut ids);
                out.push_str(&format!(
                    "    {in_id}[\"{}\"] --> {out_id}[\"{out_label}\"]\n",
                    label_for(path)
                ));
            }
        }
        for prompt in task.prompt_inputs() {
            if let Some(path) = prompt.canonical() {
                let in_id = id_for(path, &mut ids);
                out.push_str(&format!(
                    "    {in_id}([\"{}\"]) --> {out_id}[\"{out_label}\"]\n",
                    label_for(path)
                ));
            }
        }
    }
    Ok(out)
}
