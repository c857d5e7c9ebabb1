use crate::domain::errors::{DomainResult, OrchestrationError};
use crate::domain::models::Task;
use std::collections::{HashMap, HashSet, VecDeque};
use uuid::Uuid;

/// Adjacency list: task id → ids it depends on.
pub type DependencyGraph = HashMap<Uuid, Vec<Uuid>>;

/// Graph algorithms over task dependencies: cycle detection, reachability
/// and wave ordering.
#[derive(Debug, Clone, Default)]
pub struct DependencyResolver;

// Standalone helper for cycle detection (no self needed)
fn detect_cycle_util(
    node: Uuid,
    graph: &DependencyGraph,
    visited: &mut HashSet<Uuid>,
    rec_stack: &mut HashSet<Uuid>,
    path: &mut Vec<Uuid>,
) -> bool {
    visited.insert(node);
    rec_stack.insert(node);
    path.push(node);

    if let Some(neighbors) = graph.get(&node) {
        for &neighbor in neighbors {
            if !visited.contains(&neighbor) {
                if detect_cycle_util(neighbor, graph, visited, rec_stack, path) {
                    return true;
                }
            } else if rec_stack.contains(&neighbor) {
                if let Some(cycle_start) = path.iter().position(|&id| id == neighbor) {
                    path.drain(0..cycle_start);
                    // Close the loop so the path reads A -> B -> A
                    path.push(neighbor);
                    return true;
                }
            }
        }
    }

    rec_stack.remove(&node);
    path.pop();
    false
}

impl DependencyResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn graph_of(tasks: &[Task]) -> DependencyGraph {
        tasks
            .iter()
            .map(|t| (t.id, t.depends_on.clone()))
            .collect()
    }

    /// Validate that all dependencies exist in `known` or among `tasks` themselves.
    pub fn validate_dependencies(
        &self,
        tasks: &[Task],
        known: &HashSet<Uuid>,
    ) -> DomainResult<()> {
        let batch: HashSet<Uuid> = tasks.iter().map(|t| t.id).collect();
        for task in tasks {
            for dep_id in &task.depends_on {
                if !known.contains(dep_id) && !batch.contains(dep_id) {
                    return Err(OrchestrationError::UnknownDependency {
                        task: task.id,
                        dependency: *dep_id,
                    });
                }
            }
        }
        Ok(())
    }

    /// Detect circular dependencies. Returns the closed cycle path when found.
    pub fn detect_cycle(&self, graph: &DependencyGraph) -> Option<Vec<Uuid>> {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        // Sorted start order keeps the reported path stable between runs
        let mut roots: Vec<Uuid> = graph.keys().copied().collect();
        roots.sort_unstable();

        for task_id in roots {
            if !visited.contains(&task_id)
                && detect_cycle_util(task_id, graph, &mut visited, &mut rec_stack, &mut path)
            {
                return Some(path);
            }
        }

        None
    }

    /// Would adding `task -> dependency` close a cycle? Returns the cycle
    /// path (starting and ending at `task`) if so.
    pub fn path_closing_edge(
        &self,
        graph: &DependencyGraph,
        task: Uuid,
        dependency: Uuid,
    ) -> Option<Vec<Uuid>> {
        if task == dependency {
            return Some(vec![task, task]);
        }
        // Search for `task` among the dependency's own ancestors
        let mut parents: HashMap<Uuid, Uuid> = HashMap::new();
        let mut queue = VecDeque::from([dependency]);
        let mut seen = HashSet::from([dependency]);

        while let Some(node) = queue.pop_front() {
            for &next in graph.get(&node).map_or(&[][..], Vec::as_slice) {
                if !seen.insert(next) {
                    continue;
                }
                parents.insert(next, node);
                if next == task {
                    let mut path = vec![task];
                    let mut cursor = task;
                    while let Some(&prev) = parents.get(&cursor) {
                        path.push(prev);
                        cursor = prev;
                    }
                    // path is task <- ... <- dependency; the new edge leads task -> dependency
                    path.reverse();
                    path.insert(0, task);
                    return Some(path);
                }
                queue.push_back(next);
            }
        }
        None
    }

    /// Every task that transitively depends on `root`, in breadth-first order.
    pub fn transitive_dependents(
        &self,
        dependents: &HashMap<Uuid, Vec<Uuid>>,
        root: Uuid,
    ) -> Vec<Uuid> {
        let mut out = Vec::new();
        let mut seen = HashSet::from([root]);
        let mut queue = VecDeque::from([root]);
        while let Some(node) = queue.pop_front() {
            for &child in dependents.get(&node).map_or(&[][..], Vec::as_slice) {
                if seen.insert(child) {
                    out.push(child);
                    queue.push_back(child);
                }
            }
        }
        out
    }

    /// Group tasks into waves: each wave only depends on earlier waves.
    /// Kahn's algorithm, one level at a time.
    pub fn execution_waves(&self, tasks: &[Task]) -> DomainResult<Vec<Vec<Uuid>>> {
        let graph = Self::graph_of(tasks);
        if let Some(cycle) = self.detect_cycle(&graph) {
            return Err(OrchestrationError::CycleDetected(cycle));
        }

        let mut in_degree: HashMap<Uuid, usize> = HashMap::new();
        let mut reverse: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for task in tasks {
            in_degree.entry(task.id).or_insert(0);
            for &dep_id in &task.depends_on {
                if graph.contains_key(&dep_id) {
                    reverse.entry(dep_id).or_default().push(task.id);
                    *in_degree.entry(task.id).or_insert(0) += 1;
                }
            }
        }

        // Keep input order inside a wave
        let mut current: Vec<Uuid> = tasks
            .iter()
            .filter(|t| in_degree.get(&t.id) == Some(&0))
            .map(|t| t.id)
            .collect();
        let order: HashMap<Uuid, usize> =
            tasks.iter().enumerate().map(|(i, t)| (t.id, i)).collect();

        let mut waves = Vec::new();
        let mut placed = 0;
        while !current.is_empty() {
            placed += current.len();
            let mut next = Vec::new();
            for node in &current {
                for &child in reverse.get(node).map_or(&[][..], Vec::as_slice) {
                    if let Some(degree) = in_degree.get_mut(&child) {
                        *degree -= 1;
                        if *degree == 0 {
                            next.push(child);
                        }
                    }
                }
            }
            next.sort_by_key(|id| order.get(id).copied().unwrap_or(usize::MAX));
            waves.push(std::mem::replace(&mut current, next));
        }

        if placed != tasks.len() {
            return Err(OrchestrationError::Validation(
                "topological ordering failed: graph is not a DAG".to_string(),
            ));
        }
        Ok(waves)
    }

    /// Calculate the dependency depth for a task (0 for roots).
    pub fn calculate_depth(&self, task: Uuid, graph: &DependencyGraph) -> DomainResult<u32> {
        let mut visited = HashSet::new();
        calculate_depth_recursive(task, graph, &mut visited)
    }
}

// Standalone helper for depth calculation
fn calculate_depth_recursive(
    task: Uuid,
    graph: &DependencyGraph,
    visited: &mut HashSet<Uuid>,
) -> DomainResult<u32> {
    if !visited.insert(task) {
        return Err(OrchestrationError::CycleDetected(vec![task, task]));
    }

    let deps = graph.get(&task).map_or(&[][..], Vec::as_slice);
    let mut max_depth = 0;
    for &dep_id in deps {
        if graph.contains_key(&dep_id) {
            max_depth = max_depth.max(calculate_depth_recursive(dep_id, graph, visited)? + 1);
        }
    }

    visited.remove(&task);
    Ok(max_depth)
}
