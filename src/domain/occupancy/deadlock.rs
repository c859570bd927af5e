use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::domain::utils::id::TrainId;

/// Directed "waits for" relation between trains: `a -> b` if `a` is queued on a resource
/// currently held by `b`.
#[derive(Debug, Default, Clone)]
pub struct WaitForGraph {
    edges: BTreeMap<TrainId, BTreeSet<TrainId>>,
}

impl WaitForGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_wait(&mut self, waiter: TrainId, holder: TrainId) {
        if waiter != holder {
            self.edges.entry(waiter).or_default().insert(holder);
        }
    }

    pub fn waits_for(&self, train: &TrainId) -> impl Iterator<Item = &TrainId> + '_ {
        self.edges.get(train).into_iter().flatten()
    }

    /// Finds a cycle that leads back to `start`.
    ///
    /// # Returns
    /// Returns the trains along the cycle beginning with `start`, or `None` if `start` is
    /// not part of any cycle.
    pub fn find_cycle_through(&self, start: &TrainId) -> Option<Vec<TrainId>> {
        let mut visited: HashSet<&TrainId> = HashSet::new();
        // (train, index of the next successor to explore)
        let mut stack: Vec<(&TrainId, usize)> = vec![(start, 0)];
        visited.insert(start);

        while let Some((current, next_index)) = stack.last_mut() {
            let current: &TrainId = current;
            let successor = self.waits_for(current).nth(*next_index);
            *next_index += 1;

            match successor {
                None => {
                    stack.pop();
                }
                Some(next) if next == start => {
                    return Some(stack.iter().map(|(train, _)| (*train).clone()).collect());
                }
                Some(next) => {
                    if visited.insert(next) {
                        stack.push((next, 0));
                    }
                }
            }
        }

        None
    }
}

/// Human readable cycle description, e.g. `"circular wait: A -> B -> A"`.
pub fn describe_cycle(cycle: &[TrainId]) -> String {
    let mut parts: Vec<String> = cycle.iter().map(|train| train.to_string()).collect();
    if let Some(first) = cycle.first() {
        parts.push(first.to_string());
    }
    format!("circular wait: {}", parts.join(" -> "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(id: &str) -> TrainId {
        TrainId::new(id)
    }

    #[test]
    fn finds_two_train_cycle() {
        let mut graph = WaitForGraph::new();
        graph.add_wait(t("A"), t("B"));
        graph.add_wait(t("B"), t("A"));

        assert_eq!(graph.find_cycle_through(&t("A")), Some(vec![t("A"), t("B")]));
        assert_eq!(describe_cycle(&[t("A"), t("B")]), "circular wait: A -> B -> A");
    }

    #[test]
    fn finds_transitive_cycle_and_ignores_chains() {
        let mut graph = WaitForGraph::new();
        graph.add_wait(t("A"), t("B"));
        graph.add_wait(t("B"), t("C"));
        graph.add_wait(t("C"), t("D"));

        assert_eq!(graph.find_cycle_through(&t("A")), None);

        graph.add_wait(t("C"), t("A"));
        assert_eq!(graph.find_cycle_through(&t("A")), Some(vec![t("A"), t("B"), t("C")]));
    }

    #[test]
    fn cycle_not_through_start_is_not_reported() {
        let mut graph = WaitForGraph::new();
        graph.add_wait(t("A"), t("B"));
        graph.add_wait(t("B"), t("C"));
        graph.add_wait(t("C"), t("B"));

        assert_eq!(graph.find_cycle_through(&t("A")), None);
    }
}
