//! Orden topológico (Kahn) con desempate lexicográfico.

use std::collections::{BTreeMap, BTreeSet};

use super::{ActionGraph, GraphReport};
use crate::model::ActionKey;

impl ActionGraph {
    /// Orden total consistente con todas las aristas; entre nodos listos gana
    /// la clave menor. Falla cerrado si hay dependencias ausentes o ciclos.
    pub fn topological_order(&self) -> Result<Vec<ActionKey>, GraphReport> {
        let report = self.validate();
        if report.blocks_ordering() {
            return Err(report);
        }

        let mut indegree: BTreeMap<&ActionKey, usize> = BTreeMap::new();
        let mut dependents: BTreeMap<ActionKey, Vec<&ActionKey>> = BTreeMap::new();
        for node in self.nodes() {
            let deps = self.edges(&node.key);
            indegree.insert(&node.key, deps.len());
            for dep in deps {
                dependents.entry(dep).or_default().push(&node.key);
            }
        }

        let mut ready: BTreeSet<&ActionKey> = indegree.iter().filter(|(_, d)| **d == 0).map(|(k, _)| *k).collect();
        let mut order = Vec::with_capacity(self.len());
        while let Some(key) = ready.pop_first() {
            order.push(key.clone());
            for next in dependents.get(key).into_iter().flatten() {
                if let Some(d) = indegree.get_mut(next) {
                    *d -= 1;
                    if *d == 0 {
                        ready.insert(*next);
                    }
                }
            }
        }

        if order.len() != self.len() {
            // sólo alcanzable si validate no detectó un ciclo
            return Err(report);
        }
        Ok(order)
    }
}
