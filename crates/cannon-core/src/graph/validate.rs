//! Validación estructural del grafo.
//!
//! Se reportan todos los problemas a la vez para que el autor pueda
//! corregirlos en una sola pasada.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::ActionGraph;
use crate::model::ActionKey;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingDependency {
    pub node: ActionKey,
    /// Clave de acción o output (`contracts.Foo`) sin definir.
    pub dependency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtraneousDependency {
    pub node: ActionKey,
    pub extraneous: ActionKey,
    pub in_dep: ActionKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConflict {
    pub output: String,
    pub providers: Vec<ActionKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GraphReport {
    pub missing: Vec<MissingDependency>,
    /// Cada ciclo empieza en el nodo por el que se re-entró.
    pub cycles: Vec<Vec<ActionKey>>,
    pub extraneous: Vec<ExtraneousDependency>,
    pub conflicts: Vec<OutputConflict>,
}

impl GraphReport {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.cycles.is_empty() && self.extraneous.is_empty() && self.conflicts.is_empty()
    }

    /// Problemas que impiden calcular un orden.
    pub fn blocks_ordering(&self) -> bool {
        !self.missing.is_empty() || !self.cycles.is_empty()
    }
}

impl fmt::Display for GraphReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for m in &self.missing {
            writeln!(f, "missing dependency: `{}` -> `{}`", m.node, m.dependency)?;
        }
        for cycle in &self.cycles {
            let path: Vec<&str> = cycle.iter().chain(cycle.first()).map(ActionKey::as_str).collect();
            writeln!(f, "dependency cycle: {}", path.join(" -> "))?;
        }
        for e in &self.extraneous {
            writeln!(f,
                     "extraneous dependency: `{}` depends on `{}`, already implied by `{}`",
                     e.node, e.extraneous, e.in_dep)?;
        }
        for c in &self.conflicts {
            let keys: Vec<&str> = c.providers.iter().map(ActionKey::as_str).collect();
            writeln!(f, "output conflict: `{}` provided by {}", c.output, keys.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

impl ActionGraph {
    /// Dependencias existentes de `key` (las ausentes van a `missing`).
    pub(super) fn edges(&self, key: &ActionKey) -> Vec<ActionKey> {
        self.depends_on(key).into_iter().filter(|d| self.contains(d)).collect()
    }

    pub fn validate(&self) -> GraphReport {
        GraphReport { missing: self.find_missing(),
                      cycles: self.find_cycles(),
                      extraneous: self.find_extraneous(),
                      conflicts: self.find_conflicts() }
    }

    fn find_missing(&self) -> Vec<MissingDependency> {
        let mut out = Vec::new();
        for node in self.nodes() {
            for dep in node.explicit.iter().filter(|d| !self.contains(d)) {
                out.push(MissingDependency { node: node.key.clone(),
                                             dependency: dep.to_string() });
            }
            for output in &node.unresolved {
                out.push(MissingDependency { node: node.key.clone(),
                                             dependency: output.to_string() });
            }
        }
        out
    }

    /// DFS iterativo con marcado blanco/gris/negro en orden lexicográfico.
    /// Cada arista hacia un nodo gris cierra un ciclo: el tramo de la pila
    /// desde ese nodo.
    fn find_cycles(&self) -> Vec<Vec<ActionKey>> {
        let mut color: BTreeMap<ActionKey, Color> = BTreeMap::new();
        let mut cycles = Vec::new();
        for root in self.keys() {
            if color.get(root).copied().unwrap_or(Color::White) != Color::White {
                continue;
            }
            // (nodo, dependencias, siguiente dependencia a visitar)
            let mut stack: Vec<(ActionKey, Vec<ActionKey>, usize)> = vec![(root.clone(), self.edges(root), 0)];
            color.insert(root.clone(), Color::Gray);
            while let Some((key, deps, next)) = stack.last_mut() {
                let Some(dep) = deps.get(*next).cloned() else {
                    color.insert(key.clone(), Color::Black);
                    stack.pop();
                    continue;
                };
                *next += 1;
                match color.get(&dep).copied().unwrap_or(Color::White) {
                    Color::White => {
                        color.insert(dep.clone(), Color::Gray);
                        let edges = self.edges(&dep);
                        stack.push((dep, edges, 0));
                    }
                    Color::Gray => {
                        if let Some(pos) = stack.iter().position(|(k, _, _)| *k == dep) {
                            cycles.push(stack[pos..].iter().map(|(k, _, _)| k.clone()).collect());
                        }
                    }
                    Color::Black => {}
                }
            }
        }
        cycles
    }

    fn reaches(&self, from: &ActionKey, to: &ActionKey) -> bool {
        let mut seen = BTreeSet::new();
        let mut pending = vec![from.clone()];
        while let Some(k) = pending.pop() {
            if &k == to {
                return true;
            }
            if seen.insert(k.clone()) {
                pending.extend(self.edges(&k));
            }
        }
        false
    }

    /// `A -> C` declarado explícitamente cuando otra dependencia `B` de `A`
    /// ya alcanza `C`.
    fn find_extraneous(&self) -> Vec<ExtraneousDependency> {
        let mut out = Vec::new();
        for node in self.nodes() {
            let deps = self.edges(&node.key);
            for c in node.explicit.iter().filter(|c| self.contains(c)) {
                if let Some(b) = deps.iter().find(|b| *b != c && self.reaches(b, c)) {
                    out.push(ExtraneousDependency { node: node.key.clone(),
                                                    extraneous: c.clone(),
                                                    in_dep: b.clone() });
                }
            }
        }
        out
    }

    fn find_conflicts(&self) -> Vec<OutputConflict> {
        self.providers
            .iter()
            .filter(|(_, keys)| keys.len() > 1)
            .map(|(output, keys)| OutputConflict { output: output.to_string(),
                                                   providers: keys.clone() })
            .collect()
    }
}
