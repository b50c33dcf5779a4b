//! Grafo de acciones: parseo del mapa crudo, dependencias explícitas e
//! implícitas, validación y orden topológico.
//!
//! Las aristas implícitas se obtienen estáticamente: cada string de la
//! config se tokeniza con `template` y cada ruta se mapea al nodo que
//! provee ese output (`contracts.Foo` -> la acción que registra `Foo`).

mod order;
mod validate;

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::errors::{DefinitionError, SchemaError};
use crate::hashing::hash_value;
use crate::model::{ActionKey, ActionKind, RawActionMap};
use crate::step::{default_provides, ImportRequirement, StepConfig};
use crate::template::{collect_references, Output, PathExpr, Section};

pub use validate::{ExtraneousDependency, GraphReport, MissingDependency, OutputConflict};

#[derive(Debug, Clone, PartialEq)]
pub struct ActionNode {
    pub key: ActionKey,
    pub raw: Value,
    /// Resultado de `validate_config`. Un error de schema no invalida el
    /// grafo: se reporta al ejecutar la acción.
    pub config: Result<StepConfig, SchemaError>,
    /// Claves listadas en `depends`.
    pub explicit: BTreeSet<ActionKey>,
    /// Nodos que proveen outputs referenciados por la config.
    pub implicit: BTreeSet<ActionKey>,
    /// Outputs referenciados sin proveedor.
    pub unresolved: Vec<Output>,
    pub provides: Vec<Output>,
}

impl ActionNode {
    pub fn kind(&self) -> ActionKind {
        self.key.kind()
    }

    /// Unión de dependencias explícitas e implícitas.
    pub fn depends_on(&self) -> BTreeSet<ActionKey> {
        self.explicit.union(&self.implicit).cloned().collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionGraph {
    nodes: BTreeMap<ActionKey, ActionNode>,
    raw: RawActionMap,
    /// Output -> acciones que lo proveen.
    providers: BTreeMap<Output, Vec<ActionKey>>,
}

fn parse_depends(key: &ActionKey, raw: &Value) -> Result<BTreeSet<ActionKey>, DefinitionError> {
    let invalid = |message: String| DefinitionError::InvalidDepends { key: key.to_string(),
                                                                       message };
    match raw.get("depends") {
        None | Some(Value::Null) => Ok(BTreeSet::new()),
        Some(Value::Array(items)) => items.iter()
                                          .map(|item| {
                                              let s = item.as_str()
                                                          .ok_or_else(|| invalid(format!("expected string, got {item}")))?;
                                              ActionKey::parse(s).map_err(|e| invalid(e.to_string()))
                                          })
                                          .collect(),
        Some(other) => Err(invalid(format!("expected array, got {other}"))),
    }
}

/// Rutas referenciadas en la config, sin contar `depends`.
fn template_references(key: &ActionKey, raw: &Value) -> Result<Vec<PathExpr>, DefinitionError> {
    let mut refs = Vec::new();
    if let Value::Object(map) = raw {
        for (field, value) in map {
            if field == "depends" {
                continue;
            }
            collect_references(value, &mut refs).map_err(|source| DefinitionError::Template { key: key.to_string(),
                                                                                             source })?;
        }
    }
    Ok(refs)
}

impl ActionGraph {
    /// Construye el grafo. Falla sólo ante errores de definición (claves,
    /// `depends` o templates mal formados); los problemas estructurales se
    /// reportan con `validate`.
    pub fn parse(raw: &RawActionMap) -> Result<Self, DefinitionError> {
        struct Parsed {
            key: ActionKey,
            raw: Value,
            config: Result<StepConfig, SchemaError>,
            explicit: BTreeSet<ActionKey>,
            refs: Vec<Output>,
            provides: Vec<Output>,
        }

        let mut parsed = Vec::with_capacity(raw.len());
        for (name, value) in raw {
            let key = ActionKey::parse(name)?;
            if !value.is_object() {
                return Err(DefinitionError::ConfigNotObject(name.clone()));
            }
            let explicit = parse_depends(&key, value)?;
            let mut refs: Vec<Output> = template_references(&key, value)?.iter()
                                                                           .filter_map(PathExpr::output)
                                                                           .collect();
            let config = StepConfig::validate(&key, value);
            let provides = match &config {
                Ok(cfg) => {
                    refs.extend(cfg.references());
                    cfg.provides(&key)
                }
                Err(_) => default_provides(&key),
            };
            parsed.push(Parsed { key,
                                 raw: value.clone(),
                                 config,
                                 explicit,
                                 refs,
                                 provides });
        }

        let mut providers: BTreeMap<Output, Vec<ActionKey>> = BTreeMap::new();
        for p in &parsed {
            for out in &p.provides {
                providers.entry(out.clone()).or_default().push(p.key.clone());
            }
        }

        let mut nodes = BTreeMap::new();
        for p in parsed {
            let mut implicit = BTreeSet::new();
            let mut unresolved = Vec::new();
            for out in p.refs {
                match providers.get(&out) {
                    Some(keys) => implicit.extend(keys.iter().filter(|k| **k != p.key).cloned()),
                    // settings sin proveedor se resuelven al renderizar
                    None if out.section == Section::Settings => {}
                    None => {
                        if !unresolved.contains(&out) {
                            unresolved.push(out)
                        }
                    }
                }
            }
            nodes.insert(p.key.clone(),
                         ActionNode { key: p.key,
                                      raw: p.raw,
                                      config: p.config,
                                      explicit: p.explicit,
                                      implicit,
                                      unresolved,
                                      provides: p.provides });
        }

        Ok(Self { nodes,
                  raw: raw.clone(),
                  providers })
    }

    /// Parsea un mapa JSON (p.ej. `PackageRecord::def` serializado).
    pub fn from_value(value: &Value) -> Result<Self, DefinitionError> {
        let map = value.as_object().ok_or(DefinitionError::NotAnObject)?;
        let raw: RawActionMap = map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        Self::parse(&raw)
    }

    pub fn contains(&self, key: &ActionKey) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn node(&self, key: &ActionKey) -> Option<&ActionNode> {
        self.nodes.get(key)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ActionNode> {
        self.nodes.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ActionKey> {
        self.nodes.keys()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Dependencias (explícitas + implícitas) de `key`.
    pub fn depends_on(&self, key: &ActionKey) -> BTreeSet<ActionKey> {
        self.nodes.get(key).map(ActionNode::depends_on).unwrap_or_default()
    }

    pub fn raw(&self) -> &RawActionMap {
        &self.raw
    }

    /// Hash canónico de la definición (independiente del orden de claves).
    pub fn definition_hash(&self) -> String {
        let map: serde_json::Map<String, Value> = self.raw.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        hash_value(&Value::Object(map))
    }

    /// Coordenadas upstream de una acción clone/pull/import/provision.
    pub fn required_imports(&self, key: &ActionKey) -> Vec<ImportRequirement> {
        match self.nodes.get(key).map(|n| &n.config) {
            Some(Ok(cfg)) => cfg.required_imports(),
            _ => Vec::new(),
        }
    }

    /// Todas las coordenadas upstream del grafo, sin duplicados.
    pub fn all_required_imports(&self) -> Vec<ImportRequirement> {
        let all: BTreeSet<ImportRequirement> = self.nodes.keys().flat_map(|k| self.required_imports(k)).collect();
        all.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn raw(v: Value) -> RawActionMap {
        v.as_object().unwrap().iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    #[test]
    fn template_references_imply_edges() {
        let g = ActionGraph::parse(&raw(json!({
            "deploy.Token": {"artifact": "Token"},
            "invoke.mint": {"target": "Token", "func": "mint", "args": ["<%= contracts.Token.address %>"]}
        }))).unwrap();
        let mint = ActionKey::parse("invoke.mint").unwrap();
        let token = ActionKey::parse("deploy.Token").unwrap();
        assert_eq!(g.depends_on(&mint), BTreeSet::from([token]));
        assert!(g.node(&mint).unwrap().explicit.is_empty());
    }

    #[test]
    fn imports_paths_resolve_to_package_actions() {
        let g = ActionGraph::parse(&raw(json!({
            "clone.lib": {"source": "lib:1.0.0"},
            "invoke.init": {"target": "lib.Foo", "func": "init", "args": ["<%= imports.lib.contracts.Foo.address %>"]}
        }))).unwrap();
        let init = ActionKey::parse("invoke.init").unwrap();
        assert_eq!(g.depends_on(&init), BTreeSet::from([ActionKey::parse("clone.lib").unwrap()]));
    }

    #[test]
    fn caller_settings_do_not_imply_edges() {
        let g = ActionGraph::parse(&raw(json!({
            "deploy.Token": {"artifact": "Token", "args": ["<%= settings.owner %>", "<%= chainId %>"]}
        }))).unwrap();
        let node = g.node(&ActionKey::parse("deploy.Token").unwrap()).unwrap();
        assert!(node.implicit.is_empty());
        assert!(node.unresolved.is_empty());
    }

    #[test]
    fn var_settings_imply_edges() {
        let g = ActionGraph::parse(&raw(json!({
            "var.main": {"defaults": {"owner": "0x1"}},
            "deploy.Token": {"artifact": "Token", "args": ["<%= settings.owner %>"]}
        }))).unwrap();
        assert_eq!(g.depends_on(&ActionKey::parse("deploy.Token").unwrap()),
                   BTreeSet::from([ActionKey::parse("var.main").unwrap()]));
    }

    #[test]
    fn definition_errors() {
        assert!(matches!(ActionGraph::parse(&raw(json!({"deploy:Token": {}}))),
                         Err(DefinitionError::InvalidKey(_))));
        assert!(matches!(ActionGraph::parse(&raw(json!({"deploy.A": {"artifact": "A", "depends": "deploy.B"}}))),
                         Err(DefinitionError::InvalidDepends { .. })));
        assert!(matches!(ActionGraph::parse(&raw(json!({"deploy.A": {"artifact": "<%= contracts.B"}}))),
                         Err(DefinitionError::Template { .. })));
        assert!(matches!(ActionGraph::from_value(&json!([])), Err(DefinitionError::NotAnObject)));
    }

    #[test]
    fn schema_errors_are_kept_on_the_node() {
        let g = ActionGraph::parse(&raw(json!({"deploy.A": {"args": []}}))).unwrap();
        let node = g.node(&ActionKey::parse("deploy.A").unwrap()).unwrap();
        assert!(node.config.is_err());
        assert_eq!(node.provides, vec![Output::new(Section::Contracts, "A")]);
    }

    #[test]
    fn required_imports_are_collected() {
        let g = ActionGraph::parse(&raw(json!({
            "import.a": {"source": "a:1.0.0", "chainId": 1},
            "provision.b": {"sources": ["b:1.0.0", "b:0.9.0"]},
            "deploy.X": {"artifact": "X"}
        }))).unwrap();
        let imports = g.all_required_imports();
        assert_eq!(imports.len(), 3);
        assert_eq!(g.required_imports(&ActionKey::parse("import.a").unwrap())[0].chain_id, Some(1));
        assert!(g.required_imports(&ActionKey::parse("deploy.X").unwrap()).is_empty());
    }

    #[test]
    fn definition_hash_ignores_declaration_order() {
        let a = ActionGraph::parse(&raw(json!({"deploy.A": {"artifact": "A"}, "deploy.B": {"artifact": "B"}}))).unwrap();
        let mut reordered = RawActionMap::new();
        reordered.insert("deploy.B".into(), json!({"artifact": "B"}));
        reordered.insert("deploy.A".into(), json!({"artifact": "A"}));
        let b = ActionGraph::parse(&reordered).unwrap();
        assert_eq!(a.definition_hash(), b.definition_hash());
    }
}
