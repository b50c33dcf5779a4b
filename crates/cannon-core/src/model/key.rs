//! `ActionKey` (`"<kind>.<label>"`) y el conjunto cerrado de kinds.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DefinitionError;

/// Kinds de acción soportados. Añadir uno nuevo es añadir una variante aquí
/// y su rama en `step::StepConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Deploy,
    Contract,
    Invoke,
    Router,
    Clone,
    Pull,
    Import,
    Provision,
    Keeper,
    Var,
}

impl ActionKind {
    pub const ALL: [ActionKind; 10] = [ActionKind::Deploy,
                                       ActionKind::Contract,
                                       ActionKind::Invoke,
                                       ActionKind::Router,
                                       ActionKind::Clone,
                                       ActionKind::Pull,
                                       ActionKind::Import,
                                       ActionKind::Provision,
                                       ActionKind::Keeper,
                                       ActionKind::Var];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Deploy => "deploy",
            ActionKind::Contract => "contract",
            ActionKind::Invoke => "invoke",
            ActionKind::Router => "router",
            ActionKind::Clone => "clone",
            ActionKind::Pull => "pull",
            ActionKind::Import => "import",
            ActionKind::Provision => "provision",
            ActionKind::Keeper => "keeper",
            ActionKind::Var => "var",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionKind::ALL.iter()
                       .copied()
                       .find(|k| k.as_str() == s)
                       .ok_or_else(|| s.to_string())
    }
}

/// Clave única de una acción dentro del grafo.
///
/// Se ordena y compara por su forma textual completa, de modo que el orden
/// lexicográfico de las claves es el desempate del orden topológico.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ActionKey {
    raw: String,
    kind: ActionKind,
}

impl ActionKey {
    pub fn new(kind: ActionKind, label: &str) -> Result<Self, DefinitionError> {
        Self::parse(&format!("{}.{}", kind.as_str(), label))
    }

    pub fn parse(raw: &str) -> Result<Self, DefinitionError> {
        let (kind, label) = raw.split_once('.')
                               .ok_or_else(|| DefinitionError::InvalidKey(raw.to_string()))?;
        if !is_valid_label(label) {
            return Err(DefinitionError::InvalidKey(raw.to_string()));
        }
        let kind = kind.parse::<ActionKind>()
                       .map_err(|kind| DefinitionError::UnknownKind { key: raw.to_string(),
                                                                      kind })?;
        Ok(Self { raw: raw.to_string(),
                  kind })
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.raw[self.kind.as_str().len() + 1..]
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

pub(crate) fn is_valid_label(label: &str) -> bool {
    !label.is_empty() && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl PartialEq for ActionKey {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for ActionKey {}

impl Hash for ActionKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state)
    }
}

impl PartialOrd for ActionKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ActionKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl fmt::Display for ActionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for ActionKey {
    type Err = DefinitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ActionKey {
    type Error = DefinitionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ActionKey> for String {
    fn from(value: ActionKey) -> Self {
        value.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_kind_and_label() {
        let key = ActionKey::parse("deploy.Token").unwrap();
        assert_eq!(key.kind(), ActionKind::Deploy);
        assert_eq!(key.label(), "Token");
        assert_eq!(key.to_string(), "deploy.Token");
    }

    #[test]
    fn rejects_legacy_colon_delimiter() {
        assert!(matches!(ActionKey::parse("deploy:Token"), Err(DefinitionError::InvalidKey(_))));
    }

    #[test]
    fn rejects_unknown_kind_and_nested_label() {
        assert!(matches!(ActionKey::parse("deplo.Token"), Err(DefinitionError::UnknownKind { .. })));
        assert!(ActionKey::parse("deploy.a.b").is_err());
        assert!(ActionKey::parse("deploy.").is_err());
    }

    #[test]
    fn orders_lexicographically_by_full_key() {
        let mut keys = vec![ActionKey::parse("var.a").unwrap(),
                            ActionKey::parse("clone.z").unwrap(),
                            ActionKey::parse("deploy.b").unwrap()];
        keys.sort();
        let raw: Vec<&str> = keys.iter().map(|k| k.as_str()).collect();
        assert_eq!(raw, vec!["clone.z", "deploy.b", "var.a"]);
    }
}
