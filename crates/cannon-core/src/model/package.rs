//! Referencias de paquete (`name:version@preset`) y variantes
//! (`<chainId>-<preset>`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_PRESET, DEFAULT_VERSION};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageRef {
    pub name: String,
    pub version: String,
    pub preset: String,
}

impl PackageRef {
    pub fn new(name: impl Into<String>, version: impl Into<String>, preset: impl Into<String>) -> Self {
        Self { name: name.into(),
               version: version.into(),
               preset: preset.into() }
    }

    /// Acepta `name`, `name:version`, `name@preset` y `name:version@preset`.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        let (rest, preset) = match raw.split_once('@') {
            Some((rest, preset)) => (rest, preset),
            None => (raw, DEFAULT_PRESET),
        };
        let (name, version) = match rest.split_once(':') {
            Some((name, version)) => (name, version),
            None => (rest, DEFAULT_VERSION),
        };
        let pkg = Self::new(name, version, preset);
        pkg.validate().map_err(|what| format!("invalid package {what} in `{raw}`"))?;
        Ok(pkg)
    }

    /// Cada parte acaba siendo un segmento de ruta en el store: sólo
    /// `[A-Za-z0-9._-]`, y nunca `.` o `..`. Devuelve la parte inválida.
    pub fn validate(&self) -> Result<(), &'static str> {
        for (part, what) in [(&self.name, "name"), (&self.version, "version"), (&self.preset, "preset")] {
            let allowed = part.chars().all(|c| c.is_ascii_alphanumeric() || "-_.".contains(c));
            if part.is_empty() || !allowed || part.chars().all(|c| c == '.') {
                return Err(what);
            }
        }
        Ok(())
    }

    /// Misma referencia con otro preset.
    pub fn with_preset(&self, preset: &str) -> Self {
        Self::new(&self.name, &self.version, preset)
    }

    pub fn with_version(&self, version: &str) -> Self {
        Self::new(&self.name, version, &self.preset)
    }

    /// `name:version` sin preset (identidad de la definición).
    pub fn package_id(&self) -> String {
        format!("{}:{}", self.name, self.version)
    }

    pub fn variant(&self, chain_id: u64) -> Variant {
        Variant::new(chain_id, &self.preset)
    }
}

impl fmt::Display for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.name, self.version, self.preset)
    }
}

impl FromStr for PackageRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PackageRef {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PackageRef> for String {
    fn from(value: PackageRef) -> Self {
        value.to_string()
    }
}

/// Destino concreto de un despliegue: par `(chainId, preset)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Variant {
    pub chain_id: u64,
    pub preset: String,
}

impl Variant {
    pub fn new(chain_id: u64, preset: &str) -> Self {
        Self { chain_id,
               preset: preset.to_string() }
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        let (chain, preset) = raw.split_once('-')
                                 .ok_or_else(|| format!("invalid variant `{raw}`"))?;
        let chain_id = chain.parse::<u64>()
                            .map_err(|e| format!("invalid chain id in variant `{raw}`: {e}"))?;
        if preset.is_empty() {
            return Err(format!("empty preset in variant `{raw}`"));
        }
        Ok(Self::new(chain_id, preset))
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.chain_id, self.preset)
    }
}
