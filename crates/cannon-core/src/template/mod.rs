//! Evaluador de expresiones `<%= ruta.con.puntos %>` sobre el contexto.
//!
//! La gramática es deliberadamente restringida: una expresión es sólo una
//! ruta de segmentos separados por `.`. Esto permite extraer estáticamente
//! qué outputs del grafo referencia cada acción (aristas implícitas) y
//! evaluar la misma ruta contra la vista JSON de `BuildContext`.

use std::fmt;

use serde_json::Value;

use crate::errors::TemplateError;
use crate::hashing::to_canonical_json;

pub const OPEN: &str = "<%=";
pub const CLOSE: &str = "%>";

/// Raíces válidas de una ruta.
pub const ROOTS: [&str; 7] = ["contracts", "txns", "imports", "settings", "chainId", "timestamp", "package"];

/// Sección del contexto a la que contribuye una acción.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Section {
    Contracts,
    Txns,
    Imports,
    Settings,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Contracts => "contracts",
            Section::Txns => "txns",
            Section::Imports => "imports",
            Section::Settings => "settings",
        }
    }
}

/// Output nombrado del grafo, p.ej. `contracts.Token`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Output {
    pub section: Section,
    pub name: String,
}

impl Output {
    pub fn new(section: Section, name: impl Into<String>) -> Self {
        Self { section,
               name: name.into() }
    }

    /// Output referenciado por una ruta de contrato estilo `Foo` o `lib.Foo`.
    pub fn for_contract_path(path: &str) -> Option<Self> {
        let mut parts = path.split('.');
        let first = parts.next().filter(|p| !p.is_empty())?;
        Some(match parts.next() {
            None => Output::new(Section::Contracts, first),
            Some(_) => Output::new(Section::Imports, first),
        })
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section.as_str(), self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathExpr {
    segments: Vec<String>,
}

fn valid_segment(seg: &str) -> bool {
    !seg.is_empty() && seg.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '$')
}

impl PathExpr {
    pub fn parse(src: &str) -> Result<Self, TemplateError> {
        let src = src.trim();
        let segments: Vec<String> = src.split('.').map(str::to_string).collect();
        if !segments.iter().all(|s| valid_segment(s)) || !ROOTS.contains(&segments[0].as_str()) {
            return Err(TemplateError::InvalidPath(src.to_string()));
        }
        Ok(Self { segments })
    }

    pub fn root(&self) -> &str {
        &self.segments[0]
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Output del grafo que produce el valor referenciado, si aplica.
    /// `chainId`, `timestamp` y `package` no dependen de ninguna acción.
    pub fn output(&self) -> Option<Output> {
        let name = self.segments.get(1)?;
        let section = match self.root() {
            "contracts" => Section::Contracts,
            "txns" => Section::Txns,
            "imports" => Section::Imports,
            "settings" => Section::Settings,
            _ => return None,
        };
        Some(Output::new(section, name.clone()))
    }

    /// Sigue la ruta sobre `root`; los segmentos numéricos indexan arrays.
    pub fn resolve<'v>(&self, root: &'v Value) -> Option<&'v Value> {
        self.segments.iter().try_fold(root, |cur, seg| match cur {
                                Value::Object(map) => map.get(seg),
                                Value::Array(items) => seg.parse::<usize>().ok().and_then(|i| items.get(i)),
                                _ => None,
                            })
    }
}

impl fmt::Display for PathExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    Literal(String),
    Expr(PathExpr),
}

/// String de config ya tokenizado.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pieces: Vec<Piece>,
}

impl Template {
    pub fn parse(src: &str) -> Result<Self, TemplateError> {
        let mut pieces = Vec::new();
        let mut rest = src;
        while let Some(start) = rest.find(OPEN) {
            if start > 0 {
                pieces.push(Piece::Literal(rest[..start].to_string()));
            }
            let after = &rest[start + OPEN.len()..];
            let end = after.find(CLOSE)
                           .ok_or_else(|| TemplateError::Unterminated(src.to_string()))?;
            pieces.push(Piece::Expr(PathExpr::parse(&after[..end])?));
            rest = &after[end + CLOSE.len()..];
        }
        if !rest.is_empty() {
            pieces.push(Piece::Literal(rest.to_string()));
        }
        Ok(Self { pieces })
    }

    pub fn references(&self) -> impl Iterator<Item = &PathExpr> {
        self.pieces.iter().filter_map(|p| match p {
                              Piece::Expr(e) => Some(e),
                              Piece::Literal(_) => None,
                          })
    }

    pub fn is_literal(&self) -> bool {
        self.references().next().is_none()
    }

    pub fn render(&self, root: &Value) -> Result<String, TemplateError> {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Literal(s) => out.push_str(s),
                Piece::Expr(expr) => {
                    let value = expr.resolve(root)
                                    .ok_or_else(|| TemplateError::Unresolved(expr.to_string()))?;
                    out.push_str(&scalar(value).ok_or_else(|| TemplateError::Unresolved(expr.to_string()))?);
                }
            }
        }
        Ok(out)
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(_) | Value::Number(_) => Some(value.to_string()),
        other => Some(to_canonical_json(other)),
    }
}

pub fn contains_template(s: &str) -> bool {
    s.contains(OPEN)
}

/// Recolecta todas las rutas referenciadas en cualquier string de `value`.
pub fn collect_references(value: &Value, out: &mut Vec<PathExpr>) -> Result<(), TemplateError> {
    match value {
        Value::String(s) if contains_template(s) => {
            out.extend(Template::parse(s)?.references().cloned());
        }
        Value::Array(items) => {
            for item in items {
                collect_references(item, out)?;
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                collect_references(item, out)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Renderiza todos los strings de `value` contra `root`.
pub fn render_value(value: &Value, root: &Value) -> Result<Value, TemplateError> {
    Ok(match value {
        Value::String(s) if contains_template(s) => Value::String(Template::parse(s)?.render(root)?),
        Value::Array(items) => Value::Array(items.iter()
                                                 .map(|v| render_value(v, root))
                                                 .collect::<Result<_, _>>()?),
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), render_value(v, root)?);
            }
            Value::Object(out)
        }
        other => other.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_literals_and_expressions() {
        let t = Template::parse("addr=<%= contracts.Token.address %>;").unwrap();
        let refs: Vec<String> = t.references().map(|r| r.to_string()).collect();
        assert_eq!(refs, vec!["contracts.Token.address"]);
        assert!(!t.is_literal());
        assert!(Template::parse("plain").unwrap().is_literal());
    }

    #[test]
    fn rejects_unterminated_and_non_path_expressions() {
        assert!(matches!(Template::parse("<%= contracts.A"), Err(TemplateError::Unterminated(_))));
        assert!(matches!(Template::parse("<%= contracts.A + 1 %>"), Err(TemplateError::InvalidPath(_))));
        assert!(matches!(Template::parse("<%= process.env.X %>"), Err(TemplateError::InvalidPath(_))));
    }

    #[test]
    fn maps_paths_to_outputs() {
        let p = PathExpr::parse("imports.lib.contracts.Foo.address").unwrap();
        assert_eq!(p.output(), Some(Output::new(Section::Imports, "lib")));
        assert_eq!(PathExpr::parse("chainId").unwrap().output(), None);
        assert_eq!(Output::for_contract_path("lib.Foo"), Some(Output::new(Section::Imports, "lib")));
        assert_eq!(Output::for_contract_path("Foo"), Some(Output::new(Section::Contracts, "Foo")));
    }

    #[test]
    fn renders_nested_values_and_array_indexes() {
        let root = json!({
            "chainId": 5,
            "contracts": {"Token": {"address": "0xabc"}},
            "txns": {"mint": {"events": {"Transfer": [{"args": ["0x1", 7]}]}}}
        });
        let cfg = json!({
            "args": ["<%= contracts.Token.address %>", "chain-<%= chainId %>"],
            "amount": "<%= txns.mint.events.Transfer.0.args.1 %>",
            "n": 3
        });
        let out = render_value(&cfg, &root).unwrap();
        assert_eq!(out, json!({"args": ["0xabc", "chain-5"], "amount": "7", "n": 3}));
    }

    #[test]
    fn unresolved_reference_is_an_error() {
        let err = render_value(&json!("<%= settings.missing %>"), &json!({"settings": {}})).unwrap_err();
        assert_eq!(err, TemplateError::Unresolved("settings.missing".into()));
    }
}
