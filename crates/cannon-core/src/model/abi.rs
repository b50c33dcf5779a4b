//! Lectura mínima de ABIs JSON (sólo nombres y firmas; la codificación es
//! responsabilidad del cliente de cadena).

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbiFunction {
    pub name: String,
    /// `name(type1,type2)`
    pub signature: String,
}

fn entries<'a>(abi: &'a Value, ty: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
    abi.as_array()
       .into_iter()
       .flatten()
       .filter(move |e| e.get("type").and_then(Value::as_str) == Some(ty))
}

fn signature_of(entry: &Value, name: &str) -> String {
    let types: Vec<&str> = entry.get("inputs")
                                .and_then(Value::as_array)
                                .into_iter()
                                .flatten()
                                .filter_map(|i| i.get("type").and_then(Value::as_str))
                                .collect();
    format!("{}({})", name, types.join(","))
}

pub fn functions(abi: &Value) -> Vec<AbiFunction> {
    entries(abi, "function").filter_map(|e| {
                                let name = e.get("name")?.as_str()?;
                                Some(AbiFunction { name: name.to_string(),
                                                   signature: signature_of(e, name) })
                            })
                            .collect()
}

pub fn event_names(abi: &Value) -> Vec<String> {
    entries(abi, "event").filter_map(|e| e.get("name").and_then(Value::as_str).map(str::to_string))
                         .collect()
}

/// Busca una función por nombre o por firma completa.
pub fn find_function(abi: &Value, func: &str) -> Option<AbiFunction> {
    functions(abi).into_iter()
                  .find(|f| f.name == func || f.signature == func)
}
