//! Renderizado de la config de una acción contra el contexto acumulado.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::errors::{SchemaError, StepError, TemplateError};
use crate::model::BuildContext;
use crate::template;

/// Renderiza todos los strings de `value` usando la vista JSON de `ctx`.
pub fn render_value(value: &Value, ctx: &BuildContext) -> Result<Value, TemplateError> {
    template::render_value(value, &ctx.to_value())
}

/// Renderiza una config tipada: se serializa, se renderiza cada string y se
/// vuelve a deserializar al mismo tipo.
pub fn render_config<C>(key: &str, config: &C, ctx: &BuildContext) -> Result<C, StepError>
    where C: Serialize + DeserializeOwned
{
    let raw = serde_json::to_value(config).map_err(|e| SchemaError::new(key, e.to_string()))?;
    let rendered = render_value(&raw, ctx).map_err(crate::errors::ExecutionError::Render)?;
    serde_json::from_value(rendered).map_err(|e| SchemaError::new(key, e.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PackageMeta;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Cfg {
        target: String,
        args: Vec<Value>,
    }

    #[test]
    fn renders_typed_config() {
        let mut ctx = BuildContext::new(PackageMeta::new("app", "1.0.0"), 1);
        ctx.settings.insert("owner".into(), "0xowner".into());
        let cfg = Cfg { target: "Token".into(),
                        args: vec![json!("<%= settings.owner %>"), json!(5)] };
        let out = render_config("invoke.mint", &cfg, &ctx).unwrap();
        assert_eq!(out.args, vec![json!("0xowner"), json!(5)]);
    }
}
