//! Fusión determinista de contextos.
//!
//! Los artifacts son inmutables una vez registrados: una clave presente en
//! ambos lados sólo se acepta si los valores son idénticos. Cualquier otra
//! coincidencia es un `MergeCollisionError`.

use std::collections::BTreeMap;

use chrono::Utc;

use crate::errors::MergeCollisionError;
use crate::model::BuildContext;

/// Une `incoming` en `target`. Las claves nuevas se insertan; las existentes
/// deben coincidir exactamente.
pub fn union_into<V>(section: &str,
                     target: &mut BTreeMap<String, V>,
                     incoming: &BTreeMap<String, V>)
                     -> Result<(), MergeCollisionError>
    where V: PartialEq + Clone
{
    for (k, v) in incoming {
        match target.get(k) {
            Some(existing) if existing == v => {}
            Some(_) => {
                return Err(MergeCollisionError { section: section.to_string(),
                                                 key: k.clone() })
            }
            None => {
                target.insert(k.clone(), v.clone());
            }
        }
    }
    Ok(())
}

/// Combina los contextos de ramas independientes del grafo.
///
/// El primero actúa de base: de él se toman `package`, `chainId` y
/// `settings`. `contracts`, `txns` e `imports` se unen con `union_into`.
/// El timestamp resultante nunca es anterior al de ninguna entrada.
/// Devuelve `None` si no hay contextos.
pub fn combine_ctx<I>(contexts: I) -> Result<Option<BuildContext>, MergeCollisionError>
    where I: IntoIterator<Item = BuildContext>
{
    let mut iter = contexts.into_iter();
    let Some(mut out) = iter.next() else {
        return Ok(None);
    };
    let mut latest = out.timestamp;
    for ctx in iter {
        union_into("contracts", &mut out.contracts, &ctx.contracts)?;
        union_into("txns", &mut out.txns, &ctx.txns)?;
        union_into("imports", &mut out.imports, &ctx.imports)?;
        latest = latest.max(ctx.timestamp);
    }
    out.timestamp = latest.max(Utc::now());
    Ok(Some(out))
}
