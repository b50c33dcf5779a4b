//! Envío de transacciones y espera de receipts con cancelación y timeout.

use std::collections::BTreeMap;
use std::thread;
use std::time::Instant;

use serde_json::Value;

use super::runtime::{StepRuntime, TxReceipt, TxRequest};
use crate::errors::ExecutionError;
use crate::model::abi::event_names;
use crate::model::{BuildContext, DecodedEvent};

/// Hace polling del receipt de `hash` hasta obtenerlo, agotar
/// `receipt_timeout` o recibir cancelación. Un receipt con `status = false`
/// es un revert.
pub fn wait_for_receipt(rt: &StepRuntime<'_>, hash: &str) -> Result<TxReceipt, ExecutionError> {
    let started = Instant::now();
    loop {
        rt.ensure_not_cancelled()?;
        if let Some(receipt) = rt.chain.get_transaction_receipt(hash)? {
            if !receipt.status {
                return Err(ExecutionError::Reverted { hash: Some(hash.to_string()),
                                                      reason: "transaction status 0".into() });
            }
            return Ok(receipt);
        }
        if started.elapsed() >= rt.options.receipt_timeout {
            return Err(ExecutionError::Timeout { what: format!("receipt of {hash}"),
                                                 secs: rt.options.receipt_timeout.as_secs() });
        }
        thread::sleep(rt.options.poll_interval);
    }
}

pub fn send_and_wait(rt: &StepRuntime<'_>, tx: &TxRequest) -> Result<(String, TxReceipt), ExecutionError> {
    rt.ensure_not_cancelled()?;
    let hash = rt.chain.send_transaction(tx)?;
    log::debug!("sent {hash} from {}", tx.from);
    let receipt = wait_for_receipt(rt, &hash)?;
    Ok((hash, receipt))
}

/// Agrupa los logs por evento. Sólo se conservan eventos declarados en `abi`
/// o en el ABI de un contrato conocido del contexto con esa dirección.
pub fn decode_events(receipt: &TxReceipt, abi: &Value, ctx: &BuildContext) -> BTreeMap<String, Vec<DecodedEvent>> {
    let declared = event_names(abi);
    let mut out: BTreeMap<String, Vec<DecodedEvent>> = BTreeMap::new();
    for log in &receipt.logs {
        let known = declared.contains(&log.event)
                    || ctx.contract_at(&log.address)
                          .map(|c| event_names(&c.abi).contains(&log.event))
                          .unwrap_or(false);
        if !known {
            continue;
        }
        out.entry(log.event.clone())
           .or_default()
           .push(DecodedEvent { name: log.event.clone(),
                                args: log.args.clone() });
    }
    out
}

/// Valor escalar como string (para settings y direcciones).
pub fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(_) | Value::Bool(_) => Some(value.to_string()),
        _ => None,
    }
}
