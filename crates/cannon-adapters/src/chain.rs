//! Cadena simulada.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use cannon_core::errors::ExecutionError;
use cannon_core::hashing::{hash_str, hash_value};
use cannon_core::step::{ChainClient, RawLog, TxInput, TxReceipt, TxRequest};
use serde_json::{json, Value};

pub const DEFAULT_SIGNER: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

#[derive(Debug, Clone)]
struct EmitSpec {
    event: String,
    args: Vec<Value>,
}

#[derive(Debug, Default)]
struct ChainState {
    block: u64,
    nonces: HashMap<String, u64>,
    receipts: HashMap<String, TxReceipt>,
    code: HashMap<String, String>,
    sent: Vec<TxRequest>,
    reverts: HashSet<String>,
    emits: HashMap<String, Vec<EmitSpec>>,
    withhold_receipts: bool,
}

#[derive(Debug)]
pub struct SimulatedChain {
    chain_id: u64,
    default_signer: String,
    inner: Mutex<ChainState>,
}

/// `transfer(address,uint256)` -> `transfer`
fn function_name(signature: &str) -> &str {
    signature.split('(').next().unwrap_or(signature)
}

/// Dirección de creación derivada de (firmante, nonce).
pub fn create_address(from: &str, nonce: u64) -> String {
    format!("0x{}", &hash_str(&format!("{}:{nonce}", from.to_lowercase()))[..40])
}

impl SimulatedChain {
    pub fn new(chain_id: u64) -> Self {
        Self { chain_id,
               default_signer: DEFAULT_SIGNER.to_string(),
               inner: Mutex::new(ChainState::default()) }
    }

    pub fn with_signer(mut self, signer: &str) -> Self {
        self.default_signer = signer.to_lowercase();
        self
    }

    fn state(&self) -> Result<MutexGuard<'_, ChainState>, ExecutionError> {
        self.inner.lock().map_err(|_| ExecutionError::Chain("simulated chain state poisoned".into()))
    }

    /// Las llamadas a `function` (nombre o firma) revierten hasta
    /// `clear_revert`. Un revert no consume nonce.
    pub fn revert_on(&self, function: &str) {
        if let Ok(mut s) = self.state() {
            s.reverts.insert(function.to_string());
        }
    }

    pub fn clear_revert(&self, function: &str) {
        if let Ok(mut s) = self.state() {
            s.reverts.remove(function);
        }
    }

    /// Cada llamada a `function` emite `event(args)` desde el contrato llamado.
    pub fn emit_on(&self, function: &str, event: &str, args: Vec<Value>) {
        if let Ok(mut s) = self.state() {
            s.emits.entry(function.to_string()).or_default().push(EmitSpec { event: event.to_string(),
                                                                             args });
        }
    }

    /// Con `true` los receipts no aparecen nunca (para probar timeouts).
    pub fn withhold_receipts(&self, withhold: bool) {
        if let Ok(mut s) = self.state() {
            s.withhold_receipts = withhold;
        }
    }

    pub fn sent_transactions(&self) -> Vec<TxRequest> {
        self.state().map(|s| s.sent.clone()).unwrap_or_default()
    }

    pub fn transaction_count(&self) -> usize {
        self.state().map(|s| s.sent.len()).unwrap_or(0)
    }

    pub fn code_at(&self, address: &str) -> Option<String> {
        self.state().ok().and_then(|s| s.code.get(&address.to_lowercase()).cloned())
    }
}

impl ChainClient for SimulatedChain {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn get_signer(&self, address: Option<&str>) -> Result<String, ExecutionError> {
        Ok(address.map(str::to_lowercase).unwrap_or_else(|| self.default_signer.clone()))
    }

    fn send_transaction(&self, tx: &TxRequest) -> Result<String, ExecutionError> {
        let mut s = self.state()?;
        let mut logs = Vec::new();
        if let TxInput::Call { function, .. } = &tx.input {
            if s.reverts.contains(function.as_str()) || s.reverts.contains(function_name(function)) {
                return Err(ExecutionError::Reverted { hash: None,
                                                      reason: format!("{function} reverted") });
            }
            let to = tx.to.as_deref().unwrap_or_default().to_lowercase();
            if !s.code.contains_key(&to) {
                return Err(ExecutionError::Chain(format!("no contract at {to}")));
            }
            let specs = s.emits.get(function_name(function)).cloned().unwrap_or_default();
            logs = specs.into_iter()
                        .map(|e| RawLog { address: to.clone(),
                                          event: e.event,
                                          args: e.args })
                        .collect();
        }

        let from = tx.from.to_lowercase();
        let nonce = {
            let n = s.nonces.entry(from.clone()).or_insert(0);
            *n += 1;
            *n - 1
        };
        let hash = format!("0x{}",
                           hash_value(&json!({ "chain": self.chain_id, "from": from, "nonce": nonce, "tx": tx })));
        s.block += 1;

        let contract_address = match &tx.input {
            TxInput::Create { bytecode, .. } => {
                let address = create_address(&from, nonce);
                s.code.insert(address.clone(), bytecode.clone());
                Some(address)
            }
            TxInput::Call { .. } => None,
        };
        let receipt = TxReceipt { transaction_hash: hash.clone(),
                                  block_number: s.block,
                                  status: true,
                                  contract_address,
                                  logs };
        s.receipts.insert(hash.clone(), receipt);
        s.sent.push(tx.clone());
        log::debug!("simulated chain {}: tx {hash} (nonce {nonce})", self.chain_id);
        Ok(hash)
    }

    fn call(&self, to: &str, _function: &str, _args: &[Value]) -> Result<Value, ExecutionError> {
        let s = self.state()?;
        if !s.code.contains_key(&to.to_lowercase()) {
            return Err(ExecutionError::Chain(format!("no contract at {to}")));
        }
        Ok(Value::Null)
    }

    fn get_transaction_receipt(&self, hash: &str) -> Result<Option<TxReceipt>, ExecutionError> {
        let s = self.state()?;
        if s.withhold_receipts {
            return Ok(None);
        }
        Ok(s.receipts.get(hash).cloned())
    }

    fn get_block_number(&self) -> Result<u64, ExecutionError> {
        Ok(self.state()?.block)
    }
}
