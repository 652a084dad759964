use super::{DatumOption, ScriptRef, Value, shelley_parts, Credential};

/// A transaction output together with the exact bytes it was decoded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    /// Raw address bytes
    pub address: Vec<u8>,
    pub value: Value,
    pub datum: Option<DatumOption>,
    pub script_ref: Option<ScriptRef>,
    /// Encoding as received from the node or the transaction body
    pub raw: Vec<u8>,
}

impl Output {
    pub fn new(address: Vec<u8>, value: Value) -> Self {
        Self {
            address,
            value,
            datum: None,
            script_ref: None,
            raw: Vec::new(),
        }
    }

    pub fn with_datum(mut self, datum: DatumOption) -> Self {
        self.datum = Some(datum);
        self
    }

    pub fn with_script_ref(mut self, script: ScriptRef) -> Self {
        self.script_ref = Some(script);
        self
    }

    pub fn payment_credential(&self) -> Option<Credential> {
        shelley_parts(&self.address).map(|parts| parts.payment)
    }
}
