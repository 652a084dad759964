//! Builders and in-memory node fakes shared by the unit tests

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::oneshot;

use crate::error::{GatewayError, NodeError};
use crate::eval::{EngineError, ScriptEngine};
use crate::ledger::Transaction;
use crate::node::{
    ChainEvent, ChainPoint, CostModels, EraBound, EraHistory, EraParams, EraSummary, FaultSignal,
    LedgerTip, MempoolSizes, NodeConnector, NodeSession, PendingTx, ProtocolParams,
    ProtocolVersion, SubmitResponse, UtxoSet,
};
use crate::plutus::{Data, SystemStart};
use crate::primitives::{
    Era, ExUnits, Input, KeyHash, Output, PlutusScript, PlutusVersion, PolicyId, Redeemer,
    RedeemerTag, RewardAccount, ScriptHash, TxHash, WitnessDatum,
};

/// Enterprise testnet address locked by `script`
pub fn script_address(script: &PlutusScript) -> Vec<u8> {
    let mut address = vec![0b0111_0000];
    address.extend_from_slice(&script.hash()[..]);
    address
}

/// Enterprise testnet address of the key hash `[byte; 28]`
pub fn key_address(byte: u8) -> Vec<u8> {
    let mut address = vec![0b0110_0000];
    address.extend([byte; 28]);
    address
}

pub fn sample_script() -> PlutusScript {
    PlutusScript::new(PlutusVersion::V2, vec![0x46, 0x01, 0x00, 0x00, 0x22, 0x00, 0x11])
}

/// Smallest well formed Conway transaction: spends `[seed; 32]#0`, pays 1 ada to an enterprise
/// address and carries no witnesses.
pub fn sample_tx_bytes(seed: u8) -> Vec<u8> {
    let mut bytes = vec![0x84, 0xa3, 0x00, 0x81, 0x82, 0x58, 0x20];
    bytes.extend([seed; 32]);
    bytes.extend([0x00, 0x01, 0x81, 0x82, 0x58, 0x1d, 0x61]);
    bytes.extend([0x11; 28]);
    bytes.extend([0x1a, 0x00, 0x0f, 0x42, 0x40]);
    bytes.extend([0x02, 0x1a, 0x00, 0x02, 0x98, 0x10]);
    bytes.extend([0xa0, 0xf5, 0xf6]);
    bytes
}

pub fn pending_tx(seed: u8) -> PendingTx {
    PendingTx {
        era: Era::Conway,
        bytes: sample_tx_bytes(seed),
    }
}

pub struct TxFixture(Transaction);

impl TxFixture {
    pub fn new() -> Self {
        Self(Transaction {
            hash: TxHash::new([0x99; 32]),
            era: Era::Conway,
            inputs: vec![],
            reference_inputs: vec![],
            outputs: vec![],
            fee: 0,
            mint: Default::default(),
            withdrawals: vec![],
            validity_start: None,
            ttl: None,
            required_signers: vec![],
            scripts: vec![],
            redeemers: vec![],
            datums: vec![],
            raw: vec![],
        })
    }

    pub fn hash(mut self, hash: TxHash) -> Self {
        self.0.hash = hash;
        self
    }

    pub fn input(mut self, input: Input) -> Self {
        self.0.inputs.push(input);
        self
    }

    pub fn reference_input(mut self, input: Input) -> Self {
        self.0.reference_inputs.push(input);
        self
    }

    pub fn output(mut self, output: Output) -> Self {
        self.0.outputs.push(output);
        self
    }

    pub fn fee(mut self, fee: u64) -> Self {
        self.0.fee = fee;
        self
    }

    pub fn mint(mut self, policy: PolicyId, name: &[u8], quantity: i64) -> Self {
        self.0
            .mint
            .entry(policy)
            .or_default()
            .insert(name.to_vec(), quantity);
        self
    }

    pub fn withdrawal(mut self, account: RewardAccount, amount: u64) -> Self {
        self.0.withdrawals.push((account, amount));
        self
    }

    pub fn validity(mut self, start: Option<u64>, ttl: Option<u64>) -> Self {
        self.0.validity_start = start;
        self.0.ttl = ttl;
        self
    }

    pub fn signer(mut self, signer: KeyHash) -> Self {
        self.0.required_signers.push(signer);
        self
    }

    pub fn script(mut self, script: PlutusScript) -> Self {
        self.0.scripts.push(script);
        self
    }

    pub fn redeemer(mut self, tag: RedeemerTag, index: u32, data: Data) -> Self {
        self.0.redeemers.push(Redeemer {
            tag,
            index,
            data,
            ex_units: ExUnits::default(),
        });
        self
    }

    pub fn datum(mut self, raw: &[u8]) -> Self {
        self.0
            .datums
            .push(WitnessDatum::from_cbor(raw).expect("valid datum"));
        self
    }

    pub fn build(self) -> Transaction {
        self.0
    }
}

pub fn sample_params() -> ProtocolParams {
    ProtocolParams {
        protocol_version: Some(ProtocolVersion {
            major: 9,
            minor: 0,
        }),
        cost_models: CostModels {
            plutus_v1: Some(vec![1; 166]),
            plutus_v2: Some(vec![2; 175]),
            plutus_v3: Some(vec![3; 251]),
        },
        ..Default::default()
    }
}

/// Preview's system start, 2022-10-25T00:00:00Z
/// Byron followed by an open ended Shelley era
pub fn sample_history() -> EraHistory {
    let shelley = EraBound {
        time_ms: 89_856_000_000,
        slot: 4_492_800,
        epoch: 208,
    };

    EraHistory(vec![
        EraSummary {
            start: EraBound {
                time_ms: 0,
                slot: 0,
                epoch: 0,
            },
            end: Some(shelley),
            params: EraParams {
                epoch_length: 21_600,
                slot_length_ms: 20_000,
                safe_zone: Some(4_320),
                genesis_window: Some(4_320),
            },
        },
        EraSummary {
            start: shelley,
            end: None,
            params: EraParams {
                epoch_length: 432_000,
                slot_length_ms: 1_000,
                safe_zone: Some(129_600),
                genesis_window: Some(36_000),
            },
        },
    ])
}

pub fn sample_system_start() -> SystemStart {
    SystemStart {
        year: 2022,
        day_of_year: 298,
        picoseconds_of_day: 0,
    }
}

/// State behind a [`FakeNode`]
pub struct FakeState {
    pub era: Era,
    pub params: ProtocolParams,
    pub system_start: SystemStart,
    pub tip: LedgerTip,
    pub history: EraHistory,
    pub utxos: UtxoSet,
    pub submit_replies: VecDeque<SubmitResponse>,
    pub submitted: Vec<(Era, Vec<u8>)>,
    /// Snapshots handed out by successive acquires. Acquiring past the last one blocks.
    pub snapshots: VecDeque<Vec<PendingTx>>,
    pub current: Option<VecDeque<PendingTx>>,
    pub mempool_sizes: MempoolSizes,
    pub in_mempool: Vec<TxHash>,
    pub events: VecDeque<ChainEvent>,
    /// Raised on the fault signal once `events` is drained
    pub fault_when_idle: Option<NodeError>,
    pub refuse_connections: bool,
    pub calls: Vec<&'static str>,
    pub opened: usize,
    pub closed: usize,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            era: Era::Conway,
            params: sample_params(),
            system_start: sample_system_start(),
            tip: LedgerTip {
                era: Era::Conway,
                point: ChainPoint::Specific {
                    slot: 1_000,
                    hash: vec![0xcd; 32],
                },
                epoch: 7,
                block_number: 500,
            },
            history: sample_history(),
            utxos: UtxoSet::new(),
            submit_replies: VecDeque::new(),
            submitted: vec![],
            snapshots: VecDeque::new(),
            current: None,
            mempool_sizes: MempoolSizes {
                capacity: 1_000,
                size: 0,
                tx_count: 0,
            },
            in_mempool: vec![],
            events: VecDeque::new(),
            fault_when_idle: None,
            refuse_connections: false,
            calls: vec![],
            opened: 0,
            closed: 0,
        }
    }
}

/// Scripted node. Cloning shares the state, so a test keeps a handle to inspect it after the
/// code under test consumed its sessions.
#[derive(Clone, Default)]
pub struct FakeNode(Arc<Mutex<FakeState>>);

impl FakeNode {
    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.0.lock().expect("fake node poisoned")
    }

    pub fn with(self, configure: impl FnOnce(&mut FakeState)) -> Self {
        configure(&mut self.state());
        self
    }
}

impl NodeConnector for FakeNode {
    type Session = FakeSession;

    async fn open(&self) -> Result<FakeSession, NodeError> {
        let mut state = self.state();
        if state.refuse_connections {
            return Err(NodeError::Connect("connection refused".into()));
        }
        state.opened += 1;

        let (fault, signal) = oneshot::channel();
        Ok(FakeSession {
            node: self.clone(),
            fault: Some(fault),
            signal: Some(signal),
        })
    }
}

pub struct FakeSession {
    node: FakeNode,
    fault: Option<oneshot::Sender<NodeError>>,
    signal: Option<oneshot::Receiver<NodeError>>,
}

impl FakeSession {
    fn call(&self, name: &'static str) -> MutexGuard<'_, FakeState> {
        let mut state = self.node.state();
        state.calls.push(name);
        state
    }
}

impl NodeSession for FakeSession {
    async fn current_era(&mut self) -> Result<Era, NodeError> {
        Ok(self.call("current_era").era)
    }

    async fn protocol_params(&mut self) -> Result<ProtocolParams, NodeError> {
        Ok(self.call("protocol_params").params.clone())
    }

    async fn system_start(&mut self) -> Result<SystemStart, NodeError> {
        Ok(self.call("system_start").system_start)
    }

    async fn chain_point(&mut self) -> Result<ChainPoint, NodeError> {
        Ok(self.call("chain_point").tip.point.clone())
    }

    async fn ledger_tip(&mut self) -> Result<LedgerTip, NodeError> {
        Ok(self.call("ledger_tip").tip.clone())
    }

    async fn era_history(&mut self) -> Result<EraHistory, NodeError> {
        Ok(self.call("era_history").history.clone())
    }

    async fn utxos_by_refs(&mut self, refs: &[Input]) -> Result<UtxoSet, GatewayError> {
        let state = self.call("utxos_by_refs");
        Ok(refs
            .iter()
            .filter_map(|input| state.utxos.get(input).map(|output| (*input, output.clone())))
            .collect())
    }

    async fn utxos_by_address(&mut self, addresses: &[Vec<u8>]) -> Result<UtxoSet, GatewayError> {
        let state = self.call("utxos_by_address");
        Ok(state
            .utxos
            .iter()
            .filter(|(_, output)| addresses.contains(&output.address))
            .map(|(input, output)| (*input, output.clone()))
            .collect())
    }

    async fn utxos_whole(&mut self) -> Result<UtxoSet, GatewayError> {
        Ok(self.call("utxos_whole").utxos.clone())
    }

    async fn submit_tx(&mut self, era: Era, bytes: Vec<u8>) -> Result<SubmitResponse, NodeError> {
        let mut state = self.call("submit_tx");
        state.submitted.push((era, bytes));
        Ok(state
            .submit_replies
            .pop_front()
            .unwrap_or(SubmitResponse::Accepted))
    }

    async fn mempool_acquire(&mut self) -> Result<(), NodeError> {
        let snapshot = {
            let mut state = self.call("mempool_acquire");
            state.snapshots.pop_front()
        };

        match snapshot {
            Some(snapshot) => {
                self.node.state().current = Some(snapshot.into());
                Ok(())
            }
            None => std::future::pending().await,
        }
    }

    async fn mempool_next(&mut self) -> Result<Option<PendingTx>, NodeError> {
        let mut state = self.call("mempool_next");
        match state.current.as_mut() {
            Some(current) => Ok(current.pop_front()),
            None => Err(NodeError::Protocol {
                operation: "next mempool tx",
                reason: "not acquired".into(),
            }),
        }
    }

    async fn mempool_release(&mut self) -> Result<(), NodeError> {
        let mut state = self.call("mempool_release");
        state.current = None;
        Ok(())
    }

    async fn mempool_has_tx(&mut self, hash: TxHash) -> Result<bool, NodeError> {
        let state = self.call("mempool_has_tx");
        Ok(state.in_mempool.contains(&hash))
    }

    async fn mempool_sizes(&mut self) -> Result<MempoolSizes, NodeError> {
        Ok(self.call("mempool_sizes").mempool_sizes)
    }

    async fn follow_tip(&mut self) -> Result<ChainPoint, NodeError> {
        Ok(self.call("follow_tip").tip.point.clone())
    }

    async fn next_event(&mut self) -> Result<ChainEvent, GatewayError> {
        let (event, fault) = {
            let mut state = self.call("next_event");
            let event = state.events.pop_front();
            let fault = match event {
                Some(_) => None,
                None => state.fault_when_idle.take(),
            };
            (event, fault)
        };

        if let Some(event) = event {
            return Ok(event);
        }
        if let (Some(fault), Some(sender)) = (fault, self.fault.take()) {
            let _ = sender.send(fault);
        }
        std::future::pending().await
    }

    fn take_fault_signal(&mut self) -> FaultSignal {
        self.signal.take().map(FaultSignal::new).unwrap_or_default()
    }

    async fn close(self) {
        self.node.state().closed += 1;
    }
}

/// Engine that records its calls and charges a fixed cost per argument. Scripts listed in
/// `failing` fail.
#[derive(Default)]
pub struct FakeEngine {
    pub failing: Vec<ScriptHash>,
    pub calls: Mutex<Vec<(ScriptHash, usize)>>,
}

impl FakeEngine {
    pub fn failing(hash: ScriptHash) -> Self {
        Self {
            failing: vec![hash],
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<(ScriptHash, usize)> {
        self.calls.lock().expect("fake engine poisoned").clone()
    }
}

impl ScriptEngine for FakeEngine {
    fn evaluate(
        &self,
        script: &PlutusScript,
        args: &[Data],
        _budget: ExUnits,
        _protocol_version: ProtocolVersion,
        _cost_model: &[i64],
    ) -> Result<ExUnits, EngineError> {
        let hash = script.hash();
        self.calls
            .lock()
            .expect("fake engine poisoned")
            .push((hash, args.len()));

        if self.failing.contains(&hash) {
            return Err(EngineError::Failed("validator returned false".into()));
        }

        Ok(ExUnits::new(1_000 * args.len() as u64, 100_000))
    }
}
