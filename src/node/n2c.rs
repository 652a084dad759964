use std::fmt::Display;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use pallas::codec::minicbor::data::Type;
use pallas::codec::minicbor::{self as cbor, Decode, Decoder};
use pallas::network::facades::NodeClient;
use pallas::network::miniprotocols::chainsync::NextResponse;
use pallas::network::miniprotocols::localstate::queries_v16::{
    self as q, get_block_epoch_number, get_chain_block_no, get_chain_point, get_current_era,
    get_current_pparams, get_system_start,
};
use pallas::network::miniprotocols::localtxsubmission::{EraTx, Response};
use pallas::network::miniprotocols::Point;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::history::more;
use super::{
    ChainEvent, ChainPoint, EraHistory, FaultSignal, LedgerTip, MempoolSizes, NodeConnector, NodeSession,
    PendingTx, ProtocolParams, SubmitResponse, UtxoSet,
};
use crate::error::{GatewayError, NodeError};
use crate::ledger::{decode_block, decode_output};
use crate::plutus::SystemStart;
use crate::primitives::{Era, Input, TxHash};

/// Opens node-to-client sessions over the node's Unix socket.
#[derive(Debug, Clone)]
pub struct N2cConnector {
    inner: Arc<N2cOptions>,
}

#[derive(Debug)]
struct N2cOptions {
    socket_path: PathBuf,
    magic: u64,
    connect_timeout: Duration,
    query_timeout: Duration,
}

impl N2cConnector {
    pub fn new(
        socket_path: impl Into<PathBuf>,
        magic: u64,
        connect_timeout: Duration,
        query_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(N2cOptions {
                socket_path: socket_path.into(),
                magic,
                connect_timeout,
                query_timeout,
            }),
        }
    }
}

impl NodeConnector for N2cConnector {
    type Session = N2cSession;

    async fn open(&self) -> Result<N2cSession, NodeError> {
        let options = &self.inner;
        let client = tokio::time::timeout(
            options.connect_timeout,
            NodeClient::connect(&options.socket_path, options.magic),
        )
        .await
        .map_err(|_| NodeError::ConnectTimeout)?
        .map_err(|e| NodeError::Connect(e.to_string()))?;

        debug!(socket = %options.socket_path.display(), "opened node session");

        let (fault, signal) = oneshot::channel();
        Ok(N2cSession {
            client: Some(client),
            query_timeout: options.query_timeout,
            fault: Some(fault),
            signal: Some(signal),
        })
    }
}

/// A live node-to-client connection. Dropping it without [`NodeSession::close`] aborts the
/// connection in the background.
pub struct N2cSession {
    client: Option<NodeClient>,
    query_timeout: Duration,
    fault: Option<oneshot::Sender<NodeError>>,
    signal: Option<oneshot::Receiver<NodeError>>,
}

impl N2cSession {
    fn client(&mut self) -> Result<(&mut NodeClient, Round<'_>), NodeError> {
        let client = self.client.as_mut().ok_or(NodeError::Closed)?;
        Ok((
            client,
            Round {
                timeout: self.query_timeout,
                fault: &mut self.fault,
            },
        ))
    }
}

/// Bookkeeping for one mini-protocol exchange
struct Round<'a> {
    timeout: Duration,
    fault: &'a mut Option<oneshot::Sender<NodeError>>,
}

impl Round<'_> {
    fn failed(&mut self, error: NodeError) -> NodeError {
        if let Some(fault) = self.fault.take() {
            let _ = fault.send(error.clone());
        }
        error
    }

    /// One round trip bounded by the query timeout
    async fn bounded<T, E: Display>(
        &mut self,
        operation: &'static str,
        work: impl Future<Output = Result<T, E>>,
    ) -> Result<T, NodeError> {
        match tokio::time::timeout(self.timeout, work).await {
            Ok(result) => self.settle(operation, result),
            Err(_) => Err(self.failed(NodeError::Timeout(operation))),
        }
    }

    /// A wait that only ends when the node has something to say
    async fn unbounded<T, E: Display>(
        &mut self,
        operation: &'static str,
        work: impl Future<Output = Result<T, E>>,
    ) -> Result<T, NodeError> {
        let result = work.await;
        self.settle(operation, result)
    }

    fn settle<T, E: Display>(
        &mut self,
        operation: &'static str,
        result: Result<T, E>,
    ) -> Result<T, NodeError> {
        result.map_err(|e| {
            self.failed(NodeError::Protocol {
                operation,
                reason: e.to_string(),
            })
        })
    }
}

fn era_of(index: u16) -> Result<Era, NodeError> {
    Era::from_index(index).ok_or_else(|| NodeError::Unexpected(format!("unknown era {index}")))
}

fn chain_point(point: Point) -> ChainPoint {
    match point {
        Point::Origin => ChainPoint::Origin,
        Point::Specific(slot, hash) => ChainPoint::Specific { slot, hash },
    }
}

/// Reads a system start in its wire form `[year, day of year, picoseconds of day]`.
fn system_start(value: &q::SystemStart) -> Result<SystemStart, NodeError> {
    let unexpected = |e: &dyn Display| NodeError::Unexpected(format!("system start: {e}"));

    let bytes = pallas::codec::minicbor::to_vec(value).map_err(|e| unexpected(&e))?;
    let mut decoder = minicbor::Decoder::new(&bytes);
    decoder.array().map_err(|e| unexpected(&e))?;
    let year = decoder.int().map_err(|e| unexpected(&e))?;
    let day_of_year = decoder.u32().map_err(|e| unexpected(&e))?;
    let picoseconds_of_day = decoder.u64().map_err(|e| unexpected(&e))?;

    Ok(SystemStart {
        year: i32::try_from(i128::from(year)).map_err(|e| unexpected(&e))?,
        day_of_year,
        picoseconds_of_day,
    })
}

/// A UTxO query result with every output kept exactly as the node encoded it.
#[derive(Debug, Default)]
struct RawUtxos(Vec<(Input, Vec<u8>)>);

impl<'b, C> Decode<'b, C> for RawUtxos {
    fn decode(d: &mut Decoder<'b>, _ctx: &mut C) -> Result<Self, cbor::decode::Error> {
        // block query results are wrapped in a one element array
        if matches!(d.datatype()?, Type::Array | Type::ArrayIndef) {
            d.array()?;
        }

        let mut utxos = Vec::new();
        let mut remaining = d.map()?;
        while more(d, &mut remaining)? {
            d.array()?;
            let hash: [u8; 32] = d
                .bytes()?
                .try_into()
                .map_err(|_| cbor::decode::Error::message("transaction id is not 32 bytes"))?;
            let index = d.u64()?;

            let start = d.position();
            d.skip()?;
            let raw = d.input()[start..d.position()].to_vec();

            utxos.push((Input::new(TxHash::new(hash), index), raw));
        }

        Ok(RawUtxos(utxos))
    }
}

fn utxo_set(found: RawUtxos) -> Result<UtxoSet, GatewayError> {
    let mut utxos = UtxoSet::new();
    for (input, raw) in found.0 {
        utxos.insert(input, decode_output(raw)?);
    }
    Ok(utxos)
}

fn block_query(era: u16, query: q::BlockQuery) -> q::Request {
    q::Request::LedgerQuery(q::LedgerQuery::BlockQuery(era, query))
}

impl NodeSession for N2cSession {
    async fn current_era(&mut self) -> Result<Era, NodeError> {
        let (client, mut round) = self.client()?;
        let statequery = client.statequery();

        round.bounded("acquire", statequery.acquire(None)).await?;
        let era = round.bounded("get current era", get_current_era(statequery)).await?;
        round.bounded("release", statequery.send_release()).await?;

        era_of(era)
    }

    async fn protocol_params(&mut self) -> Result<ProtocolParams, NodeError> {
        let (client, mut round) = self.client()?;
        let statequery = client.statequery();

        round.bounded("acquire", statequery.acquire(None)).await?;
        let era = round.bounded("get current era", get_current_era(statequery)).await?;
        let params = round
            .bounded("get protocol params", get_current_pparams(statequery, era))
            .await?;
        round.bounded("release", statequery.send_release()).await?;

        params
            .first()
            .map(ProtocolParams::from)
            .ok_or_else(|| NodeError::Unexpected("empty protocol parameters".into()))
    }

    async fn system_start(&mut self) -> Result<SystemStart, NodeError> {
        let (client, mut round) = self.client()?;
        let statequery = client.statequery();

        round.bounded("acquire", statequery.acquire(None)).await?;
        let start = round.bounded("get system start", get_system_start(statequery)).await?;
        round.bounded("release", statequery.send_release()).await?;

        system_start(&start)
    }

    async fn chain_point(&mut self) -> Result<ChainPoint, NodeError> {
        let (client, mut round) = self.client()?;
        let statequery = client.statequery();

        round.bounded("acquire", statequery.acquire(None)).await?;
        let point = round.bounded("get chain point", get_chain_point(statequery)).await?;
        round.bounded("release", statequery.send_release()).await?;

        Ok(chain_point(point))
    }

    async fn ledger_tip(&mut self) -> Result<LedgerTip, NodeError> {
        let (client, mut round) = self.client()?;
        let statequery = client.statequery();

        round.bounded("acquire", statequery.acquire(None)).await?;
        let era = round.bounded("get current era", get_current_era(statequery)).await?;
        let point = round.bounded("get chain point", get_chain_point(statequery)).await?;
        let epoch = round
            .bounded("get epoch", get_block_epoch_number(statequery, era))
            .await?;
        let block = round
            .bounded("get block number", get_chain_block_no(statequery))
            .await?;
        round.bounded("release", statequery.send_release()).await?;

        Ok(LedgerTip {
            era: era_of(era)?,
            point: chain_point(point),
            epoch: u64::from(epoch),
            block_number: u64::from(block.block_number),
        })
    }

    async fn utxos_by_refs(&mut self, refs: &[Input]) -> Result<UtxoSet, GatewayError> {
        let (client, mut round) = self.client()?;
        let statequery = client.statequery();
        let refs = refs.iter().map(Into::into).collect();

        round.bounded("acquire", statequery.acquire(None)).await?;
        let era = round.bounded("get current era", get_current_era(statequery)).await?;
        let found: RawUtxos = round
            .bounded(
                "get utxo by input",
                statequery.query(block_query(era, q::BlockQuery::GetUTxOByTxIn(refs))),
            )
            .await?;
        round.bounded("release", statequery.send_release()).await?;

        utxo_set(found)
    }

    async fn utxos_by_address(&mut self, addresses: &[Vec<u8>]) -> Result<UtxoSet, GatewayError> {
        let (client, mut round) = self.client()?;
        let statequery = client.statequery();
        let addresses = addresses.iter().cloned().map(Into::into).collect();

        round.bounded("acquire", statequery.acquire(None)).await?;
        let era = round.bounded("get current era", get_current_era(statequery)).await?;
        let found: RawUtxos = round
            .bounded(
                "get utxo by address",
                statequery.query(block_query(era, q::BlockQuery::GetUTxOByAddress(addresses))),
            )
            .await?;
        round.bounded("release", statequery.send_release()).await?;

        utxo_set(found)
    }

    async fn utxos_whole(&mut self) -> Result<UtxoSet, GatewayError> {
        let (client, mut round) = self.client()?;
        let statequery = client.statequery();

        round.bounded("acquire", statequery.acquire(None)).await?;
        let era = round.bounded("get current era", get_current_era(statequery)).await?;
        let found: RawUtxos = round
            .bounded(
                "get whole utxo",
                statequery.query(block_query(era, q::BlockQuery::GetUTxOWhole)),
            )
            .await?;
        round.bounded("release", statequery.send_release()).await?;

        utxo_set(found)
    }

    async fn era_history(&mut self) -> Result<EraHistory, NodeError> {
        let (client, mut round) = self.client()?;
        let statequery = client.statequery();
        let request =
            q::Request::LedgerQuery(q::LedgerQuery::HardForkQuery(q::HardForkQuery::GetInterpreter));

        round.bounded("acquire", statequery.acquire(None)).await?;
        let history = round.bounded("get era history", statequery.query(request)).await?;
        round.bounded("release", statequery.send_release()).await?;

        Ok(history)
    }

    async fn submit_tx(&mut self, era: Era, bytes: Vec<u8>) -> Result<SubmitResponse, NodeError> {
        let (client, mut round) = self.client()?;
        let response = round
            .bounded(
                "submit tx",
                client.submission().submit_tx(EraTx(era.index(), bytes)),
            )
            .await?;

        Ok(match response {
            Response::Accepted => SubmitResponse::Accepted,
            Response::Rejected(reason) => SubmitResponse::Rejected(reason.0),
        })
    }

    async fn mempool_acquire(&mut self) -> Result<(), NodeError> {
        let (client, mut round) = self.client()?;
        round
            .unbounded("acquire mempool", client.monitor().acquire())
            .await?;
        Ok(())
    }

    async fn mempool_next(&mut self) -> Result<Option<PendingTx>, NodeError> {
        let (client, mut round) = self.client()?;
        let next = round
            .bounded("next mempool tx", client.monitor().query_next_tx())
            .await?;

        next.map(|EraTx(era, bytes)| {
            Ok(PendingTx {
                era: era_of(era)?,
                bytes,
            })
        })
        .transpose()
    }

    async fn mempool_release(&mut self) -> Result<(), NodeError> {
        let (client, mut round) = self.client()?;
        round
            .bounded("release mempool", client.monitor().release())
            .await
    }

    async fn mempool_has_tx(&mut self, hash: TxHash) -> Result<bool, NodeError> {
        let (client, mut round) = self.client()?;
        let monitor = client.monitor();

        round.bounded("acquire mempool", monitor.acquire()).await?;
        let found = round
            .bounded("has mempool tx", monitor.query_has_tx(hash.to_string()))
            .await?;
        round.bounded("release mempool", monitor.release()).await?;

        Ok(found)
    }

    async fn mempool_sizes(&mut self) -> Result<MempoolSizes, NodeError> {
        let (client, mut round) = self.client()?;
        let monitor = client.monitor();

        round.bounded("acquire mempool", monitor.acquire()).await?;
        let sizes = round
            .bounded("mempool sizes", monitor.query_size_and_capacity())
            .await?;
        round.bounded("release mempool", monitor.release()).await?;

        Ok(MempoolSizes {
            capacity: sizes.capacity_in_bytes,
            size: sizes.size_in_bytes,
            tx_count: sizes.number_of_txs,
        })
    }

    async fn follow_tip(&mut self) -> Result<ChainPoint, NodeError> {
        let (client, mut round) = self.client()?;
        let point = round
            .bounded("intersect tip", client.chainsync().intersect_tip())
            .await?;

        Ok(chain_point(point))
    }

    async fn next_event(&mut self) -> Result<ChainEvent, GatewayError> {
        let (client, mut round) = self.client()?;
        let chainsync = client.chainsync();

        loop {
            let next = round
                .unbounded("chain sync", chainsync.request_or_await_next())
                .await?;

            match next {
                NextResponse::RollForward(block, _) => {
                    return Ok(ChainEvent::RollForward(decode_block(&block.0)?));
                }
                NextResponse::RollBackward(point, _) => {
                    return Ok(ChainEvent::RollBackward(chain_point(point)));
                }
                NextResponse::Await => continue,
            }
        }
    }

    fn take_fault_signal(&mut self) -> FaultSignal {
        self.signal.take().map(FaultSignal::new).unwrap_or_default()
    }

    async fn close(mut self) {
        if let Some(client) = self.client.take() {
            client.abort().await;
            debug!("closed node session");
        }
    }
}

impl Drop for N2cSession {
    fn drop(&mut self) {
        let Some(client) = self.client.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(client.abort());
            }
            Err(_) => warn!("node session dropped outside of a runtime"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // {[tx id, 3]: [enterprise address, 1_000_000 as a non minimal u64]}
    fn utxo_response(wrapped: bool) -> (Vec<u8>, Vec<u8>) {
        let mut output = vec![0x82, 0x58, 0x1d, 0x61];
        output.extend([0x11; 28]);
        output.extend([0x1b, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0f, 0x42, 0x40]);

        let mut bytes = if wrapped { vec![0x81] } else { vec![] };
        bytes.extend([0xa1, 0x82, 0x58, 0x20]);
        bytes.extend([0xab; 32]);
        bytes.push(0x03);
        bytes.extend(&output);
        (bytes, output)
    }

    #[test]
    fn test_outputs_keep_node_bytes() {
        let (bytes, output) = utxo_response(true);

        let found: RawUtxos = cbor::decode(&bytes).unwrap();
        let utxos = utxo_set(found).unwrap();

        let input = Input::new(TxHash::new([0xab; 32]), 3);
        assert_eq!(utxos[&input].raw, output);
        assert_eq!(utxos[&input].value.lovelace, 1_000_000);
    }

    #[test]
    fn test_unwrapped_and_indefinite_maps() {
        let (mut bytes, output) = utxo_response(false);
        bytes[0] = 0xbf;
        bytes.push(0xff);

        let found: RawUtxos = cbor::decode(&bytes).unwrap();

        assert_eq!(found.0.len(), 1);
        assert_eq!(found.0[0].1, output);
    }

    #[test]
    fn test_rejects_short_transaction_id() {
        let bytes = [0x81, 0xa1, 0x82, 0x41, 0x00, 0x00, 0x80];

        assert!(cbor::decode::<RawUtxos>(&bytes).is_err());
    }
}
