use std::{
    net::SocketAddr,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use redis_protocol::{codec::Resp2, resp2::types::BytesFrame};
use tokio::{
    net::TcpStream,
    sync::{Mutex, MutexGuard},
    time,
};
use tokio_util::codec::Framed;
use tracing::{debug, trace};
use typed_builder::TypedBuilder;

use super::{Consistency, CounterStore, StoreError, TallyRow};
use crate::election::{DistrictId, VoteTarget};

type Connection = Framed<TcpStream, Resp2>;

#[derive(Debug, Clone, TypedBuilder)]
pub struct RespConfig {
    /// Address of the primary. Writes and reads both go here; replicas are
    /// only observed through `WAIT`.
    pub addr: SocketAddr,
    /// Namespace for every key this store touches.
    #[builder(default = String::from("elections"), setter(into))]
    pub key_prefix: String,
    /// Number of replicas behind the primary.
    #[builder(default = 0)]
    pub replicas: usize,
    /// Connections kept open. Bounds the number of calls in flight.
    #[builder(default = 4)]
    pub pool_size: usize,
    /// Bound on each command round trip.
    #[builder(default = Duration::from_secs(10))]
    pub op_timeout: Duration,
    /// How long the server may wait for replica acknowledgements.
    #[builder(default = Duration::from_secs(1))]
    pub wait_timeout: Duration,
}

/// A counter store on a replicated Redis-compatible deployment.
///
/// Each district is a hash at `{prefix}:votes:{district}` whose fields are
/// `{party}:{candidate}`. Consistency levels are enforced with `WAIT` on the
/// connection that issued the write.
pub struct RespStore {
    config: RespConfig,
    pool: Vec<Mutex<Option<Connection>>>,
    next: AtomicUsize,
}

impl RespStore {
    /// Opens `pool_size` connections to the primary.
    pub async fn connect(config: RespConfig) -> Result<Self, StoreError> {
        let mut pool = Vec::with_capacity(config.pool_size.max(1));
        for _ in 0..config.pool_size.max(1) {
            let conn = connect(config.addr, config.op_timeout).await?;
            pool.push(Mutex::new(Some(conn)));
        }
        debug!(addr = %config.addr, connections = pool.len(), "connected");
        Ok(Self {
            config,
            pool,
            next: AtomicUsize::new(0),
        })
    }

    pub fn config(&self) -> &RespConfig {
        &self.config
    }

    fn district_key(&self, district_id: DistrictId) -> String {
        format!("{}:votes:{}", self.config.key_prefix, district_id)
    }

    /// Takes the next connection round-robin, reconnecting it if a previous
    /// call left it unusable.
    async fn checkout(&self) -> Result<Checkout<'_>, StoreError> {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.pool.len();
        let mut slot = self.pool[idx].lock().await;
        if slot.is_none() {
            debug!(connection = idx, "reconnecting");
            let conn = connect(self.config.addr, self.config.op_timeout).await?;
            *slot = Some(conn);
        }
        Ok(Checkout {
            slot,
            op_timeout: self.config.op_timeout,
        })
    }

    async fn wait_for_replicas(
        &self,
        conn: &mut Checkout<'_>,
        consistency: Consistency,
    ) -> Result<(), StoreError> {
        let required = consistency.required_replica_acks(self.config.replicas);
        if required == 0 {
            return Ok(());
        }
        let timeout_ms = self.config.wait_timeout.as_millis().to_string();
        let required_arg = required.to_string();
        let reply = conn
            .call(command(["WAIT", required_arg.as_str(), timeout_ms.as_str()]))
            .await?;
        let acknowledged = usize::try_from(integer(reply)?).unwrap_or(0);
        trace!(%consistency, required, acknowledged, "replicas acknowledged");
        if acknowledged < required {
            return Err(StoreError::ConsistencyNotMet {
                required,
                acknowledged,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl CounterStore for RespStore {
    async fn increment(
        &self,
        target: VoteTarget,
        consistency: Consistency,
    ) -> Result<(), StoreError> {
        let key = self.district_key(target.district_id);
        let field = format!("{}:{}", target.party_id, target.candidate_id);
        let mut conn = self.checkout().await?;
        let req = command(["HINCRBY", key.as_str(), field.as_str(), "1"]);
        integer(conn.call(req).await?)?;
        self.wait_for_replicas(&mut conn, consistency).await
    }

    async fn read_district(
        &self,
        district_id: DistrictId,
    ) -> Result<Vec<TallyRow>, StoreError> {
        let key = self.district_key(district_id);
        let mut conn = self.checkout().await?;
        let reply = conn.call(command(["HGETALL", key.as_str()])).await?;
        parse_tally_rows(district_id, reply)
    }

    async fn truncate(
        &self,
        consistency: Consistency,
    ) -> Result<(), StoreError> {
        let pattern = format!("{}:votes:*", self.config.key_prefix);
        let mut conn = self.checkout().await?;
        let keys = match conn.call(command(["KEYS", pattern.as_str()])).await? {
            BytesFrame::Array(keys) => keys
                .into_iter()
                .map(bulk_string)
                .collect::<Result<Vec<_>, _>>()?,
            other => return Err(unexpected("KEYS", &other)),
        };
        if !keys.is_empty() {
            let mut del = vec!["DEL".to_owned()];
            del.extend(keys);
            let removed = integer(conn.call(command(&del)).await?)?;
            debug!(removed, "deleted district counters");
        }
        self.wait_for_replicas(&mut conn, consistency).await
    }
}

/// A pooled connection held for the duration of one store operation.
struct Checkout<'a> {
    slot: MutexGuard<'a, Option<Connection>>,
    op_timeout: Duration,
}

impl Checkout<'_> {
    /// Sends one command and reads its reply. Anything other than an error
    /// reply from the server drops the connection, as a late reply would
    /// otherwise be read as the answer to the next command.
    async fn call(
        &mut self,
        req: BytesFrame,
    ) -> Result<BytesFrame, StoreError> {
        let conn = self.slot.as_mut().ok_or(StoreError::ConnectionClosed)?;
        let result = round_trip(conn, req, self.op_timeout).await;
        if let Err(ref e) = result {
            if !matches!(e, StoreError::Server(_)) {
                *self.slot = None;
            }
        }
        result
    }
}

async fn connect(
    addr: SocketAddr,
    op_timeout: Duration,
) -> Result<Connection, StoreError> {
    let socket = time::timeout(op_timeout, TcpStream::connect(addr)).await??;
    socket.set_nodelay(true).ok();
    Ok(Framed::new(socket, Resp2::default()))
}

async fn round_trip(
    conn: &mut Connection,
    req: BytesFrame,
    op_timeout: Duration,
) -> Result<BytesFrame, StoreError> {
    time::timeout(op_timeout, conn.send(req)).await??;
    match time::timeout(op_timeout, conn.next()).await? {
        Some(Ok(BytesFrame::Error(err))) => {
            Err(StoreError::Server(err.to_string()))
        }
        Some(Ok(frame)) => Ok(frame),
        Some(Err(e)) => Err(e.into()),
        None => Err(StoreError::ConnectionClosed),
    }
}

/// Builds a RESP command frame.
fn command<I, T>(args: I) -> BytesFrame
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    BytesFrame::Array(
        args.into_iter()
            .map(|arg| {
                BytesFrame::BulkString(Bytes::copy_from_slice(
                    arg.as_ref().as_bytes(),
                ))
            })
            .collect(),
    )
}

fn unexpected(what: &str, frame: &BytesFrame) -> StoreError {
    StoreError::UnexpectedReply(format!("{what}: {frame:?}"))
}

fn integer(frame: BytesFrame) -> Result<i64, StoreError> {
    match frame {
        BytesFrame::Integer(n) => Ok(n),
        other => Err(unexpected("expected integer", &other)),
    }
}

fn bulk_string(frame: BytesFrame) -> Result<String, StoreError> {
    match frame {
        BytesFrame::BulkString(bytes) | BytesFrame::SimpleString(bytes) => {
            String::from_utf8(bytes.to_vec()).map_err(|_| {
                StoreError::UnexpectedReply("non-utf8 string".into())
            })
        }
        other => Err(unexpected("expected string", &other)),
    }
}

/// Interprets an `HGETALL` reply: alternating `{party}:{candidate}` fields
/// and counter values.
fn parse_tally_rows(
    district_id: DistrictId,
    reply: BytesFrame,
) -> Result<Vec<TallyRow>, StoreError> {
    let items = match reply {
        BytesFrame::Array(items) => items,
        // a missing hash reads as empty
        BytesFrame::Null => return Ok(Vec::new()),
        other => return Err(unexpected("HGETALL", &other)),
    };
    if items.len() % 2 != 0 {
        return Err(StoreError::UnexpectedReply(
            "HGETALL returned an odd number of items".into(),
        ));
    }

    let mut rows = Vec::with_capacity(items.len() / 2);
    let mut items = items.into_iter();
    while let (Some(field), Some(value)) = (items.next(), items.next()) {
        let field = bulk_string(field)?;
        let (party_id, candidate_id) = field
            .split_once(':')
            .and_then(|(p, c)| Some((p.parse().ok()?, c.parse().ok()?)))
            .ok_or_else(|| {
                StoreError::UnexpectedReply(format!(
                    "bad counter field {field:?}"
                ))
            })?;
        let value = bulk_string(value)?;
        let votes = value.parse().map_err(|_| {
            StoreError::UnexpectedReply(format!("bad counter value {value:?}"))
        })?;
        rows.push(TallyRow {
            district_id,
            party_id,
            candidate_id,
            votes,
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bulk(s: &str) -> BytesFrame {
        BytesFrame::BulkString(Bytes::copy_from_slice(s.as_bytes()))
    }

    #[test]
    fn builds_commands() {
        let frame = command(["HINCRBY", "elections:votes:1", "2:3", "1"]);
        assert_eq!(
            frame,
            BytesFrame::Array(vec![
                bulk("HINCRBY"),
                bulk("elections:votes:1"),
                bulk("2:3"),
                bulk("1"),
            ])
        );
    }

    #[test]
    fn parses_hash_rows() {
        let reply = BytesFrame::Array(vec![
            bulk("1:1"),
            bulk("17"),
            bulk("2:5"),
            bulk("3"),
        ]);
        let rows = parse_tally_rows(4, reply).unwrap();

        assert_eq!(
            rows,
            vec![
                TallyRow {
                    district_id: 4,
                    party_id: 1,
                    candidate_id: 1,
                    votes: 17
                },
                TallyRow {
                    district_id: 4,
                    party_id: 2,
                    candidate_id: 5,
                    votes: 3
                },
            ]
        );
        assert!(parse_tally_rows(4, BytesFrame::Null).unwrap().is_empty());
    }

    #[test]
    fn rejects_malformed_rows() {
        let odd = BytesFrame::Array(vec![bulk("1:1")]);
        assert!(matches!(
            parse_tally_rows(1, odd),
            Err(StoreError::UnexpectedReply(_))
        ));

        let bad_field = BytesFrame::Array(vec![bulk("1-1"), bulk("2")]);
        assert!(matches!(
            parse_tally_rows(1, bad_field),
            Err(StoreError::UnexpectedReply(_))
        ));

        let negative = BytesFrame::Array(vec![bulk("1:1"), bulk("-2")]);
        assert!(matches!(
            parse_tally_rows(1, negative),
            Err(StoreError::UnexpectedReply(_))
        ));

        assert!(matches!(
            parse_tally_rows(1, BytesFrame::Integer(3)),
            Err(StoreError::UnexpectedReply(_))
        ));
    }
}
