//! Per-command message payloads.

use satoshi_chain::{Block, Header, Transaction};
use satoshi_core::{ByteReader, ByteWriter, Codec, Hash32};

/// A network address as carried inside `version`/`addr` payloads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkAddress {
    /// Service bitflags this peer advertises.
    pub services: u64,
    /// IPv6 address, or an IPv4 address mapped into `::ffff:a.b.c.d`.
    pub ip: [u8; 16],
    /// TCP port, host byte order.
    pub port: u16,
}

impl Codec for NetworkAddress {
    fn decode(reader: &mut ByteReader<'_>) -> Option<Self> {
        let services = reader.read_u64_le();
        let ip = reader.read_hash::<16>();
        let port = reader.read_u16_be_hack(); // ports are big-endian on the wire
        if reader.failed() {
            None
        } else {
            Some(Self { services, ip, port })
        }
    }

    fn encode(&self, writer: &mut ByteWriter) {
        writer.write_u64_le(self.services);
        writer.write_bytes(&self.ip);
        writer.write_port_be(self.port);
    }

    fn encoded_len(&self) -> usize {
        26
    }
}

/// Extension methods filling the gap between this crate's big-endian port
/// field and `satoshi-core`'s little-endian-only reader/writer primitives.
trait PortExt {
    fn read_u16_be_hack(&mut self) -> u16;
}
impl PortExt for ByteReader<'_> {
    fn read_u16_be_hack(&mut self) -> u16 {
        u16::from_be_bytes(self.read_hash::<2>())
    }
}
trait PortWriteExt {
    fn write_port_be(&mut self, port: u16);
}
impl PortWriteExt for ByteWriter {
    fn write_port_be(&mut self, port: u16) {
        self.write_bytes(&port.to_be_bytes());
    }
}

fn read_varstr(reader: &mut ByteReader<'_>) -> String {
    String::from_utf8_lossy(&reader.read_var_bytes()).into_owned()
}

fn write_varstr(writer: &mut ByteWriter, s: &str) {
    writer.write_var_bytes(s.as_bytes());
}

/// `version`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionMessage {
    /// Protocol version the sender speaks.
    pub version: u32,
    /// Advertised service bitflags.
    pub services: u64,
    /// Sender's wall-clock time.
    pub timestamp: i64,
    /// Address of the recipient as seen by the sender (no timestamp field).
    pub addr_recv: NetworkAddress,
    /// Address of the sender (no timestamp field).
    pub addr_from: NetworkAddress,
    /// Random nonce, used to detect self-connections.
    pub nonce: u64,
    /// Free-form user agent string (BIP14).
    pub user_agent: String,
    /// Best block height the sender has.
    pub start_height: u32,
    /// Whether the sender wants unfiltered inv relay (protocol >= 70001).
    pub relay: Option<bool>,
}

impl Codec for VersionMessage {
    fn decode(reader: &mut ByteReader<'_>) -> Option<Self> {
        let version = reader.read_u32_le();
        let services = reader.read_u64_le();
        let timestamp = reader.read_u64_le() as i64;
        let addr_recv = NetworkAddress::decode(reader)?;
        let addr_from = NetworkAddress::decode(reader)?;
        let nonce = reader.read_u64_le();
        let user_agent = read_varstr(reader);
        let start_height = reader.read_u32_le();
        let relay = if reader.is_exhausted() {
            None
        } else {
            Some(reader.read_u8() != 0)
        };
        if reader.failed() {
            None
        } else {
            Some(Self {
                version,
                services,
                timestamp,
                addr_recv,
                addr_from,
                nonce,
                user_agent,
                start_height,
                relay,
            })
        }
    }

    fn encode(&self, writer: &mut ByteWriter) {
        writer.write_u32_le(self.version);
        writer.write_u64_le(self.services);
        writer.write_u64_le(self.timestamp as u64);
        self.addr_recv.encode(writer);
        self.addr_from.encode(writer);
        writer.write_u64_le(self.nonce);
        write_varstr(writer, &self.user_agent);
        writer.write_u32_le(self.start_height);
        if let Some(relay) = self.relay {
            writer.write_u8(relay as u8);
        }
    }

    fn encoded_len(&self) -> usize {
        4 + 8
            + 8
            + self.addr_recv.encoded_len()
            + self.addr_from.encoded_len()
            + 8
            + satoshi_core::ser::varint_len(self.user_agent.len() as u64)
            + self.user_agent.len()
            + 4
            + self.relay.map_or(0, |_| 1)
    }
}

/// `addr`: a timestamped network address list.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct AddrMessage {
    /// Each entry's advertisement time plus address.
    pub entries: Vec<(u32, NetworkAddress)>,
}

impl Codec for AddrMessage {
    fn decode(reader: &mut ByteReader<'_>) -> Option<Self> {
        let count = reader.read_varint();
        let mut entries = Vec::with_capacity(count.min(10_000) as usize);
        for _ in 0..count {
            let timestamp = reader.read_u32_le();
            let addr = NetworkAddress::decode(reader)?;
            entries.push((timestamp, addr));
        }
        if reader.failed() {
            None
        } else {
            Some(Self { entries })
        }
    }

    fn encode(&self, writer: &mut ByteWriter) {
        writer.write_varint(self.entries.len() as u64);
        for (timestamp, addr) in &self.entries {
            writer.write_u32_le(*timestamp);
            addr.encode(writer);
        }
    }

    fn encoded_len(&self) -> usize {
        satoshi_core::ser::varint_len(self.entries.len() as u64)
            + self.entries.iter().map(|(_, a)| 4 + a.encoded_len()).sum::<usize>()
    }
}

/// An inventory vector's type tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InventoryKind {
    /// Unspecified/error.
    Error,
    /// A transaction, without witness data.
    Tx,
    /// A block, without witness data.
    Block,
    /// A filtered block (BIP37).
    FilteredBlock,
    /// A compact block (BIP152).
    CompactBlock,
    /// A transaction including witness data (BIP144).
    WitnessTx,
    /// A block including witness data (BIP144).
    WitnessBlock,
    /// Any value this crate doesn't have a name for; round-trips losslessly.
    Unknown(u32),
}

const INV_WITNESS_FLAG: u32 = 0x4000_0000;

impl InventoryKind {
    fn from_u32(value: u32) -> Self {
        match value {
            0 => Self::Error,
            1 => Self::Tx,
            2 => Self::Block,
            3 => Self::FilteredBlock,
            4 => Self::CompactBlock,
            v if v == 1 | INV_WITNESS_FLAG => Self::WitnessTx,
            v if v == 2 | INV_WITNESS_FLAG => Self::WitnessBlock,
            other => Self::Unknown(other),
        }
    }

    fn to_u32(self) -> u32 {
        match self {
            Self::Error => 0,
            Self::Tx => 1,
            Self::Block => 2,
            Self::FilteredBlock => 3,
            Self::CompactBlock => 4,
            Self::WitnessTx => 1 | INV_WITNESS_FLAG,
            Self::WitnessBlock => 2 | INV_WITNESS_FLAG,
            Self::Unknown(v) => v,
        }
    }
}

/// One `(type, hash)` entry shared by `inv`/`getdata`/`notfound`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InventoryItem {
    /// What kind of object this entry names.
    pub kind: InventoryKind,
    /// The object's hash (txid/wtxid or block hash).
    pub hash: Hash32,
}

/// `inv` / `getdata` / `notfound`: all three share this exact wire shape.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct InventoryMessage {
    /// The inventory vector.
    pub items: Vec<InventoryItem>,
}

impl Codec for InventoryMessage {
    fn decode(reader: &mut ByteReader<'_>) -> Option<Self> {
        let count = reader.read_varint();
        let mut items = Vec::with_capacity(count.min(50_000) as usize);
        for _ in 0..count {
            let kind = InventoryKind::from_u32(reader.read_u32_le());
            let hash = Hash32::decode(reader)?;
            items.push(InventoryItem { kind, hash });
        }
        if reader.failed() {
            None
        } else {
            Some(Self { items })
        }
    }

    fn encode(&self, writer: &mut ByteWriter) {
        writer.write_varint(self.items.len() as u64);
        for item in &self.items {
            writer.write_u32_le(item.kind.to_u32());
            item.hash.encode(writer);
        }
    }

    fn encoded_len(&self) -> usize {
        satoshi_core::ser::varint_len(self.items.len() as u64) + self.items.len() * 36
    }
}

/// `getblocks` / `getheaders`: identical wire shape, a block-locator list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocatorMessage {
    /// Protocol version of the sender.
    pub version: u32,
    /// Block locator hashes, highest-to-lowest.
    pub locator_hashes: Vec<Hash32>,
    /// Hash to stop at, or all-zero for "as many as possible".
    pub stop_hash: Hash32,
}

impl Codec for LocatorMessage {
    fn decode(reader: &mut ByteReader<'_>) -> Option<Self> {
        let version = reader.read_u32_le();
        let count = reader.read_varint();
        let mut locator_hashes = Vec::with_capacity(count.min(2_000) as usize);
        for _ in 0..count {
            locator_hashes.push(Hash32::decode(reader)?);
        }
        let stop_hash = Hash32::decode(reader)?;
        if reader.failed() {
            None
        } else {
            Some(Self {
                version,
                locator_hashes,
                stop_hash,
            })
        }
    }

    fn encode(&self, writer: &mut ByteWriter) {
        writer.write_u32_le(self.version);
        writer.write_varint(self.locator_hashes.len() as u64);
        for hash in &self.locator_hashes {
            hash.encode(writer);
        }
        self.stop_hash.encode(writer);
    }

    fn encoded_len(&self) -> usize {
        4 + satoshi_core::ser::varint_len(self.locator_hashes.len() as u64)
            + self.locator_hashes.len() * 32
            + 32
    }
}

/// `headers`: a `getheaders` response. Not part of the distilled wire
/// schema list but needed for any peer that wants header-first sync
/// without downloading full blocks; each header carries a trailing
/// zero-length transaction count per the historical wire quirk.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct HeadersMessage {
    /// The headers being announced, in chain order.
    pub headers: Vec<Header>,
}

impl Codec for HeadersMessage {
    fn decode(reader: &mut ByteReader<'_>) -> Option<Self> {
        let count = reader.read_varint();
        let mut headers = Vec::with_capacity(count.min(2_000) as usize);
        for _ in 0..count {
            headers.push(Header::decode(reader)?);
            let tx_count = reader.read_varint();
            if tx_count != 0 {
                return None;
            }
        }
        if reader.failed() {
            None
        } else {
            Some(Self { headers })
        }
    }

    fn encode(&self, writer: &mut ByteWriter) {
        writer.write_varint(self.headers.len() as u64);
        for header in &self.headers {
            header.encode(writer);
            writer.write_varint(0);
        }
    }

    fn encoded_len(&self) -> usize {
        satoshi_core::ser::varint_len(self.headers.len() as u64) + self.headers.len() * 81
    }
}

/// `ping` / `pong`: identical shape, a single nonce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NonceMessage {
    /// Echoed nonce.
    pub nonce: u64,
}

impl Codec for NonceMessage {
    fn decode(reader: &mut ByteReader<'_>) -> Option<Self> {
        let nonce = reader.read_u64_le();
        if reader.failed() {
            None
        } else {
            Some(Self { nonce })
        }
    }

    fn encode(&self, writer: &mut ByteWriter) {
        writer.write_u64_le(self.nonce);
    }

    fn encoded_len(&self) -> usize {
        8
    }
}

/// Every message schema this crate knows how to decode/encode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    /// `version`.
    Version(VersionMessage),
    /// `verack`.
    VerAck,
    /// `addr`.
    Addr(AddrMessage),
    /// `getaddr`.
    GetAddr,
    /// `inv`.
    Inv(InventoryMessage),
    /// `getdata`.
    GetData(InventoryMessage),
    /// `notfound`.
    NotFound(InventoryMessage),
    /// `getblocks`.
    GetBlocks(LocatorMessage),
    /// `getheaders`.
    GetHeaders(LocatorMessage),
    /// `headers`.
    Headers(HeadersMessage),
    /// `tx`.
    Tx(Transaction),
    /// `block`.
    Block(Block),
    /// `ping`.
    Ping(NonceMessage),
    /// `pong`.
    Pong(NonceMessage),
}

impl Message {
    /// The command name this message serializes under.
    pub fn command(&self) -> &'static str {
        match self {
            Self::Version(_) => "version",
            Self::VerAck => "verack",
            Self::Addr(_) => "addr",
            Self::GetAddr => "getaddr",
            Self::Inv(_) => "inv",
            Self::GetData(_) => "getdata",
            Self::NotFound(_) => "notfound",
            Self::GetBlocks(_) => "getblocks",
            Self::GetHeaders(_) => "getheaders",
            Self::Headers(_) => "headers",
            Self::Tx(_) => "tx",
            Self::Block(_) => "block",
            Self::Ping(_) => "ping",
            Self::Pong(_) => "pong",
        }
    }

    /// Serialize just the payload (the caller wraps it in a [`crate::frame::FrameHeader`]).
    pub fn encode_payload(&self) -> Vec<u8> {
        match self {
            Self::Version(m) => m.to_bytes(),
            Self::VerAck | Self::GetAddr => Vec::new(),
            Self::Addr(m) => m.to_bytes(),
            Self::Inv(m) | Self::GetData(m) | Self::NotFound(m) => m.to_bytes(),
            Self::GetBlocks(m) | Self::GetHeaders(m) => m.to_bytes(),
            Self::Headers(m) => m.to_bytes(),
            Self::Tx(m) => m.to_bytes(),
            Self::Block(m) => m.to_bytes(),
            Self::Ping(m) | Self::Pong(m) => m.to_bytes(),
        }
    }

    /// Decode a payload given its command name. Returns `None` for a
    /// command this crate has no schema for or a malformed payload.
    pub fn decode(command: &str, payload: &[u8]) -> Option<Self> {
        Some(match command {
            "version" => Self::Version(VersionMessage::from_bytes(payload)?),
            "verack" => Self::VerAck,
            "addr" => Self::Addr(AddrMessage::from_bytes(payload)?),
            "getaddr" => Self::GetAddr,
            "inv" => Self::Inv(InventoryMessage::from_bytes(payload)?),
            "getdata" => Self::GetData(InventoryMessage::from_bytes(payload)?),
            "notfound" => Self::NotFound(InventoryMessage::from_bytes(payload)?),
            "getblocks" => Self::GetBlocks(LocatorMessage::from_bytes(payload)?),
            "getheaders" => Self::GetHeaders(LocatorMessage::from_bytes(payload)?),
            "headers" => Self::Headers(HeadersMessage::from_bytes(payload)?),
            "tx" => Self::Tx(Transaction::from_bytes(payload)?),
            "block" => Self::Block(Block::from_bytes(payload)?),
            "ping" => Self::Ping(NonceMessage::from_bytes(payload)?),
            "pong" => Self::Pong(NonceMessage::from_bytes(payload)?),
            _ => return None,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn addr() -> NetworkAddress {
        NetworkAddress {
            services: 1,
            ip: [0u8; 16],
            port: 8333,
        }
    }

    #[test]
    fn version_roundtrips_with_and_without_relay() {
        let msg = VersionMessage {
            version: 70015,
            services: 1,
            timestamp: 1_600_000_000,
            addr_recv: addr(),
            addr_from: addr(),
            nonce: 42,
            user_agent: "/satoshi-node:0.1/".to_string(),
            start_height: 100,
            relay: Some(true),
        };
        let bytes = msg.to_bytes();
        assert_eq!(bytes.len(), msg.encoded_len());
        assert_eq!(VersionMessage::from_bytes(&bytes).unwrap(), msg);
    }

    #[test]
    fn inv_roundtrips_witness_flagged_items() {
        let msg = InventoryMessage {
            items: vec![InventoryItem {
                kind: InventoryKind::WitnessTx,
                hash: Hash32::zero(),
            }],
        };
        let bytes = msg.to_bytes();
        let back = InventoryMessage::from_bytes(&bytes).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn message_dispatch_roundtrips_ping() {
        let msg = Message::Ping(NonceMessage { nonce: 7 });
        let payload = msg.encode_payload();
        let back = Message::decode("ping", &payload).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn unknown_command_decodes_to_none() {
        assert!(Message::decode("notarealcommand", &[]).is_none());
    }

    #[test]
    fn headers_message_roundtrips() {
        let header = Header {
            version: 1,
            previous_block_hash: Hash32::zero(),
            merkle_root: Hash32::zero(),
            timestamp: 0,
            bits: 0x207f_ffff,
            nonce: 0,
        };
        let msg = HeadersMessage {
            headers: vec![header],
        };
        let bytes = msg.to_bytes();
        assert_eq!(HeadersMessage::from_bytes(&bytes).unwrap(), msg);
    }
}
