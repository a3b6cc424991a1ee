//! The channel: one socket, one read pipeline, one write pipeline, three
//! timers, and a subscriber registry, all serialized through a strand.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use satoshi_wire::frame::{FrameHeader, HEADER_LEN, MAX_PAYLOAD_LEN};
use satoshi_wire::messages::NonceMessage;
use satoshi_wire::Message;

use crate::error::NetError;
use crate::strand::Strand;
use crate::subscriber::{ChannelSubscribers, Handler};
use crate::timers::Timer;

/// Default interval between heartbeat `ping`s when none is supplied.
pub const DEFAULT_HEARTBEAT_PERIOD: Duration = Duration::from_secs(30);
/// Default idle-read deadline when none is supplied.
pub const DEFAULT_TIMEOUT_PERIOD: Duration = Duration::from_secs(90);

/// The read pipeline's current stage, mirroring the states a single frame
/// passes through on its way in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadState {
    /// No read currently in flight.
    Idle,
    /// Filling the 20-byte magic/command/length prefix.
    ReadingHeader,
    /// Filling the 4-byte checksum.
    ReadingChecksum,
    /// Filling the payload, sized by the header's declared length.
    ReadingPayload,
    /// Terminal: the channel will not read or write again.
    Stopped,
}

struct Inner {
    magic: [u8; 4],
    strand: Strand,
    subscribers: ChannelSubscribers,
    writer: tokio::sync::Mutex<OwnedWriteHalf>,
    stopped: AtomicBool,
    state: Mutex<ReadState>,
    heartbeat: Mutex<Option<Timer>>,
    timeout: Mutex<Option<Timer>>,
    revival: Mutex<Option<Timer>>,
}

impl Inner {
    /// Transition to `Stopped` and flush every subscriber. A no-op past the
    /// first call, matching the documented stop idempotence.
    ///
    /// A free associated function taking `&Arc<Inner>` rather than a method
    /// with an `Arc<Self>` receiver, since stable Rust only special-cases
    /// `Arc<Self>`/`Rc<Self>`/`Box<Self>` by value as receivers, not `&Arc<Self>`.
    fn stop(inner: &Arc<Inner>, cause: NetError) {
        if inner.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        *inner.state.lock().unwrap() = ReadState::Stopped;
        // The heartbeat/timeout/revival tasks hold only weak references to
        // `Inner`, so dropping the timers here is enough to let them wind
        // down; we don't need an explicit cancellation signal.
        *inner.heartbeat.lock().unwrap() = None;
        *inner.timeout.lock().unwrap() = None;
        *inner.revival.lock().unwrap() = None;
        let inner2 = inner.clone();
        inner.strand.post(move || async move {
            inner2.subscribers.fire_stop(cause);
        });
    }
}

/// A handle to one peer connection's channel. Cloning shares the same
/// underlying socket, strand, and subscriber registry.
#[derive(Clone)]
pub struct Channel {
    inner: Arc<Inner>,
}

impl Channel {
    /// Take ownership of an already-connected socket and start its read
    /// pipeline and timers. `magic` is the network's frame magic; frames
    /// carrying any other magic are treated as corrupt.
    pub fn spawn(stream: TcpStream, magic: [u8; 4]) -> Self {
        Self::spawn_with_periods(stream, magic, DEFAULT_HEARTBEAT_PERIOD, DEFAULT_TIMEOUT_PERIOD)
    }

    /// Like [`Channel::spawn`], with explicit heartbeat/timeout periods.
    pub fn spawn_with_periods(
        stream: TcpStream,
        magic: [u8; 4],
        heartbeat_period: Duration,
        timeout_period: Duration,
    ) -> Self {
        let (read_half, write_half) = stream.into_split();

        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| {
            let weak_heartbeat = weak.clone();
            let heartbeat = Timer::periodic(heartbeat_period, move || {
                if let Some(inner) = weak_heartbeat.upgrade() {
                    let channel = Channel { inner };
                    tokio::spawn(async move {
                        let nonce = rand::random::<u64>();
                        let _ = channel.send(&Message::Ping(NonceMessage { nonce })).await;
                    });
                }
            });

            let weak_timeout = weak.clone();
            let timeout = Timer::one_shot(timeout_period, move || {
                if let Some(inner) = weak_timeout.upgrade() {
                    Inner::stop(&inner, NetError::ChannelTimeout);
                }
            });

            Inner {
                magic,
                strand: Strand::spawn(),
                subscribers: ChannelSubscribers::new(),
                writer: tokio::sync::Mutex::new(write_half),
                stopped: AtomicBool::new(false),
                state: Mutex::new(ReadState::Idle),
                heartbeat: Mutex::new(Some(heartbeat)),
                timeout: Mutex::new(Some(timeout)),
                revival: Mutex::new(None),
            }
        });

        tokio::spawn(run_read_pipeline(inner.clone(), read_half));

        Self { inner }
    }

    /// The read pipeline's current stage.
    pub fn state(&self) -> ReadState {
        *self.inner.state.lock().unwrap()
    }

    /// Serialize `message`, frame it, and write it in a single socket write.
    /// The write is posted onto the strand so it can't interleave with the
    /// read pipeline's dispatch of an in-flight message.
    pub async fn send(&self, message: &Message) -> Result<(), NetError> {
        if self.inner.stopped.load(Ordering::SeqCst) {
            return Err(NetError::ServiceStopped);
        }
        let bytes = satoshi_wire::encode_frame(self.inner.magic, message);
        let inner = self.inner.clone();
        self.inner
            .strand
            .post_wait(move || async move {
                let mut writer = inner.writer.lock().await;
                writer
                    .write_all(&bytes)
                    .await
                    .map_err(|_| NetError::BadStream)
            })
            .await?
    }

    /// Register a one-shot handler for `command`'s next decoded delivery.
    pub fn subscribe(&self, command: &'static str, handler: Handler<Message>) {
        self.inner.subscribers.subscribe(command, handler);
    }

    /// Register a one-shot handler for the next frame, decoded or not.
    pub fn subscribe_raw(&self, handler: Handler<(FrameHeader, Vec<u8>)>) {
        self.inner.subscribers.subscribe_raw(handler);
    }

    /// Register a one-shot handler invoked when the channel stops.
    pub fn subscribe_stop(&self, handler: Handler<NetError>) {
        self.inner.subscribers.subscribe_stop(handler);
    }

    /// Arm the optional revival timer: if no read succeeds within `period`,
    /// `handler` fires (used by higher layers to request fresh inv/getdata
    /// traffic rather than to tear the channel down).
    pub fn set_revival_handler<F>(&self, period: Duration, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let timer = Timer::periodic(period, handler);
        *self.inner.revival.lock().unwrap() = Some(timer);
    }

    /// Rearm the revival timer from its full period. A no-op if no revival
    /// handler has been registered.
    pub fn reset_revival(&self) {
        if let Some(timer) = self.inner.revival.lock().unwrap().as_ref() {
            timer.reset();
        }
    }

    /// Gracefully stop the channel. Idempotent; subsequent `send`/
    /// `subscribe_*` calls observe `service_stopped`.
    pub fn stop(&self) {
        Inner::stop(&self.inner, NetError::ServiceStopped);
    }
}

/// Drive the read pipeline: `Idle -> ReadingHeader -> ReadingChecksum ->
/// ReadingPayload -> Idle`, looping until a read fails or the checksum
/// doesn't match, at which point the channel transitions to `Stopped`.
async fn run_read_pipeline(inner: Arc<Inner>, mut reader: OwnedReadHalf) {
    loop {
        *inner.state.lock().unwrap() = ReadState::ReadingHeader;
        let mut prefix = [0u8; HEADER_LEN - 4];
        if reader.read_exact(&mut prefix).await.is_err() {
            Inner::stop(&inner, NetError::BadStream);
            return;
        }

        *inner.state.lock().unwrap() = ReadState::ReadingChecksum;
        let mut checksum = [0u8; 4];
        if reader.read_exact(&mut checksum).await.is_err() {
            Inner::stop(&inner, NetError::BadStream);
            return;
        }

        let mut raw_header = [0u8; HEADER_LEN];
        raw_header[..HEADER_LEN - 4].copy_from_slice(&prefix);
        raw_header[HEADER_LEN - 4..].copy_from_slice(&checksum);
        let header = match FrameHeader::from_bytes(&raw_header) {
            Some(header) => header,
            None => {
                Inner::stop(&inner, NetError::BadStream);
                return;
            }
        };
        if header.magic != inner.magic || header.payload_len > MAX_PAYLOAD_LEN {
            Inner::stop(&inner, NetError::BadStream);
            return;
        }

        *inner.state.lock().unwrap() = ReadState::ReadingPayload;
        let mut payload = vec![0u8; header.payload_len as usize];
        if reader.read_exact(&mut payload).await.is_err() {
            Inner::stop(&inner, NetError::BadStream);
            return;
        }
        if header.verify_payload(&payload).is_err() {
            Inner::stop(&inner, NetError::BadStream);
            return;
        }

        if let Some(timeout) = inner.timeout.lock().unwrap().as_ref() {
            timeout.reset();
        }

        let command = header.command_str().to_string();
        let decoded = Message::decode(&command, &payload);
        let inner2 = inner.clone();
        let header2 = header.clone();
        inner.strand.post(move || async move {
            inner2.subscribers.notify_raw(header2, payload);
            if let Some(message) = decoded {
                inner2.subscribers.notify(message.command(), message);
            }
            // An unrecognized command is not an error: the payload is
            // simply discarded here and the loop above keeps reading.
        });

        *inner.state.lock().unwrap() = ReadState::Idle;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::mpsc;
    use tokio::net::TcpListener;

    const MAGIC: [u8; 4] = [0xF9, 0xBE, 0xB4, 0xD9];

    async fn connected_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connect = TcpStream::connect(addr);
        let (accepted, connected) = tokio::join!(listener.accept(), connect);
        (accepted.unwrap().0, connected.unwrap())
    }

    #[tokio::test]
    async fn delivers_a_decoded_message_to_its_subscriber() {
        let (server_sock, client_sock) = connected_pair().await;
        let server = Channel::spawn(server_sock, MAGIC);
        let client = Channel::spawn(client_sock, MAGIC);

        let (tx, rx) = mpsc::channel();
        server.subscribe(
            "ping",
            Box::new(move |result| {
                tx.send(result).unwrap();
            }),
        );

        client
            .send(&Message::Ping(NonceMessage { nonce: 7 }))
            .await
            .unwrap();

        let delivered = tokio::task::spawn_blocking(move || rx.recv().unwrap())
            .await
            .unwrap();
        assert_eq!(delivered, Ok(Message::Ping(NonceMessage { nonce: 7 })));
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_flushes_subscribers() {
        let (server_sock, client_sock) = connected_pair().await;
        let server = Channel::spawn(server_sock, MAGIC);
        drop(client_sock);

        let (tx, rx) = mpsc::channel();
        server.subscribe_stop(Box::new(move |cause| {
            tx.send(cause).unwrap();
        }));
        server.stop();
        server.stop();

        let cause = tokio::task::spawn_blocking(move || rx.recv().unwrap())
            .await
            .unwrap();
        assert_eq!(cause, Ok(NetError::ServiceStopped));
        assert_eq!(
            server.send(&Message::GetAddr).await,
            Err(NetError::ServiceStopped)
        );
    }
}
