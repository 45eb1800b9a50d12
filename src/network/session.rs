//! TCP session to the SDR server
//!
//! The read side feeds the framer and the orchestrator; outgoing messages go through a bounded
//! channel to a writer task that owns the write half.

use std::net::SocketAddr;
use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

use crate::audio::PcmBlock;
use crate::config::NetworkConfig;
use crate::error::{NetworkError, Result};
use crate::protocol::{FramedMessage, LinkStatus, MessageFramer};
use crate::stream::{ControlCommand, StreamOrchestrator};

/// Period of the keepalive/housekeeping tick
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

const READ_CHUNK: usize = 4096;

/// OS-level keepalive probe interval on the socket
const TCP_KEEPALIVE_TIME: Duration = Duration::from_secs(30);

pub struct Session {
    reader: OwnedReadHalf,
    outgoing: mpsc::Sender<FramedMessage>,
    writer: JoinHandle<()>,
    framer: MessageFramer,
    idle_timeout: Duration,
    peer: SocketAddr,
}

impl Session {
    /// Connect to the configured server, reporting `Connecting` then `Connected` (or
    /// `DisconnectTimeout` on failure) through the orchestrator.
    pub async fn connect(
        config: &NetworkConfig,
        orchestrator: &mut StreamOrchestrator,
    ) -> Result<Self> {
        let address = config.address();
        orchestrator.set_status(LinkStatus::Connecting);
        info!("Connecting to {}", address);

        let stream = match time::timeout(config.connect_timeout(), TcpStream::connect(&address))
            .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                error!("Connect to {} failed: {}", address, e);
                orchestrator.shutdown(LinkStatus::DisconnectTimeout);
                return Err(NetworkError::ConnectionFailed(e.to_string()).into());
            }
            Err(_) => {
                error!("Connect to {} timed out", address);
                orchestrator.shutdown(LinkStatus::DisconnectTimeout);
                return Err(NetworkError::ConnectTimeout(address).into());
            }
        };

        let session = Self::from_stream(stream, config)?;
        orchestrator.set_status(LinkStatus::Connected);
        Ok(session)
    }

    /// Wrap an already connected stream
    pub fn from_stream(stream: TcpStream, config: &NetworkConfig) -> Result<Self> {
        stream.set_nodelay(true)?;
        let keepalive = TcpKeepalive::new().with_time(TCP_KEEPALIVE_TIME);
        if let Err(e) = SockRef::from(&stream).set_tcp_keepalive(&keepalive) {
            warn!("Failed to enable TCP keepalive: {}", e);
        }

        let peer = stream.peer_addr()?;
        let (reader, writer) = stream.into_split();
        let (outgoing, rx) = mpsc::channel(config.send_queue_depth);
        let writer = tokio::spawn(write_loop(writer, rx));

        info!("Connected to {}", peer);
        Ok(Self {
            reader,
            outgoing,
            writer,
            framer: MessageFramer::new(config.max_message_len),
            idle_timeout: config.idle_timeout(),
            peer,
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Drive the link until it ends.
    ///
    /// Returns `Ok` when the command channel closes; every other end is an error and leaves
    /// the orchestrator in a disconnected state.
    pub async fn run(
        mut self,
        orchestrator: &mut StreamOrchestrator,
        mut commands: mpsc::Receiver<ControlCommand>,
        mut capture: mpsc::Receiver<PcmBlock>,
    ) -> Result<()> {
        let result = self.drive(orchestrator, &mut commands, &mut capture).await;

        self.framer.reset();
        drop(self.outgoing);
        if let Err(e) = self.writer.await {
            warn!("Writer task ended abnormally: {}", e);
        }

        match &result {
            Ok(()) => {
                info!("Session with {} closed", self.peer);
                orchestrator.shutdown(LinkStatus::Off);
            }
            Err(e) => {
                error!("Session with {} ended: {}", self.peer, e);
                if !orchestrator.status().is_disconnected() {
                    orchestrator.shutdown(LinkStatus::DisconnectTimeout);
                }
            }
        }
        result
    }

    async fn drive(
        &mut self,
        orchestrator: &mut StreamOrchestrator,
        commands: &mut mpsc::Receiver<ControlCommand>,
        capture: &mut mpsc::Receiver<PcmBlock>,
    ) -> Result<()> {
        let mut buf = vec![0u8; READ_CHUNK];
        let mut received = Vec::new();
        let mut ticker = time::interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
        let idle = time::sleep(self.idle_timeout);
        tokio::pin!(idle);

        loop {
            tokio::select! {
                read = self.reader.read(&mut buf) => {
                    let n = read?;
                    if n == 0 {
                        return Err(NetworkError::Closed.into());
                    }
                    received.clear();
                    let framed = self.framer.feed_slice(&buf[..n], &mut received);
                    if !received.is_empty() {
                        idle.as_mut().reset(Instant::now() + self.idle_timeout);
                    }
                    for msg in &received {
                        orchestrator.handle_message(msg)?;
                    }
                    framed?;
                }
                Some(block) = capture.recv() => {
                    orchestrator.push_capture(&block);
                }
                cmd = commands.recv() => match cmd {
                    Some(cmd) => {
                        debug!("Command {:?}", cmd);
                        orchestrator.apply(cmd);
                    }
                    None => {
                        self.flush(orchestrator).await?;
                        return Ok(());
                    }
                },
                _ = ticker.tick() => {
                    orchestrator.keepalive_tick()?;
                }
                _ = &mut idle => {
                    warn!("Nothing received from {} for {:?}", self.peer, self.idle_timeout);
                    return Err(NetworkError::IdleTimeout(self.idle_timeout).into());
                }
            }

            self.flush(orchestrator).await?;
        }
    }

    async fn flush(&self, orchestrator: &mut StreamOrchestrator) -> Result<()> {
        for msg in orchestrator.take_outbound() {
            self.outgoing
                .send(msg)
                .await
                .map_err(|_| NetworkError::SendFailed("writer task stopped".into()))?;
        }
        Ok(())
    }
}

async fn write_loop(mut writer: OwnedWriteHalf, mut rx: mpsc::Receiver<FramedMessage>) {
    while let Some(msg) = rx.recv().await {
        let bytes = match msg.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Dropping outgoing {:?} message: {}", msg.kind, e);
                continue;
            }
        };
        if let Err(e) = writer.write_all(&bytes).await {
            error!("Write failed: {}", e);
            break;
        }
    }
    if let Err(e) = writer.shutdown().await {
        debug!("Socket shutdown: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{shared_jitter_buffer, NullOutput, PlaybackPath};
    use crate::error::Error;
    use crate::protocol::items::CHAT_RXCHAR;
    use crate::protocol::MessageKind;
    use crate::stream::StreamEvent;
    use bytes::Bytes;
    use crossbeam_channel::{bounded, Receiver};
    use tokio::net::TcpListener;

    fn orchestrator() -> (StreamOrchestrator, Receiver<StreamEvent>) {
        let (tx, rx) = bounded(256);
        let orch = StreamOrchestrator::new(
            PlaybackPath::new(shared_jitter_buffer(24000)),
            Box::new(NullOutput::new()),
            tx,
        );
        (orch, rx)
    }

    async fn listen() -> (TcpListener, NetworkConfig) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let config = NetworkConfig {
            host: addr.ip().to_string(),
            port: addr.port(),
            ..NetworkConfig::default()
        };
        (listener, config)
    }

    #[tokio::test]
    async fn test_commands_reach_server_and_messages_reach_events() {
        let (listener, config) = listen().await;
        let (mut orch, events) = orchestrator();

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let chat = FramedMessage::data(
                MessageKind::DataItem3,
                Bytes::from_static(&[CHAT_RXCHAR, b'q']),
            );
            sock.write_all(&chat.encode().unwrap()).await.unwrap();

            let mut got = [0u8; 8];
            sock.read_exact(&mut got).await.unwrap();
            got
        });

        let session = Session::connect(&config, &mut orch).await.unwrap();
        assert_eq!(orch.status(), LinkStatus::Connected);

        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (_cap_tx, cap_rx) = mpsc::channel(8);
        cmd_tx.send(ControlCommand::SetRunState(true)).await.unwrap();

        let run = tokio::spawn(async move {
            let result = session.run(&mut orch, cmd_rx, cap_rx).await;
            (result, orch)
        });

        let got = server.await.unwrap();
        assert_eq!(got, [0x08, 0x00, 0x18, 0x00, 0x00, 0x02, 0x00, 0x00]);

        let mut seen = Vec::new();
        for _ in 0..200 {
            seen.extend(events.try_iter());
            if seen.contains(&StreamEvent::RxChar(b'q')) {
                break;
            }
            time::sleep(Duration::from_millis(10)).await;
        }

        drop(cmd_tx);
        let (result, orch) = run.await.unwrap();
        // either the command channel closed first or the server hung up
        if let Err(e) = result {
            assert!(matches!(e, Error::Network(NetworkError::Closed)));
        }
        assert!(orch.status() == LinkStatus::Off || orch.status().is_disconnected());

        seen.extend(events.try_iter());
        assert!(seen.contains(&StreamEvent::Status(LinkStatus::Connecting)));
        assert!(seen.contains(&StreamEvent::Status(LinkStatus::Connected)));
        assert!(seen.contains(&StreamEvent::RxChar(b'q')));
    }

    #[tokio::test]
    async fn test_peer_close_disconnects() {
        let (listener, config) = listen().await;
        let (mut orch, _events) = orchestrator();

        let server = tokio::spawn(async move {
            let (sock, _) = listener.accept().await.unwrap();
            drop(sock);
        });

        let session = Session::connect(&config, &mut orch).await.unwrap();
        server.await.unwrap();

        let (_cmd_tx, cmd_rx) = mpsc::channel(8);
        let (_cap_tx, cap_rx) = mpsc::channel(8);
        let result = session.run(&mut orch, cmd_rx, cap_rx).await;
        assert!(matches!(result, Err(Error::Network(NetworkError::Closed))));
        assert_eq!(orch.status(), LinkStatus::DisconnectTimeout);
    }

    #[tokio::test]
    async fn test_oversized_header_is_fatal() {
        let (listener, config) = listen().await;
        let (mut orch, _events) = orchestrator();

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            // declared length 4000, above the 3000 byte limit
            let word: u16 = 4000 | (4 << 13);
            sock.write_all(&word.to_le_bytes()).await.unwrap();
            // hold the socket open until the client gives up
            let mut rest = Vec::new();
            let _ = sock.read_to_end(&mut rest).await;
        });

        let session = Session::connect(&config, &mut orch).await.unwrap();
        let (_cmd_tx, cmd_rx) = mpsc::channel(8);
        let (_cap_tx, cap_rx) = mpsc::channel(8);
        let result = session.run(&mut orch, cmd_rx, cap_rx).await;
        assert!(matches!(result, Err(Error::Protocol(_))));
        assert_eq!(orch.status(), LinkStatus::DisconnectTimeout);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_idle_timeout() {
        let (listener, mut config) = listen().await;
        config.idle_timeout_secs = 1;
        let (mut orch, _events) = orchestrator();

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut rest = Vec::new();
            let _ = sock.read_to_end(&mut rest).await;
        });

        let session = Session::connect(&config, &mut orch).await.unwrap();
        let (_cmd_tx, cmd_rx) = mpsc::channel(8);
        let (_cap_tx, cap_rx) = mpsc::channel(8);
        let result = session.run(&mut orch, cmd_rx, cap_rx).await;
        assert!(matches!(
            result,
            Err(Error::Network(NetworkError::IdleTimeout(_)))
        ));
        assert_eq!(orch.status(), LinkStatus::DisconnectTimeout);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let (listener, config) = listen().await;
        drop(listener);
        let (mut orch, _events) = orchestrator();

        let result = Session::connect(&config, &mut orch).await;
        assert!(result.is_err());
        assert_eq!(orch.status(), LinkStatus::DisconnectTimeout);
    }
}
