//! TCP star transport for processes that share nothing but a network.
//!
//! Rank 0 listens; every other rank connects to it and introduces itself with
//! a [`Message::Join`] frame. Peers never talk to each other.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use super::message::{Message, FRAME_LEN};
use super::transport::Transport;
use crate::error::{Error, Result, TransportError};

const RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// One rank's end of a TCP star.
#[derive(Debug)]
pub struct TcpTransport {
    rank: usize,
    group_size: usize,
    streams: Vec<Option<TcpStream>>,
}

impl TcpTransport {
    /// Accepts `group_size - 1` peers on `listener` and becomes rank 0.
    ///
    /// Peers may connect in any order.
    ///
    /// # Errors
    /// Socket failures, or [`TransportError::Protocol`] for a peer that opens
    /// with anything but a `Join` naming a fresh, in-range rank.
    pub fn coordinator(listener: &TcpListener, group_size: usize) -> Result<Self> {
        if group_size == 0 {
            return Err(Error::InvalidGroup {
                rank: 0,
                group_size,
            });
        }

        let mut streams: Vec<Option<TcpStream>> = (0..group_size).map(|_| None).collect();
        for _ in 1..group_size {
            let (mut stream, addr) = listener.accept().map_err(TransportError::from)?;
            stream.set_nodelay(true).map_err(TransportError::from)?;

            let rank = read_join(&mut stream, addr)?;
            if rank == 0 || rank >= group_size {
                return Err(TransportError::Protocol(format!(
                    "{addr} claims rank {rank}, outside 1..{group_size}"
                ))
                .into());
            }
            if streams[rank].is_some() {
                return Err(TransportError::Protocol(format!(
                    "rank {rank} joined twice (second time from {addr})"
                ))
                .into());
            }
            streams[rank] = Some(stream);
            tracing::debug!(rank, %addr, "peer joined");
        }

        Ok(Self {
            rank: 0,
            group_size,
            streams,
        })
    }

    /// Binds `addr` and accepts the group as rank 0.
    pub fn listen(addr: SocketAddr, group_size: usize) -> Result<Self> {
        let listener = TcpListener::bind(addr).map_err(TransportError::from)?;
        tracing::info!(%addr, group_size, "waiting for peers");
        Self::coordinator(&listener, group_size)
    }

    /// Connects to rank 0 at `addr` as `rank`.
    ///
    /// # Errors
    /// [`Error::InvalidGroup`] unless `0 < rank < group_size`, or the
    /// connection failure.
    pub fn connect(addr: SocketAddr, rank: usize, group_size: usize) -> Result<Self> {
        check_peer_rank(rank, group_size)?;
        let stream = TcpStream::connect(addr).map_err(TransportError::from)?;
        Self::join(stream, rank, group_size)
    }

    /// Like [`TcpTransport::connect`], retrying refused connections until
    /// `timeout` elapses. Rank 0 may start after its peers.
    pub fn connect_retrying(
        addr: SocketAddr,
        rank: usize,
        group_size: usize,
        timeout: Duration,
    ) -> Result<Self> {
        check_peer_rank(rank, group_size)?;
        let deadline = Instant::now() + timeout;
        loop {
            match TcpStream::connect(addr) {
                Ok(stream) => return Self::join(stream, rank, group_size),
                Err(err) if retryable(&err) && Instant::now() < deadline => {
                    tracing::trace!(%addr, rank, "coordinator not up yet: {err}");
                    thread::sleep(RETRY_INTERVAL);
                }
                Err(err) => return Err(TransportError::from(err).into()),
            }
        }
    }

    fn join(mut stream: TcpStream, rank: usize, group_size: usize) -> Result<Self> {
        stream.set_nodelay(true).map_err(TransportError::from)?;
        write_frame(&mut stream, Message::Join { rank: rank as u32 })?;

        let mut streams: Vec<Option<TcpStream>> = (0..group_size).map(|_| None).collect();
        streams[0] = Some(stream);
        Ok(Self {
            rank,
            group_size,
            streams,
        })
    }

    fn stream(&mut self, peer: usize) -> Result<&mut TcpStream, TransportError> {
        let from = self.rank;
        self.streams
            .get_mut(peer)
            .and_then(Option::as_mut)
            .ok_or(TransportError::NoRoute { from, to: peer })
    }
}

impl Transport for TcpTransport {
    fn rank(&self) -> usize {
        self.rank
    }

    fn group_size(&self) -> usize {
        self.group_size
    }

    fn send(&mut self, to: usize, message: Message) -> Result<(), TransportError> {
        let stream = self.stream(to)?;
        write_frame(stream, message).map_err(|err| disconnect_on_eof(err, to))
    }

    fn recv(&mut self, from: usize) -> Result<Message, TransportError> {
        let stream = self.stream(from)?;
        read_frame(stream, from)
    }
}

/// Reads the opening frame of a connection whose rank is not known yet.
fn read_join(stream: &mut TcpStream, addr: SocketAddr) -> Result<usize, TransportError> {
    let mut bytes = [0u8; FRAME_LEN];
    if let Err(err) = stream.read_exact(&mut bytes) {
        return Err(match err.kind() {
            io::ErrorKind::UnexpectedEof | io::ErrorKind::ConnectionReset => {
                TransportError::Protocol(format!("{addr} hung up before joining"))
            }
            _ => TransportError::Io(err),
        });
    }
    match Message::decode(bytes)? {
        Message::Join { rank } => Ok(rank as usize),
        other => Err(TransportError::Protocol(format!(
            "{addr} opened with {other:?} instead of join"
        ))),
    }
}

fn check_peer_rank(rank: usize, group_size: usize) -> Result<()> {
    if rank == 0 || rank >= group_size || group_size > u32::MAX as usize {
        return Err(Error::InvalidGroup { rank, group_size });
    }
    Ok(())
}

fn retryable(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset | io::ErrorKind::TimedOut
    )
}

fn write_frame(stream: &mut TcpStream, message: Message) -> Result<(), TransportError> {
    stream.write_all(&message.encode())?;
    Ok(())
}

fn read_frame(stream: &mut TcpStream, peer: usize) -> Result<Message, TransportError> {
    let mut bytes = [0u8; FRAME_LEN];
    stream
        .read_exact(&mut bytes)
        .map_err(|err| disconnect_on_eof(TransportError::Io(err), peer))?;
    Message::decode(bytes)
}

fn disconnect_on_eof(err: TransportError, peer: usize) -> TransportError {
    match err {
        TransportError::Io(io)
            if matches!(
                io.kind(),
                io::ErrorKind::UnexpectedEof | io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset
            ) =>
        {
            TransportError::Disconnected { peer }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn loopback() -> TcpListener {
        TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap()
    }

    #[test]
    fn peers_join_in_any_order() {
        let listener = loopback();
        let addr = listener.local_addr().unwrap();

        thread::scope(|s| {
            let peers: Vec<_> = [2, 1]
                .into_iter()
                .map(|rank| {
                    s.spawn(move || {
                        let mut t = TcpTransport::connect(addr, rank, 3).unwrap();
                        t.send(0, Message::Arrival { epoch: rank as u32 }).unwrap();
                        t.recv(0).unwrap()
                    })
                })
                .collect();

            let mut hub = TcpTransport::coordinator(&listener, 3).unwrap();
            assert_eq!(hub.recv(1).unwrap(), Message::Arrival { epoch: 1 });
            assert_eq!(hub.recv(2).unwrap(), Message::Arrival { epoch: 2 });
            hub.send(1, Message::Release { epoch: 0 }).unwrap();
            hub.send(2, Message::Release { epoch: 0 }).unwrap();

            for p in peers {
                assert_eq!(p.join().unwrap(), Message::Release { epoch: 0 });
            }
        });
    }

    #[test]
    fn rejects_bad_peer_rank() {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, 1));
        assert!(matches!(
            TcpTransport::connect(addr, 0, 2),
            Err(Error::InvalidGroup { rank: 0, .. })
        ));
        assert!(matches!(
            TcpTransport::connect(addr, 2, 2),
            Err(Error::InvalidGroup { rank: 2, .. })
        ));
    }

    #[test]
    fn duplicate_join_is_a_protocol_error() {
        let listener = loopback();
        let addr = listener.local_addr().unwrap();

        thread::scope(|s| {
            s.spawn(move || {
                let _a = TcpTransport::connect(addr, 1, 3).unwrap();
                let _b = TcpTransport::connect(addr, 1, 3).unwrap();
            });
            assert!(matches!(
                TcpTransport::coordinator(&listener, 3),
                Err(Error::Transport(TransportError::Protocol(_)))
            ));
        });
    }

    #[test]
    fn hangup_before_join_names_the_address() {
        let listener = loopback();
        let addr = listener.local_addr().unwrap();

        thread::scope(|s| {
            let peer = s.spawn(move || {
                let stream = TcpStream::connect(addr).unwrap();
                let local = stream.local_addr().unwrap();
                drop(stream);
                local
            });
            let err = TcpTransport::coordinator(&listener, 2).unwrap_err();
            let local = peer.join().unwrap();
            match err {
                Error::Transport(TransportError::Protocol(msg)) => {
                    assert!(msg.contains("hung up before joining"), "{msg}");
                    assert!(msg.contains(&local.to_string()), "{msg}");
                }
                other => panic!("expected a protocol error, got {other:?}"),
            }
        });
    }

    #[test]
    fn hangup_is_a_disconnect() {
        let listener = loopback();
        let addr = listener.local_addr().unwrap();

        thread::scope(|s| {
            s.spawn(move || drop(TcpTransport::connect(addr, 1, 2).unwrap()));
            let mut hub = TcpTransport::coordinator(&listener, 2).unwrap();
            assert!(matches!(
                hub.recv(1),
                Err(TransportError::Disconnected { peer: 1 })
            ));
        });
    }
}
