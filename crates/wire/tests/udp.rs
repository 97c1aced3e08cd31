use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tickwire::{
    Channel, Direction, MessageHandler, NetworkSession, Remote, SessionConfig, Transport,
    TransportEvent, UdpTransport,
};

static PORT_COUNTER: AtomicU16 = AtomicU16::new(41000);

fn next_port() -> u16 {
    PORT_COUNTER.fetch_add(10, Ordering::SeqCst)
}

fn bind_server() -> (UdpTransport, SocketAddr) {
    let port = next_port();
    let addr: SocketAddr = format!("127.0.0.1:{}", port).parse().unwrap();
    let server = UdpTransport::bind_server(addr, 4, Duration::from_secs(5)).unwrap();
    (server, addr)
}

#[derive(Default)]
struct Inbox {
    messages: Vec<(Remote, Channel, Vec<u8>)>,
    connected: Vec<Remote>,
    disconnected: Vec<Remote>,
}

impl MessageHandler for Inbox {
    fn on_message_received(&mut self, remote: Remote, channel: Channel, payload: &[u8]) {
        self.messages.push((remote, channel, payload.to_vec()));
    }

    fn on_connected(&mut self, remote: Remote) {
        self.connected.push(remote);
    }

    fn on_disconnected(&mut self, remote: Remote) {
        self.disconnected.push(remote);
    }
}

fn poll_until<T, F>(transport: &mut T, timeout_ms: u64, mut done: F) -> Vec<TransportEvent>
where
    T: Transport,
    F: FnMut(&[TransportEvent]) -> bool,
{
    let start = Instant::now();
    let mut events = Vec::new();
    while start.elapsed() < Duration::from_millis(timeout_ms) {
        events.extend(transport.iterate_incoming());
        if done(&events) {
            break;
        }
        thread::sleep(Duration::from_millis(1));
    }
    events
}

fn pump_until<F>(
    session: &mut NetworkSession,
    transport: &mut UdpTransport,
    inbox: &mut Inbox,
    timeout_ms: u64,
    mut done: F,
) where
    F: FnMut(&Inbox) -> bool,
{
    let start = Instant::now();
    while start.elapsed() < Duration::from_millis(timeout_ms) {
        session.iterate_incoming(transport, inbox);
        if done(inbox) {
            return;
        }
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_connect_admits_peer() {
    let (mut server, addr) = bind_server();
    let mut client = UdpTransport::connect(addr).unwrap();

    assert_eq!(
        client.iterate_incoming(),
        vec![TransportEvent::Connected(Remote::Server)]
    );

    let events = poll_until(&mut server, 500, |e| !e.is_empty());
    assert!(matches!(
        events.as_slice(),
        [TransportEvent::Connected(Remote::Peer(_))]
    ));
    assert_eq!(server.connections().map(|c| c.len()), Some(1));
}

#[test]
fn test_frames_carry_channel_tag() {
    let (mut server, addr) = bind_server();
    let mut client = UdpTransport::connect(addr).unwrap();
    client.iterate_incoming();

    client.send(Channel::Unreliable, &[1, 2, 3], Remote::Server);
    let events = poll_until(&mut server, 500, |e| e.len() >= 2);

    let data: Vec<_> = events
        .into_iter()
        .filter_map(|e| match e {
            TransportEvent::Data {
                channel, payload, ..
            } => Some((channel, payload)),
            _ => None,
        })
        .collect();
    assert_eq!(data, vec![(Channel::Unreliable, vec![1, 2, 3])]);
}

#[test]
fn test_oversized_datagram_is_refused() {
    let (_server, addr) = bind_server();
    let mut client = UdpTransport::connect(addr).unwrap();

    let mtu = client.mtu(Channel::Reliable);
    client.send(Channel::Reliable, &vec![0; mtu + 1], Remote::Server);
    assert_eq!(client.stats().send_errors, 1);
}

#[test]
fn test_sessions_exchange_fragmented_message() {
    let (mut server_transport, addr) = bind_server();
    let mut client_transport = UdpTransport::connect(addr).unwrap();

    let mut server = NetworkSession::new(SessionConfig::default());
    let mut client = NetworkSession::new(SessionConfig::default());
    let mut server_inbox = Inbox::default();
    let mut client_inbox = Inbox::default();

    client.iterate_incoming(&mut client_transport, &mut client_inbox);
    pump_until(&mut server, &mut server_transport, &mut server_inbox, 500, |i| {
        !i.connected.is_empty()
    });
    let peer = server_inbox.connected[0];

    let big: Vec<u8> = (0..2500).map(|i| (i % 199) as u8).collect();
    client.enqueue(Remote::Server, Channel::Reliable, b"hello", false);
    client.enqueue(Remote::Server, Channel::Reliable, &big, false);
    client.iterate_outgoing(Direction::ToServer, &mut client_transport, Instant::now());

    pump_until(&mut server, &mut server_transport, &mut server_inbox, 1000, |i| {
        i.messages.len() >= 2
    });
    assert_eq!(server_inbox.messages.len(), 2);
    assert_eq!(server_inbox.messages[0], (peer, Channel::Reliable, b"hello".to_vec()));
    assert_eq!(server_inbox.messages[1].2, big);

    server.enqueue(peer, Channel::Unreliable, b"echo", false);
    server.iterate_outgoing(Direction::ToPeers, &mut server_transport, Instant::now());
    pump_until(&mut client, &mut client_transport, &mut client_inbox, 500, |i| {
        !i.messages.is_empty()
    });
    assert_eq!(
        client_inbox.messages,
        vec![(Remote::Server, Channel::Unreliable, b"echo".to_vec())]
    );
}

#[test]
fn test_server_stop_reaches_client() {
    let (mut server_transport, addr) = bind_server();
    let mut client_transport = UdpTransport::connect(addr).unwrap();

    let mut server = NetworkSession::new(SessionConfig::default());
    let mut client = NetworkSession::new(SessionConfig::default());
    let mut server_inbox = Inbox::default();
    let mut client_inbox = Inbox::default();

    client.iterate_incoming(&mut client_transport, &mut client_inbox);
    pump_until(&mut server, &mut server_transport, &mut server_inbox, 500, |i| {
        !i.connected.is_empty()
    });
    let peer = server_inbox.connected[0];

    server.mark_disconnecting(peer);
    server.iterate_outgoing(Direction::ToPeers, &mut server_transport, Instant::now());
    for _ in 0..server.config().disconnect_drain_ticks() {
        server.advance_tick();
    }
    assert_eq!(server.process_disconnects(&mut server_transport), vec![peer]);
    assert_eq!(server_transport.connections().map(|c| c.len()), Some(0));

    pump_until(&mut client, &mut client_transport, &mut client_inbox, 500, |i| {
        !i.disconnected.is_empty()
    });
    assert_eq!(client_inbox.disconnected, vec![Remote::Server]);
    assert!(!client_transport.is_connected());
}
