//! End-to-end tests over real loopback sockets.

use std::{net::SocketAddr, time::Duration};

use tandem_core::{Engine, EngineConfig, rate_limiter::RateLimitConfig};
use tandem_proto::{ClientEvent, ServerEvent, events::client::SendMessage};
use tandem_server::{
    EngineActor, SystemEnv,
    actor::COMMAND_CAPACITY,
    codec::{read_frame, write_frame},
    listener::{CONNECT_LIMIT_MESSAGE, Listener},
};
use tokio::{net::TcpStream, sync::mpsc};

async fn start(connect_rate: RateLimitConfig) -> SocketAddr {
    let (commands, inbox) = mpsc::channel(COMMAND_CAPACITY);
    let loopback = "127.0.0.1:0".parse().expect("valid address");
    let listener =
        Listener::bind(loopback, SystemEnv, connect_rate, commands).await.expect("bind loopback");
    let addr = listener.local_addr().expect("bound address");

    let actor = EngineActor::new(Engine::new(SystemEnv, EngineConfig::default()), inbox);
    tokio::spawn(actor.run(std::future::pending()));
    tokio::spawn(listener.run());

    addr
}

async fn next_named(stream: &mut TcpStream, name: &str) -> ServerEvent {
    loop {
        let frame = read_frame(stream).await.expect("read").expect("stream open");
        let event = ServerEvent::from_frame(&frame).expect("server event");
        if event.name() == name {
            return event;
        }
    }
}

#[tokio::test]
async fn two_tcp_clients_are_paired_and_chat() {
    let addr = start(RateLimitConfig::CONNECTS).await;

    let mut alice = TcpStream::connect(addr).await.expect("connect");
    next_named(&mut alice, "waiting").await;
    let mut bob = TcpStream::connect(addr).await.expect("connect");

    let ServerEvent::Matched(matched) = next_named(&mut bob, "matched").await else {
        unreachable!("next_named returns the named event");
    };
    next_named(&mut alice, "matched").await;

    let frame = ClientEvent::SendMessage(SendMessage { content: Some("hello".to_string()) })
        .into_frame()
        .expect("encodes");
    write_frame(&mut bob, &frame).await.expect("write");

    let ServerEvent::ReceiveMessage(message) = next_named(&mut alice, "receive-message").await
    else {
        unreachable!("next_named returns the named event");
    };
    assert_eq!(message.content, "hello");
    assert_ne!(message.sender_id, matched.partner_id, "bob's partner is alice, not bob");
}

#[tokio::test]
async fn connect_limit_refuses_with_retry_hint() {
    let rate = RateLimitConfig {
        max_requests: 1,
        window: Duration::from_secs(60),
        block_for: Some(Duration::from_secs(300)),
    };
    let addr = start(rate).await;

    let mut first = TcpStream::connect(addr).await.expect("connect");
    next_named(&mut first, "waiting").await;

    let mut second = TcpStream::connect(addr).await.expect("connect");
    let ServerEvent::Error(payload) = next_named(&mut second, "error").await else {
        unreachable!("next_named returns the named event");
    };
    assert_eq!(payload.message, CONNECT_LIMIT_MESSAGE);
    assert_eq!(payload.retry_after, Some(300));

    assert_eq!(read_frame(&mut second).await.expect("clean close"), None);
}
