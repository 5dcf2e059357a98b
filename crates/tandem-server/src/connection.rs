//! Per-connection reader and writer tasks.
//!
//! The reader decodes frames and forwards them to the engine actor. The
//! writer drains the connection's outbound channel onto the socket. Neither
//! touches engine state.
//!
//! # Lifecycle
//!
//! 1. `Connect` is sent with the outbound sender; the actor replies with the
//!    assigned id
//! 2. The reader runs until end of stream, a socket error, or a corrupt
//!    header
//! 3. `Disconnect` is sent; the actor drops the outbound sender, which ends
//!    the writer after it has flushed what was already queued

use tandem_core::ConnectionId;
use tandem_proto::{ClientEvent, ServerEvent};
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
    sync::{mpsc, oneshot},
};
use tracing::{debug, error, warn};

use crate::{
    actor::Command,
    codec::{self, CodecError},
    registry::OUTBOUND_CAPACITY,
};

/// Serve one client until it goes away.
pub async fn serve<R, W>(reader: R, writer: W, commands: mpsc::Sender<Command>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (outbound, inbound) = mpsc::channel(OUTBOUND_CAPACITY);
    let (reply, assigned) = oneshot::channel();

    if commands.send(Command::Connect { outbound, reply }).await.is_err() {
        debug!("engine stopped, refusing connection");
        return;
    }
    let Ok(connection) = assigned.await else {
        debug!("engine stopped before assigning an id");
        return;
    };

    let writer = tokio::spawn(write_loop(connection, writer, inbound));

    read_loop(connection, reader, &commands).await;

    if commands.send(Command::Disconnect { connection }).await.is_err() {
        debug!(connection = %connection, "engine stopped before disconnect");
    }

    if let Err(e) = writer.await {
        error!(connection = %connection, error = %e, "writer task failed");
    }
}

async fn read_loop<R>(connection: ConnectionId, mut reader: R, commands: &mpsc::Sender<Command>)
where
    R: AsyncRead + Unpin,
{
    loop {
        let command = match codec::read_frame(&mut reader).await {
            Ok(Some(frame)) => match ClientEvent::from_frame(&frame) {
                Ok(event) => Command::Event { connection, event },
                Err(error) => Command::Malformed { connection, error },
            },
            Ok(None) => {
                debug!(connection = %connection, "peer closed");
                return;
            },
            Err(CodecError::Protocol(e)) => {
                warn!(connection = %connection, error = %e, "corrupt frame header, closing");
                return;
            },
            Err(CodecError::Io(e)) => {
                debug!(connection = %connection, error = %e, "read failed");
                return;
            },
        };

        if commands.send(command).await.is_err() {
            return;
        }
    }
}

async fn write_loop<W>(
    connection: ConnectionId,
    mut writer: W,
    mut inbound: mpsc::Receiver<ServerEvent>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(event) = inbound.recv().await {
        let name = event.name();
        let frame = match event.into_frame() {
            Ok(frame) => frame,
            Err(e) => {
                error!(connection = %connection, event = name, error = %e, "failed to encode");
                continue;
            },
        };

        if let Err(e) = codec::write_frame(&mut writer, &frame).await {
            debug!(connection = %connection, error = %e, "write failed");
            return;
        }
    }

    if let Err(e) = writer.shutdown().await {
        debug!(connection = %connection, error = %e, "shutdown failed");
    }
}

#[cfg(test)]
mod tests {
    use tandem_core::{Engine, EngineConfig};
    use tandem_proto::{Frame, FrameHeader, Opcode, events::client::SendMessage};
    use tokio::io::{DuplexStream, ReadHalf, WriteHalf};

    use super::*;
    use crate::{
        actor::{COMMAND_CAPACITY, EngineActor},
        system_env::SystemEnv,
    };

    struct Client {
        reader: ReadHalf<DuplexStream>,
        writer: WriteHalf<DuplexStream>,
    }

    impl Client {
        async fn send(&mut self, event: ClientEvent) {
            let frame = event.into_frame().expect("encodes");
            codec::write_frame(&mut self.writer, &frame).await.expect("write");
        }

        async fn next(&mut self) -> Option<ServerEvent> {
            let frame = codec::read_frame(&mut self.reader).await.expect("read")?;
            Some(ServerEvent::from_frame(&frame).expect("server event"))
        }

        /// Skip events until one named `name` arrives
        async fn expect(&mut self, name: &str) -> ServerEvent {
            loop {
                let event = self.next().await.expect("stream open");
                if event.name() == name {
                    return event;
                }
            }
        }
    }

    fn start_engine() -> mpsc::Sender<Command> {
        let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
        let actor = EngineActor::new(Engine::new(SystemEnv, EngineConfig::default()), rx);
        tokio::spawn(actor.run(std::future::pending()));
        tx
    }

    fn open(commands: &mpsc::Sender<Command>) -> Client {
        let (client, server) = tokio::io::duplex(4096);
        let (server_reader, server_writer) = tokio::io::split(server);
        tokio::spawn(serve(server_reader, server_writer, commands.clone()));

        let (reader, writer) = tokio::io::split(client);
        Client { reader, writer }
    }

    #[tokio::test]
    async fn paired_clients_exchange_messages() {
        let commands = start_engine();
        let mut alice = open(&commands);
        alice.expect("waiting").await;
        let mut bob = open(&commands);

        alice.expect("matched").await;
        bob.expect("matched").await;

        alice
            .send(ClientEvent::SendMessage(SendMessage { content: Some(" hi bob ".to_string()) }))
            .await;

        for client in [&mut alice, &mut bob] {
            let ServerEvent::ReceiveMessage(message) = client.expect("receive-message").await
            else {
                unreachable!("expect returns the named event");
            };
            assert_eq!(message.content, "hi bob");
        }
    }

    #[tokio::test]
    async fn closing_one_side_tells_the_partner() {
        let commands = start_engine();
        let mut alice = open(&commands);
        alice.expect("waiting").await;
        let mut bob = open(&commands);
        bob.expect("matched").await;

        drop(alice);

        bob.expect("partner-disconnected").await;
        bob.expect("waiting").await;
    }

    #[tokio::test]
    async fn bad_payload_is_answered_and_connection_stays() {
        let commands = start_engine();
        let mut alice = open(&commands);
        alice.expect("waiting").await;

        let frame = Frame::new(FrameHeader::new(Opcode::SendMessage), vec![0xff_u8]);
        codec::write_frame(&mut alice.writer, &frame).await.expect("write");

        let ServerEvent::Error(payload) = alice.expect("error").await else {
            unreachable!("expect returns the named event");
        };
        assert_eq!(payload.message, "Invalid request");

        alice.send(ClientEvent::FindNewPartner).await;
        let mut bob = open(&commands);
        bob.expect("matched").await;
    }

    #[tokio::test]
    async fn corrupt_header_closes_the_stream() {
        let commands = start_engine();
        let mut alice = open(&commands);
        alice.expect("waiting").await;

        alice.writer.write_all(b"garbage!").await.expect("write");

        while alice.next().await.is_some() {}
    }

    #[tokio::test]
    async fn stopped_engine_refuses_connection() {
        let (commands, rx) = mpsc::channel(COMMAND_CAPACITY);
        drop(rx);

        let (_client, server) = tokio::io::duplex(64);
        let (reader, writer) = tokio::io::split(server);
        serve(reader, writer, commands).await;
    }
}
