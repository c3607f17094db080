//! End-to-end tests: real server on a loopback port, real clients.

use std::{sync::Arc, time::Duration};

use parley_client::{Client, ClientError};
use parley_core::{AdmissionConfig, Challenge};
use parley_proto::{
    Direction, Frame, FrameReader, PROTOCOL_VERSION, ReplyCode, Request, ServerMessage, opcode,
};
use parley_server::{Router, Server, ServerConfig};
use tokio::{io::AsyncWriteExt, net::TcpStream};

const WAIT: Duration = Duration::from_secs(5);

struct TestServer {
    addr: std::net::SocketAddr,
    router: Arc<Router>,
    task: tokio::task::JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn start(admission: AdmissionConfig) -> TestServer {
    let config = ServerConfig {
        bind_address: "127.0.0.1:0".into(),
        admission,
        delivery_timeout: Duration::from_millis(500),
    };
    let server = Server::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let router = server.router();
    let task = tokio::spawn(async move {
        let _ = server.run().await;
    });
    TestServer { addr, router, task }
}

/// Cheap puzzles and no periodic re-challenges.
async fn start_quiet() -> TestServer {
    start(AdmissionConfig { difficulty: 4, max_resend: u32::MAX }).await
}

/// Connect and consume the greeting challenge.
async fn connect(server: &TestServer) -> Client {
    let mut client = Client::connect(server.addr).await.unwrap();
    let greeting = tokio::time::timeout(WAIT, client.next_message()).await.unwrap().unwrap();
    assert!(matches!(greeting, ServerMessage::Challenge { .. }), "got {greeting:?}");
    client
}

async fn logged_in(server: &TestServer, name: &str) -> Client {
    let mut client = connect(server).await;
    assert_eq!(client.create_account(name).await.unwrap().code, ReplyCode::AccountCreated);
    assert_eq!(client.log_in(name).await.unwrap().code, ReplyCode::LoggedIn);
    client
}

/// Poll until `name` has no live connection.
async fn wait_offline(router: &Router, name: &str) {
    tokio::time::timeout(WAIT, async {
        while router.connection_of(name).await.is_some() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn push_when_online_queue_when_offline() {
    let server = start_quiet().await;
    let mut alice = logged_in(&server, "alice").await;
    let mut bob = logged_in(&server, "bob").await;

    let reply = alice.send_message("bob", "hi").await.unwrap();
    assert_eq!(reply.code, ReplyCode::MessageSent);
    assert_eq!(reply.text, "New message is sent to bob successfully.");
    let pushed = tokio::time::timeout(WAIT, bob.next_delivery()).await.unwrap().unwrap();
    assert_eq!(pushed, "alice:hi\n");

    drop(bob);
    wait_offline(&server.router, "bob").await;

    assert_eq!(alice.send_message("bob", "yo").await.unwrap().code, ReplyCode::MessageSent);

    let mut bob = connect(&server).await;
    assert_eq!(bob.log_in("bob").await.unwrap().code, ReplyCode::LoggedIn);
    let reply = bob.check_message().await.unwrap();
    assert_eq!(reply.code, ReplyCode::Messages);
    assert_eq!(reply.text, "alice:yo\n");

    let reply = bob.check_message().await.unwrap();
    assert_eq!(reply.code, ReplyCode::Messages);
    assert_eq!(reply.text, "");
}

#[tokio::test]
async fn duplicate_create_and_unknown_login() {
    let server = start_quiet().await;
    let mut client = connect(&server).await;

    assert_eq!(client.create_account("alice").await.unwrap().code, ReplyCode::AccountCreated);
    let reply = client.create_account("alice").await.unwrap();
    assert_eq!(reply.code, ReplyCode::AccountExists);
    assert_eq!(reply.text, "The account alice exists already.");

    let reply = client.log_in("ghost").await.unwrap();
    assert_eq!(reply.code, ReplyCode::NoSuchAccount);
    assert!(!reply.is_success());
}

#[tokio::test]
async fn switching_accounts_forces_takeover() {
    let server = start_quiet().await;
    let mut setup = connect(&server).await;
    setup.create_account("bob").await.unwrap();

    let mut client = logged_in(&server, "alice").await;
    let reply = client.log_in("bob").await.unwrap();
    assert_eq!(reply.code, ReplyCode::TakeOver);
    assert_eq!(
        reply.text,
        "Account alice has logged in here. That account is forced to log out. You are now logged in."
    );

    assert_eq!(server.router.connection_of("alice").await, None);
    assert!(server.router.connection_of("bob").await.is_some());
}

#[tokio::test]
async fn second_login_displaces_first_connection_silently() {
    let server = start_quiet().await;
    let mut first = logged_in(&server, "alice").await;
    let mut second = connect(&server).await;

    assert_eq!(second.log_in("alice").await.unwrap().code, ReplyCode::LoggedIn);

    // The displaced connection is not told ...
    let notice = first.next_message_within(Duration::from_millis(100)).await.unwrap();
    assert_eq!(notice, None);
    // ... but is no longer logged in
    assert_eq!(first.check_message().await.unwrap().code, ReplyCode::CheckNotLoggedIn);
    assert_eq!(second.check_message().await.unwrap().code, ReplyCode::Messages);
}

#[tokio::test]
async fn delete_returns_queue_and_frees_name() {
    let server = start_quiet().await;
    let mut alice = logged_in(&server, "alice").await;
    let mut bob = logged_in(&server, "bob").await;
    assert_eq!(bob.quit().await.unwrap().code, ReplyCode::LoggedOut);

    alice.send_message("bob", "one").await.unwrap();
    alice.send_message("bob", "two").await.unwrap();

    assert_eq!(bob.log_in("bob").await.unwrap().code, ReplyCode::LoggedIn);
    let reply = bob.delete_account().await.unwrap();
    assert_eq!(reply.code, ReplyCode::AccountDeleted);
    assert_eq!(
        reply.text,
        "The account bob is permanently deleted. You have the following unread messages:\n\
         alice:one\nalice:two\n"
    );

    assert_eq!(bob.delete_account().await.unwrap().code, ReplyCode::DeleteNotLoggedIn);
    assert_eq!(alice.send_message("bob", "three").await.unwrap().code, ReplyCode::NoSuchReceiver);
    assert_eq!(bob.create_account("bob").await.unwrap().code, ReplyCode::AccountCreated);
}

#[tokio::test]
async fn list_accounts_with_wildcards() {
    let server = start_quiet().await;
    let mut client = connect(&server).await;
    for name in ["bob", "bib", "bobby", "alice"] {
        client.create_account(name).await.unwrap();
    }

    let reply = client.list_account("*").await.unwrap();
    assert_eq!(reply.code, ReplyCode::AccountList);
    assert_eq!(reply.text, "alice\nbib\nbob\nbobby\n");

    assert_eq!(client.list_account("b_b").await.unwrap().text, "bib\nbob\n");
    assert_eq!(client.list_account("").await.unwrap().text, "alice\nbib\nbob\nbobby\n");

    // Unclosed bracket is an ordinary character
    client.create_account("[b").await.unwrap();
    let reply = client.list_account("[b").await.unwrap();
    assert_eq!(reply.code, ReplyCode::AccountList);
    assert_eq!(reply.text, "[b\n");
}

#[tokio::test]
async fn quit_keeps_connection_open() {
    let server = start_quiet().await;
    let mut client = logged_in(&server, "alice").await;

    let reply = client.quit().await.unwrap();
    assert_eq!(reply.code, ReplyCode::LoggedOut);
    assert_eq!(reply.text, "You: alice has logged out successfully.");
    assert_eq!(client.quit().await.unwrap().code, ReplyCode::QuitNotLoggedIn);

    assert_eq!(client.log_in("alice").await.unwrap().code, ReplyCode::LoggedIn);
}

#[tokio::test]
async fn concurrent_sends_to_offline_receiver_all_arrive() {
    const SENDERS: usize = 8;
    const PER_SENDER: usize = 5;

    let server = start_quiet().await;
    let mut setup = connect(&server).await;
    setup.create_account("bob").await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..SENDERS {
        let mut client = logged_in(&server, &format!("sender{i}")).await;
        tasks.push(tokio::spawn(async move {
            for j in 0..PER_SENDER {
                let reply = client.send_message("bob", &format!("m{j}")).await.unwrap();
                assert_eq!(reply.code, ReplyCode::MessageSent);
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let mut bob = connect(&server).await;
    bob.log_in("bob").await.unwrap();
    let queue = bob.check_message().await.unwrap().text;
    let lines: Vec<&str> = queue.lines().collect();
    assert_eq!(lines.len(), SENDERS * PER_SENDER);

    // Per-sender order is preserved and nothing is duplicated
    for i in 0..SENDERS {
        let prefix = format!("sender{i}:");
        let mine: Vec<&str> = lines.iter().filter(|l| l.starts_with(&prefix)).copied().collect();
        let expected: Vec<String> = (0..PER_SENDER).map(|j| format!("{prefix}m{j}")).collect();
        assert_eq!(mine, expected);
    }
}

#[tokio::test]
async fn challenge_reissued_after_max_resend() {
    let server = start(AdmissionConfig { difficulty: 6, max_resend: 2 }).await;
    let mut client = Client::connect(server.addr).await.unwrap();

    let ServerMessage::Challenge { difficulty, .. } = client.next_message().await.unwrap() else {
        panic!("expected greeting challenge");
    };
    assert_eq!(difficulty, 6);
    let first = client.challenge().cloned().unwrap();
    let answer = client.solve_challenge().await.unwrap().unwrap();
    assert!(first.verify(answer));

    for _ in 0..3 {
        client.list_account("*").await.unwrap();
    }
    let message = tokio::time::timeout(WAIT, client.next_message()).await.unwrap().unwrap();
    let ServerMessage::Challenge { difficulty, target } = message else {
        panic!("expected a fresh challenge, got {message:?}");
    };
    let fresh = Challenge::from_wire(difficulty, &target).unwrap();
    assert_eq!(client.challenge(), Some(&fresh));
    assert!(client.solve_challenge().await.unwrap().is_some_and(|a| fresh.verify(a)));
}

#[tokio::test]
async fn version_mismatch_closes_connection() {
    let server = start_quiet().await;
    let stream = TcpStream::connect(server.addr).await.unwrap();
    let (read, mut write) = stream.into_split();
    let mut frames = FrameReader::new(read, Direction::ServerToClient);

    let greeting = ServerMessage::try_from(frames.read_next().await.unwrap().unwrap()).unwrap();
    assert!(matches!(greeting, ServerMessage::Challenge { .. }));

    let frame = Frame::new(PROTOCOL_VERSION + 1, opcode::CHECK_MESSAGE, Vec::new());
    write.write_all(&frame.encode().unwrap()).await.unwrap();

    let next = tokio::time::timeout(WAIT, frames.read_next()).await.unwrap();
    assert!(matches!(next, Ok(None) | Err(_)), "connection should close, got {next:?}");
}

#[tokio::test]
async fn keep_alive_is_ignored() {
    let server = start_quiet().await;
    let mut client = connect(&server).await;

    client.keep_alive().await.unwrap();
    client.keep_alive().await.unwrap();
    assert_eq!(client.list_account("*").await.unwrap().code, ReplyCode::AccountList);
}

#[tokio::test]
async fn client_rejects_long_text_locally() {
    let server = start_quiet().await;
    let mut alice = logged_in(&server, "alice").await;

    let err = alice.send_message("alice", &"x".repeat(101)).await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidRequest { .. }));

    // Connection is still usable
    assert_eq!(alice.check_message().await.unwrap().code, ReplyCode::Messages);
}

#[tokio::test]
async fn oversized_text_from_raw_client_is_accepted() {
    let server = start_quiet().await;
    let mut bob = logged_in(&server, "bob").await;
    bob.quit().await.unwrap();

    let stream = TcpStream::connect(server.addr).await.unwrap();
    let (read, mut write) = stream.into_split();
    let mut frames = FrameReader::new(read, Direction::ServerToClient);
    frames.read_next().await.unwrap();

    let text = "x".repeat(500);
    let mut wire = Vec::new();
    wire.extend_from_slice(&Request::LogIn { name: "bob".into() }.to_frame().encode().unwrap());
    wire.extend_from_slice(
        &Request::SendMessage { receiver: "bob".into(), text: text.clone() }
            .to_frame()
            .encode()
            .unwrap(),
    );
    write.write_all(&wire).await.unwrap();

    // Reply to log_in, then the self-delivery and the send reply in either order
    let mut seen = Vec::new();
    for _ in 0..3 {
        seen.push(ServerMessage::try_from(frames.read_next().await.unwrap().unwrap()).unwrap());
    }
    assert!(seen.contains(&ServerMessage::Delivery { text: format!("bob:{text}\n") }));
    assert!(seen.iter().any(|m| matches!(
        m,
        ServerMessage::Reply { code: ReplyCode::MessageSent, .. }
    )));
}
