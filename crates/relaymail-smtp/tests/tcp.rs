//! Sessions over real sockets against a minimal in-process relay.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use relaymail_smtp::{Error, Mailbox, Mailer, Message, Security, SmtpConfig};

/// Accepts one connection, answers like a relay that accepts everything,
/// and returns the lines it received.
async fn spawn_relay() -> (u16, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let (read, mut write) = socket.into_split();
        let mut reader = BufReader::new(read);
        let mut received = Vec::new();

        write.write_all(b"220 test.relay ESMTP\r\n").await.unwrap();

        let mut in_data = false;
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).await.unwrap() == 0 {
                break;
            }
            let line = line.trim_end_matches(['\r', '\n']).to_string();
            received.push(line.clone());

            if in_data {
                if line == "." {
                    in_data = false;
                    write.write_all(b"250 2.0.0 queued\r\n").await.unwrap();
                }
                continue;
            }

            let reply: &[u8] = match line.split_whitespace().next().unwrap_or_default() {
                "EHLO" => b"250-test.relay\r\n250-SIZE 1000000\r\n250 8BITMIME\r\n",
                "MAIL" | "RCPT" => b"250 2.1.0 Ok\r\n",
                "DATA" => {
                    in_data = true;
                    b"354 Go ahead\r\n"
                }
                "QUIT" => {
                    write.write_all(b"221 2.0.0 Bye\r\n").await.unwrap();
                    break;
                }
                _ => b"500 5.5.2 Unrecognized\r\n",
            };
            write.write_all(reply).await.unwrap();
        }

        received
    });

    (port, handle)
}

fn plain_config(port: u16) -> SmtpConfig {
    SmtpConfig::builder("127.0.0.1")
        .port(port)
        .security(Security::None)
        .client_id("tests.local")
        .io_timeout(Duration::from_secs(5))
        .build()
}

fn message() -> Message {
    Message::builder()
        .from(Mailbox::new("bot@example.com").unwrap())
        .to(Mailbox::new("ops@example.net").unwrap())
        .subject("Nightly build")
        .text_body("All green.")
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_send_over_tcp() {
    let (port, relay) = spawn_relay().await;

    Mailer::new(plain_config(port))
        .send_email(&message())
        .await
        .unwrap();

    let received = relay.await.unwrap();
    assert_eq!(received[0], "EHLO tests.local");
    assert_eq!(received[1], "MAIL FROM:<bot@example.com>");
    assert_eq!(received[2], "RCPT TO:<ops@example.net>");
    assert_eq!(received[3], "DATA");
    assert!(received.iter().any(|l| l == "MIME-Version: 1.0"));
    assert!(received.iter().any(|l| l == "Content-Type: text/plain; charset=UTF-8"));
    assert_eq!(received[received.len() - 2], ".");
    assert_eq!(received.last().unwrap(), "QUIT");
}

#[tokio::test]
async fn test_silent_relay_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let _relay = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        drop(socket);
    });

    let config = SmtpConfig::builder("127.0.0.1")
        .port(port)
        .security(Security::None)
        .io_timeout(Duration::from_millis(100))
        .build();

    let err = Mailer::new(config).send_email(&message()).await.unwrap_err();
    assert!(matches!(err, Error::Timeout(_)), "{err}");
}

#[tokio::test]
async fn test_refused_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let err = Mailer::new(plain_config(port))
        .send_email(&message())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Connection(_)), "{err}");
}
