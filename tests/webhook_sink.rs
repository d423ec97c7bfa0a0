// tests/webhook_sink.rs
//! WebhookSink against a local responder that answers with scripted statuses.
use chrono::{TimeZone, Utc};
use push_feed_monitor::sink::webhook::WebhookSink;
use push_feed_monitor::{Event, EventSink, PushEvent};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

struct FakeHook {
    url: String,
    bodies: Arc<Mutex<Vec<Value>>>,
}

/// Answer each POST with the next status in `statuses`; the last one repeats.
async fn hook(statuses: Vec<u16>) -> FakeHook {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let bodies = Arc::new(Mutex::new(Vec::new()));
    let seen = bodies.clone();
    let script = Arc::new(Mutex::new(VecDeque::from(statuses)));

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            let seen = seen.clone();
            let script = script.clone();
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                let header_end = loop {
                    if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                        break pos + 4;
                    }
                    match stream.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                };
                let head = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
                let len: usize = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or(0);
                while buf.len() < header_end + len {
                    match stream.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }
                let body: Value =
                    serde_json::from_slice(&buf[header_end..header_end + len]).unwrap_or_default();
                seen.lock().unwrap().push(body);

                let status = {
                    let mut script = script.lock().unwrap();
                    if script.len() > 1 {
                        script.pop_front().unwrap_or(200)
                    } else {
                        script.front().copied().unwrap_or(200)
                    }
                };
                let resp = format!(
                    "HTTP/1.1 {status} X\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
                );
                let _ = stream.write_all(resp.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    FakeHook {
        url: format!("http://{addr}/hook"),
        bodies,
    }
}

fn push(id: i64) -> Event {
    Event::Push(PushEvent {
        id,
        timestamp: Utc.with_ymd_and_hms(2022, 12, 1, 18, 4, 11).unwrap(),
        size: 3,
        commits: vec![],
    })
}

#[tokio::test]
async fn embed_reaches_the_webhook() {
    let server = hook(vec![204]).await;
    let sink = WebhookSink::new(server.url.clone(), "octo".into()).with_timeout(5);

    sink.send_event(&push(42)).await.unwrap();

    let bodies = server.bodies.lock().unwrap();
    assert_eq!(bodies.len(), 1);
    let embed = &bodies[0]["embeds"][0];
    assert_eq!(embed["title"], "octo pushed");
    assert_eq!(embed["timestamp"], "2022-12-01T18:04:11+00:00");
    let desc = embed["description"].as_str().unwrap();
    assert!(desc.contains("**Commits:** 3"));
    assert!(desc.contains("**Event:** 42"));
}

#[tokio::test]
async fn server_error_is_retried_until_success() {
    let server = hook(vec![502, 200]).await;
    let sink = WebhookSink::new(server.url.clone(), "octo".into())
        .with_timeout(5)
        .with_retries(3);

    sink.send_event(&push(7)).await.unwrap();

    let bodies = server.bodies.lock().unwrap();
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0], bodies[1]);
}

#[tokio::test]
async fn persistent_server_error_gives_up_after_retries() {
    let server = hook(vec![500]).await;
    let sink = WebhookSink::new(server.url.clone(), "octo".into())
        .with_timeout(5)
        .with_retries(2);

    let err = sink.send_event(&push(8)).await.unwrap_err();
    assert!(err.to_string().contains("500"), "{err}");
    assert_eq!(server.bodies.lock().unwrap().len(), 2);

    // deliver swallows the failure
    sink.deliver(&push(9)).await;
    assert_eq!(server.bodies.lock().unwrap().len(), 4);
}
