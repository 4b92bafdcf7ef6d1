//! API engines against a local canned HTTP server

use raahi_spk::config::{ApiTtsConfig, RetryConfig, VoiceConfig};
use raahi_spk::engines::api::ApiTtsEngine;
use raahi_spk::engines::TtsEngine;
use raahi_spk::SpeechError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

/// What the server saw: request line plus body, per request
type Seen = Arc<Mutex<Vec<String>>>;

/// Serve `responses` in order (the last one repeats), one per connection
async fn serve(responses: Vec<(u16, &'static str, Vec<u8>)>) -> (String, Seen, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let hits = Arc::new(AtomicUsize::new(0));

    let (seen_task, hits_task) = (seen.clone(), hits.clone());
    tokio::spawn(async move {
        loop {
            let (mut stream, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };
            let n = hits_task.fetch_add(1, Ordering::SeqCst);
            let (status, content_type, body) = responses[n.min(responses.len() - 1)].clone();
            let request = read_request(&mut stream).await;
            seen_task.lock().await.push(request);

            let head = format!(
                "HTTP/1.1 {} X\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                content_type,
                body.len()
            );
            let _ = stream.write_all(head.as_bytes()).await;
            let _ = stream.write_all(&body).await;
            let _ = stream.shutdown().await;
        }
    });

    (format!("http://{}", addr), seen, hits)
}

async fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf).to_string();
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|l| {
                    let lower = l.to_ascii_lowercase();
                    lower.strip_prefix("content-length:").map(|v| v.trim().parse::<usize>().unwrap_or(0))
                })
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    let text = String::from_utf8_lossy(&buf).to_string();
    let request_line = text.lines().next().unwrap_or_default().to_string();
    let body = text.split("\r\n\r\n").nth(1).unwrap_or_default().to_string();
    format!("{}\n{}", request_line, body)
}

fn api_config(endpoint: String) -> ApiTtsConfig {
    ApiTtsConfig {
        endpoint,
        api_key: Some("test-key".to_string()),
        model: None,
        timeout_secs: 5,
        retry_config: RetryConfig {
            max_retries: 2,
            initial_delay_ms: 1,
            max_delay_ms: 5,
        },
    }
}

#[tokio::test]
async fn test_google_translate_concatenates_chunks() {
    let (endpoint, seen, hits) = serve(vec![(200, "audio/mpeg", b"MP3".to_vec())]).await;
    let engine = ApiTtsEngine::new_google_translate(&api_config(endpoint)).unwrap();

    // Two chunks at the 100 character limit
    let text = format!("{} {}", "word ".repeat(19).trim(), "tail ".repeat(5).trim());
    let audio = engine.synthesize(&text, &VoiceConfig::default()).await.unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert_eq!(&audio[..], b"MP3MP3");

    let seen = seen.lock().await;
    assert!(seen[0].starts_with("GET /translate_tts?"));
    assert!(seen[0].contains("client=tw-ob"));
    assert!(seen[0].contains("tl=en"));
    assert!(seen[0].contains("total=2"));
    assert!(seen[1].contains("idx=1"));
}

#[tokio::test]
async fn test_retry_recovers_from_server_error() {
    let (endpoint, _, hits) = serve(vec![
        (500, "text/plain", b"busy".to_vec()),
        (200, "audio/mpeg", b"OK".to_vec()),
    ])
    .await;
    let engine = ApiTtsEngine::new_google_translate(&api_config(endpoint)).unwrap();

    let audio = engine.synthesize("I see chair.", &VoiceConfig::default()).await.unwrap();
    assert_eq!(&audio[..], b"OK");
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_retries_give_up() {
    let (endpoint, _, hits) = serve(vec![(503, "text/plain", b"down".to_vec())]).await;
    let engine = ApiTtsEngine::new_google_translate(&api_config(endpoint)).unwrap();

    let err = engine.synthesize("I see chair.", &VoiceConfig::default()).await.unwrap_err();
    assert!(matches!(err, SpeechError::Api(_)));
    // First attempt plus two retries
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_openai_request_shape() {
    let (endpoint, seen, _) = serve(vec![(200, "audio/mpeg", b"ID3".to_vec())]).await;
    let engine = ApiTtsEngine::new_openai(&api_config(endpoint), 150).unwrap();
    assert!(engine.is_available());

    let audio = engine.synthesize("hello", &VoiceConfig::default()).await.unwrap();
    assert_eq!(&audio[..], b"ID3");

    let seen = seen.lock().await;
    assert!(seen[0].starts_with("POST /v1/audio/speech"));
    let body: serde_json::Value = serde_json::from_str(seen[0].lines().nth(1).unwrap()).unwrap();
    assert_eq!(body["model"], "tts-1");
    assert_eq!(body["voice"], "alloy");
    assert_eq!(body["input"], "hello");
}

#[tokio::test]
async fn test_custom_endpoint_json_audio() {
    let (endpoint, seen, _) = serve(vec![(200, "application/json", br#"{"audio":"UklGRg=="}"#.to_vec())]).await;
    let engine = ApiTtsEngine::new_custom(&api_config(format!("{}/tts", endpoint)), "lab".to_string()).unwrap();

    let voice = VoiceConfig {
        name: Some("asha".to_string()),
        ..VoiceConfig::default()
    };
    let audio = engine.synthesize("namaste", &voice).await.unwrap();
    assert_eq!(&audio[..], b"RIFF");

    let seen = seen.lock().await;
    assert!(seen[0].starts_with("POST /tts"));
    let body: serde_json::Value = serde_json::from_str(seen[0].lines().nth(1).unwrap()).unwrap();
    assert_eq!(body["text"], "namaste");
    assert_eq!(body["voice"], "asha");
    assert_eq!(body["language"], "en");
}

#[tokio::test]
async fn test_custom_bare_host_gets_default_path() {
    let (endpoint, seen, _) = serve(vec![(200, "audio/mpeg", b"RAW".to_vec())]).await;
    let engine = ApiTtsEngine::new_custom(&api_config(endpoint), "lab".to_string()).unwrap();

    engine.synthesize("hi", &VoiceConfig::default()).await.unwrap();
    assert!(seen.lock().await[0].starts_with("POST /v1/synthesize"));
}
