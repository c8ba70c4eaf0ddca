//! HTTP client against a local server with canned responses.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rig_console::address::{AddressSource, SchemePolicy, ServerAddress};
use rig_console::api::{HttpRigApi, RigApi};
use rig_console::ConsoleError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Request as seen by the server: method, target and body.
type Seen = Arc<Mutex<Vec<(String, String, String)>>>;

struct Canned {
    routes: HashMap<String, (u16, String)>,
}

impl Canned {
    fn new() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    fn route(mut self, target: &str, status: u16, body: &str) -> Self {
        self.routes
            .insert(target.to_string(), (status, body.to_string()));
        self
    }

    /// Serve on an ephemeral port; returns a client for it and the request log.
    async fn serve(self) -> (HttpRigApi, Seen) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let seen: Seen = Arc::default();

        let log = Arc::clone(&seen);
        let routes = Arc::new(self.routes);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let log = Arc::clone(&log);
                let routes = Arc::clone(&routes);
                tokio::spawn(async move { answer(stream, &routes, &log).await });
            }
        });

        let address = ServerAddress::parse(
            &format!("127.0.0.1:{port}"),
            AddressSource::UserInput,
            SchemePolicy::Plain,
        )
        .unwrap();
        (HttpRigApi::new(address, Duration::from_secs(5)), seen)
    }
}

async fn answer(mut stream: TcpStream, routes: &HashMap<String, (u16, String)>, seen: &Seen) {
    let mut raw = Vec::new();
    let mut buf = [0u8; 4096];
    let head_end = loop {
        let n = stream.read(&mut buf).await.unwrap();
        if n == 0 {
            return;
        }
        raw.extend_from_slice(&buf[..n]);
        if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&raw[..head_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    while raw.len() < head_end + content_length {
        let n = stream.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&buf[..n]);
    }

    let mut request_line = head.lines().next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let target = request_line.next().unwrap_or_default().to_string();
    let body = String::from_utf8_lossy(&raw[head_end..]).to_string();
    seen.lock().unwrap().push((method, target.clone(), body));

    let (status, body) = routes
        .get(&target)
        .cloned()
        .unwrap_or((404, "\"not found\"".to_string()));
    let response = format!(
        "HTTP/1.1 {status} Canned\r\nContent-Type: application/json\r\n\
         Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await.unwrap();
    stream.shutdown().await.ok();
}

#[tokio::test]
async fn test_submit_capture_posts_setpoints_and_decodes_batch() {
    let (api, seen) = Canned::new()
        .route(
            "/cam/shot",
            200,
            r#"{"cam1": ["AA", "BB"], "cam2": ["CC", "DD"]}"#,
        )
        .serve()
        .await;

    let batch = api
        .submit_capture(&["10".to_string(), "20".to_string()])
        .await
        .unwrap();

    assert_eq!(batch.cam1, vec!["AA", "BB"]);
    assert_eq!(batch.cam2, vec!["CC", "DD"]);
    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].0, "POST");
    assert_eq!(seen[0].1, "/cam/shot");
    let body: Vec<String> = serde_json::from_str(&seen[0].2).unwrap();
    assert_eq!(body, vec!["10", "20"]);
}

#[tokio::test]
async fn test_classification_and_image_listing() {
    let (api, _seen) = Canned::new()
        .route(
            "/result/upload",
            200,
            r#"{"result": [{"part": "torque_converter", "family": "TC-200",
                "probability": 0.15, "make": "Aisin", "directory": "tc200"}],
               "savePlace": "20250101_120000"}"#,
        )
        .route(
            "/photo/torque_converter/tc200",
            200,
            r#"[{"url": "front.jpg"}, {"url": "/side.jpg"}]"#,
        )
        .serve()
        .await;

    let response = api.fetch_classification().await.unwrap();
    assert_eq!(response.save_place, "20250101_120000");
    assert_eq!(response.result.len(), 1);
    assert_eq!(response.result[0].family, "TC-200");

    let urls = api
        .fetch_item_images("torque_converter", "tc200")
        .await
        .unwrap();
    let base = api
        .photo_listing_url("torque_converter", "tc200")
        .unwrap()
        .to_string();
    assert_eq!(urls, vec![format!("{base}/front.jpg"), format!("{base}/side.jpg")]);
}

#[tokio::test]
async fn test_seed_and_label_correction() {
    let (api, seen) = Canned::new()
        .route("/motor/spInit", 200, "[0, 1000, 2500.5]")
        .route("/correctLabel?correctLabel=TC-250", 200, "true")
        .serve()
        .await;

    assert_eq!(
        api.initial_setpoints().await.unwrap(),
        vec![0.0, 1000.0, 2500.5]
    );
    assert!(api.correct_label("TC-250").await.unwrap());

    let seen = seen.lock().unwrap();
    assert_eq!(seen[1].0, "POST");
    assert_eq!(seen[1].1, "/correctLabel?correctLabel=TC-250");
}

#[tokio::test]
async fn test_error_status_maps_to_request_error() {
    let (api, _seen) = Canned::new()
        .route("/result/upload", 500, r#""classifier offline""#)
        .serve()
        .await;

    match api.fetch_classification().await {
        Err(ConsoleError::Request { endpoint, .. }) => assert_eq!(endpoint, "/result/upload"),
        other => panic!("expected request error, got {other:?}"),
    }

    // Unrouted listing answers 404.
    let err = api.fetch_item_images("pump", "missing").await.unwrap_err();
    assert!(matches!(err, ConsoleError::Request { .. }), "{err}");
}

#[tokio::test]
async fn test_malformed_body_is_a_request_error() {
    let (api, _seen) = Canned::new()
        .route("/cam/shot", 200, "<html>busy</html>")
        .serve()
        .await;

    match api.submit_capture(&["0".to_string()]).await {
        Err(ConsoleError::Request { endpoint, message }) => {
            assert_eq!(endpoint, "/cam/shot");
            assert!(message.contains("invalid JSON"), "{message}");
        }
        other => panic!("expected request error, got {other:?}"),
    }
}
