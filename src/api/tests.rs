use super::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

struct CapturedRequest {
    request_line: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl CapturedRequest {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    fn json_body(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("request body is json")
    }
}

async fn read_http_request(stream: &mut tokio::net::TcpStream) -> Result<CapturedRequest, String> {
    let mut buffer = Vec::new();
    let mut header_end = None;
    while header_end.is_none() {
        let mut chunk = [0_u8; 1024];
        let read = stream
            .read(&mut chunk)
            .await
            .map_err(|err| err.to_string())?;
        if read == 0 {
            return Err("Unexpected EOF while reading HTTP headers".to_string());
        }
        buffer.extend_from_slice(&chunk[..read]);
        header_end = buffer
            .windows(4)
            .position(|window| window == b"\r\n\r\n")
            .map(|index| index + 4);
    }

    let header_end = header_end.expect("header end should exist");
    let header_text =
        std::str::from_utf8(&buffer[..header_end]).map_err(|err| err.to_string())?;
    let mut lines = header_text.split("\r\n").filter(|line| !line.is_empty());
    let request_line = lines
        .next()
        .ok_or_else(|| "Missing HTTP request line".to_string())?
        .to_string();

    let mut headers = Vec::new();
    let mut content_length = 0_usize;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim().to_string();
        if name.eq_ignore_ascii_case("content-length") {
            content_length = value.parse::<usize>().map_err(|err| err.to_string())?;
        }
        headers.push((name.to_string(), value));
    }

    let mut body = buffer[header_end..].to_vec();
    while body.len() < content_length {
        let mut chunk = vec![0_u8; content_length - body.len()];
        let read = stream
            .read(&mut chunk)
            .await
            .map_err(|err| err.to_string())?;
        if read == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..read]);
    }

    Ok(CapturedRequest {
        request_line,
        headers,
        body,
    })
}

/// Accept a single request, answer it with `status` and `body`, and hand the
/// captured request back through the join handle.
async fn serve_once(
    status: &'static str,
    body: &'static str,
) -> (String, tokio::task::JoinHandle<Result<CapturedRequest, String>>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("local addr should resolve");

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.map_err(|err| err.to_string())?;
        let request = read_http_request(&mut stream).await?;
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream
            .write_all(response.as_bytes())
            .await
            .map_err(|err| err.to_string())?;
        stream.shutdown().await.map_err(|err| err.to_string())?;
        Ok(request)
    });

    (format!("http://{addr}/api/"), server)
}

#[test]
fn extract_error_message_reads_service_error_field() {
    assert_eq!(
        extract_error_message(r#"{"error": "Insufficient tokens"}"#),
        Some("Insufficient tokens".to_string())
    );
    assert_eq!(
        extract_error_message(r#"{"error": {"message": "bad   request\n here"}}"#),
        Some("bad request here".to_string())
    );
    assert_eq!(
        extract_error_message(r#"{"detail": "Invalid token."}"#),
        Some("Invalid token.".to_string())
    );
    assert_eq!(
        extract_error_message("<html>oops</html>"),
        Some("<html>oops</html>".to_string())
    );
    assert_eq!(extract_error_message("   "), None);
    assert_eq!(extract_error_message(r#"{"other": 1}"#), None);
}

#[test]
fn from_status_classifies_auth_and_quota_failures() {
    let unauthorized = ApiError::from_status(StatusCode::UNAUTHORIZED, "");
    assert!(unauthorized.is_auth_rejection());
    assert!(ApiError::from_status(StatusCode::FORBIDDEN, "{}").is_auth_rejection());

    let quota = ApiError::from_status(StatusCode::BAD_REQUEST, r#"{"error":"Insufficient tokens"}"#);
    assert!(quota.is_quota_refusal());
    assert!(!quota.is_auth_rejection());

    let missing = ApiError::from_status(StatusCode::BAD_REQUEST, r#"{"error":"Message is required"}"#);
    assert!(!missing.is_quota_refusal());

    let server = ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "");
    assert_eq!(
        server,
        ApiError::Status {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Internal Server Error".to_string(),
        }
    );
    assert!(!ApiError::Network("refused".into()).is_quota_refusal());
}

#[tokio::test]
async fn send_message_posts_json_with_token_header() {
    let (base_url, server) = serve_once(
        "200 OK",
        r#"{"message":"hi","response":"Predicted intent: greeting","predicted_intent":"greeting","remaining_tokens":3900}"#,
    )
    .await;
    let client = ApiClient::new(&base_url, None).expect("client builds");

    let reply = client
        .send_message("tok-123", "hi")
        .await
        .expect("send succeeds");
    assert_eq!(reply.response, "Predicted intent: greeting");
    assert_eq!(reply.remaining_tokens, 3900);
    assert_eq!(reply.predicted_intent.as_deref(), Some("greeting"));

    let request = server.await.expect("server task").expect("request captured");
    assert_eq!(request.request_line, "POST /api/chat/send_message/ HTTP/1.1");
    assert_eq!(request.header("authorization"), Some("Token tok-123"));
    assert_eq!(request.json_body(), serde_json::json!({ "message": "hi" }));
}

#[tokio::test]
async fn verify_identity_maps_401_to_auth_rejection() {
    let (base_url, server) =
        serve_once("401 Unauthorized", r#"{"detail":"Invalid token."}"#).await;
    let client = ApiClient::new(&base_url, None).expect("client builds");

    let err = client
        .verify_identity("stale")
        .await
        .expect_err("401 must fail");
    assert!(err.is_auth_rejection());

    let request = server.await.expect("server task").expect("request captured");
    assert_eq!(request.request_line, "GET /api/user/details/ HTTP/1.1");
    assert_eq!(request.header("authorization"), Some("Token stale"));
}

#[tokio::test]
async fn fetch_profile_decodes_username_and_tokens() {
    let (base_url, server) = serve_once("200 OK", r#"{"username":"ada","tokens":4000}"#).await;
    let client = ApiClient::new(&base_url, None).expect("client builds");

    let profile = client.fetch_profile("tok").await.expect("profile loads");
    assert_eq!(
        profile,
        ProfileResponse {
            username: "ada".to_string(),
            tokens: 4000,
        }
    );

    let request = server.await.expect("server task").expect("request captured");
    assert_eq!(request.request_line, "GET /api/users/ HTTP/1.1");
}

#[tokio::test]
async fn fetch_profile_rejects_unexpected_shape() {
    let (base_url, _server) = serve_once("200 OK", r#"[{"username":"ada"}]"#).await;
    let client = ApiClient::new(&base_url, None).expect("client builds");

    let err = client.fetch_profile("tok").await.expect_err("list is not a profile");
    assert!(matches!(err, ApiError::Decode(_)));
}

#[tokio::test]
async fn login_returns_token_and_sends_no_auth_header() {
    let (base_url, server) = serve_once("200 OK", r#"{"token":"fresh-token"}"#).await;
    let client = ApiClient::new(&base_url, None).expect("client builds");

    let token = client.login("ada", "s3cret").await.expect("login succeeds");
    assert_eq!(token, "fresh-token");

    let request = server.await.expect("server task").expect("request captured");
    assert_eq!(request.request_line, "POST /api/auth/login/ HTTP/1.1");
    assert_eq!(request.header("authorization"), None);
    assert_eq!(
        request.json_body(),
        serde_json::json!({ "username": "ada", "password": "s3cret" })
    );
}

#[tokio::test]
async fn register_surfaces_server_error_text() {
    let (base_url, _server) =
        serve_once("400 Bad Request", r#"{"error":"Username already taken"}"#).await;
    let client = ApiClient::new(&base_url, None).expect("client builds");

    let err = client.register("ada", "pw").await.expect_err("taken");
    assert_eq!(
        err,
        ApiError::Status {
            status: StatusCode::BAD_REQUEST,
            message: "Username already taken".to_string(),
        }
    );
}

#[tokio::test]
async fn connection_refused_is_a_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("local addr should resolve");
    drop(listener);

    let client = ApiClient::new(&format!("http://{addr}/api"), None).expect("client builds");
    let err = client
        .send_message("tok", "hi")
        .await
        .expect_err("nothing listens");
    assert!(matches!(err, ApiError::Network(_)));
}
