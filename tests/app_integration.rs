use tracing::info;

use estnav::quote_provider::FundQuote;

mod test_utils {
    use std::sync::Arc;
    use std::time::Duration;

    use estnav::cache::QuoteCache;
    use estnav::config::UpstreamConfig;
    use estnav::providers::eastmoney::EastmoneyProvider;
    use estnav::quote_provider::CodeLengthPolicy;
    use estnav::server::{create_router, AppState};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub async fn create_estimate_mock_server() -> MockServer {
        MockServer::start().await
    }

    pub async fn mount_estimate(mock_server: &MockServer, code: &str, body: &str, expect: Option<u64>) {
        let mut mock = Mock::given(method("GET"))
            .and(path(format!("/js/{code}.js")))
            .respond_with(ResponseTemplate::new(200).set_body_string(body));
        if let Some(expected_calls) = expect {
            mock = mock.expect(expected_calls);
        }
        mock.mount(mock_server).await;
    }

    pub async fn mount_estimate_error(mock_server: &MockServer, code: &str, status: u16) {
        Mock::given(method("GET"))
            .and(path(format!("/js/{code}.js")))
            .respond_with(ResponseTemplate::new(status))
            .mount(mock_server)
            .await;
    }

    /// Spins up the full service against the given mock upstream and returns
    /// its base URL.
    pub async fn spawn_app(upstream_url: &str, policy: CodeLengthPolicy) -> String {
        let upstream = UpstreamConfig {
            base_url: upstream_url.to_string(),
            referer: "https://fund.example.com/".to_string(),
            timeout_secs: 10,
        };
        let provider = Arc::new(EastmoneyProvider::new(&upstream).expect("Failed to build provider"));
        let cache = Arc::new(QuoteCache::new(provider, Duration::from_secs(60), true));
        let state = AppState {
            cache,
            code_policy: policy,
        };
        let app = create_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind ephemeral port");
        let addr = listener.local_addr().expect("Failed to read local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Server crashed");
        });

        format!("http://{addr}")
    }
}

#[test_log::test(tokio::test)]
async fn test_batch_preserves_input_order_and_length() {
    let mock_server = test_utils::create_estimate_mock_server().await;
    test_utils::mount_estimate(
        &mock_server,
        "161725",
        r#"jsonpgz({"fundcode":"161725","name":"白酒指数","gsz":"1.2388","gszzl":"-0.42"});"#,
        None,
    )
    .await;
    test_utils::mount_estimate(
        &mock_server,
        "005827",
        r#"jsonpgz({"fundcode":"005827","name":"蓝筹精选","gsz":"2.5170","gszzl":"1.03"});"#,
        None,
    )
    .await;

    let base_url = test_utils::spawn_app(
        &mock_server.uri(),
        estnav::quote_provider::CodeLengthPolicy::SixOnly,
    )
    .await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{base_url}/api/fund"))
        .json(&serde_json::json!({"codes": ["161725", "12AB56", "005827"]}))
        .send()
        .await
        .expect("Request failed");

    assert_eq!(response.status().as_u16(), 200);
    let quotes: Vec<FundQuote> = response.json().await.expect("Invalid response body");

    assert_eq!(quotes.len(), 3);
    assert_eq!(quotes[0].code, "161725");
    assert_eq!(quotes[0].name, "白酒指数");
    assert_eq!(quotes[0].estimate_net, "1.2388");
    assert_eq!(quotes[1].code, "12AB56");
    assert_eq!(quotes[1].name, "invalid fund code");
    assert_eq!(quotes[1].estimate_net, "0.0000");
    assert_eq!(quotes[2].code, "005827");
    assert_eq!(quotes[2].estimate_change, "1.03");

    info!("Batch response: {quotes:?}");

    // The invalid code never reached the upstream: only the two valid codes
    // produced requests.
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 2);
}

#[test_log::test(tokio::test)]
async fn test_repeated_batch_within_ttl_hits_cache() {
    let mock_server = test_utils::create_estimate_mock_server().await;
    test_utils::mount_estimate(
        &mock_server,
        "161725",
        r#"jsonpgz({"fundcode":"161725","name":"白酒指数","gsz":"1.2388","gszzl":"-0.42"});"#,
        Some(1),
    )
    .await;

    let base_url = test_utils::spawn_app(
        &mock_server.uri(),
        estnav::quote_provider::CodeLengthPolicy::SixOnly,
    )
    .await;

    let client = reqwest::Client::new();
    let body = serde_json::json!({"codes": ["161725"]});

    let first: Vec<FundQuote> = client
        .post(format!("{base_url}/api/fund"))
        .json(&body)
        .send()
        .await
        .expect("First request failed")
        .json()
        .await
        .expect("Invalid first response");
    let second: Vec<FundQuote> = client
        .post(format!("{base_url}/api/fund"))
        .json(&body)
        .send()
        .await
        .expect("Second request failed")
        .json()
        .await
        .expect("Invalid second response");

    // Byte-identical records, single upstream call (wiremock verifies the
    // expectation of 1 on drop).
    assert_eq!(first, second);
}

#[test_log::test(tokio::test)]
async fn test_five_digit_codes_accepted_under_loose_policy() {
    let mock_server = test_utils::create_estimate_mock_server().await;
    test_utils::mount_estimate(
        &mock_server,
        "12345",
        r#"jsonpgz({"fundcode":"12345","name":"Five Digit","gsz":"1.0001","gszzl":"0.01"});"#,
        None,
    )
    .await;

    let base_url = test_utils::spawn_app(
        &mock_server.uri(),
        estnav::quote_provider::CodeLengthPolicy::FiveOrSix,
    )
    .await;

    let quotes: Vec<FundQuote> = reqwest::Client::new()
        .post(format!("{base_url}/api/fund"))
        .json(&serde_json::json!({"codes": ["12345"]}))
        .send()
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Invalid response body");

    assert_eq!(quotes[0].name, "Five Digit");
}

#[test_log::test(tokio::test)]
async fn test_malformed_body_yields_400_with_error_field() {
    let mock_server = test_utils::create_estimate_mock_server().await;
    let base_url = test_utils::spawn_app(
        &mock_server.uri(),
        estnav::quote_provider::CodeLengthPolicy::SixOnly,
    )
    .await;

    let client = reqwest::Client::new();

    // Well-formed JSON, wrong shape
    let response = client
        .post(format!("{base_url}/api/fund"))
        .json(&serde_json::json!({"foo": 1}))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.expect("Invalid error body");
    assert_eq!(body["error"], "codes must be an array");

    // codes present but not an array
    let response = client
        .post(format!("{base_url}/api/fund"))
        .json(&serde_json::json!({"codes": "161725"}))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(response.status().as_u16(), 400);

    // Not JSON at all
    let response = client
        .post(format!("{base_url}/api/fund"))
        .header("content-type", "application/json")
        .body("not json")
        .send()
        .await
        .expect("Request failed");
    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.expect("Invalid error body");
    assert!(body["error"].is_string());
}

#[test_log::test(tokio::test)]
async fn test_upstream_failure_degrades_without_batch_error() {
    let mock_server = test_utils::create_estimate_mock_server().await;
    test_utils::mount_estimate_error(&mock_server, "161725", 500).await;

    let base_url = test_utils::spawn_app(
        &mock_server.uri(),
        estnav::quote_provider::CodeLengthPolicy::SixOnly,
    )
    .await;

    let response = reqwest::Client::new()
        .post(format!("{base_url}/api/fund"))
        .json(&serde_json::json!({"codes": ["161725"]}))
        .send()
        .await
        .expect("Request failed");

    // Upstream trouble never becomes a batch-level error
    assert_eq!(response.status().as_u16(), 200);
    let quotes: Vec<FundQuote> = response.json().await.expect("Invalid response body");
    assert_eq!(quotes.len(), 1);
    assert_eq!(quotes[0].code, "161725");
    assert_eq!(quotes[0].estimate_net, "0.0000");
    assert_eq!(quotes[0].estimate_change, "0.00");
    assert!(quotes[0].name.starts_with("fetch failed:"));
}

#[test_log::test(tokio::test)]
async fn test_health_endpoint() {
    let mock_server = test_utils::create_estimate_mock_server().await;
    let base_url = test_utils::spawn_app(
        &mock_server.uri(),
        estnav::quote_provider::CodeLengthPolicy::SixOnly,
    )
    .await;

    let response = reqwest::Client::new()
        .get(format!("{base_url}/health"))
        .send()
        .await
        .expect("Request failed");

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.expect("Invalid health body");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "estnav");
}
