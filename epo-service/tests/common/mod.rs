use epo_service::config::{EpoConfig, OpsConfig, SearchProvider};
use epo_service::Application;
use secrecy::Secret;
use service_core::config::Config as CoreConfig;
use std::net::{IpAddr, Ipv4Addr};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_CONSUMER_KEY: &str = "test-consumer-key";
pub const TEST_CONSUMER_SECRET: &str = "test-consumer-secret";
pub const TEST_ACCESS_TOKEN: &str = "test-access-token";

pub const TOKEN_PATH: &str = "/auth/accesstoken";
pub const SEARCH_PATH: &str = "/rest-services/published-data/search";

/// Service under test plus a mock EPO it forwards to.
pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub epo: MockServer,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_timeout(5).await
    }

    pub async fn spawn_with_timeout(request_timeout_secs: u64) -> Self {
        let epo = MockServer::start().await;
        let config = test_config(&epo.uri(), request_timeout_secs);

        let app = Application::build(config)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for HTTP server to be ready by polling health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp { address, port, epo }
    }

    /// Mount a token endpoint that hands out [`TEST_ACCESS_TOKEN`].
    pub async fn mock_token(&self, expires_in: &str) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": TEST_ACCESS_TOKEN,
                "token_type": "BearerToken",
                "expires_in": expires_in,
                "status": "approved"
            })))
            .mount(&self.epo)
            .await;
    }

    pub async fn post_search(&self, body: serde_json::Value) -> reqwest::Response {
        reqwest::Client::new()
            .post(format!("{}/search", self.address))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }
}

pub fn test_config(base_url: &str, request_timeout_secs: u64) -> EpoConfig {
    EpoConfig {
        common: CoreConfig {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0, // Random port for testing
        },
        epo: OpsConfig {
            provider: SearchProvider::Ops,
            base_url: base_url.to_string(),
            consumer_key: Secret::new(TEST_CONSUMER_KEY.to_string()),
            consumer_secret: Secret::new(TEST_CONSUMER_SECRET.to_string()),
            request_timeout_secs,
        },
    }
}
