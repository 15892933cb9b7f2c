#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};

static SERVER: OnceLock<TestServer> = OnceLock::new();
static DETACHED_SERVER: OnceLock<TestServer> = OnceLock::new();

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    fn spawn(await_recompute: bool) -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        // Memory backend; awaited recomputes unless the test exercises detached mode
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_bootcamp-api-rust"));
        cmd.env("PORT", port.to_string())
            .env("APP_ENV", "development")
            .env("STORE_BACKEND", "memory")
            .env("JWT_SECRET", "integration-test-secret")
            .env("AGGREGATE_AWAIT", await_recompute.to_string())
            .env("API_ENABLE_REQUEST_LOGGING", "false")
            .env("RUST_LOG", "warn")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self { port, base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/api/v1/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn(true).expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}

/// A server running with its default fire-and-forget recomputes
pub async fn ensure_detached_server() -> Result<&'static TestServer> {
    let server = DETACHED_SERVER.get_or_init(|| TestServer::spawn(false).expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}

/// Unique suffix so tests sharing one server never collide
pub fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, &uuid::Uuid::new_v4().simple().to_string()[..12])
}

/// Register a fresh account and return its bearer token
pub async fn register(server: &TestServer, role: &str) -> Result<String> {
    let email = format!("{}@example.com", unique(role));
    let res = reqwest::Client::new()
        .post(server.url("/auth/register"))
        .json(&json!({ "name": "Test User", "email": email, "password": "123456", "role": role }))
        .send()
        .await?;
    anyhow::ensure!(res.status() == StatusCode::OK, "register failed: {}", res.status());
    let body: Value = res.json().await?;
    body["token"]
        .as_str()
        .map(str::to_string)
        .context("register response has no token")
}

/// Create a bootcamp as the given publisher and return its id
pub async fn create_bootcamp(server: &TestServer, token: &str) -> Result<String> {
    let res = reqwest::Client::new()
        .post(server.url("/bootcamps"))
        .bearer_auth(token)
        .json(&json!({
            "name": unique("Camp"),
            "description": "Full stack web development",
            "careers": ["Web Development"]
        }))
        .send()
        .await?;
    anyhow::ensure!(res.status() == StatusCode::CREATED, "create bootcamp failed: {}", res.status());
    let body: Value = res.json().await?;
    body["data"]["id"]
        .as_str()
        .map(str::to_string)
        .context("bootcamp response has no id")
}

pub async fn create_course(server: &TestServer, token: &str, bootcamp_id: &str, tuition: i64) -> Result<Value> {
    let res = reqwest::Client::new()
        .post(server.url(&format!("/bootcamps/{}/courses", bootcamp_id)))
        .bearer_auth(token)
        .json(&json!({
            "title": unique("Course"),
            "description": "Learn things",
            "weeks": "8",
            "tuition": tuition,
            "minimumSkill": "intermediate"
        }))
        .send()
        .await?;
    anyhow::ensure!(res.status() == StatusCode::CREATED, "create course failed: {}", res.status());
    let body: Value = res.json().await?;
    Ok(body["data"].clone())
}

pub async fn get_bootcamp(server: &TestServer, id: &str) -> Result<Value> {
    let body: Value = reqwest::Client::new()
        .get(server.url(&format!("/bootcamps/{}", id)))
        .send()
        .await?
        .json()
        .await?;
    Ok(body["data"].clone())
}

/// Poll a bootcamp until `field` settles on `expected`, for detached recomputes
pub async fn wait_for_field(server: &TestServer, id: &str, field: &str, expected: &Value) -> Result<()> {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let current = get_bootcamp(server, id).await?[field].clone();
        if current == *expected {
            return Ok(());
        }
        if Instant::now() > deadline {
            anyhow::bail!("{} on bootcamp {} stayed {} (expected {})", field, id, current, expected);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

pub async fn create_review(server: &TestServer, token: &str, bootcamp_id: &str, rating: i64) -> Result<Value> {
    let res = reqwest::Client::new()
        .post(server.url(&format!("/bootcamps/{}/reviews", bootcamp_id)))
        .bearer_auth(token)
        .json(&json!({ "title": "Solid", "text": "Worth it", "rating": rating }))
        .send()
        .await?;
    anyhow::ensure!(res.status() == StatusCode::CREATED, "create review failed: {}", res.status());
    let body: Value = res.json().await?;
    Ok(body["data"].clone())
}
