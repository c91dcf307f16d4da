//! Test server management.
//!
//! Spawns and manages snapsyncd instances for integration testing.

use std::net::{SocketAddr, TcpListener};
use std::process::{Child, Command};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::sleep;

/// Listener addresses reserved for one daemon.
#[derive(Debug, Clone, Copy)]
pub struct Ports {
    pub http: SocketAddr,
    pub websocket: SocketAddr,
}

impl Ports {
    /// Reserve two free loopback ports.
    pub fn allocate() -> anyhow::Result<Self> {
        Ok(Self {
            http: free_addr()?,
            websocket: free_addr()?,
        })
    }

    /// URL other replicas dial to reach this one.
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.websocket)
    }
}

fn free_addr() -> anyhow::Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?)
}

/// A test server instance.
pub struct TestServer {
    child: Child,
    ports: Ports,
    source: String,
    _data_dir: TempDir,
}

impl TestServer {
    /// Spawn a standalone replica.
    pub async fn spawn(source: &str) -> anyhow::Result<Self> {
        Self::spawn_with(source, Ports::allocate()?, &[], "").await
    }

    /// Spawn a replica on `ports` that dials `peers` (WebSocket URLs).
    /// `extra` is appended to the generated config verbatim.
    pub async fn spawn_with(
        source: &str,
        ports: Ports,
        peers: &[String],
        extra: &str,
    ) -> anyhow::Result<Self> {
        let data_dir = tempfile::tempdir()?;
        let config_path = data_dir.path().join("config.toml");

        let mut config_content = format!(
            r#"
[replica]
source = "{source}"

[listen]
http = "{http}"
websocket = "{websocket}"

[sync]
reconnect_delay_ms = 100
"#,
            http = ports.http,
            websocket = ports.websocket,
        );
        for (i, url) in peers.iter().enumerate() {
            config_content.push_str(&format!("\n[[peers]]\nname = \"peer{i}\"\nurl = \"{url}\"\n"));
        }
        config_content.push_str(extra);

        std::fs::write(&config_path, config_content)?;

        let child = Command::new(env!("CARGO_BIN_EXE_snapsyncd"))
            .arg(&config_path)
            .env("RUST_LOG", "warn")
            .spawn()?;

        let server = Self {
            child,
            ports,
            source: source.to_string(),
            _data_dir: data_dir,
        };

        // Wait for server to start listening
        server.wait_until_ready().await?;

        Ok(server)
    }

    /// Wait until both listeners accept connections.
    async fn wait_until_ready(&self) -> anyhow::Result<()> {
        for _ in 0..50 {
            let http = tokio::net::TcpStream::connect(self.ports.http).await;
            let ws = tokio::net::TcpStream::connect(self.ports.websocket).await;
            if http.is_ok() && ws.is_ok() {
                return Ok(());
            }
            sleep(Duration::from_millis(100)).await;
        }
        anyhow::bail!("Server failed to start within 5 seconds")
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ports(&self) -> Ports {
        self.ports
    }

    /// Base URL of the HTTP surface.
    pub fn http_base(&self) -> String {
        format!("http://{}", self.ports.http)
    }

    /// HTTP client bound to this server.
    pub fn client(&self) -> super::client::TestClient {
        super::client::TestClient::new(self.http_base())
    }

    /// Open a WebSocket subscription on this server.
    pub async fn subscribe(&self) -> anyhow::Result<super::client::WsClient> {
        super::client::WsClient::connect(&self.ports.ws_url()).await
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Kill the server process
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
