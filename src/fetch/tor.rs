//! Optional Tor transport
//!
//! Traffic is routed through the local Tor SOCKS port. New circuits are
//! requested over the control port with `SIGNAL NEWNYM`.

use crate::config::TorConfig;
use crate::{QuarryError, Result};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// Tor refuses NEWNYM more often than this
const MIN_RENEW_INTERVAL: Duration = Duration::from_secs(15);

/// Time for a fresh circuit to be built after NEWNYM
const DEFAULT_SETTLE: Duration = Duration::from_secs(15);

const CHECK_URL: &str = "https://check.torproject.org/api/ip";

#[derive(Debug)]
pub struct TorManager {
    config: TorConfig,
    queries_since_renewal: AtomicU32,
    last_renewal: Mutex<Option<Instant>>,
    settle: Duration,
}

impl TorManager {
    pub fn new(config: &TorConfig) -> Self {
        Self {
            config: config.clone(),
            queries_since_renewal: AtomicU32::new(0),
            last_renewal: Mutex::new(None),
            settle: DEFAULT_SETTLE,
        }
    }

    /// Returns a manager when Tor is enabled and reachable
    ///
    /// An unreachable proxy is not fatal; the caller continues without Tor.
    pub async fn connect(config: &TorConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let manager = Self::new(config);
        if manager.check_available().await {
            Some(manager)
        } else {
            tracing::warn!(
                "Tor not reachable on SOCKS port {}, falling back to direct connection",
                config.socks_port
            );
            None
        }
    }

    /// Overrides the wait after a successful renewal
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// SOCKS proxy URL; `socks5h` so DNS is resolved inside Tor
    pub fn proxy_url(&self) -> String {
        format!("socks5h://127.0.0.1:{}", self.config.socks_port)
    }

    /// Builds a reqwest proxy for all schemes
    pub fn proxy(&self) -> Result<reqwest::Proxy> {
        Ok(reqwest::Proxy::all(self.proxy_url())?)
    }

    /// Checks that traffic through the SOCKS port exits via Tor
    pub async fn check_available(&self) -> bool {
        let client = match self
            .proxy()
            .and_then(|proxy| {
                reqwest::Client::builder()
                    .proxy(proxy)
                    .timeout(Duration::from_secs(15))
                    .build()
                    .map_err(QuarryError::from)
            }) {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!("Could not build Tor client: {}", e);
                return false;
            }
        };

        let response = match client.get(CHECK_URL).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Tor check failed: {}", e);
                return false;
            }
        };

        match response.json::<serde_json::Value>().await {
            Ok(body) => {
                let is_tor = body.get("IsTor").and_then(|v| v.as_bool()).unwrap_or(false);
                if is_tor {
                    tracing::info!(
                        "Tor connected, exit IP {}",
                        body.get("IP").and_then(|v| v.as_str()).unwrap_or("unknown")
                    );
                }
                is_tor
            }
            Err(e) => {
                tracing::warn!("Unexpected Tor check response: {}", e);
                false
            }
        }
    }

    /// Counts one search issued over the current circuit
    pub fn record_query(&self) {
        self.queries_since_renewal.fetch_add(1, Ordering::Relaxed);
    }

    /// True once `renew-every` queries have used the current circuit
    pub fn should_renew(&self) -> bool {
        self.config.renew_every > 0
            && self.queries_since_renewal.load(Ordering::Relaxed) >= self.config.renew_every
    }

    /// Requests a new circuit
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - Tor accepted NEWNYM and the settle wait has passed
    /// * `Ok(false)` - The previous renewal was too recent; nothing was sent
    /// * `Err(QuarryError::Tor)` - The control port refused or was unreachable
    pub async fn renew_circuit(&self) -> Result<bool> {
        if let Some(last) = self.last_renewal() {
            if last.elapsed() < MIN_RENEW_INTERVAL {
                tracing::debug!("Skipping circuit renewal, last one {:?} ago", last.elapsed());
                return Ok(false);
            }
        }

        let addr = format!("127.0.0.1:{}", self.config.control_port);
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| QuarryError::Tor(format!("control port {}: {}", addr, e)))?;
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        let auth = format!("AUTHENTICATE \"{}\"\r\n", self.config.password);
        send_command(&mut writer, &mut reader, &auth).await?;
        send_command(&mut writer, &mut reader, "SIGNAL NEWNYM\r\n").await?;

        self.queries_since_renewal.store(0, Ordering::Relaxed);
        self.set_last_renewal(Instant::now());
        tracing::info!("Tor circuit renewed");

        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }
        Ok(true)
    }

    /// Reacts to a rate-limited search
    pub async fn on_ratelimit(&self) -> bool {
        if !self.config.renew_on_ratelimit {
            return false;
        }
        match self.renew_circuit().await {
            Ok(renewed) => renewed,
            Err(e) => {
                tracing::warn!("Circuit renewal after rate limit failed: {}", e);
                false
            }
        }
    }

    fn last_renewal(&self) -> Option<Instant> {
        match self.last_renewal.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn set_last_renewal(&self, at: Instant) {
        let mut guard = match self.last_renewal.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(at);
    }
}

async fn send_command<W, R>(writer: &mut W, reader: &mut R, command: &str) -> Result<()>
where
    W: AsyncWriteExt + Unpin,
    R: AsyncBufReadExt + Unpin,
{
    writer.write_all(command.as_bytes()).await?;
    writer.flush().await?;

    let mut reply = String::new();
    reader.read_line(&mut reply).await?;
    if !reply.starts_with("250") {
        let verb = command.split_whitespace().next().unwrap_or_default();
        return Err(QuarryError::Tor(format!(
            "{} rejected: {}",
            verb,
            reply.trim_end()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn tor_config(control_port: u16) -> TorConfig {
        TorConfig {
            enabled: true,
            control_port,
            password: "secret".to_string(),
            renew_every: 2,
            ..TorConfig::default()
        }
    }

    /// Answers every control line with `reply` and returns the lines seen
    async fn fake_control_port(reply: &'static str) -> (u16, tokio::task::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = stream.into_split();
            let mut lines = BufReader::new(reader).lines();
            let mut seen = Vec::new();
            while let Ok(Some(line)) = lines.next_line().await {
                seen.push(line);
                if writer.write_all(reply.as_bytes()).await.is_err() {
                    break;
                }
            }
            seen
        });
        (port, handle)
    }

    #[tokio::test]
    async fn test_connect_disabled_is_direct() {
        let config = TorConfig {
            enabled: false,
            ..TorConfig::default()
        };
        assert!(TorManager::connect(&config).await.is_none());
    }

    #[tokio::test]
    async fn test_connect_falls_back_when_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let closed_port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = TorConfig {
            enabled: true,
            socks_port: closed_port,
            ..TorConfig::default()
        };
        assert!(TorManager::connect(&config).await.is_none());
    }

    #[test]
    fn test_proxy_url() {
        let manager = TorManager::new(&TorConfig::default());
        assert_eq!(manager.proxy_url(), "socks5h://127.0.0.1:9150");
        assert!(manager.proxy().is_ok());
    }

    #[test]
    fn test_should_renew_after_threshold() {
        let manager = TorManager::new(&tor_config(9051));
        assert!(!manager.should_renew());
        manager.record_query();
        assert!(!manager.should_renew());
        manager.record_query();
        assert!(manager.should_renew());
    }

    #[tokio::test]
    async fn test_renew_circuit_sends_newnym() {
        let (port, handle) = fake_control_port("250 OK\r\n").await;
        let manager = TorManager::new(&tor_config(port)).with_settle(Duration::ZERO);
        manager.record_query();
        manager.record_query();

        assert!(manager.renew_circuit().await.unwrap());
        assert!(!manager.should_renew());

        let seen = handle.await.unwrap();
        assert_eq!(seen, vec!["AUTHENTICATE \"secret\"", "SIGNAL NEWNYM"]);
    }

    #[tokio::test]
    async fn test_renew_circuit_respects_min_interval() {
        let (port, _handle) = fake_control_port("250 OK\r\n").await;
        let manager = TorManager::new(&tor_config(port)).with_settle(Duration::ZERO);

        assert!(manager.renew_circuit().await.unwrap());
        assert!(!manager.renew_circuit().await.unwrap());
    }

    #[tokio::test]
    async fn test_renew_circuit_auth_rejected() {
        let (port, _handle) = fake_control_port("515 Authentication failed\r\n").await;
        let manager = TorManager::new(&tor_config(port)).with_settle(Duration::ZERO);

        let err = manager.renew_circuit().await.unwrap_err();
        assert!(matches!(err, QuarryError::Tor(_)));
        assert!(err.to_string().contains("AUTHENTICATE"));
    }

    #[tokio::test]
    async fn test_on_ratelimit_disabled() {
        let config = TorConfig {
            renew_on_ratelimit: false,
            ..tor_config(1)
        };
        let manager = TorManager::new(&config);
        assert!(!manager.on_ratelimit().await);
    }
}
