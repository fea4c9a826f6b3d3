//! Container stats from the Docker Engine API
//!
//! Talks HTTP/1.0 over the engine's Unix socket:
//! - GET /version to negotiate the API version
//! - GET /containers/json to list running containers
//! - GET /containers/{id}/stats?stream=false for one stats reading, which
//!   carries both the current and the previous CPU counters

use crate::error::{InitError, SourceError};
use crate::models::{ContainerSample, CpuSnapshotPair, CpuTimes};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::{debug, info};

/// Used when DOCKER_HOST is unset
pub const DEFAULT_DOCKER_HOST: &str = "unix:///var/run/docker.sock";

/// Newest API version this client speaks
pub const MAX_API_VERSION: &str = "1.43";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Entry of GET /containers/json
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DockerContainer {
    id: String,
    #[serde(default)]
    names: Vec<String>,
}

impl DockerContainer {
    /// First name without the leading '/', or the short id
    fn display_name(&self) -> String {
        self.names
            .first()
            .map(|n| n.trim_start_matches('/').to_string())
            .unwrap_or_else(|| self.id.chars().take(12).collect())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DockerStats {
    #[serde(default)]
    cpu_stats: DockerCpuStats,
    #[serde(default)]
    precpu_stats: DockerCpuStats,
    #[serde(default)]
    memory_stats: DockerMemoryStats,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DockerCpuStats {
    #[serde(default)]
    cpu_usage: DockerCpuUsage,
    #[serde(default)]
    system_cpu_usage: Option<u64>,
    #[serde(default)]
    online_cpus: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DockerCpuUsage {
    #[serde(default)]
    total_usage: u64,
    #[serde(default)]
    percpu_usage: Option<Vec<u64>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DockerMemoryStats {
    #[serde(default)]
    usage: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DockerVersion {
    api_version: String,
}

impl DockerStats {
    fn into_sample(self, id: String, name: String) -> ContainerSample {
        let online_cpus = self
            .cpu_stats
            .online_cpus
            .filter(|n| *n > 0)
            .or_else(|| {
                self.cpu_stats
                    .cpu_usage
                    .percpu_usage
                    .as_ref()
                    .map(|v| v.len() as u32)
                    .filter(|n| *n > 0)
            })
            .unwrap_or(1);

        ContainerSample {
            id,
            name,
            cpu: CpuSnapshotPair {
                previous: CpuTimes {
                    busy: self.precpu_stats.cpu_usage.total_usage,
                    total: self.precpu_stats.system_cpu_usage.unwrap_or(0),
                },
                current: CpuTimes {
                    busy: self.cpu_stats.cpu_usage.total_usage,
                    total: self.cpu_stats.system_cpu_usage.unwrap_or(0),
                },
            },
            online_cpus,
            memory_usage: self.memory_stats.usage,
        }
    }
}

/// Minimal Docker Engine client over a Unix socket
#[derive(Debug, Clone)]
pub struct DockerClient {
    socket_path: PathBuf,
    api_version: String,
    timeout: Duration,
}

impl DockerClient {
    /// Connect using DOCKER_HOST and DOCKER_API_VERSION from the environment
    pub async fn from_env() -> Result<Self, InitError> {
        let host =
            std::env::var("DOCKER_HOST").unwrap_or_else(|_| DEFAULT_DOCKER_HOST.to_string());
        let pinned = std::env::var("DOCKER_API_VERSION")
            .ok()
            .filter(|v| !v.trim().is_empty());
        Self::connect(&host, pinned).await
    }

    /// Connect to `host` and settle on an API version
    ///
    /// The engine is contacted once here so an unreachable socket fails at
    /// startup rather than on every tick.
    pub async fn connect(host: &str, pinned_version: Option<String>) -> Result<Self, InitError> {
        let socket_path = parse_docker_host(host)?;
        let unreachable = |detail: String| InitError::RuntimeUnreachable {
            socket: socket_path.display().to_string(),
            detail,
        };

        let mut client = Self {
            socket_path: socket_path.clone(),
            api_version: MAX_API_VERSION.to_string(),
            timeout: DEFAULT_TIMEOUT,
        };

        let (status, body) = client.request("/version").await.map_err(unreachable)?;
        if !(200..300).contains(&status) {
            return Err(unreachable(format!("GET /version answered HTTP {}", status)));
        }

        client.api_version = match pinned_version {
            Some(version) => version,
            None => {
                let server: DockerVersion = serde_json::from_str(&body)
                    .map_err(|e| unreachable(format!("invalid /version response: {}", e)))?;
                negotiate_version(&server.api_version, MAX_API_VERSION)
            }
        };

        info!(
            socket = %client.socket_path.display(),
            api_version = %client.api_version,
            "Connected to container runtime"
        );

        Ok(client)
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Read one stats sample for every running container
    pub async fn sample_containers(&self) -> Result<Vec<ContainerSample>, SourceError> {
        let containers: Vec<DockerContainer> = self.get_json("/containers/json").await?;
        let mut samples = Vec::with_capacity(containers.len());

        for container in containers {
            let path = format!("/containers/{}/stats?stream=false", container.id);
            match self.get_json::<DockerStats>(&path).await {
                Ok(stats) => {
                    let name = container.display_name();
                    samples.push(stats.into_sample(container.id, name));
                }
                // Exited between the listing and the stats call
                Err(SourceError::RuntimeStatus { status: 404, .. }) => {
                    debug!(container_id = %container.id, "Container vanished before stats read");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(samples)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, SourceError> {
        let versioned = format!("/v{}{}", self.api_version, path);
        let (status, body) = self
            .request(&versioned)
            .await
            .map_err(|detail| SourceError::Runtime {
                path: versioned.clone(),
                detail,
            })?;

        if !(200..300).contains(&status) {
            return Err(SourceError::RuntimeStatus {
                path: versioned,
                status,
            });
        }

        serde_json::from_str(&body).map_err(|e| SourceError::Runtime {
            path: versioned,
            detail: format!("invalid JSON: {}", e),
        })
    }

    /// Send one GET and return status code and body
    async fn request(&self, path: &str) -> Result<(u16, String), String> {
        let exchange = async {
            let mut stream = UnixStream::connect(&self.socket_path)
                .await
                .map_err(|e| format!("connect failed: {}", e))?;

            let request = format!(
                "GET {} HTTP/1.0\r\nHost: docker\r\nAccept: application/json\r\n\r\n",
                path
            );
            stream
                .write_all(request.as_bytes())
                .await
                .map_err(|e| format!("write failed: {}", e))?;

            // HTTP/1.0: the engine closes the connection after the response
            let mut response = Vec::new();
            stream
                .read_to_end(&mut response)
                .await
                .map_err(|e| format!("read failed: {}", e))?;
            Ok::<_, String>(response)
        };

        let response = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| format!("timed out after {:?}", self.timeout))??;

        parse_http_response(&response)
    }
}

/// Extract the socket path from a DOCKER_HOST value
pub fn parse_docker_host(host: &str) -> Result<PathBuf, InitError> {
    match host.strip_prefix("unix://") {
        Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
        _ => Err(InitError::UnsupportedDockerHost(host.to_string())),
    }
}

/// Lower of the server's and the client's API versions
pub fn negotiate_version(server: &str, client_max: &str) -> String {
    fn parts(v: &str) -> Option<(u32, u32)> {
        let (major, minor) = v.trim().split_once('.')?;
        Some((major.parse().ok()?, minor.parse().ok()?))
    }

    match (parts(server), parts(client_max)) {
        (Some(s), Some(c)) if s < c => server.trim().to_string(),
        _ => client_max.to_string(),
    }
}

/// Split a raw HTTP response into status code and decoded body
///
/// Framing is handled on bytes; the body is converted to text only once it
/// has been reassembled.
pub(crate) fn parse_http_response(raw: &[u8]) -> Result<(u16, String), String> {
    let split = find(raw, b"\r\n\r\n")
        .ok_or_else(|| "invalid HTTP response: no header terminator".to_string())?;
    let head = String::from_utf8_lossy(&raw[..split]);
    let body = &raw[split + 4..];

    let mut lines = head.lines();
    let status_line = lines.next().unwrap_or_default();
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse::<u16>().ok())
        .ok_or_else(|| format!("invalid status line '{}'", status_line))?;

    let chunked = lines.any(|line| {
        line.split_once(':').is_some_and(|(name, value)| {
            name.trim().eq_ignore_ascii_case("transfer-encoding")
                && value.trim().eq_ignore_ascii_case("chunked")
        })
    });

    let body = if chunked {
        decode_chunked(body)?
    } else {
        body.to_vec()
    };

    let body = String::from_utf8(body).map_err(|e| format!("body is not UTF-8: {}", e))?;
    Ok((status, body))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn decode_chunked(mut body: &[u8]) -> Result<Vec<u8>, String> {
    let mut decoded = Vec::new();

    loop {
        let line_end = find(body, b"\r\n").ok_or_else(|| "truncated chunk header".to_string())?;
        let size_line = String::from_utf8_lossy(&body[..line_end]);
        let size_hex = size_line.split(';').next().unwrap_or_default().trim();
        let size = usize::from_str_radix(size_hex, 16)
            .map_err(|_| format!("invalid chunk size '{}'", size_hex))?;
        if size == 0 {
            return Ok(decoded);
        }
        let rest = &body[line_end + 2..];
        let chunk = rest
            .get(..size)
            .ok_or_else(|| "truncated chunk".to_string())?;
        decoded.extend_from_slice(chunk);
        body = rest[size..].strip_prefix(b"\r\n").unwrap_or(&rest[size..]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_docker_host() {
        assert_eq!(
            parse_docker_host("unix:///var/run/docker.sock").unwrap(),
            PathBuf::from("/var/run/docker.sock")
        );
        assert!(matches!(
            parse_docker_host("tcp://10.0.0.1:2375"),
            Err(InitError::UnsupportedDockerHost(_))
        ));
        assert!(parse_docker_host("unix://").is_err());
    }

    #[test]
    fn test_negotiate_version() {
        assert_eq!(negotiate_version("1.41", "1.43"), "1.41");
        assert_eq!(negotiate_version("1.45", "1.43"), "1.43");
        assert_eq!(negotiate_version("garbage", "1.43"), "1.43");
        assert_eq!(negotiate_version("1.9", "1.43"), "1.9");
    }

    #[test]
    fn test_parse_http_response() {
        let raw = b"HTTP/1.0 200 OK\r\nContent-Type: application/json\r\n\r\n[{\"Id\":\"abc\"}]";
        let (status, body) = parse_http_response(raw).unwrap();
        assert_eq!(status, 200);
        assert_eq!(body, "[{\"Id\":\"abc\"}]");
    }

    #[test]
    fn test_parse_http_response_chunked() {
        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n4\r\n{\"a\"\r\n3\r\n:1}\r\n0\r\n\r\n";
        let (_, body) = parse_http_response(raw).unwrap();
        assert_eq!(body, "{\"a\":1}");
    }

    #[test]
    fn test_parse_http_response_error_status() {
        let raw = b"HTTP/1.0 404 Not Found\r\n\r\n{\"message\":\"No such container\"}";
        let (status, _) = parse_http_response(raw).unwrap();
        assert_eq!(status, 404);
    }

    #[test]
    fn test_parse_http_response_chunk_splits_multibyte_char() {
        // "é" is 0xC3 0xA9; the two bytes land in different chunks
        let mut raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n".to_vec();
        raw.extend_from_slice(b"7\r\n{\"n\":\"\xC3\r\n");
        raw.extend_from_slice(b"3\r\n\xA9\"}\r\n0\r\n\r\n");

        let (_, body) = parse_http_response(&raw).unwrap();

        assert_eq!(body, "{\"n\":\"é\"}");
    }

    #[test]
    fn test_parse_http_response_garbage() {
        assert!(parse_http_response(b"not http").is_err());
    }

    #[test]
    fn test_stats_into_sample() {
        let json = r#"{
            "cpu_stats": {
                "cpu_usage": {"total_usage": 1500, "percpu_usage": [700, 800]},
                "system_cpu_usage": 14000
            },
            "precpu_stats": {
                "cpu_usage": {"total_usage": 1000},
                "system_cpu_usage": 10000,
                "online_cpus": 2
            },
            "memory_stats": {"usage": 1048576}
        }"#;

        let stats: DockerStats = serde_json::from_str(json).unwrap();
        let sample = stats.into_sample("abc".to_string(), "app".to_string());

        assert_eq!(sample.online_cpus, 2);
        assert_eq!(sample.memory_usage, 1048576);
        assert_eq!(sample.cpu.previous, CpuTimes { busy: 1000, total: 10000 });
        assert_eq!(sample.cpu.current, CpuTimes { busy: 1500, total: 14000 });
    }

    #[test]
    fn test_stats_without_cpu_count_defaults_to_one() {
        let stats: DockerStats = serde_json::from_str("{}").unwrap();
        let sample = stats.into_sample("abc".to_string(), "app".to_string());
        assert_eq!(sample.online_cpus, 1);
        assert_eq!(sample.cpu, CpuSnapshotPair::default());
    }

    #[test]
    fn test_container_display_name() {
        let named: DockerContainer =
            serde_json::from_str(r#"{"Id":"0123456789abcdef","Names":["/app"]}"#).unwrap();
        assert_eq!(named.display_name(), "app");

        let unnamed: DockerContainer =
            serde_json::from_str(r#"{"Id":"0123456789abcdef"}"#).unwrap();
        assert_eq!(unnamed.display_name(), "0123456789ab");
    }

    /// Serve canned engine replies on a Unix socket, recording request paths
    fn spawn_fake_engine(
        listener: tokio::net::UnixListener,
        paths: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
    ) {
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };

                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let request = String::from_utf8_lossy(&request).to_string();
                let path = request
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or_default()
                    .to_string();
                paths.lock().unwrap().push(path.clone());

                let (status, body) = match path.as_str() {
                    "/version" => ("200 OK", r#"{"ApiVersion":"1.41"}"#.to_string()),
                    "/v1.41/containers/json" => (
                        "200 OK",
                        r#"[{"Id":"aaa","Names":["/app"]},{"Id":"bbb","Names":["/gone"]}]"#
                            .to_string(),
                    ),
                    "/v1.41/containers/aaa/stats?stream=false" => (
                        "200 OK",
                        r#"{
                            "cpu_stats": {"cpu_usage": {"total_usage": 1250}, "system_cpu_usage": 14000, "online_cpus": 2},
                            "precpu_stats": {"cpu_usage": {"total_usage": 1000}, "system_cpu_usage": 10000},
                            "memory_stats": {"usage": 1048576}
                        }"#
                        .to_string(),
                    ),
                    _ => (
                        "404 Not Found",
                        r#"{"message":"No such container"}"#.to_string(),
                    ),
                };

                let response = format!(
                    "HTTP/1.0 {}\r\nContent-Type: application/json\r\n\r\n{}",
                    status, body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });
    }

    #[tokio::test]
    async fn test_sample_containers_against_engine() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("docker.sock");
        let listener = tokio::net::UnixListener::bind(&socket).unwrap();
        let paths = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        spawn_fake_engine(listener, paths.clone());

        let client = DockerClient::connect(&format!("unix://{}", socket.display()), None)
            .await
            .unwrap();
        assert_eq!(client.api_version(), "1.41");

        let samples = client.sample_containers().await.unwrap();

        // "bbb" answered 404 and is skipped
        assert_eq!(samples.len(), 1);
        let app = &samples[0];
        assert_eq!(app.id, "aaa");
        assert_eq!(app.name, "app");
        assert_eq!(app.online_cpus, 2);
        assert_eq!(app.memory_usage, 1_048_576);
        assert_eq!(
            app.cpu,
            CpuSnapshotPair {
                previous: CpuTimes { busy: 1000, total: 10000 },
                current: CpuTimes { busy: 1250, total: 14000 },
            }
        );
        let percent =
            crate::rate::container_cpu_percent(&app.name, &app.cpu, app.online_cpus).unwrap();
        assert!((percent - 12.5).abs() < 1e-9);

        assert_eq!(
            *paths.lock().unwrap(),
            vec![
                "/version",
                "/v1.41/containers/json",
                "/v1.41/containers/aaa/stats?stream=false",
                "/v1.41/containers/bbb/stats?stream=false",
            ]
        );
    }

    #[tokio::test]
    async fn test_pinned_version_skips_negotiation() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("docker.sock");
        let listener = tokio::net::UnixListener::bind(&socket).unwrap();
        let paths = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        spawn_fake_engine(listener, paths.clone());

        let client = DockerClient::connect(
            &format!("unix://{}", socket.display()),
            Some("1.40".to_string()),
        )
        .await
        .unwrap();

        assert_eq!(client.api_version(), "1.40");
        assert_eq!(*paths.lock().unwrap(), vec!["/version"]);
    }

    #[tokio::test]
    async fn test_connect_to_missing_socket_fails() {
        let dir = tempfile::tempdir().unwrap();
        let host = format!("unix://{}", dir.path().join("docker.sock").display());

        let result = DockerClient::connect(&host, None).await;

        assert!(matches!(result, Err(InitError::RuntimeUnreachable { .. })));
    }
}
