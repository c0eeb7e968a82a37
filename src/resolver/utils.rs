// Helper functions shared by providers and the pipeline

use regex::Regex;
use serde::de::DeserializeOwned;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;

use super::errors::ProviderError;

/// Outbound HTTP settings shared by every HTTP provider and the directory
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// HTTP or SOCKS5 proxy URL (e.g., "socks5h://127.0.0.1:1080")
    pub proxy: Option<String>,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            user_agent: concat!("video-relay/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpConfig {
    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Build the shared reqwest client
pub fn build_http_client(config: &HttpConfig) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .connect_timeout(Duration::from_secs(5));

    if let Some(proxy_url) = config.proxy.as_deref() {
        builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
    }

    builder.build()
}

/// GET a JSON document with a per-request timeout
pub async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, &str)],
    request_timeout: Duration,
) -> Result<T, ProviderError> {
    if !is_absolute_url(url) {
        return Err(ProviderError::InvalidAddress(url.to_string()));
    }

    let response = client
        .get(url)
        .query(query)
        .timeout(request_timeout)
        .send()
        .await
        .map_err(|e| classify_reqwest(e, request_timeout))?;

    let status = response.status();
    if status.as_u16() == 429 {
        return Err(ProviderError::Blocked("HTTP 429 Too Many Requests".to_string()));
    }
    if !status.is_success() {
        return Err(ProviderError::Status(status.as_u16()));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| classify_reqwest(e, request_timeout))?;

    serde_json::from_slice(&body).map_err(|e| ProviderError::Parse(e.to_string()))
}

/// GET a URL and only check that it answers 2xx
pub async fn get_ok(
    client: &reqwest::Client,
    url: &str,
    request_timeout: Duration,
) -> Result<(), ProviderError> {
    if !is_absolute_url(url) {
        return Err(ProviderError::InvalidAddress(url.to_string()));
    }

    let response = client
        .get(url)
        .timeout(request_timeout)
        .send()
        .await
        .map_err(|e| classify_reqwest(e, request_timeout))?;

    if response.status().is_success() {
        Ok(())
    } else {
        Err(ProviderError::Status(response.status().as_u16()))
    }
}

fn classify_reqwest(e: reqwest::Error, request_timeout: Duration) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(request_timeout.as_millis() as u64)
    } else {
        ProviderError::Http(e)
    }
}

/// Join a provider base URL and an absolute path
pub fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim().trim_end_matches('/'), path)
}

/// Run command with timeout, killing it when the budget runs out
pub async fn run_output_with_timeout(
    program: &str,
    args: Vec<String>,
    budget: Duration,
) -> Result<std::process::Output, ProviderError> {
    let mut child = TokioCommand::new(program)
        .args(&args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ProviderError::InvalidAddress(format!("failed to start {}: {}", program, e)))?;

    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| ProviderError::Execution(format!("no stdout from {}", program)))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| ProviderError::Execution(format!("no stderr from {}", program)))?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });

    match timeout(budget, child.wait()).await {
        Ok(status_res) => {
            let status = status_res
                .map_err(|e| ProviderError::Execution(format!("failed to wait for {}: {}", program, e)))?;
            let stdout = join_pipe(stdout_task).await?;
            let stderr = join_pipe(stderr_task).await?;
            Ok(std::process::Output { status, stdout, stderr })
        }
        Err(_) => {
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            Err(ProviderError::Timeout(budget.as_millis() as u64))
        }
    }
}

async fn join_pipe(
    task: tokio::task::JoinHandle<std::io::Result<Vec<u8>>>,
) -> Result<Vec<u8>, ProviderError> {
    task.await
        .map_err(|e| ProviderError::Execution(format!("pipe reader failed: {}", e)))?
        .map_err(|e| ProviderError::Execution(format!("failed to read pipe: {}", e)))
}

/// `true` for http(s) URLs with a host
pub fn is_absolute_url(candidate: &str) -> bool {
    match url::Url::parse(candidate.trim()) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.has_host(),
        Err(_) => false,
    }
}

/// Absolute http(s) URL, resolving protocol-relative `//host/...` against https
pub fn absolute_url(candidate: &str) -> Option<String> {
    let candidate = candidate.trim();
    let resolved = match candidate.strip_prefix("//") {
        Some(rest) => format!("https://{}", rest),
        None => candidate.to_string(),
    };
    is_absolute_url(&resolved).then_some(resolved)
}

/// Keep a URL only if it is absolute, otherwise use the empty sentinel
pub fn url_or_empty(candidate: Option<&str>) -> String {
    candidate.and_then(absolute_url).unwrap_or_default()
}

/// Video ids are exactly 11 characters of `[A-Za-z0-9_-]`
pub fn is_valid_video_id(id: &str) -> bool {
    lazy_static::lazy_static! {
        static ref VIDEO_ID_RE: Regex = Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap();
    }
    VIDEO_ID_RE.is_match(id)
}

pub fn is_valid_playlist_id(id: &str) -> bool {
    lazy_static::lazy_static! {
        static ref PLAYLIST_ID_RE: Regex = Regex::new(r"^[A-Za-z0-9_-]{10,64}$").unwrap();
    }
    PLAYLIST_ID_RE.is_match(id)
}

/// Format seconds as `m:ss`
pub fn format_duration(total_seconds: u64) -> String {
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}

/// Unix timestamp -> `YYYYMMDD`
pub fn compact_date_from_unix(timestamp: i64) -> Option<String> {
    let date = time::OffsetDateTime::from_unix_timestamp(timestamp).ok()?.date();
    Some(compact(date))
}

/// `2009-10-25` or `2009-10-25T06:57:33Z` -> `20091025`
pub fn compact_date_from_iso(value: &str) -> Option<String> {
    let day = value.trim().get(..10)?;
    let format = time::format_description::parse("[year]-[month]-[day]").ok()?;
    let date = time::Date::parse(day, &format).ok()?;
    Some(compact(date))
}

fn compact(date: time::Date) -> String {
    format!(
        "{:04}{:02}{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_id_validation() {
        assert!(is_valid_video_id("abcdefghijk"));
        assert!(is_valid_video_id("dQw4w9WgXcQ"));
        assert!(is_valid_video_id("a-b_c-d_e-f"));
        assert!(!is_valid_video_id("abcdefghij"));
        assert!(!is_valid_video_id("abcdefghijkl"));
        assert!(!is_valid_video_id("abcdefghij!"));
        assert!(!is_valid_video_id(""));
        assert!(!is_valid_video_id("abc/../defg"));
    }

    #[test]
    fn test_playlist_id_validation() {
        assert!(is_valid_playlist_id("PLBCF2DAC6FFB574DE"));
        assert!(!is_valid_playlist_id("PL"));
        assert!(!is_valid_playlist_id("PL BCF2DAC6FFB574DE"));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(125), "2:05");
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(59), "0:59");
        assert_eq!(format_duration(3725), "62:05");
    }

    #[test]
    fn test_absolute_urls() {
        assert!(is_absolute_url("https://example.com/videoplayback?id=1"));
        assert!(!is_absolute_url("/vi/abc/hq.jpg"));
        assert!(!is_absolute_url("ftp://example.com/x"));
        assert!(!is_absolute_url(""));
        assert_eq!(url_or_empty(Some("/relative")), "");
        assert_eq!(url_or_empty(None), "");
        assert_eq!(url_or_empty(Some("https://a.example/x")), "https://a.example/x");
        assert_eq!(
            url_or_empty(Some("//yt3.ggpht.com/avatar=s176")),
            "https://yt3.ggpht.com/avatar=s176"
        );
        assert_eq!(absolute_url("//"), None);
    }

    #[test]
    fn test_compact_dates() {
        assert_eq!(compact_date_from_unix(1_256_453_853).as_deref(), Some("20091025"));
        assert_eq!(compact_date_from_iso("2009-10-25").as_deref(), Some("20091025"));
        assert_eq!(
            compact_date_from_iso("2009-10-25T06:57:33Z").as_deref(),
            Some("20091025")
        );
        assert_eq!(compact_date_from_iso("yesterday"), None);
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("https://a.example/", "/api/v1/stats"), "https://a.example/api/v1/stats");
        assert_eq!(join_url("https://a.example", "/streams/x"), "https://a.example/streams/x");
    }
}
