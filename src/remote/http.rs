use crate::error::{Result, VintageError};
use crate::remote::{PackageMetadata, RemoteSource};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::{Client, Response};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const MAX_METADATA_BYTES: u64 = 1024 * 1024;
const DOWNLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Blocking HTTP client for metadata endpoints and the bundle archive.
pub struct HttpRemote {
    client: Client,
}

impl HttpRemote {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(15)))
            .user_agent(concat!("vintage-cli/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| VintageError::network("<client>", e))?;

        Ok(Self { client })
    }

    fn get(&self, url: &str) -> Result<Response> {
        debug!(url, "GET");

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| VintageError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            debug!(url, %status, "request rejected");
            return Err(VintageError::network(url, format!("HTTP {status}")));
        }

        Ok(response)
    }

    fn progress_bar(total: Option<u64>) -> ProgressBar {
        match total {
            Some(len) => {
                let pb = ProgressBar::new(len);
                if let Ok(style) = ProgressStyle::default_bar()
                    .template("  [{bar:40}] {bytes}/{total_bytes} {msg}")
                {
                    pb.set_style(style.progress_chars("=>-"));
                }
                pb
            }
            None => {
                let pb = ProgressBar::new_spinner();
                if let Ok(style) = ProgressStyle::default_spinner().template("  {spinner} {bytes} {msg}")
                {
                    pb.set_style(style);
                }
                pb
            }
        }
    }
}

impl RemoteSource for HttpRemote {
    fn fetch_metadata(&self, url: &str) -> Result<PackageMetadata> {
        let response = self.get(url)?;

        if response.content_length().is_some_and(|len| len > MAX_METADATA_BYTES) {
            return Err(VintageError::network(url, "metadata response exceeded 1MB limit"));
        }

        let mut body = Vec::new();
        response
            .take(MAX_METADATA_BYTES + 1)
            .read_to_end(&mut body)
            .map_err(|e| VintageError::network(url, e))?;

        if body.len() as u64 > MAX_METADATA_BYTES {
            return Err(VintageError::network(url, "metadata response exceeded 1MB limit"));
        }

        PackageMetadata::from_bytes(url, &body)
    }

    fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        let mut response = self.get(url)?;

        let pb = Self::progress_bar(response.content_length());
        pb.set_message("downloading template bundle");

        let mut file = File::create(dest).map_err(|e| VintageError::fs(dest, e))?;
        let mut buf = vec![0u8; DOWNLOAD_CHUNK_SIZE];
        let mut written = 0u64;
        loop {
            let read = response
                .read(&mut buf)
                .map_err(|e| VintageError::network(url, e))?;
            if read == 0 {
                break;
            }
            file.write_all(&buf[..read])
                .map_err(|e| VintageError::fs(dest, e))?;
            written += read as u64;
            pb.inc(read as u64);
        }
        file.sync_all().map_err(|e| VintageError::fs(dest, e))?;

        pb.finish_and_clear();
        debug!(url, bytes = written, dest = %dest.display(), "download complete");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;
    use tempfile::tempdir;
    use tokio::runtime::Runtime;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // the blocking client must run outside the runtime, so the mock server is driven by hand
    fn serve(rt: &Runtime, route: &str, response: ResponseTemplate) -> MockServer {
        rt.block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path(route))
                .respond_with(response)
                .mount(&server)
                .await;
            server
        })
    }

    /// Answers one request with `body` and no Content-Length, closing the connection at the end.
    fn serve_unsized(body: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut request = [0u8; 4096];
                let _ = stream.read(&mut request);
                let _ = stream.write_all(
                    b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n",
                );
                let _ = stream.write_all(&body);
            }
        });
        format!("http://{addr}/package.json")
    }

    fn remote() -> HttpRemote {
        HttpRemote::new(Duration::from_secs(10)).unwrap()
    }

    #[test]
    fn fetches_metadata_version() {
        let rt = Runtime::new().unwrap();
        let server = serve(
            &rt,
            "/package.json",
            ResponseTemplate::new(200).set_body_string(r#"{"name":"vintage-cli","version":"0.5.2"}"#),
        );

        let meta = remote()
            .fetch_metadata(&format!("{}/package.json", server.uri()))
            .unwrap();
        assert_eq!(meta.version, "0.5.2");
    }

    #[test]
    fn not_found_is_a_network_error() {
        let rt = Runtime::new().unwrap();
        let server = serve(&rt, "/package.json", ResponseTemplate::new(404));
        let url = format!("{}/package.json", server.uri());

        match remote().fetch_metadata(&url).unwrap_err() {
            VintageError::Network { url: failed, message } => {
                assert_eq!(failed, url);
                assert!(message.contains("404"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn oversized_metadata_with_length_is_rejected() {
        let rt = Runtime::new().unwrap();
        let body = vec![b' '; 2 * 1024 * 1024];
        let server = serve(&rt, "/package.json", ResponseTemplate::new(200).set_body_bytes(body));

        let err = remote()
            .fetch_metadata(&format!("{}/package.json", server.uri()))
            .unwrap_err();
        assert!(err.to_string().contains("exceeded 1MB limit"), "{err}");
    }

    #[test]
    fn oversized_metadata_without_length_is_rejected() {
        let url = serve_unsized(vec![b' '; 2 * 1024 * 1024]);

        let err = remote().fetch_metadata(&url).unwrap_err();
        assert!(matches!(err, VintageError::Network { .. }));
        assert!(err.to_string().contains("exceeded 1MB limit"), "{err}");
    }

    #[test]
    fn slow_endpoint_times_out() {
        let rt = Runtime::new().unwrap();
        let server = serve(
            &rt,
            "/package.json",
            ResponseTemplate::new(200)
                .set_body_string(r#"{"version":"1.0.0"}"#)
                .set_delay(Duration::from_secs(5)),
        );

        let err = HttpRemote::new(Duration::from_millis(300))
            .unwrap()
            .fetch_metadata(&format!("{}/package.json", server.uri()))
            .unwrap_err();
        assert!(matches!(err, VintageError::Network { .. }));
    }

    #[test]
    fn download_streams_body_to_disk() {
        let rt = Runtime::new().unwrap();
        let body: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let server = serve(
            &rt,
            "/bundle.tar.gz",
            ResponseTemplate::new(200).set_body_bytes(body.clone()),
        );
        let dir = tempdir().unwrap();
        let dest = dir.path().join("bundle.tar.gz");

        let written = remote()
            .download(&format!("{}/bundle.tar.gz", server.uri()), &dest)
            .unwrap();

        assert_eq!(written, body.len() as u64);
        assert_eq!(std::fs::read(&dest).unwrap(), body);
    }

    #[test]
    fn failed_download_reports_network_error() {
        let rt = Runtime::new().unwrap();
        let server = serve(&rt, "/bundle.tar.gz", ResponseTemplate::new(500));
        let dir = tempdir().unwrap();
        let dest = dir.path().join("bundle.tar.gz");

        let err = remote()
            .download(&format!("{}/bundle.tar.gz", server.uri()), &dest)
            .unwrap_err();
        assert!(matches!(err, VintageError::Network { .. }));
        assert!(!dest.exists());
    }
}
