//! Blocking transports for the BOM feeds.
//!
//! Observations and the zone scrape come over HTTP, forecasts and the station
//! metadata archive over anonymous FTP. Both sit behind small traits so the
//! fetchers can be driven by stubs in tests.

use std::net::{TcpStream, ToSocketAddrs};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use suppaftp::FtpStream;

use crate::model::BomError;

/// Per-request timeout on the HTTP path.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bound on a whole FTP retrieval (connect, login, RETR, quit).
pub const FTP_TIMEOUT: Duration = Duration::from_secs(30);

pub const BOM_FTP_HOST: &str = "ftp.bom.gov.au";
pub const FTP_PORT: u16 = 21;

// BOM rejects requests that carry no user agent.
const USER_AGENT: &str = concat!("bom_service/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

/// A point-to-point GET returning the response body as text.
pub trait HttpGet {
    fn get_text(&self, url: &str) -> Result<String, BomError>;
}

impl HttpGet for reqwest::blocking::Client {
    fn get_text(&self, url: &str) -> Result<String, BomError> {
        let response = self.get(url).timeout(HTTP_TIMEOUT).send()?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(BomError::Fetch(format!("HTTP error: {} for {}", status, url)));
        }

        Ok(response.text()?)
    }
}

/// Builds the shared blocking client used for every HTTP request.
pub fn build_http_client() -> Result<reqwest::blocking::Client, BomError> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()?)
}

// ---------------------------------------------------------------------------
// FTP
// ---------------------------------------------------------------------------

/// Retrieves one file from a directory on an anonymous FTP server.
pub trait FtpRetrieve {
    fn retrieve(&self, dir: &str, file: &str) -> Result<Vec<u8>, BomError>;
}

/// Anonymous FTP client with a hard deadline on every retrieval.
#[derive(Debug, Clone)]
pub struct FtpClient {
    host: String,
    port: u16,
    timeout: Duration,
}

impl FtpClient {
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            port: FTP_PORT,
            timeout: FTP_TIMEOUT,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Default for FtpClient {
    fn default() -> Self {
        Self::new(BOM_FTP_HOST)
    }
}

impl FtpRetrieve for FtpClient {
    /// Runs the session on a worker thread and waits at most `timeout` for it.
    ///
    /// The control socket gets read/write timeouts so an abandoned worker
    /// exits on its own. The RETR data connection has none, so the overall
    /// deadline is enforced here.
    fn retrieve(&self, dir: &str, file: &str) -> Result<Vec<u8>, BomError> {
        let (tx, rx) = mpsc::channel();
        let (host, port) = (self.host.clone(), self.port);
        let (dir_owned, file_owned) = (dir.to_string(), file.to_string());
        let timeout = self.timeout;

        thread::spawn(move || {
            let _ = tx.send(retrieve_session(&host, port, &dir_owned, &file_owned, timeout));
        });

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(BomError::Fetch(format!(
                "FTP retrieval of {}/{} from {} timed out after {}s",
                dir,
                file,
                self.host,
                self.timeout.as_secs()
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(BomError::Fetch(format!(
                "FTP worker for {}/{} exited without a result",
                dir, file
            ))),
        }
    }
}

fn retrieve_session(
    host: &str,
    port: u16,
    dir: &str,
    file: &str,
    timeout: Duration,
) -> Result<Vec<u8>, BomError> {
    let addr = (host, port)
        .to_socket_addrs()
        .map_err(|e| BomError::Fetch(format!("cannot resolve {}: {}", host, e)))?
        .next()
        .ok_or_else(|| BomError::Fetch(format!("no address for {}", host)))?;

    // The greeting is read inside suppaftp's connect, so the socket timeouts
    // have to be in place before the stream is handed over.
    let stream = TcpStream::connect_timeout(&addr, timeout)
        .map_err(|e| BomError::Fetch(format!("cannot connect to {}: {}", addr, e)))?;
    let socket_timeout = timeout * 2;
    stream
        .set_read_timeout(Some(socket_timeout))
        .and_then(|_| stream.set_write_timeout(Some(socket_timeout)))
        .map_err(|e| BomError::Fetch(format!("cannot configure socket to {}: {}", addr, e)))?;

    let mut ftp = FtpStream::connect_with_stream(stream)?;
    ftp.login("anonymous", "anonymous")?;
    ftp.cwd(dir)?;
    let buffer = ftp.retr_as_buffer(file)?;
    if let Err(e) = ftp.quit() {
        log::debug!("FTP quit on {} failed: {}", host, e);
    }

    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    #[test]
    fn test_non_success_status_is_fetch_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut request = [0u8; 1024];
                let _ = stream.read(&mut request);
                let _ = stream.write_all(
                    b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                );
            }
        });

        let client = build_http_client().unwrap();
        let url = format!("http://127.0.0.1:{}/fwo/IDN60901/IDN60901.94768.json", port);
        match client.get_text(&url) {
            Err(BomError::Fetch(msg)) => assert!(msg.contains("404"), "{}", msg),
            other => panic!("expected Fetch error, got {:?}", other),
        }
    }

    #[test]
    fn test_ftp_client_defaults_to_bom_host_and_bounded_timeout() {
        let client = FtpClient::default();
        assert_eq!(client.host, BOM_FTP_HOST);
        assert_eq!(client.port(), FTP_PORT);
        assert_eq!(client.timeout(), FTP_TIMEOUT);
    }

    #[test]
    fn test_silent_server_hits_the_retrieval_deadline() {
        // Accepts the connection but never sends the 220 greeting.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        thread::spawn(move || {
            if let Ok((stream, _)) = listener.accept() {
                thread::sleep(Duration::from_secs(5));
                drop(stream);
            }
        });

        let client = FtpClient::new("127.0.0.1")
            .with_port(port)
            .with_timeout(Duration::from_secs(1));
        let started = std::time::Instant::now();

        match client.retrieve("anon/gen/fwo", "IDN11060.xml") {
            Err(BomError::Fetch(msg)) => assert!(msg.contains("timed out"), "{}", msg),
            other => panic!("expected Fetch timeout, got {:?}", other),
        }
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_session_on_silent_server_gives_up_on_its_own() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        thread::spawn(move || {
            if let Ok((stream, _)) = listener.accept() {
                thread::sleep(Duration::from_secs(10));
                drop(stream);
            }
        });

        // Socket timeouts are twice the deadline: the greeting read fails
        // after one second rather than when the server hangs up.
        let started = std::time::Instant::now();
        let result = retrieve_session(
            "127.0.0.1",
            port,
            "anon/gen/fwo",
            "IDN11060.xml",
            Duration::from_millis(500),
        );
        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_unreachable_host_surfaces_as_fetch_error() {
        // `.invalid` is reserved and never resolves.
        let client = FtpClient::new("bom.invalid").with_timeout(Duration::from_secs(5));
        match client.retrieve("anon/gen/fwo", "IDN11060.xml") {
            Err(BomError::Fetch(_)) => {}
            other => panic!("expected Fetch error, got {:?}", other),
        }
    }
}
