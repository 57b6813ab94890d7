// Line-oriented sensor source
// Reads "BPM: <value>" lines from a device/file path or a TCP stream,
// reconnecting when the stream drops

use std::io::SeekFrom;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::net::TcpStream;

use super::parse::{parse_bpm_line, ParseError};
use super::SourceError;
use crate::config::BpmRange;
use crate::events::types::Reading;

const TCP_SCHEME: &str = "tcp://";

/// Where sensor lines come from
#[derive(Debug, Clone, PartialEq)]
pub enum SourceAddress {
    /// Serial device node or plain file, followed like `tail -f`
    /// Device nodes are not configured here (baud rate, raw mode)
    Path(PathBuf),

    /// `host:port` of a line server
    Tcp(String),
}

impl SourceAddress {
    pub fn parse(address: &str) -> Result<Self, SourceError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(SourceError::InvalidAddress(address.to_string()));
        }

        match address.strip_prefix(TCP_SCHEME) {
            Some("") => Err(SourceError::InvalidAddress(address.to_string())),
            Some(host) => Ok(SourceAddress::Tcp(host.to_string())),
            None => Ok(SourceAddress::Path(PathBuf::from(address))),
        }
    }
}

impl std::fmt::Display for SourceAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceAddress::Path(path) => write!(f, "{}", path.display()),
            SourceAddress::Tcp(host) => write!(f, "{}{}", TCP_SCHEME, host),
        }
    }
}

enum Connection {
    File(BufReader<File>),
    Tcp(BufReader<TcpStream>),
}

impl Connection {
    /// Open `address`; a regular file resumes at `offset`
    async fn open(address: &SourceAddress, offset: u64) -> Result<Self, SourceError> {
        match address {
            SourceAddress::Path(path) => {
                let mut file = File::open(path).await?;
                let metadata = file.metadata().await?;
                // Device nodes cannot seek; a truncated file starts over
                if metadata.is_file() && offset > 0 && offset <= metadata.len() {
                    file.seek(SeekFrom::Start(offset)).await?;
                }
                Ok(Connection::File(BufReader::new(file)))
            }
            SourceAddress::Tcp(host) => {
                let stream = TcpStream::connect(host.as_str()).await?;
                Ok(Connection::Tcp(BufReader::new(stream)))
            }
        }
    }

    /// Append bytes up to and including the next newline to `buf`
    /// Stops short of a newline only at end of input
    async fn read_until_newline(&mut self, buf: &mut Vec<u8>) -> std::io::Result<usize> {
        match self {
            Connection::File(reader) => reader.read_until(b'\n', buf).await,
            Connection::Tcp(reader) => reader.read_until(b'\n', buf).await,
        }
    }

    fn is_file(&self) -> bool {
        matches!(self, Connection::File(_))
    }
}

/// Sensor connection producing parsed readings
pub struct LineSource {
    address: SourceAddress,
    connection: Option<Connection>,
    /// Bytes of the line currently being assembled
    pending: Vec<u8>,
    /// Bytes of complete lines consumed from a file source
    consumed: u64,
    valid: BpmRange,
    poll_interval: Duration,
    reconnect_delay: Duration,
}

impl LineSource {
    /// Open the source once; failure here means the sensor is unavailable
    pub async fn connect(
        address: SourceAddress,
        valid: BpmRange,
        poll_interval: Duration,
        reconnect_delay: Duration,
    ) -> Result<Self, SourceError> {
        let connection = Connection::open(&address, 0).await?;
        log::info!("Connected to sensor at {}", address);

        Ok(LineSource {
            address,
            connection: Some(connection),
            pending: Vec::new(),
            consumed: 0,
            valid,
            poll_interval,
            reconnect_delay,
        })
    }

    pub fn address(&self) -> &SourceAddress {
        &self.address
    }

    /// Wait for the next BPM reading
    ///
    /// Lines without a BPM value are skipped. A malformed BPM line is
    /// returned as an error so the caller can log it and keep going.
    /// Bytes that are not valid UTF-8 are replaced, never fatal.
    /// Cancel safe: a partly read line stays buffered for the next call.
    pub async fn next_reading(&mut self) -> Result<Reading, ParseError> {
        loop {
            let line = self.next_line().await;
            log::debug!("Raw line: {}", line.trim_end());

            if let Some(value) = parse_bpm_line(&line, &self.valid)? {
                return Ok(Reading::now(value));
            }
        }
    }

    /// Next newline-terminated line, decoded lossily
    async fn next_line(&mut self) -> String {
        loop {
            let Some(connection) = self.connection.as_mut() else {
                self.reconnect().await;
                continue;
            };

            match connection.read_until_newline(&mut self.pending).await {
                Ok(_) if self.pending.ends_with(b"\n") => {
                    if connection.is_file() {
                        self.consumed += self.pending.len() as u64;
                    }
                    let line = String::from_utf8_lossy(&self.pending).into_owned();
                    self.pending.clear();
                    return line;
                }
                // End of file so far; keep any partial line and wait for the writer
                Ok(_) if connection.is_file() => tokio::time::sleep(self.poll_interval).await,
                Ok(_) => {
                    log::warn!("Sensor stream {} closed", self.address);
                    self.drop_connection();
                }
                Err(e) => {
                    log::warn!("Sensor read error on {}: {}", self.address, e);
                    self.drop_connection();
                }
            }
        }
    }

    fn drop_connection(&mut self) {
        self.connection = None;
        // A file resumes after the last complete line and rereads the partial one
        self.pending.clear();
    }

    async fn reconnect(&mut self) {
        tokio::time::sleep(self.reconnect_delay).await;
        match Connection::open(&self.address, self.consumed).await {
            Ok(connection) => {
                log::info!("Reconnected to sensor at {}", self.address);
                self.connection = Some(connection);
            }
            Err(e) => log::warn!("Reconnect to {} failed: {}", self.address, e),
        }
    }
}
