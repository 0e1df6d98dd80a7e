use std::io::BufRead;
use std::io::BufReader;
use std::io::Write;
use std::net::TcpStream;
use std::net::ToSocketAddrs;
use std::thread;
use std::time::Duration;

use tracing::debug;
use tracing::trace;

use super::protocol::Request;
use super::protocol::Response;
use super::protocol::ERR_EXISTS;
use super::protocol::ERR_NO_NODE;
use crate::constants::COORDINATION_IO_TIMEOUT;
use crate::CoordinationError;

type ClientResult<T> = std::result::Result<T, CoordinationError>;

/// Blocking client for the coordination service.
///
/// Used from lifecycle code and from `spawn_blocking` sections of the
/// embedded cluster, never directly on a runtime worker.
#[derive(Debug)]
pub struct CoordinationClient {
    address: String,
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl CoordinationClient {
    pub fn connect(address: &str) -> ClientResult<Self> {
        let socket = address.to_socket_addrs()?.next().ok_or_else(|| {
            CoordinationError::Protocol(format!("{address} does not resolve to a socket address"))
        })?;
        let stream = TcpStream::connect_timeout(&socket, COORDINATION_IO_TIMEOUT)?;
        stream.set_read_timeout(Some(COORDINATION_IO_TIMEOUT))?;
        stream.set_write_timeout(Some(COORDINATION_IO_TIMEOUT))?;
        stream.set_nodelay(true)?;

        let writer = stream.try_clone()?;
        Ok(Self {
            address: address.to_string(),
            reader: BufReader::new(stream),
            writer,
        })
    }

    /// Makes up to `attempts` connection attempts, sleeping `pause` between them.
    pub fn connect_with_retries(
        address: &str,
        attempts: usize,
        pause: Duration,
    ) -> ClientResult<Self> {
        let attempts = attempts.max(1);
        for attempt in 1..=attempts {
            match Self::connect(address) {
                Ok(client) => return Ok(client),
                Err(e) => {
                    debug!(address, attempt, attempts, "coordination connect failed: {}", e);
                    if attempt < attempts {
                        thread::sleep(pause);
                    }
                }
            }
        }
        Err(CoordinationError::Unreachable {
            address: address.to_string(),
            attempts,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn request(
        &mut self,
        request: &Request,
    ) -> ClientResult<Response> {
        request.validate()?;
        trace!(address = %self.address, %request, "coordination request");

        let mut line = request.to_string();
        line.push('\n');
        self.writer.write_all(line.as_bytes())?;
        self.writer.flush()?;

        let mut reply = String::new();
        if self.reader.read_line(&mut reply)? == 0 {
            return Err(CoordinationError::IoError(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "coordination service closed the connection",
            )));
        }
        reply.parse()
    }

    pub fn ruok(&mut self) -> ClientResult<bool> {
        Ok(self.request(&Request::Ruok)? == Response::Imok)
    }

    pub fn stat(&mut self) -> ClientResult<String> {
        let response = self.request(&Request::Stat)?;
        into_payload(response, "")
    }

    pub fn create(
        &mut self,
        path: &str,
        data: &str,
    ) -> ClientResult<()> {
        let response = self.request(&Request::Create {
            path: path.to_string(),
            data: data.to_string(),
        })?;
        into_payload(response, path).map(|_| ())
    }

    pub fn set(
        &mut self,
        path: &str,
        data: &str,
    ) -> ClientResult<()> {
        let response = self.request(&Request::Set {
            path: path.to_string(),
            data: data.to_string(),
        })?;
        into_payload(response, path).map(|_| ())
    }

    pub fn get(
        &mut self,
        path: &str,
    ) -> ClientResult<String> {
        let response = self.request(&Request::Get { path: path.to_string() })?;
        into_payload(response, path)
    }

    pub fn delete(
        &mut self,
        path: &str,
    ) -> ClientResult<()> {
        let response = self.request(&Request::Delete { path: path.to_string() })?;
        into_payload(response, path).map(|_| ())
    }

    /// Paths registered under `prefix`, sorted.
    pub fn list(
        &mut self,
        prefix: &str,
    ) -> ClientResult<Vec<String>> {
        let response = self.request(&Request::List {
            prefix: prefix.to_string(),
        })?;
        let payload = into_payload(response, prefix)?;
        Ok(payload
            .split(',')
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect())
    }
}

fn into_payload(
    response: Response,
    path: &str,
) -> ClientResult<String> {
    match response {
        Response::Ok(payload) => Ok(payload),
        Response::Imok => Ok(String::new()),
        Response::Error(message) if message == ERR_EXISTS => Err(CoordinationError::NodeExists(path.to_string())),
        Response::Error(message) if message == ERR_NO_NODE => Err(CoordinationError::NoNode(path.to_string())),
        Response::Error(message) => Err(CoordinationError::Server(message)),
    }
}
