use std::io::Read;
use std::io::Write;
use std::net::TcpStream;
use std::time::Duration;

use mini_cluster::net::local_address;
use mini_cluster::Connection;
use mini_cluster::Put;
use mini_cluster::Result;

pub const ROW_COUNT: usize = 100;

pub const HTTP_TIMEOUT: Duration = Duration::from_secs(3);

/// Writes `count` rows `row-000..` with one `family:q` cell each.
pub fn load_rows(
    connection: &Connection,
    table: &str,
    family: &str,
    count: usize,
) -> Result<()> {
    let table = connection.table(table)?;
    for i in 0..count {
        table.put(&Put::new(format!("row-{i:03}")).add_column(family, "q", format!("value-{i}")))?;
    }
    Ok(())
}

/// Plain HTTP/1.0 GET against a loopback port; returns the raw response.
pub fn http_get(
    port: u16,
    path: &str,
) -> std::io::Result<String> {
    let mut stream = TcpStream::connect(local_address(port))?;
    stream.set_read_timeout(Some(HTTP_TIMEOUT))?;
    write!(stream, "GET {path} HTTP/1.0\r\nHost: localhost\r\n\r\n")?;

    let mut response = String::new();
    stream.read_to_string(&mut response)?;
    Ok(response)
}
