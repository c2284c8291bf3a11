//! In-process fake store speaking enough RESP2 for PING, GET and SET.
//!
//! Every accepted connection gets its own thread; all connections share one
//! map. Unknown commands (connection setup chatter) are answered with `+OK`.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use rkv_client::ServiceConfig;

#[derive(Default)]
struct Shared {
    data: Mutex<HashMap<Vec<u8>, Vec<u8>>>,
    accepted: AtomicUsize,
    commands: Mutex<HashMap<String, usize>>,
    streams: Mutex<Vec<TcpStream>>,
}

pub struct FakeStore {
    addr: String,
    shared: Arc<Shared>,
}

impl FakeStore {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr").to_string();
        let shared = Arc::new(Shared::default());

        let accept_shared = shared.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let stream = match stream {
                    Ok(stream) => stream,
                    Err(_) => break,
                };
                accept_shared.accepted.fetch_add(1, Ordering::SeqCst);
                if let Ok(clone) = stream.try_clone() {
                    accept_shared.streams.lock().expect("streams").push(clone);
                }
                let conn_shared = accept_shared.clone();
                thread::spawn(move || serve(stream, conn_shared));
            }
        });

        FakeStore { addr, shared }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Config with short socket timeouts so a broken test fails instead of hanging.
    pub fn config(&self) -> ServiceConfig {
        ServiceConfig {
            connect_timeout: Some(Duration::from_secs(1)),
            read_timeout: Some(Duration::from_secs(2)),
            write_timeout: Some(Duration::from_secs(2)),
            ..ServiceConfig::with_addr(self.addr.clone())
        }
    }

    /// Number of TCP connections accepted so far.
    pub fn accepted(&self) -> usize {
        self.shared.accepted.load(Ordering::SeqCst)
    }

    /// Number of times `name` (upper case) was received.
    pub fn command_count(&self, name: &str) -> usize {
        let commands = self.shared.commands.lock().expect("commands");
        commands.get(name).copied().unwrap_or(0)
    }

    pub fn value(&self, key: &str) -> Option<String> {
        let data = self.shared.data.lock().expect("data");
        data.get(key.as_bytes())
            .map(|value| String::from_utf8_lossy(value).into_owned())
    }

    /// Closes every accepted connection from the server side.
    pub fn drop_connections(&self) {
        let mut streams = self.shared.streams.lock().expect("streams");
        for stream in streams.drain(..) {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

fn serve(stream: TcpStream, shared: Arc<Shared>) {
    let mut writer = match stream.try_clone() {
        Ok(writer) => writer,
        Err(_) => return,
    };
    let mut reader = BufReader::new(stream);

    while let Ok(Some(args)) = read_command(&mut reader) {
        if args.is_empty() {
            break;
        }
        let name = String::from_utf8_lossy(&args[0]).to_ascii_uppercase();
        *shared
            .commands
            .lock()
            .expect("commands")
            .entry(name.clone())
            .or_insert(0) += 1;

        let reply = match name.as_str() {
            "PING" if args.len() == 2 => bulk(&args[1]),
            "PING" => b"+PONG\r\n".to_vec(),
            "GET" if args.len() == 2 => {
                let data = shared.data.lock().expect("data");
                match data.get(&args[1]) {
                    Some(value) => bulk(value),
                    None => b"$-1\r\n".to_vec(),
                }
            }
            "SET" if args.len() >= 3 => {
                let mut data = shared.data.lock().expect("data");
                data.insert(args[1].clone(), args[2].clone());
                b"+OK\r\n".to_vec()
            }
            "GET" | "SET" => b"-ERR wrong number of arguments\r\n".to_vec(),
            _ => b"+OK\r\n".to_vec(),
        };

        if writer.write_all(&reply).and_then(|_| writer.flush()).is_err() {
            break;
        }
    }
}

fn bulk(data: &[u8]) -> Vec<u8> {
    let mut out = format!("${}\r\n", data.len()).into_bytes();
    out.extend_from_slice(data);
    out.extend_from_slice(b"\r\n");
    out
}

fn read_command(reader: &mut BufReader<TcpStream>) -> std::io::Result<Option<Vec<Vec<u8>>>> {
    let mut line = Vec::new();
    if read_line(reader, &mut line)?.is_none() {
        return Ok(None);
    }
    if line.first() != Some(&b'*') {
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "expected array"));
    }
    let count = parse_usize(&line[1..])?;
    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        read_line(reader, &mut line)?
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof"))?;
        if line.first() != Some(&b'$') {
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "expected bulk"));
        }
        let len = parse_usize(&line[1..])?;
        let mut data = vec![0u8; len];
        reader.read_exact(&mut data)?;
        let mut crlf = [0u8; 2];
        reader.read_exact(&mut crlf)?;
        if crlf != [b'\r', b'\n'] {
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "missing crlf"));
        }
        args.push(data);
    }
    Ok(Some(args))
}

fn read_line(reader: &mut BufReader<TcpStream>, buf: &mut Vec<u8>) -> std::io::Result<Option<()>> {
    buf.clear();
    let bytes = reader.read_until(b'\n', buf)?;
    if bytes == 0 {
        return Ok(None);
    }
    if buf.len() < 2 || buf[buf.len() - 2] != b'\r' {
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "invalid line"));
    }
    buf.truncate(buf.len() - 2);
    Ok(Some(()))
}

fn parse_usize(data: &[u8]) -> std::io::Result<usize> {
    if data.is_empty() {
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "empty"));
    }
    let mut value = 0usize;
    for &b in data {
        if !b.is_ascii_digit() {
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "digit"));
        }
        value = value.saturating_mul(10).saturating_add((b - b'0') as usize);
    }
    Ok(value)
}

/// Address nothing is listening on.
pub fn unreachable_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr").to_string();
    drop(listener);
    addr
}
