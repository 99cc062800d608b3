//! Fake editor used by the CLI tests.
//!
//! Listens on an ephemeral TCP port and answers each connection with the
//! next scripted reply using the length-prefixed frame protocol.

use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use serde_json::Value;

/// What the fake editor does with one connection.
#[derive(Debug, Clone)]
pub(in crate::tests) enum Reply {
    /// Answer with this JSON document.
    Frame(Value),
    /// Read the request, then close without answering.
    Hangup,
}

pub(in crate::tests) struct FakeEditor {
    port: u16,
    requests: Arc<Mutex<Vec<Value>>>,
    handle: Option<thread::JoinHandle<Result<()>>>,
}

impl FakeEditor {
    /// Spawns an editor that serves one connection per scripted reply.
    pub(in crate::tests) fn spawn(replies: Vec<Reply>) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).context("bind fake editor")?;
        listener
            .set_nonblocking(true)
            .context("fake editor nonblocking")?;
        let port = listener.local_addr().context("local addr")?.port();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);
        let handle = thread::spawn(move || Self::serve(&listener, replies, &recorded));
        Ok(Self {
            port,
            requests,
            handle: Some(handle),
        })
    }

    pub(in crate::tests) const fn port(&self) -> u16 {
        self.port
    }

    /// Waits for the editor thread and returns every decoded request.
    pub(in crate::tests) fn take_requests(&mut self) -> Result<Vec<Value>> {
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| anyhow!("fake editor thread panicked"))?
                .context("fake editor failed")?;
        }
        let requests = self
            .requests
            .lock()
            .map_err(|error| anyhow!("lock requests: {error}"))?;
        Ok(requests.clone())
    }

    fn serve(
        listener: &TcpListener,
        replies: Vec<Reply>,
        requests: &Arc<Mutex<Vec<Value>>>,
    ) -> Result<()> {
        for reply in replies {
            let Some(mut stream) = Self::accept(listener)? else {
                // The CLI stopped before using every scripted reply.
                return Ok(());
            };
            stream
                .set_nonblocking(false)
                .context("blocking client stream")?;
            let request = read_frame(&mut stream).context("read request frame")?;
            requests
                .lock()
                .map_err(|error| anyhow!("lock requests: {error}"))?
                .push(serde_json::from_slice(&request).context("decode request")?);
            match reply {
                Reply::Frame(body) => {
                    write_frame(&mut stream, &serde_json::to_vec(&body)?)
                        .context("write reply frame")?;
                }
                Reply::Hangup => drop(stream),
            }
        }
        Ok(())
    }

    fn accept(listener: &TcpListener) -> Result<Option<TcpStream>> {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            match listener.accept() {
                Ok((stream, _)) => return Ok(Some(stream)),
                Err(ref error)
                    if error.kind() == io::ErrorKind::WouldBlock && Instant::now() < deadline =>
                {
                    thread::sleep(Duration::from_millis(10));
                }
                Err(ref error) if error.kind() == io::ErrorKind::WouldBlock => return Ok(None),
                Err(error) => return Err(error).context("accept connection"),
            }
        }
    }
}

fn read_frame(stream: &mut TcpStream) -> io::Result<Vec<u8>> {
    let mut header = [0_u8; 8];
    stream.read_exact(&mut header)?;
    let length = usize::try_from(u64::from_be_bytes(header))
        .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))?;
    let mut body = vec![0_u8; length];
    stream.read_exact(&mut body)?;
    Ok(body)
}

fn write_frame(stream: &mut TcpStream, body: &[u8]) -> io::Result<()> {
    let length = u64::try_from(body.len())
        .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))?;
    stream.write_all(&length.to_be_bytes())?;
    stream.write_all(body)?;
    stream.flush()
}
