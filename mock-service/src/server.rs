use crate::MockService;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Connection bookkeeping shared with the accept loop.
#[derive(Debug, Default)]
struct Counters {
    accepted: AtomicUsize,
    open: AtomicUsize,
    requests: AtomicUsize,
}

/// Frames pushed ahead of every response.
#[derive(Debug, Clone, Default)]
struct Script {
    before_response: Vec<String>,
}

/// A WebSocket server for [`MockService`] on `127.0.0.1`, serving until dropped.
pub struct WsServer {
    addr: SocketAddr,
    counters: Arc<Counters>,
    task: JoinHandle<()>,
}

impl WsServer {
    pub fn builder() -> WsServerBuilder {
        WsServerBuilder::default()
    }

    /// Starts a server with no scripted frames.
    pub async fn start() -> io::Result<Self> {
        Self::builder().start().await
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn url(&self) -> String {
        format!("ws://{}/jsonrpc", self.addr)
    }

    /// Connections accepted so far.
    pub fn connections(&self) -> usize {
        self.counters.accepted.load(Ordering::SeqCst)
    }

    /// Connections not closed yet.
    pub fn open_connections(&self) -> usize {
        self.counters.open.load(Ordering::SeqCst)
    }

    /// Requests answered so far, across connections.
    pub fn requests(&self) -> usize {
        self.counters.requests.load(Ordering::SeqCst)
    }
}

impl Drop for WsServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[derive(Debug, Default)]
pub struct WsServerBuilder {
    script: Script,
}

impl WsServerBuilder {
    /// Sends `frame` as a text frame before every response.
    pub fn before_each_response(mut self, frame: impl Into<String>) -> Self {
        self.script.before_response.push(frame.into());
        self
    }

    pub async fn start(self) -> io::Result<WsServer> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let counters = Arc::new(Counters::default());

        let task = tokio::spawn(accept_loop(listener, Arc::clone(&counters), move |stream, counters| {
            serve_ws(stream, MockService, self.script.clone(), counters)
        }));

        Ok(WsServer {
            addr,
            counters,
            task,
        })
    }
}

/// A raw TCP server for [`MockService`] on `127.0.0.1`, serving until dropped.
pub struct TcpServer {
    addr: SocketAddr,
    counters: Arc<Counters>,
    task: JoinHandle<()>,
}

impl TcpServer {
    pub fn builder() -> TcpServerBuilder {
        TcpServerBuilder::default()
    }

    pub async fn start() -> io::Result<Self> {
        Self::builder().start().await
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// The `host:port` address to connect to.
    pub fn addr(&self) -> String {
        self.addr.to_string()
    }

    pub fn connections(&self) -> usize {
        self.counters.accepted.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> usize {
        self.counters.requests.load(Ordering::SeqCst)
    }
}

impl Drop for TcpServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[derive(Debug, Default)]
pub struct TcpServerBuilder {
    script: Script,
}

impl TcpServerBuilder {
    /// Writes `frame` before every response, with no delimiter, as Kodi does.
    pub fn before_each_response(mut self, frame: impl Into<String>) -> Self {
        self.script.before_response.push(frame.into());
        self
    }

    pub async fn start(self) -> io::Result<TcpServer> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let counters = Arc::new(Counters::default());

        let task = tokio::spawn(accept_loop(listener, Arc::clone(&counters), move |stream, counters| {
            serve_tcp(stream, MockService, self.script.clone(), counters)
        }));

        Ok(TcpServer {
            addr,
            counters,
            task,
        })
    }
}

async fn accept_loop<F, Fut>(listener: TcpListener, counters: Arc<Counters>, serve: F)
where
    F: Fn(TcpStream, Arc<Counters>) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    while let Ok((stream, _)) = listener.accept().await {
        counters.accepted.fetch_add(1, Ordering::SeqCst);
        counters.open.fetch_add(1, Ordering::SeqCst);

        let session = serve(stream, Arc::clone(&counters));
        let counters = Arc::clone(&counters);

        tokio::spawn(async move {
            session.await;
            counters.open.fetch_sub(1, Ordering::SeqCst);
        });
    }
}

async fn serve_ws(stream: TcpStream, service: MockService, script: Script, counters: Arc<Counters>) {
    let Ok(mut ws) = accept_async(stream).await else {
        return;
    };

    // Keep reading after a close frame so the reply gets flushed.
    while let Some(Ok(message)) = ws.next().await {
        let Message::Text(text) = message else {
            continue;
        };

        let Ok(request) = serde_json::from_str::<Value>(text.as_str()) else {
            continue;
        };

        for frame in &script.before_response {
            if ws.send(Message::text(frame.clone())).await.is_err() {
                return;
            }
        }

        let response = service.handle(&request);
        counters.requests.fetch_add(1, Ordering::SeqCst);

        if ws.send(Message::text(response.to_string())).await.is_err() {
            return;
        }
    }
}

async fn serve_tcp(mut stream: TcpStream, service: MockService, script: Script, counters: Arc<Counters>) {
    let mut buffer = Vec::new();

    loop {
        match stream.read_buf(&mut buffer).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }

        let mut values = serde_json::Deserializer::from_slice(&buffer).into_iter::<Value>();
        let mut requests = Vec::new();
        let mut consumed = 0;

        while let Some(Ok(request)) = values.next() {
            consumed = values.byte_offset();
            requests.push(request);
        }
        buffer.drain(..consumed);

        for request in requests {
            let mut out = script.before_response.concat();
            out.push_str(&service.handle(&request).to_string());
            counters.requests.fetch_add(1, Ordering::SeqCst);

            if stream.write_all(out.as_bytes()).await.is_err() {
                return;
            }
        }
    }
}
