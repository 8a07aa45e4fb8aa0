//! TCP relay that tests can cut to simulate network outages

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::task::JoinHandle;

type Pipes = Arc<Mutex<Vec<JoinHandle<()>>>>;

pub struct TcpProxy {
    listen: SocketAddr,
    upstream: SocketAddr,
    pipes: Pipes,
    accept: Option<JoinHandle<()>>,
}

impl TcpProxy {
    /// Listen on an ephemeral port and relay to `upstream`
    pub async fn start(upstream: SocketAddr) -> io::Result<Self> {
        let listener = bind("127.0.0.1:0".parse().expect("literal address"))?;
        let listen = listener.local_addr()?;

        let mut proxy = Self {
            listen,
            upstream,
            pipes: Arc::new(Mutex::new(Vec::new())),
            accept: None,
        };
        proxy.accept = Some(spawn_accept(listener, upstream, proxy.pipes.clone()));
        Ok(proxy)
    }

    pub fn addr(&self) -> SocketAddr {
        self.listen
    }

    /// Cut every relayed connection; new connections are still accepted
    pub async fn kill_connected(&self) {
        let pipes: Vec<_> = self.pipes.lock().unwrap().drain(..).collect();
        for pipe in pipes {
            pipe.abort();
            let _ = pipe.await;
        }
    }

    /// Stop listening and cut every relayed connection; dials are refused
    pub async fn stop(&mut self) {
        if let Some(accept) = self.accept.take() {
            accept.abort();
            let _ = accept.await;
        }
        self.kill_connected().await;
    }

    /// Listen again on the same port after [`TcpProxy::stop`]
    pub async fn resume(&mut self) -> io::Result<()> {
        if self.accept.is_some() {
            return Ok(());
        }
        let listener = bind(self.listen)?;
        self.accept = Some(spawn_accept(listener, self.upstream, self.pipes.clone()));
        Ok(())
    }
}

impl Drop for TcpProxy {
    fn drop(&mut self) {
        if let Some(accept) = self.accept.take() {
            accept.abort();
        }
        for pipe in self.pipes.lock().unwrap().drain(..) {
            pipe.abort();
        }
    }
}

fn bind(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = TcpSocket::new_v4()?;
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(128)
}

fn spawn_accept(listener: TcpListener, upstream: SocketAddr, pipes: Pipes) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Ok((mut client, _)) = listener.accept().await {
            let pipe = tokio::spawn(async move {
                let Ok(mut server) = TcpStream::connect(upstream).await else {
                    return;
                };
                let _ = tokio::io::copy_bidirectional(&mut client, &mut server).await;
            });
            pipes.lock().unwrap().push(pipe);
        }
    })
}
