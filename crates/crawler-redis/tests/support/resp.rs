//! Minimal RESP2 server covering the commands the dedup store sends

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};

type Data = Arc<Mutex<HashMap<Vec<u8>, Entry>>>;

struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

pub struct FakeRedis {
    addr: SocketAddr,
    data: Data,
    muted: Arc<AtomicBool>,
    accept: JoinHandle<()>,
}

impl FakeRedis {
    pub async fn start() -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let data: Data = Arc::new(Mutex::new(HashMap::new()));

        let muted = Arc::new(AtomicBool::new(false));

        let shared = data.clone();
        let silence = muted.clone();
        let accept = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let data = shared.clone();
                let muted = silence.clone();
                tokio::spawn(async move {
                    let _ = serve(stream, data, muted).await;
                });
            }
        });

        Ok(Self {
            addr,
            data,
            muted,
            accept,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// While muted, commands are read and dropped without a reply
    pub fn mute(&self, muted: bool) {
        self.muted.store(muted, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.data.lock().unwrap().len()
    }
}

impl Drop for FakeRedis {
    fn drop(&mut self) {
        self.accept.abort();
    }
}

async fn serve(stream: TcpStream, data: Data, muted: Arc<AtomicBool>) -> io::Result<()> {
    let (read, mut write) = stream.into_split();
    let mut reader = BufReader::new(read);

    while let Some(args) = read_command(&mut reader).await? {
        if muted.load(Ordering::SeqCst) {
            continue;
        }
        let reply = execute(&args, &data);
        write.write_all(&reply).await?;
    }
    Ok(())
}

async fn read_command<R>(reader: &mut R) -> io::Result<Option<Vec<Vec<u8>>>>
where
    R: AsyncBufReadExt + Unpin,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }

    let count: usize = parse_header(&line, '*')?;
    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        line.clear();
        reader.read_line(&mut line).await?;
        let len: usize = parse_header(&line, '$')?;

        let mut buf = vec![0u8; len + 2];
        reader.read_exact(&mut buf).await?;
        buf.truncate(len);
        args.push(buf);
    }
    Ok(Some(args))
}

fn parse_header(line: &str, marker: char) -> io::Result<usize> {
    line.trim_end()
        .strip_prefix(marker)
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, format!("bad header {:?}", line)))
}

fn execute(args: &[Vec<u8>], data: &Data) -> Vec<u8> {
    let Some(name) = args.first() else {
        return error("empty command");
    };
    let now = Instant::now();
    let mut data = data.lock().unwrap();
    data.retain(|_, entry| entry.is_live(now));

    match name.to_ascii_uppercase().as_slice() {
        b"PING" => b"+PONG\r\n".to_vec(),
        b"CLIENT" | b"SELECT" => b"+OK\r\n".to_vec(),
        b"SET" if args.len() >= 3 => {
            let mut nx = false;
            let mut ttl = None;
            let mut options = args[3..].iter();
            while let Some(option) = options.next() {
                match option.to_ascii_uppercase().as_slice() {
                    b"NX" => nx = true,
                    b"EX" => {
                        let secs = options
                            .next()
                            .and_then(|v| std::str::from_utf8(v).ok())
                            .and_then(|v| v.parse::<u64>().ok());
                        match secs {
                            Some(secs) => ttl = Some(Duration::from_secs(secs)),
                            None => return error("value is not an integer or out of range"),
                        }
                    }
                    _ => return error("syntax error"),
                }
            }

            if nx && data.contains_key(&args[1]) {
                return b"$-1\r\n".to_vec();
            }
            data.insert(
                args[1].clone(),
                Entry {
                    value: args[2].clone(),
                    expires_at: ttl.map(|ttl| now + ttl),
                },
            );
            b"+OK\r\n".to_vec()
        }
        b"EXISTS" => integer(args[1..].iter().filter(|k| data.contains_key(*k)).count() as i64),
        b"TTL" if args.len() == 2 => match data.get(&args[1]) {
            None => integer(-2),
            Some(Entry { expires_at: None, .. }) => integer(-1),
            Some(Entry {
                expires_at: Some(at), ..
            }) => integer(at.saturating_duration_since(now).as_secs_f64().round() as i64),
        },
        b"KEYS" if args.len() == 2 => {
            let pattern = &args[1];
            let prefix = pattern.strip_suffix(b"*").unwrap_or(pattern.as_slice());
            let keys: Vec<&Vec<u8>> = data.keys().filter(|k| k.starts_with(prefix)).collect();

            let mut reply = format!("*{}\r\n", keys.len()).into_bytes();
            for key in keys {
                reply.extend_from_slice(format!("${}\r\n", key.len()).as_bytes());
                reply.extend_from_slice(key);
                reply.extend_from_slice(b"\r\n");
            }
            reply
        }
        b"DEL" => integer(args[1..].iter().filter(|k| data.remove(*k).is_some()).count() as i64),
        b"GET" if args.len() == 2 => match data.get(&args[1]) {
            Some(entry) => {
                let mut reply = format!("${}\r\n", entry.value.len()).into_bytes();
                reply.extend_from_slice(&entry.value);
                reply.extend_from_slice(b"\r\n");
                reply
            }
            None => b"$-1\r\n".to_vec(),
        },
        _ => error("unknown command"),
    }
}

fn integer(n: i64) -> Vec<u8> {
    format!(":{}\r\n", n).into_bytes()
}

fn error(message: &str) -> Vec<u8> {
    format!("-ERR {}\r\n", message).into_bytes()
}
