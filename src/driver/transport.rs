//! Socket Transport
//!
//! TCP 소켓 I/O 어댑터 (동기/비동기)

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream as StdTcpStream, ToSocketAddrs};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::config::{ServerAddress, SocketSettings};

// ============================================================================
// SocketTransport - 전송 트레이트
// ============================================================================

/// 연결이 사용하는 바이트 전송
///
/// 모든 I/O 메서드는 동기/비동기 두 형태를 가진다. 연결 하나에서 두 형태를
/// 섞어 써도 된다. `disconnect`는 `&self`로 다른 스레드에서 호출될 수 있다.
#[async_trait]
pub trait SocketTransport: Send + Sync {
    /// 연결 (블로킹)
    fn connect(&mut self, address: &ServerAddress) -> io::Result<()>;
    /// 연결
    async fn connect_async(&mut self, address: &ServerAddress) -> io::Result<()>;

    /// 전체 쓰기 (블로킹)
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;
    /// 전체 쓰기
    async fn write_all_async(&mut self, buf: &[u8]) -> io::Result<()>;

    /// 플러시 (블로킹)
    fn flush(&mut self) -> io::Result<()>;
    /// 플러시
    async fn flush_async(&mut self) -> io::Result<()>;

    /// 읽기 (블로킹). 0은 상대가 연결을 닫았음을 뜻한다.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    /// 읽기. 0은 상대가 연결을 닫았음을 뜻한다.
    async fn read_async(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// 소켓 종료 (블로킹)
    fn disconnect(&self);

    /// 소켓 종료
    async fn disconnect_async(&self) {
        self.disconnect()
    }
}

// ============================================================================
// TcpSocketClient - TCP 구현
// ============================================================================

enum Socket {
    Blocking(StdTcpStream),
    Async(TcpStream),
}

/// TCP 소켓 전송
///
/// 소켓은 마지막으로 사용된 모드(블로킹/비블로킹)로 유지되고 반대 모드 호출이
/// 오면 그 자리에서 전환된다. 종료용으로 복제한 핸들을 따로 들고 있어서
/// `&self`만으로 한 번 종료할 수 있다.
pub struct TcpSocketClient {
    settings: SocketSettings,
    socket: Option<Socket>,
    shutdown: Mutex<Option<StdTcpStream>>,
}

impl TcpSocketClient {
    /// 새 전송 생성
    pub fn new(settings: SocketSettings) -> Self {
        Self {
            settings,
            socket: None,
            shutdown: Mutex::new(None),
        }
    }

    fn install(&mut self, stream: StdTcpStream, socket: Socket) -> io::Result<()> {
        // 복제 핸들도 같은 소켓이라 블로킹 읽기에 그대로 적용된다
        stream.set_read_timeout(self.settings.read_timeout)?;
        *self.shutdown.lock() = Some(stream);
        self.socket = Some(socket);
        Ok(())
    }

    fn blocking(&mut self) -> io::Result<&mut StdTcpStream> {
        if let Some(Socket::Async(_)) = self.socket {
            if let Some(Socket::Async(stream)) = self.socket.take() {
                let stream = stream.into_std()?;
                stream.set_nonblocking(false)?;
                self.socket = Some(Socket::Blocking(stream));
            }
        }
        match self.socket.as_mut() {
            Some(Socket::Blocking(stream)) => Ok(stream),
            _ => Err(not_connected()),
        }
    }

    fn nonblocking(&mut self) -> io::Result<&mut TcpStream> {
        if let Some(Socket::Blocking(_)) = self.socket {
            if let Some(Socket::Blocking(stream)) = self.socket.take() {
                stream.set_nonblocking(true)?;
                self.socket = Some(Socket::Async(TcpStream::from_std(stream)?));
            }
        }
        match self.socket.as_mut() {
            Some(Socket::Async(stream)) => Ok(stream),
            _ => Err(not_connected()),
        }
    }
}

fn not_connected() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "socket is not connected")
}

#[async_trait]
impl SocketTransport for TcpSocketClient {
    fn connect(&mut self, address: &ServerAddress) -> io::Result<()> {
        let mut last_error = None;

        for addr in address.to_socket_addr().to_socket_addrs()? {
            match StdTcpStream::connect_timeout(&addr, self.settings.connection_timeout) {
                Ok(stream) => {
                    stream.set_nodelay(self.settings.tcp_nodelay)?;
                    let handle = stream.try_clone()?;
                    return self.install(handle, Socket::Blocking(stream));
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("could not resolve {}", address),
            )
        }))
    }

    async fn connect_async(&mut self, address: &ServerAddress) -> io::Result<()> {
        let target = address.to_socket_addr();
        let stream = tokio::time::timeout(self.settings.connection_timeout, TcpStream::connect(&target))
            .await
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connection to {} timed out", target),
                )
            })??;
        stream.set_nodelay(self.settings.tcp_nodelay)?;

        let stream = stream.into_std()?;
        let handle = stream.try_clone()?;
        self.install(handle, Socket::Async(TcpStream::from_std(stream)?))
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.blocking()?.write_all(buf)
    }

    async fn write_all_async(&mut self, buf: &[u8]) -> io::Result<()> {
        self.nonblocking()?.write_all(buf).await
    }

    fn flush(&mut self) -> io::Result<()> {
        self.blocking()?.flush()
    }

    async fn flush_async(&mut self) -> io::Result<()> {
        self.nonblocking()?.flush().await
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.blocking()?.read(buf)
    }

    async fn read_async(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let timeout = self.settings.read_timeout;
        let stream = self.nonblocking()?;
        match timeout {
            Some(limit) => tokio::time::timeout(limit, stream.read(buf))
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "read timed out"))?,
            None => stream.read(buf).await,
        }
    }

    fn disconnect(&self) {
        if let Some(handle) = self.shutdown.lock().take() {
            if let Err(e) = handle.shutdown(Shutdown::Both) {
                // 상대가 먼저 닫은 경우
                tracing::trace!("socket shutdown: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener as StdTcpListener;
    use std::time::Duration;

    fn local_address(listener: &StdTcpListener) -> ServerAddress {
        let port = listener.local_addr().unwrap().port();
        ServerAddress::new("127.0.0.1", port)
    }

    #[test]
    fn test_blocking_round_trip() {
        let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
        let address = local_address(&listener);

        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4];
            stream.read_exact(&mut buf).unwrap();
            stream.write_all(&buf).unwrap();
        });

        let mut client = TcpSocketClient::new(SocketSettings::default());
        client.connect(&address).unwrap();
        client.write_all(b"ping").unwrap();
        client.flush().unwrap();

        let mut buf = [0u8; 4];
        let mut read = 0;
        while read < 4 {
            read += client.read(&mut buf[read..]).unwrap();
        }
        assert_eq!(&buf, b"ping");

        server.join().unwrap();
        client.disconnect();
    }

    #[tokio::test]
    async fn test_mode_switch_after_async_connect() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 2];
            stream.read_exact(&mut buf).await.unwrap();
            stream.write_all(&buf).await.unwrap();
        });

        let mut client = TcpSocketClient::new(SocketSettings::default());
        client
            .connect_async(&ServerAddress::new("127.0.0.1", port))
            .await
            .unwrap();
        client.write_all_async(b"hi").await.unwrap();
        client.flush_async().await.unwrap();

        let mut buf = [0u8; 2];
        let mut read = 0;
        while read < 2 {
            read += client.read_async(&mut buf[read..]).await.unwrap();
        }
        assert_eq!(&buf, b"hi");

        server.await.unwrap();
        client.disconnect_async().await;
    }

    #[test]
    fn test_disconnect_unblocks_reader() {
        let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
        let address = local_address(&listener);
        let _server = std::thread::spawn(move || {
            let (_stream, _) = listener.accept().unwrap();
            std::thread::sleep(Duration::from_millis(500));
        });

        let mut client = TcpSocketClient::new(SocketSettings::default());
        client.connect(&address).unwrap();
        client.disconnect();
        // 두 번째 호출은 아무 일도 하지 않는다
        client.disconnect();

        let mut buf = [0u8; 1];
        assert_eq!(client.read(&mut buf).unwrap_or(0), 0);
    }

    #[test]
    fn test_read_timeout() {
        let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
        let address = local_address(&listener);
        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            std::thread::sleep(Duration::from_millis(300));
            drop(stream);
        });

        let mut client = TcpSocketClient::new(SocketSettings {
            read_timeout: Some(Duration::from_millis(50)),
            ..Default::default()
        });
        client.connect(&address).unwrap();

        let mut buf = [0u8; 1];
        let err = client.read(&mut buf).unwrap_err();
        assert!(matches!(
            err.kind(),
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
        ));
        server.join().unwrap();
    }

    #[tokio::test]
    async fn test_read_timeout_async() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_millis(300)).await;
            drop(stream);
        });

        let mut client = TcpSocketClient::new(SocketSettings {
            read_timeout: Some(Duration::from_millis(50)),
            ..Default::default()
        });
        client
            .connect_async(&ServerAddress::new("127.0.0.1", port))
            .await
            .unwrap();

        let mut buf = [0u8; 1];
        let err = client.read_async(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        server.await.unwrap();
    }

    #[test]
    fn test_io_before_connect() {
        let mut client = TcpSocketClient::new(SocketSettings::default());
        let err = client.write_all(b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }

    #[test]
    fn test_connect_refused() {
        let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
        let address = local_address(&listener);
        drop(listener);

        let mut client = TcpSocketClient::new(SocketSettings {
            connection_timeout: Duration::from_secs(1),
            ..Default::default()
        });
        assert!(client.connect(&address).is_err());
    }
}
