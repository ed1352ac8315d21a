//! Bolt Socket Client
//!
//! 연결 하나의 소켓 수명주기, 버전 핸드셰이크, 동기/비동기 송수신
//!
//! # State Machine
//!
//! ```text
//! Unopened ──connect──▶ Open ──stop/error/drop──▶ Closed
//! ```
//!
//! Closed에서 되돌아가는 전이는 없다. 동기/비동기 경로는 같은 상태 전이와 같은
//! 에러 처리를 공유하고 실제 소켓 I/O만 다르다.

use std::fmt;
use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn, Instrument};

use super::config::{ConnectionConfig, ServerAddress};
use super::error::DriverResult;
use super::metrics::{ConnectionListener, ConnectionPoolListener, MetricsClock, TimerEvent};
use super::transport::{SocketTransport, TcpSocketClient};
use crate::bolt::handshake::{format_version, Handshake, HANDSHAKE_RESPONSE_SIZE};
use crate::bolt::{
    BoltError, BoltProtocol, BoltProtocolFactory, BoltResult, BufferSettings, MessageReader,
    MessageWriter, Request, RequestMessage, ResponseHandler, ResponseMessage,
};

const UNOPENED: u8 = 0;
const OPEN: u8 = 1;
const CLOSED: u8 = 2;

// ============================================================================
// ConnectionState - 연결 상태
// ============================================================================

/// 연결 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// 아직 연결하지 않음
    Unopened,
    /// 소켓 연결됨
    Open,
    /// 종료됨 (재사용 불가)
    Closed,
}

impl ConnectionState {
    fn from_marker(marker: u8) -> Self {
        match marker {
            UNOPENED => ConnectionState::Unopened,
            OPEN => ConnectionState::Open,
            _ => ConnectionState::Closed,
        }
    }
}

/// 리스너마다 따로 쓰는 연결 타이머
struct ConnectTimers {
    pool: TimerEvent,
    connection: TimerEvent,
}

// ============================================================================
// SocketClient - 소켓 클라이언트
// ============================================================================

/// Bolt 소켓 클라이언트
///
/// 풀 슬롯 하나가 독점 소유한다. `connect`/`send`/`receive`는 `&mut self`,
/// `stop`/`stop_async`/`is_open`은 `&self`라서 종료는 어느 스레드에서든
/// 경쟁적으로 호출할 수 있고 실제 종료는 한 번만 일어난다.
pub struct SocketClient {
    address: ServerAddress,
    transport: Box<dyn SocketTransport>,
    factory: Arc<BoltProtocolFactory>,
    buffer_settings: BufferSettings,

    protocol: Option<Arc<dyn BoltProtocol>>,
    reader: Option<MessageReader>,
    writer: Option<MessageWriter>,

    marker: AtomicU8,

    pool_listener: Option<Arc<dyn ConnectionPoolListener>>,
    connection_listener: Option<Arc<dyn ConnectionListener>>,
    clock: MetricsClock,
    cancellation: Option<CancellationToken>,
    span: tracing::Span,
}

impl SocketClient {
    /// 설정으로 TCP 클라이언트 생성
    pub fn new(config: &ConnectionConfig) -> DriverResult<Self> {
        let factory = Arc::new(config.protocol_factory()?);
        Ok(Self::with_transport(
            config.address.clone(),
            Box::new(TcpSocketClient::new(config.socket.clone())),
            factory,
            config.buffer.clone(),
        ))
    }

    /// 임의의 전송으로 클라이언트 생성
    pub fn with_transport(
        address: ServerAddress,
        transport: Box<dyn SocketTransport>,
        factory: Arc<BoltProtocolFactory>,
        buffer_settings: BufferSettings,
    ) -> Self {
        let span = tracing::info_span!("bolt_connection", address = %address);
        Self {
            address,
            transport,
            factory,
            buffer_settings,
            protocol: None,
            reader: None,
            writer: None,
            marker: AtomicU8::new(UNOPENED),
            pool_listener: None,
            connection_listener: None,
            clock: MetricsClock::new(),
            cancellation: None,
            span,
        }
    }

    /// 풀 리스너 설정
    pub fn with_pool_listener(mut self, listener: Arc<dyn ConnectionPoolListener>) -> Self {
        self.pool_listener = Some(listener);
        self
    }

    /// 연결 리스너 설정
    pub fn with_connection_listener(mut self, listener: Arc<dyn ConnectionListener>) -> Self {
        self.connection_listener = Some(listener);
        self
    }

    /// 이벤트 시계 설정 (보통 레지스트리의 시계)
    pub fn with_clock(mut self, clock: MetricsClock) -> Self {
        self.clock = clock;
        self
    }

    /// 비동기 작업 취소 토큰 설정
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// 서버 주소
    pub fn address(&self) -> &ServerAddress {
        &self.address
    }

    /// 현재 상태
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_marker(self.marker.load(Ordering::Acquire))
    }

    /// 열려 있는지
    pub fn is_open(&self) -> bool {
        self.marker.load(Ordering::Acquire) == OPEN
    }

    /// 바인딩된 프로토콜
    pub fn protocol(&self) -> Option<&Arc<dyn BoltProtocol>> {
        self.protocol.as_ref()
    }

    /// 바인딩된 프로토콜 버전
    pub fn protocol_version(&self) -> Option<u32> {
        self.protocol.as_ref().map(|p| p.version())
    }

    // ========================================================================
    // Connect
    // ========================================================================

    /// 연결 후 핸드셰이크 (블로킹)
    ///
    /// 소켓 연결 실패 시 상태는 Unopened로 남는다. 핸드셰이크 I/O 실패나
    /// 버전 불일치는 연결을 종료한 뒤 반환한다. 합의된 버전에 구현이 없으면
    /// 연결은 Open이지만 바인딩되지 않은 채로 남고 호출자가 종료해야 한다.
    pub fn connect(&mut self) -> BoltResult<Arc<dyn BoltProtocol>> {
        let span = self.span.clone();
        let _enter = span.enter();

        self.ensure_unopened()?;
        let timers = self.before_connect();
        if let Err(e) = self.transport.connect(&self.address) {
            self.after_failed_to_connect(&timers);
            return Err(self.connect_failed(e));
        }
        self.opened(&timers)?;

        let version = self.handshake()?;
        self.select_protocol(version)
    }

    /// 연결 후 핸드셰이크
    pub async fn connect_async(&mut self) -> BoltResult<Arc<dyn BoltProtocol>> {
        let span = self.span.clone();
        self.connect_async_inner().instrument(span).await
    }

    async fn connect_async_inner(&mut self) -> BoltResult<Arc<dyn BoltProtocol>> {
        self.ensure_unopened()?;
        let token = self.cancellation.clone();
        let timers = self.before_connect();
        let address = self.address.clone();

        match until_cancelled(token.as_ref(), self.transport.connect_async(&address)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.after_failed_to_connect(&timers);
                return Err(self.connect_failed(e));
            }
            Err(cancelled) => {
                debug!("~~ [CONNECT] {} cancelled", self.address);
                self.after_failed_to_connect(&timers);
                return Err(cancelled);
            }
        }
        self.opened(&timers)?;

        let version = self.handshake_async(token.as_ref()).await?;
        self.select_protocol(version)
    }

    fn ensure_unopened(&self) -> BoltResult<()> {
        match self.state() {
            ConnectionState::Unopened => Ok(()),
            state => Err(BoltError::InvalidState(format!(
                "Cannot connect a connection in state {:?}",
                state
            ))),
        }
    }

    fn before_connect(&self) -> ConnectTimers {
        let timers = ConnectTimers {
            pool: self.clock.event(),
            connection: self.clock.event(),
        };
        if let Some(listener) = &self.pool_listener {
            listener.before_creating(&timers.pool);
        }
        if let Some(listener) = &self.connection_listener {
            listener.before_connecting(&timers.connection);
        }
        timers
    }

    fn after_failed_to_connect(&self, timers: &ConnectTimers) {
        if let Some(listener) = &self.pool_listener {
            listener.after_failed_to_create();
        }
        if let Some(listener) = &self.connection_listener {
            listener.after_failed_to_connect(&timers.connection);
        }
    }

    fn connect_failed(&self, source: io::Error) -> BoltError {
        debug!("~~ [CONNECT] {} failed: {}", self.address, source);
        BoltError::ConnectFailed {
            address: self.address.to_string(),
            source,
        }
    }

    fn opened(&self, timers: &ConnectTimers) -> BoltResult<()> {
        if self
            .marker
            .compare_exchange(UNOPENED, OPEN, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.transport.disconnect();
            self.after_failed_to_connect(timers);
            return Err(BoltError::InvalidState(
                "Connection was opened or disposed concurrently".to_string(),
            ));
        }

        debug!("~~ [CONNECT] {}", self.address);
        if let Some(listener) = &self.pool_listener {
            listener.after_created(&timers.pool);
        }
        if let Some(listener) = &self.connection_listener {
            listener.after_connected(&timers.connection);
        }
        Ok(())
    }

    // ========================================================================
    // Handshake
    // ========================================================================

    fn begin_handshake(&self) -> Handshake {
        let handshake = self.factory.handshake();
        debug!("C: [HANDSHAKE] {:02X?}", handshake.request());
        handshake
    }

    fn agree(&self, handshake: &Handshake, response: [u8; HANDSHAKE_RESPONSE_SIZE]) -> BoltResult<u32> {
        let agreed = BoltProtocolFactory::unpack_agreed_version(response);
        debug!("S: [HANDSHAKE] {}", format_version(agreed));
        Ok(handshake.accept(agreed)?)
    }

    fn handshake(&mut self) -> BoltResult<u32> {
        let handshake = self.begin_handshake();
        let result = self
            .exchange_handshake(&handshake.request())
            .map_err(BoltError::from)
            .and_then(|response| self.agree(&handshake, response));

        if let Err(e) = &result {
            error!("Handshake with {} failed: {}", self.address, e);
            self.stop();
        }
        result
    }

    async fn handshake_async(&mut self, token: Option<&CancellationToken>) -> BoltResult<u32> {
        let handshake = self.begin_handshake();
        let request = handshake.request();
        let result = match until_cancelled(token, self.exchange_handshake_async(&request)).await {
            Ok(Ok(response)) => self.agree(&handshake, response),
            Ok(Err(e)) => Err(e.into()),
            Err(cancelled) => Err(cancelled),
        };

        if let Err(e) = &result {
            error!("Handshake with {} failed: {}", self.address, e);
            self.stop_async().await;
        }
        result
    }

    fn exchange_handshake(&mut self, request: &[u8]) -> io::Result<[u8; HANDSHAKE_RESPONSE_SIZE]> {
        self.transport.write_all(request)?;
        self.transport.flush()?;

        let mut response = [0u8; HANDSHAKE_RESPONSE_SIZE];
        let mut filled = 0;
        while filled < response.len() {
            match self.transport.read(&mut response[filled..])? {
                0 => return Err(handshake_eof()),
                n => filled += n,
            }
        }
        Ok(response)
    }

    async fn exchange_handshake_async(&mut self, request: &[u8]) -> io::Result<[u8; HANDSHAKE_RESPONSE_SIZE]> {
        self.transport.write_all_async(request).await?;
        self.transport.flush_async().await?;

        let mut response = [0u8; HANDSHAKE_RESPONSE_SIZE];
        let mut filled = 0;
        while filled < response.len() {
            match self.transport.read_async(&mut response[filled..]).await? {
                0 => return Err(handshake_eof()),
                n => filled += n,
            }
        }
        Ok(response)
    }

    // ========================================================================
    // Protocol binding
    // ========================================================================

    fn select_protocol(&mut self, version: u32) -> BoltResult<Arc<dyn BoltProtocol>> {
        let protocol = self.factory.for_version(version)?;
        self.bind(Arc::clone(&protocol));
        Ok(protocol)
    }

    fn bind(&mut self, protocol: Arc<dyn BoltProtocol>) {
        let mut reader = protocol.new_reader(&self.buffer_settings);
        if let Some(previous) = self.reader.take() {
            reader.take_over(previous);
        }
        self.reader = Some(reader);
        self.writer = Some(protocol.new_writer(&self.buffer_settings));
        self.protocol = Some(protocol);
    }

    /// 핸드셰이크 없이 다른 프로토콜 구현으로 교체
    ///
    /// 이미 받아둔 바이트는 새 리더가 이어서 읽는다.
    pub fn rebind(&mut self, protocol: Arc<dyn BoltProtocol>) -> BoltResult<()> {
        self.ensure_usable()?;
        debug!(
            "~~ [REBIND] Bolt {} -> Bolt {}",
            self.protocol_version().map(format_version).unwrap_or_default(),
            format_version(protocol.version())
        );
        self.bind(protocol);
        Ok(())
    }

    fn ensure_usable(&self) -> BoltResult<()> {
        if self.state() == ConnectionState::Closed {
            return Err(BoltError::ConnectionClosed);
        }
        if self.reader.is_none() || self.writer.is_none() {
            return Err(not_bound());
        }
        Ok(())
    }

    // ========================================================================
    // Send
    // ========================================================================

    /// 메시지 묶음 전송 (블로킹)
    ///
    /// 순서대로 쓰고 마지막에 한 번 플러시한다. 실패하면 연결을 종료하고
    /// 원래 에러를 반환한다.
    pub fn send(&mut self, messages: &[&dyn RequestMessage]) -> BoltResult<()> {
        let span = self.span.clone();
        let _enter = span.enter();

        self.ensure_usable()?;
        let result = self.write_batch(messages).and_then(|_| self.flush_blocking());
        if let Err(e) = &result {
            self.log_send_failure(e);
            self.stop();
        }
        result
    }

    /// 메시지 묶음 전송
    pub async fn send_async(&mut self, messages: &[&dyn RequestMessage]) -> BoltResult<()> {
        let span = self.span.clone();
        self.send_async_inner(messages).instrument(span).await
    }

    async fn send_async_inner(&mut self, messages: &[&dyn RequestMessage]) -> BoltResult<()> {
        self.ensure_usable()?;
        let token = self.cancellation.clone();
        let result = match self.write_batch(messages) {
            Ok(()) => until_cancelled(token.as_ref(), self.flush_nonblocking())
                .await
                .and_then(|flushed| flushed),
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            self.log_send_failure(e);
            self.stop_async().await;
        }
        result
    }

    fn write_batch(&mut self, messages: &[&dyn RequestMessage]) -> BoltResult<()> {
        let writer = self.writer.as_mut().ok_or_else(not_bound)?;
        for message in messages {
            writer.write(*message)?;
            debug!("C: {}", message);
        }
        Ok(())
    }

    fn flush_blocking(&mut self) -> BoltResult<()> {
        let writer = self.writer.as_mut().ok_or_else(not_bound)?;
        self.transport.write_all(writer.pending())?;
        self.transport.flush()?;
        writer.flushed();
        Ok(())
    }

    async fn flush_nonblocking(&mut self) -> BoltResult<()> {
        let writer = self.writer.as_mut().ok_or_else(not_bound)?;
        self.transport.write_all_async(writer.pending()).await?;
        self.transport.flush_async().await?;
        writer.flushed();
        Ok(())
    }

    fn log_send_failure(&self, e: &BoltError) {
        warn!(
            "Unable to send message to server {}, connection will be terminated: {}",
            self.address, e
        );
    }

    // ========================================================================
    // Receive
    // ========================================================================

    /// 핸들러가 더 기다리는 응답이 없을 때까지 수신 (블로킹)
    ///
    /// 읽기 실패는 전송 에러로, 핸들러가 감지한 위반은 `ProtocolViolation`으로
    /// 구분된다. 둘 다 연결을 종료한 뒤 반환한다.
    pub fn receive<H>(&mut self, handler: &mut H) -> BoltResult<()>
    where
        H: ResponseHandler + ?Sized,
    {
        let span = self.span.clone();
        let _enter = span.enter();

        self.ensure_usable()?;
        while handler.unhandled_message_count() > 0 {
            let message = match self.read_blocking() {
                Ok(message) => message,
                Err(e) => {
                    self.log_read_failure(&e);
                    self.stop();
                    return Err(e);
                }
            };
            if let Err(e) = self.dispatch(handler, message) {
                self.stop();
                return Err(e);
            }
        }
        Ok(())
    }

    /// 핸들러가 더 기다리는 응답이 없을 때까지 수신
    pub async fn receive_async<H>(&mut self, handler: &mut H) -> BoltResult<()>
    where
        H: ResponseHandler + ?Sized,
    {
        let span = self.span.clone();
        self.receive_async_inner(handler).instrument(span).await
    }

    async fn receive_async_inner<H>(&mut self, handler: &mut H) -> BoltResult<()>
    where
        H: ResponseHandler + ?Sized,
    {
        self.ensure_usable()?;
        let token = self.cancellation.clone();
        while handler.unhandled_message_count() > 0 {
            let read = until_cancelled(token.as_ref(), self.read_nonblocking())
                .await
                .and_then(|read| read);
            let message = match read {
                Ok(message) => message,
                Err(e) => {
                    self.log_read_failure(&e);
                    self.stop_async().await;
                    return Err(e);
                }
            };
            if let Err(e) = self.dispatch(handler, message) {
                self.stop_async().await;
                return Err(e);
            }
        }
        Ok(())
    }

    fn read_blocking(&mut self) -> BoltResult<ResponseMessage> {
        let reader = self.reader.as_mut().ok_or_else(not_bound)?;
        loop {
            if let Some(message) = reader.try_read()? {
                return Ok(message);
            }
            match self.transport.read(reader.read_space())? {
                0 => return Err(BoltError::ConnectionClosed),
                n => reader.commit(n),
            }
        }
    }

    async fn read_nonblocking(&mut self) -> BoltResult<ResponseMessage> {
        let reader = self.reader.as_mut().ok_or_else(not_bound)?;
        loop {
            if let Some(message) = reader.try_read()? {
                return Ok(message);
            }
            match self.transport.read_async(reader.read_space()).await? {
                0 => return Err(BoltError::ConnectionClosed),
                n => reader.commit(n),
            }
        }
    }

    fn dispatch<H>(&self, handler: &mut H, message: ResponseMessage) -> BoltResult<()>
    where
        H: ResponseHandler + ?Sized,
    {
        debug!("S: {}", message);
        handler.on_message(message);
        if let Some(violation) = handler.take_protocol_violation() {
            warn!("Protocol violation from server {}: {}", self.address, violation);
            return Err(BoltError::ProtocolViolation(violation));
        }
        Ok(())
    }

    fn log_read_failure(&self, e: &BoltError) {
        match e {
            BoltError::Cancelled => debug!("Receive from {} cancelled", self.address),
            _ => error!("Unable to read message from server {}, connection will be terminated: {}", self.address, e),
        }
    }

    // ========================================================================
    // Stop / Close / Dispose
    // ========================================================================

    fn transition_to_closed(&self) -> bool {
        self.marker
            .compare_exchange(OPEN, CLOSED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// 연결 종료 (블로킹, 멱등)
    ///
    /// Open→Closed 전이에 성공한 호출자만 소켓을 닫는다.
    pub fn stop(&self) {
        if self.transition_to_closed() {
            let _enter = self.span.enter();
            debug!("~~ [DISCONNECT] {}", self.address);
            self.transport.disconnect();
        }
    }

    /// 연결 종료 (멱등)
    pub async fn stop_async(&self) {
        if self.transition_to_closed() {
            debug!(parent: &self.span, "~~ [DISCONNECT] {}", self.address);
            self.transport.disconnect_async().await;
        }
    }

    /// GOODBYE를 보낼 수 있으면 보낸 뒤 종료 (블로킹)
    pub fn close(&mut self) {
        if self.is_open() && self.can_say_goodbye() {
            let span = self.span.clone();
            let _enter = span.enter();
            if let Err(e) = self
                .write_batch(&[&Request::Goodbye])
                .and_then(|_| self.flush_blocking())
            {
                debug!("GOODBYE to {} failed: {}", self.address, e);
            }
        }
        self.stop();
    }

    /// GOODBYE를 보낼 수 있으면 보낸 뒤 종료
    pub async fn close_async(&mut self) {
        if self.is_open() && self.can_say_goodbye() {
            let goodbye = match self.write_batch(&[&Request::Goodbye]) {
                Ok(()) => self.flush_nonblocking().await,
                Err(e) => Err(e),
            };
            if let Err(e) = goodbye {
                debug!(parent: &self.span, "GOODBYE to {} failed: {}", self.address, e);
            }
        }
        self.stop_async().await;
    }

    fn can_say_goodbye(&self) -> bool {
        self.writer.is_some() && self.protocol.as_ref().is_some_and(|p| p.supports_goodbye())
    }

    /// 자원 해제 (멱등)
    ///
    /// 한 번도 열리지 않은 연결은 소켓을 건드리지 않고 Closed가 된다.
    pub fn dispose(&self) {
        if self.marker.swap(CLOSED, Ordering::AcqRel) == OPEN {
            let _enter = self.span.enter();
            debug!("~~ [DISCONNECT] {}", self.address);
            self.transport.disconnect();
        }
    }
}

impl Drop for SocketClient {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for SocketClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketClient")
            .field("address", &self.address)
            .field("state", &self.state())
            .field("protocol", &self.protocol_version().map(format_version))
            .finish_non_exhaustive()
    }
}

fn not_bound() -> BoltError {
    BoltError::InvalidState("Connection is not bound to a protocol version".to_string())
}

fn handshake_eof() -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        "connection closed during handshake",
    )
}

/// `token`이 먼저 취소되면 `Cancelled`
async fn until_cancelled<F>(token: Option<&CancellationToken>, future: F) -> BoltResult<F::Output>
where
    F: Future,
{
    match token {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(BoltError::Cancelled),
            output = future => Ok(output),
        },
        None => Ok(future.await),
    }
}
