//----------------------------------------------------------------------------------------------
// Module transport
// XCP on Ethernet transport layer (TCP and UDP)
// A background listener task reads from the socket, reassembles frames and hands each command response
// to the caller waiting for its counter. Callers send directly on the socket.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::net::{TcpStream, UdpSocket};
use tokio::select;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::config::{XcpConfig, XcpTransportLayer};
use crate::error::{Result, XcpError};
use crate::protocol::event::{AsyncMessage, ServiceRequest};
use crate::protocol::{Command, Pid};

pub mod frame;
use frame::{encode_frame, split_datagram, Frame, FrameAssembler};

/// Receive buffer size, holds the largest UDP datagram
const RX_BUFFER_SIZE: usize = 64 * 1024;

/// Capacity of the asynchronous message channel, messages are dropped when it is full
pub const ASYNC_QUEUE_SIZE: usize = 1024;

/// Time the listener gets to terminate on close before it is aborted
const LISTENER_STOP_TIMEOUT: Duration = Duration::from_millis(100);

//----------------------------------------------------------------------------------------------
// Transport state

/// Lifecycle of the transport
/// Idle -> Connecting -> Connected -> Closing -> Closed, or Connecting -> Closed if opening fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Idle,
    Connecting,
    Connected,
    Closing,
    Closed,
}

//----------------------------------------------------------------------------------------------
// Socket abstraction for UDP and TCP

#[derive(Debug, Clone)]
enum XcpSocket {
    Udp(Arc<UdpSocket>),
    Tcp(Arc<TcpStream>),
}

impl XcpSocket {
    async fn send(&self, buf: &[u8]) -> std::io::Result<()> {
        match self {
            XcpSocket::Udp(udp_socket) => {
                // Connected socket, one datagram per message
                udp_socket.send(buf).await?;
                Ok(())
            }
            XcpSocket::Tcp(tcp_stream) => {
                let mut pos = 0;
                while pos < buf.len() {
                    match tcp_stream.try_write(&buf[pos..]) {
                        Ok(0) => return Err(std::io::Error::new(std::io::ErrorKind::WriteZero, "write zero bytes")),
                        Ok(n) => pos += n,
                        Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                            tcp_stream.writable().await?;
                        }
                        Err(e) => return Err(e),
                    }
                }
                Ok(())
            }
        }
    }

    /// Read whatever is available, a whole datagram (UDP) or any part of the stream (TCP)
    /// Returns 0 if the peer closed the connection
    async fn receive(&self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            XcpSocket::Udp(udp_socket) => udp_socket.recv(buf).await,
            XcpSocket::Tcp(tcp_stream) => loop {
                tcp_stream.readable().await?;
                match tcp_stream.try_read(buf) {
                    Ok(n) => return Ok(n),
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
                    Err(e) => return Err(e),
                }
            },
        }
    }
}

//----------------------------------------------------------------------------------------------
// State shared between callers and the listener task

#[derive(Debug)]
struct Shared {
    /// Outstanding requests by counter, each with a single use notification
    pending: Mutex<HashMap<u16, oneshot::Sender<Frame>>>,
    /// Active block transfer, receives the further responses with its counter
    block: Mutex<Option<BlockTransfer>>,
    /// Events, service requests, DAQ packets and unmatched responses
    async_tx: mpsc::Sender<AsyncMessage>,
    state: Mutex<TransportState>,
}

impl Shared {
    fn set_state(&self, state: TransportState) {
        let mut s = self.state.lock();
        if *s != state {
            debug!("transport state {:?} -> {:?}", *s, state);
            *s = state;
        }
    }

    /// Fail all outstanding requests, dropping the senders wakes up the waiting callers
    fn drain_pending(&self) {
        let mut pending = self.pending.lock();
        if !pending.is_empty() {
            debug!("transport: cancel {} pending requests", pending.len());
        }
        pending.clear();
        drop(pending);
        *self.block.lock() = None;
    }

    fn start_block(&self, counter: u16) -> Result<mpsc::UnboundedReceiver<Frame>> {
        let mut block = self.block.lock();
        if let Some(b) = block.as_ref() {
            warn!("start_block: block transfer ctr = {} still active", b.counter);
            return Err(XcpError::ProtocolState("block transfer already active"));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *block = Some(BlockTransfer { counter, tx });
        Ok(rx)
    }
}

/// Block mode transfer, all slave messages carry the counter of the request
#[derive(Debug)]
struct BlockTransfer {
    counter: u16,
    tx: mpsc::UnboundedSender<Frame>,
}

/// Deliver a received frame
/// OK and ERR frames go to the caller waiting for their counter, or to the active block transfer with
/// the same counter. Everything else, and responses nobody waits for, goes to the async channel.
fn dispatch(shared: &Shared, mut frame: Frame) {
    let Some(pid) = frame.pid() else {
        warn!("dispatch: empty packet, ctr = {}", frame.counter);
        return;
    };
    let pid = Pid::from(pid);

    if pid.is_command_response() {
        let waiter = shared.pending.lock().remove(&frame.counter);
        if let Some(tx) = waiter {
            trace!("dispatch: response ctr = {} {:?}", frame.counter, pid);
            if tx.send(frame).is_err() {
                debug!("dispatch: caller gone");
            }
            return;
        }
        if let Some(block) = shared.block.lock().as_ref() {
            if block.counter == frame.counter {
                trace!("dispatch: block ctr = {} {:?}", frame.counter, pid);
                match block.tx.send(frame) {
                    Ok(()) => return,
                    Err(e) => frame = e.0,
                }
            }
        }
        debug!("dispatch: no pending request for ctr = {}", frame.counter);
    }

    let Some(msg) = AsyncMessage::from_packet(frame.counter, &frame.payload) else {
        return;
    };
    match &msg {
        AsyncMessage::Event(ev) => info!("dispatch: XCP event 0x{:02X}", ev.code()),
        AsyncMessage::Service(ServiceRequest::Text(text)) => info!("SERV_TEXT: {}", text),
        AsyncMessage::Service(s) => info!("dispatch: XCP service request {:?}", s),
        AsyncMessage::Daq { pid, .. } => trace!("dispatch: DAQ pid = {}", pid),
        AsyncMessage::Unmatched { .. } => {}
    }
    if shared.async_tx.try_send(msg).is_err() {
        trace!("dispatch: async queue full or closed, message dropped");
    }
}

/// Control messages for the listener task
#[derive(Debug)]
enum ListenerControl {
    Stop,
}

//----------------------------------------------------------------------------------------------
// EthTransport

/// Socket owner with background listener
#[derive(Debug)]
pub struct EthTransport {
    protocol: XcpTransportLayer,
    dest_addr: SocketAddr,
    socket: Mutex<Option<XcpSocket>>,
    shared: Arc<Shared>,
    // Serializes writers, a message must not be interleaved with another one on a stream
    tx_lock: tokio::sync::Mutex<()>,
    tx_control: Mutex<Option<mpsc::Sender<ListenerControl>>>,
    receive_task: Mutex<Option<JoinHandle<()>>>,
    async_rx: Mutex<Option<mpsc::Receiver<AsyncMessage>>>,
}

impl EthTransport {
    //------------------------------------------------------------------------
    // Listener task
    // Handle incoming data from the slave until stopped or the socket fails
    async fn receive_task(socket: XcpSocket, shared: Arc<Shared>, mut rx_control: mpsc::Receiver<ListenerControl>) {
        let mut buf = vec![0u8; RX_BUFFER_SIZE];
        let mut assembler = FrameAssembler::new();
        let tcp = matches!(socket, XcpSocket::Tcp(_));

        loop {
            select! {
                res = rx_control.recv() => {
                    match res {
                        Some(ListenerControl::Stop) => {
                            info!("receive_task: stop");
                        }
                        None => { // The sender has been dropped
                            info!("receive_task: stop, channel closed");
                        }
                    }
                    return;
                }

                res = socket.receive(&mut buf) => {
                    match res {
                        Ok(0) => {
                            warn!("receive_task: socket closed by peer");
                            break;
                        }
                        Ok(size) => {
                            trace!("receive_task: {} bytes", size);
                            if !tcp && size == buf.len() {
                                warn!("receive_task: datagram filled the receive buffer, {} bytes, may be truncated", size);
                            }
                            let frames = if tcp { assembler.push(&buf[..size]) } else { split_datagram(&buf[..size]) };
                            for frame in frames {
                                dispatch(&shared, frame);
                            }
                        }
                        Err(e) if !tcp => {
                            // A lost or refused datagram does not end the session
                            warn!("receive_task: datagram read error {}", e);
                        }
                        Err(e) => {
                            error!("receive_task: socket error {}", e);
                            break;
                        }
                    }
                }
            }
        }

        // Connection lost, waiting callers get TransportClosed instead of a timeout
        shared.set_state(TransportState::Closed);
        shared.drain_pending();
    }

    //------------------------------------------------------------------------
    // Open the socket and start the listener

    pub async fn open(config: &XcpConfig) -> Result<EthTransport> {
        let dest_addr = config.resolve().await?;
        let (async_tx, async_rx) = mpsc::channel(ASYNC_QUEUE_SIZE);
        let shared = Arc::new(Shared {
            pending: Mutex::new(HashMap::new()),
            block: Mutex::new(None),
            async_tx,
            state: Mutex::new(TransportState::Idle),
        });
        shared.set_state(TransportState::Connecting);

        let socket = match EthTransport::open_socket(config, dest_addr).await {
            Ok(socket) => socket,
            Err(e) => {
                shared.set_state(TransportState::Closed);
                return Err(e);
            }
        };
        info!("XCP on {} to {}", config.transport.protocol_name(), dest_addr);

        // Spawn the listener with a clone of the socket
        let (tx_control, rx_control) = mpsc::channel(1);
        let receive_task = tokio::spawn(EthTransport::receive_task(socket.clone(), Arc::clone(&shared), rx_control));
        shared.set_state(TransportState::Connected);

        Ok(EthTransport {
            protocol: config.transport,
            dest_addr,
            socket: Mutex::new(Some(socket)),
            shared,
            tx_lock: tokio::sync::Mutex::new(()),
            tx_control: Mutex::new(Some(tx_control)),
            receive_task: Mutex::new(Some(receive_task)),
            async_rx: Mutex::new(Some(async_rx)),
        })
    }

    async fn open_socket(config: &XcpConfig, dest_addr: SocketAddr) -> Result<XcpSocket> {
        Ok(match config.transport {
            XcpTransportLayer::Tcp => {
                let stream = TcpStream::connect(dest_addr).await?;
                stream.set_nodelay(true)?;
                debug!("TCP connection established, local address {:?}", stream.local_addr()?);
                XcpSocket::Tcp(Arc::new(stream))
            }
            XcpTransportLayer::Udp => {
                let udp_socket = UdpSocket::bind(config.bind_addr(&dest_addr)).await?;
                udp_socket.connect(dest_addr).await?;
                debug!("UDP socket bound to {:?}", udp_socket.local_addr()?);
                XcpSocket::Udp(Arc::new(udp_socket))
            }
        })
    }

    //------------------------------------------------------------------------
    // Send path

    /// Register a request before sending it, the returned receiver completes with the matching response
    pub fn register(&self, counter: u16) -> Result<oneshot::Receiver<Frame>> {
        let (tx, rx) = oneshot::channel();
        let mut pending = self.shared.pending.lock();
        if *self.shared.state.lock() != TransportState::Connected {
            return Err(XcpError::TransportClosed);
        }
        if pending.insert(counter, tx).is_some() {
            warn!("register: counter {} was still pending", counter);
        }
        Ok(rx)
    }

    /// Forget a request, e.g. after a timeout
    pub fn unregister(&self, counter: u16) {
        self.shared.pending.lock().remove(&counter);
    }

    /// Write one XCP packet with the transport layer header
    pub async fn send(&self, counter: u16, packet: &[u8]) -> Result<()> {
        let socket = self.socket.lock().clone().ok_or(XcpError::TransportClosed)?;
        let buf = encode_frame(counter, packet);
        trace!("TX: ctr = {} {:02X?}", counter, packet);
        let _guard = self.tx_lock.lock().await;
        socket.send(&buf).await.map_err(|e| {
            if self.state() == TransportState::Connected {
                XcpError::Io(e)
            } else {
                XcpError::TransportClosed
            }
        })
    }

    /// Send a packet and wait for the response with the same counter
    /// `command` is reported in the timeout error
    pub async fn request(&self, command: Command, counter: u16, packet: &[u8], timeout: Duration) -> Result<Frame> {
        let rx = self.register(counter)?;
        if let Err(e) = self.send(counter, packet).await {
            self.unregister(counter);
            return Err(e);
        }
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(frame)) => Ok(frame),
            Ok(Err(_)) => Err(XcpError::TransportClosed),
            Err(_) => {
                self.unregister(counter);
                debug!("request: {} ctr = {} timeout", command, counter);
                Err(XcpError::Timeout(command))
            }
        }
    }

    //------------------------------------------------------------------------
    // Block mode

    /// Route the responses with `counter` nobody waits for into the returned receiver, until `stop_block`
    /// Must be called before the request is sent, only one block transfer can be active
    pub fn start_block(&self, counter: u16) -> Result<mpsc::UnboundedReceiver<Frame>> {
        self.shared.start_block(counter)
    }

    pub fn stop_block(&self) {
        *self.shared.block.lock() = None;
    }

    //------------------------------------------------------------------------
    // Accessors

    /// Receiver for events, service requests, DAQ packets and unmatched responses, can be taken once
    pub fn take_async_receiver(&self) -> Option<mpsc::Receiver<AsyncMessage>> {
        self.async_rx.lock().take()
    }

    pub fn state(&self) -> TransportState {
        *self.shared.state.lock()
    }

    /// Number of requests waiting for a response
    pub fn pending_len(&self) -> usize {
        self.shared.pending.lock().len()
    }

    pub fn protocol(&self) -> XcpTransportLayer {
        self.protocol
    }

    pub fn dest_addr(&self) -> SocketAddr {
        self.dest_addr
    }

    pub fn is_tcp(&self) -> bool {
        self.protocol == XcpTransportLayer::Tcp
    }

    //------------------------------------------------------------------------
    // Close
    // Idempotent, stops the listener, fails waiting callers and releases the socket

    pub async fn close(&self) {
        {
            let mut state = self.shared.state.lock();
            if *state == TransportState::Closed && self.socket.lock().is_none() {
                return;
            }
            *state = TransportState::Closing;
        }
        debug!("transport: closing");

        // Stop the listener
        let tx_control = self.tx_control.lock().take();
        if let Some(tx) = tx_control {
            let _ = tx.try_send(ListenerControl::Stop);
        }
        self.shared.drain_pending();
        let task = self.receive_task.lock().take();
        if let Some(mut task) = task {
            if tokio::time::timeout(LISTENER_STOP_TIMEOUT, &mut task).await.is_err() {
                warn!("transport: listener did not stop, abort");
                task.abort();
            }
        }

        // Release the socket
        let _socket = self.socket.lock().take();
        self.shared.set_state(TransportState::Closed);
        info!("transport: closed");
    }
}

impl Drop for EthTransport {
    fn drop(&mut self) {
        if let Some(task) = self.receive_task.lock().take() {
            task.abort();
        }
        self.shared.drain_pending();
    }
}

//----------------------------------------------------------------------------------------------
