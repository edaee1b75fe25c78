//----------------------------------------------------------------------------------------------
// Module master
// XCP master command facade
// Every service is {build command -> send with a fresh counter -> await the response for that counter -> decode}

use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tokio::sync::mpsc;

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::checksum::checksum;
use crate::codec::{ByteOrder, XcpReader};
use crate::config::XcpConfig;
use crate::error::{Result, XcpError};
use crate::protocol::event::AsyncMessage;
use crate::protocol::types::*;
use crate::protocol::{Command, ErrorCode, Pid, XcpCommandBuilder};
use crate::transport::EthTransport;

// Submodule cal, calibration and page switching commands
mod cal;

// Submodule daq, data acquisition commands
mod daq;

// Submodule pgm, flash programming commands
mod pgm;

/// Function computing a USER_DEFINED checksum
pub type UserChecksumFn = Arc<dyn Fn(&[u8]) -> u32 + Send + Sync>;

//----------------------------------------------------------------------------------------------
// VerifyReport

/// Result of `verify`, the checksum reported by the slave and the one computed over the uploaded data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyReport {
    pub checksum_type: ChecksumType,
    pub slave: u32,
    pub local: u32,
}

impl VerifyReport {
    pub fn is_match(&self) -> bool {
        self.slave == self.local
    }
}

//----------------------------------------------------------------------------------------------
// XcpMaster

/// XCP master, one per slave connection
/// All services take `&self`, the master may be shared between tasks with an `Arc`
pub struct XcpMaster {
    config: XcpConfig,
    transport: EthTransport,
    ctr: AtomicU16,
    // Negotiated by the first successful CONNECT, read only afterwards
    connect_response: OnceCell<ConnectResponse>,
    connected: AtomicBool,
    current_service: Mutex<Option<Command>>,
    user_checksum: Mutex<Option<UserChecksumFn>>,
}

impl std::fmt::Debug for XcpMaster {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("XcpMaster")
            .field("config", &self.config)
            .field("transport", &self.transport)
            .field("connect_response", &self.connect_response.get())
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl XcpMaster {
    /// Open the transport, the slave has to be connected with `connect` afterwards
    pub async fn open(config: XcpConfig) -> Result<XcpMaster> {
        let transport = EthTransport::open(&config).await?;
        Ok(XcpMaster {
            config,
            transport,
            ctr: AtomicU16::new(0),
            connect_response: OnceCell::new(),
            connected: AtomicBool::new(false),
            current_service: Mutex::new(None),
            user_checksum: Mutex::new(None),
        })
    }

    //------------------------------------------------------------------------
    // Connection state

    pub fn config(&self) -> &XcpConfig {
        &self.config
    }

    pub fn transport(&self) -> &EthTransport {
        &self.transport
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Slave properties negotiated by CONNECT
    pub fn connect_response(&self) -> Option<&ConnectResponse> {
        self.connect_response.get()
    }

    /// Slave byte order, None before CONNECT
    pub fn byte_order(&self) -> Option<ByteOrder> {
        self.connect_response.get().map(ConnectResponse::byte_order)
    }

    fn require_byte_order(&self) -> Result<ByteOrder> {
        self.byte_order().ok_or(XcpError::ProtocolState("byte order unknown before CONNECT"))
    }

    pub fn max_cto(&self) -> Result<u8> {
        self.connect_response.get().map(|c| c.max_cto).ok_or(XcpError::ProtocolState("MAX_CTO unknown before CONNECT"))
    }

    pub fn max_dto(&self) -> Result<u16> {
        self.connect_response.get().map(|c| c.max_dto).ok_or(XcpError::ProtocolState("MAX_DTO unknown before CONNECT"))
    }

    /// Resources available in the slave (CONNECT), empty before CONNECT
    pub fn resources(&self) -> ResourceType {
        self.connect_response.get().map_or(ResourceType::empty(), |c| c.resource)
    }

    pub fn supports_calpag(&self) -> bool {
        self.resources().contains(ResourceType::CALPAG)
    }

    pub fn supports_daq(&self) -> bool {
        self.resources().contains(ResourceType::DAQ)
    }

    pub fn supports_stim(&self) -> bool {
        self.resources().contains(ResourceType::STIM)
    }

    pub fn supports_pgm(&self) -> bool {
        self.resources().contains(ResourceType::PGM)
    }

    /// The command currently being executed
    pub fn current_service(&self) -> Option<Command> {
        *self.current_service.lock()
    }

    /// Receiver for events, service requests and DAQ packets, can be taken once
    pub fn take_async_receiver(&self) -> Option<mpsc::Receiver<AsyncMessage>> {
        self.transport.take_async_receiver()
    }

    /// Set the function used to verify USER_DEFINED checksums
    pub fn set_user_checksum<F>(&self, f: F)
    where
        F: Fn(&[u8]) -> u32 + Send + Sync + 'static,
    {
        *self.user_checksum.lock() = Some(Arc::new(f));
    }

    //------------------------------------------------------------------------
    // Request executor
    // Centralizes counter assignment, timeout, envelope discrimination and error code decoding

    fn next_counter(&self) -> u16 {
        self.ctr.fetch_add(1, Ordering::Relaxed)
    }

    /// Start building a command, word and dword parameters need the negotiated byte order
    fn command(&self, command: Command) -> XcpCommandBuilder {
        XcpCommandBuilder::new(command, self.byte_order())
    }

    /// Execute a command, returns the positive response payload (PID removed)
    /// Fails with ProtocolState, without sending, if the response can not be decoded before CONNECT
    async fn execute(&self, cmd: &mut XcpCommandBuilder) -> Result<Bytes> {
        self.execute_with_counter(cmd, self.next_counter()).await
    }

    async fn execute_with_counter(&self, cmd: &mut XcpCommandBuilder, ctr: u16) -> Result<Bytes> {
        let command = cmd.command();
        if command.response_layout().needs_byte_order() && self.byte_order().is_none() {
            debug!("{} rejected, byte order unknown before CONNECT", command);
            return Err(XcpError::ProtocolState("response needs the byte order, unknown before CONNECT"));
        }
        let packet = cmd.build()?;
        if let Some(c) = self.connect_response.get() {
            if packet.len() > c.max_cto as usize {
                return Err(XcpError::InvalidArgument(format!("{} needs {} bytes, MAX_CTO is {}", command, packet.len(), c.max_cto)));
            }
        }

        *self.current_service.lock() = Some(command);
        let res = self.transact(command, ctr, &packet).await;
        *self.current_service.lock() = None;
        res
    }

    async fn transact(&self, command: Command, ctr: u16, packet: &[u8]) -> Result<Bytes> {
        trace!("{} ctr = {}", command, ctr);
        let frame = self.transport.request(command, ctr, packet, self.config.timeout).await?;
        response_payload(command, &frame)
    }

    /// Execute a command and decode its response with a fixed layout
    async fn execute_decode<T: XcpResponse>(&self, cmd: &mut XcpCommandBuilder) -> Result<T> {
        let payload = self.execute(cmd).await?;
        T::decode(&payload, self.require_byte_order()?)
    }

    /// Execute a command whose response carries only byte sized fields, usable before CONNECT
    async fn execute_bytes<T, F>(&self, cmd: &mut XcpCommandBuilder, decode: F) -> Result<T>
    where
        F: FnOnce(&mut XcpReader) -> Result<T>,
    {
        let payload = self.execute(cmd).await?;
        let mut r = XcpReader::new(cmd.command().name(), &payload, self.byte_order().unwrap_or(ByteOrder::Intel));
        decode(&mut r)
    }

    //------------------------------------------------------------------------
    // Mandatory commands

    /// Connect to the slave
    /// A slave may silently ignore a repeated CONNECT, in that case the already negotiated properties are returned
    pub async fn connect(&self) -> Result<ConnectResponse> {
        let mut cmd = XcpCommandBuilder::new(Command::Connect, None);
        cmd.add_u8(0);
        let payload = match self.execute(&mut cmd).await {
            Ok(payload) => payload,
            Err(XcpError::Timeout(_)) if self.is_connected() => {
                if let Some(c) = self.connect_response.get() {
                    warn!("XCP CONNECT ignored by slave, already connected");
                    return Ok(*c);
                }
                return Err(XcpError::Timeout(Command::Connect));
            }
            Err(e) => return Err(e),
        };

        let res = ConnectResponse::decode_self_describing(&payload)?;
        debug!(
            "XCP CONNECT -> resources=0x{:02X} comm_mode_basic=0x{:02X} max_cto={} max_dto={} protocol_version=0x{:02X} transport_layer_version=0x{:02X}",
            res.resource.bits(),
            res.comm_mode_basic.bits(),
            res.max_cto,
            res.max_dto,
            res.protocol_layer_version,
            res.transport_layer_version
        );
        if res.max_cto < 8 {
            return Err(XcpError::Malformed(format!("MAX_CTO {} below minimum 8", res.max_cto)));
        }
        if let Err(res) = self.connect_response.set(res) {
            if self.connect_response.get() != Some(&res) {
                warn!("XCP CONNECT: slave properties changed on reconnect, keeping the first ones");
            }
        }
        self.connected.store(true, Ordering::Release);
        info!("XCP master connected, byte order {:?}, max_cto = {}, max_dto = {}", res.byte_order(), res.max_cto, res.max_dto);
        Ok(res)
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.execute(&mut self.command(Command::Disconnect)).await?;
        self.connected.store(false, Ordering::Release);
        info!("XCP master disconnected");
        Ok(())
    }

    pub async fn get_status(&self) -> Result<StatusResponse> {
        self.execute_decode(&mut self.command(Command::GetStatus)).await
    }

    /// Synchronize command execution after a timeout
    /// The slave answers SYNCH with ERR_CMD_SYNCH, which is the expected outcome
    pub async fn synch(&self) -> Result<()> {
        match self.execute(&mut self.command(Command::Synch)).await {
            Ok(_)
            | Err(XcpError::SlaveRejected {
                code: ErrorCode::CmdSynch, ..
            }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub async fn get_comm_mode_info(&self) -> Result<CommModeInfo> {
        self.execute_bytes(&mut self.command(Command::GetCommModeInfo), |r| CommModeInfo::read(r)).await
    }

    /// Identification, contained in the response for mode 1, otherwise to be uploaded from the MTA
    pub async fn get_id(&self, mode: u8) -> Result<IdResponse> {
        let mut cmd = self.command(Command::GetId);
        cmd.add_u8(mode);
        self.execute_decode(&mut cmd).await
    }

    /// Request to store calibration data or DAQ lists, or to clear the DAQ configuration
    pub async fn set_request(&self, mode: SetRequestMode, session_configuration_id: u16) -> Result<()> {
        let mut cmd = self.command(Command::SetRequest);
        cmd.add_u8(mode.bits()).add_u8((session_configuration_id >> 8) as u8).add_u8(session_configuration_id as u8);
        self.execute(&mut cmd).await?;
        Ok(())
    }

    /// `first` 0 requests the first part of the seed, 1 the remaining part
    pub async fn get_seed(&self, first: u8, resource: ResourceType) -> Result<SeedResponse> {
        let mut cmd = self.command(Command::GetSeed);
        cmd.add_u8(first).add_u8(resource.bits());
        self.execute_bytes(&mut cmd, |r| SeedResponse::read(r)).await
    }

    /// Send (part of) the key, `length` is the remaining key length, the total length on the first call
    /// Must follow a GET_SEED sequence for the same resource
    pub async fn unlock(&self, length: u8, key: &[u8]) -> Result<ResourceType> {
        let mut cmd = self.command(Command::Unlock);
        cmd.add_u8(length).add_u8_slice(key);
        self.execute_bytes(&mut cmd, |r| ResourceType::read(r)).await
    }

    pub async fn set_mta(&self, addr: u32, ext: u8) -> Result<()> {
        let mut cmd = self.command(Command::SetMta);
        cmd.add_u8(0).add_u8(0).add_u8(ext).add_u32(addr);
        self.execute(&mut cmd).await?;
        Ok(())
    }

    /// Upload `length` bytes from the MTA
    /// If one response can not carry `length` bytes, the slave sends the data in block mode
    pub async fn upload(&self, length: u8) -> Result<Bytes> {
        let mut cmd = self.command(Command::Upload);
        cmd.add_u8(length);
        let length = length as usize;
        let single = match self.connect_response.get() {
            Some(c) => length < c.max_cto as usize,
            None => true,
        };

        if single {
            let data = self.execute(&mut cmd).await?;
            return take_data(Command::Upload, data, length);
        }

        // Block mode, the follow up responses carry the counter of the request
        let ctr = self.next_counter();
        let mut rx = self.transport.start_block(ctr)?;
        let res = self.upload_block(&mut cmd, ctr, &mut rx, length).await;
        self.transport.stop_block();
        res
    }

    async fn upload_block(&self, cmd: &mut XcpCommandBuilder, ctr: u16, rx: &mut mpsc::UnboundedReceiver<crate::Frame>, length: usize) -> Result<Bytes> {
        let first = self.execute_with_counter(cmd, ctr).await?;
        let mut data = BytesMut::with_capacity(length);
        data.extend_from_slice(&first);
        while data.len() < length {
            match tokio::time::timeout(self.config.timeout, rx.recv()).await {
                Ok(Some(frame)) => {
                    let block = response_payload(Command::Upload, &frame)?;
                    trace!("UPLOAD block ctr = {}, {} bytes", frame.counter, block.len());
                    data.extend_from_slice(&block);
                }
                Ok(None) => return Err(XcpError::TransportClosed),
                Err(_) => return Err(XcpError::Timeout(Command::Upload)),
            }
        }
        debug!("UPLOAD block mode, {} bytes", length);
        data.truncate(length);
        Ok(data.freeze())
    }

    pub async fn short_upload(&self, length: u8, addr: u32, ext: u8) -> Result<Bytes> {
        let mut cmd = self.command(Command::ShortUpload);
        cmd.add_u8(length).add_u8(0).add_u8(ext).add_u32(addr);
        let data = self.execute(&mut cmd).await?;
        take_data(Command::ShortUpload, data, length as usize)
    }

    /// Checksum over `block_size` bytes starting at the MTA
    pub async fn build_checksum(&self, block_size: u32) -> Result<BuildChecksumResponse> {
        let mut cmd = self.command(Command::BuildChecksum);
        cmd.add_u8(0).add_u8(0).add_u8(0).add_u32(block_size);
        let res: BuildChecksumResponse = self.execute_decode(&mut cmd).await?;
        debug!("BUILD_CHECKSUM -> 0x{:08X} [{:?}]", res.checksum, res.checksum_type);
        Ok(res)
    }

    /// Transport layer specific command, returns the raw response payload
    pub async fn transport_layer_cmd(&self, sub_command: u8, data: &[u8]) -> Result<Bytes> {
        let mut cmd = self.command(Command::TransportLayerCmd);
        cmd.add_u8(sub_command).add_u8_slice(data);
        self.execute(&mut cmd).await
    }

    /// Vendor specific command, returns the raw response payload
    pub async fn user_cmd(&self, sub_command: u8, data: &[u8]) -> Result<Bytes> {
        let mut cmd = self.command(Command::UserCmd);
        cmd.add_u8(sub_command).add_u8_slice(data);
        self.execute(&mut cmd).await
    }

    pub async fn get_version(&self) -> Result<VersionResponse> {
        let mut cmd = self.command(Command::GetVersion);
        self.execute_bytes(&mut cmd, |r| VersionResponse::read(r)).await
    }

    //------------------------------------------------------------------------
    // Convenience functions, not XCP services

    /// Upload `length` bytes from the MTA with a sequence of UPLOAD commands
    /// Each chunk is at most MAX_CTO-1 bytes, or `limit_payload` if smaller (must be at least 8)
    pub async fn fetch(&self, length: usize, limit_payload: Option<usize>) -> Result<Bytes> {
        if let Some(limit) = limit_payload {
            if limit < 8 {
                return Err(XcpError::InvalidArgument(format!("payload must be at least 8 bytes, given {}", limit)));
            }
        }
        let max_payload = self.max_cto()? as usize - 1;
        let chunk_size = limit_payload.map_or(max_payload, |limit| limit.min(max_payload));

        let mut result = BytesMut::with_capacity(length);
        let mut remaining = length;
        while remaining > 0 {
            let n = remaining.min(chunk_size);
            // n < MAX_CTO <= 255
            let data = self.upload(n as u8).await?;
            result.extend_from_slice(&data);
            remaining -= n;
        }
        Ok(result.freeze())
    }

    /// Compare the slave checksum of a memory range with a checksum over the same range uploaded
    /// A failing command is reported as a Sequence error with its step: 1 SET_MTA, 2 BUILD_CHECKSUM, 3 SET_MTA, 4 UPLOAD
    pub async fn verify(&self, addr: u32, length: u32) -> Result<VerifyReport> {
        self.set_mta(addr, 0).await.map_err(verify_step(1))?;
        let cs = self.build_checksum(length).await.map_err(verify_step(2))?;
        self.set_mta(addr, 0).await.map_err(verify_step(3))?;
        let data = self.fetch(length as usize, None).await.map_err(verify_step(4))?;
        let local = self.local_checksum(&data, cs.checksum_type)?;
        debug!("verify: slave checksum 0x{:08X}, local checksum 0x{:08X}", cs.checksum, local);
        Ok(VerifyReport {
            checksum_type: cs.checksum_type,
            slave: cs.checksum,
            local,
        })
    }

    fn local_checksum(&self, data: &[u8], kind: ChecksumType) -> Result<u32> {
        if kind == ChecksumType::UserDefined {
            let f = self.user_checksum.lock().clone();
            return match f {
                Some(f) => Ok(f(data)),
                None => Err(XcpError::ChecksumUnsupported(kind)),
            };
        }
        checksum(data, kind, self.require_byte_order()?)
    }

    //------------------------------------------------------------------------
    // Close

    /// Close the transport, idempotent
    /// Callers waiting for a response fail with TransportClosed
    pub async fn close(&self) {
        self.connected.store(false, Ordering::Release);
        self.transport.close().await;
    }
}

fn verify_step(step: u8) -> impl FnOnce(XcpError) -> XcpError {
    move |e| {
        debug!("verify: step {} failed, {}", step, e);
        XcpError::Sequence {
            sequence: "verify",
            step,
            source: Box::new(e),
        }
    }
}

/// Payload of a positive response, an ERR response is decoded into SlaveRejected
fn response_payload(command: Command, frame: &crate::Frame) -> Result<Bytes> {
    match frame.pid().map(Pid::from) {
        Some(Pid::Ok) => Ok(frame.data()),
        Some(Pid::Err) => {
            let code = frame
                .payload
                .get(1)
                .map(|c| ErrorCode::from(*c))
                .ok_or_else(|| XcpError::Malformed(format!("{} error response without error code", command)))?;
            debug!("{} -> {}", command, code);
            Err(XcpError::SlaveRejected { command, code })
        }
        _ => Err(XcpError::Malformed(format!("{} response with unexpected PID {:?}", command, frame.pid()))),
    }
}

/// Data elements of an upload response, the slave may append alignment bytes
fn take_data(command: Command, data: Bytes, length: usize) -> Result<Bytes> {
    if data.len() < length {
        return Err(XcpError::Malformed(format!("{} returned {} bytes, {} requested", command, data.len(), length)));
    }
    Ok(data.slice(..length))
}

/// Check a data block fits the one byte length parameter of a command
fn data_len(command: Command, data: &[u8]) -> Result<u8> {
    u8::try_from(data.len()).map_err(|_| XcpError::InvalidArgument(format!("{} data length {} exceeds 255", command, data.len())))
}

//----------------------------------------------------------------------------------------------
