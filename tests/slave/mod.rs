//-----------------------------------------------------------------------------
// Module slave
// Scripted XCP slave on localhost TCP or UDP, used by the integration tests
// Implements a 64 KiB memory with MTA, checksum, calibration pages, a few DAQ and PGM commands and
// options to misbehave (ignore commands, reject commands, answer out of order, corrupt uploads)

#![allow(dead_code)]
#![allow(unused_imports)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, trace, warn};
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UdpSocket};
use tokio::task::JoinHandle;

use xcp_master::codec::{XcpReader, XcpWriter};
use xcp_master::protocol::event::SERV_TEXT;
use xcp_master::protocol::{PID_EV, PID_SERV};
use xcp_master::transport::frame::{encode_frame, split_datagram, FrameAssembler};
use xcp_master::*;

//-----------------------------------------------------------------------------

// Logging
pub const OPTION_LOG_LEVEL: XcpLogLevel = XcpLogLevel::Info;

pub const MEMORY_SIZE: usize = 0x10000;

pub const SLAVE_ID: &str = "XCP_TEST_SLAVE";

/// Key expected by UNLOCK, the seed is [1,2,3,4]
pub const SEED: [u8; 4] = [1, 2, 3, 4];
pub const KEY: [u8; 4] = [4, 3, 2, 1];

pub const ERR_CMD_SYNCH: u8 = 0x00;
pub const ERR_CMD_UNKNOWN: u8 = 0x20;
pub const ERR_OUT_OF_RANGE: u8 = 0x22;
pub const ERR_ACCESS_LOCKED: u8 = 0x25;
pub const ERR_SEQUENCE: u8 = 0x29;

/// Initialize env_logger once per test binary
pub fn test_setup() {
    let _ = env_logger::Builder::new().filter_level(OPTION_LOG_LEVEL.to_log_level_filter()).is_test(true).try_init();
}

/// Memory content at an address
pub fn pattern(addr: usize) -> u8 {
    (addr as u8) ^ ((addr >> 8) as u8).wrapping_mul(7)
}

pub fn pattern_range(addr: u32, len: usize) -> Vec<u8> {
    (addr as usize..addr as usize + len).map(pattern).collect()
}

/// EV packet
pub fn event_packet(code: u8, data: &[u8]) -> Vec<u8> {
    let mut p = vec![PID_EV, code];
    p.extend_from_slice(data);
    p
}

/// SERV_TEXT packet, the text is NUL terminated
pub fn service_text_packet(text: &str) -> Vec<u8> {
    let mut p = vec![PID_SERV, SERV_TEXT];
    p.extend_from_slice(text.as_bytes());
    p.push(0);
    p
}

//-----------------------------------------------------------------------------
// Slave behaviour

#[derive(Debug, Clone)]
pub struct SlaveConfig {
    pub transport: XcpTransportLayer,
    pub byte_order: ByteOrder,
    pub max_cto: u8,
    pub max_dto: u16,
    pub resource: ResourceType,
    pub checksum_type: ChecksumType,
    /// Reported instead of the computed checksum
    pub checksum_value: Option<u32>,
    /// Address of a byte delivered inverted by UPLOAD and SHORT_UPLOAD
    pub corrupt_addr: Option<u32>,
    /// Commands never answered
    pub ignore: Vec<Command>,
    /// A CONNECT while connected is not answered
    pub ignore_repeated_connect: bool,
    /// Commands rejected with an error code
    pub reject: Vec<(Command, u8)>,
    /// The n-th (counted from 1) reception of a command is rejected with an error code
    pub reject_nth: Option<(Command, usize, u8)>,
    /// Packets sent with the same counter before the response to a command
    pub send_before: Vec<(Command, Vec<u8>)>,
    /// Hold SHORT_UPLOAD responses until this many arrived, then answer them in reverse order
    pub reverse_batch: usize,
    /// Responses to the first command are sent late, just before the response to the second one
    pub hold: Option<(Command, Command)>,
    /// A block mode UPLOAD is aborted with this error code after the first response
    pub block_error: Option<u8>,
}

impl Default for SlaveConfig {
    fn default() -> Self {
        SlaveConfig {
            transport: XcpTransportLayer::Tcp,
            byte_order: ByteOrder::Intel,
            max_cto: 64,
            max_dto: 1024,
            resource: ResourceType::CALPAG | ResourceType::DAQ | ResourceType::PGM,
            checksum_type: ChecksumType::Crc16,
            checksum_value: None,
            corrupt_addr: None,
            ignore: Vec::new(),
            ignore_repeated_connect: false,
            reject: Vec::new(),
            reject_nth: None,
            send_before: Vec::new(),
            reverse_batch: 0,
            hold: None,
            block_error: None,
        }
    }
}

/// Everything the slave received and did, for assertions
#[derive(Debug, Default)]
pub struct SlaveLog {
    pub commands: Vec<Command>,
    pub upload_sizes: Vec<u8>,
}

struct SlaveState {
    config: SlaveConfig,
    memory: Vec<u8>,
    mta: u32,
    connected: bool,
    cal_page: u8,
    segment_mode: u8,
    packed_mode: DaqPackedMode,
    odt_entries: Vec<OdtEntry>,
    daq_ptr: usize,
    daq_running: bool,
    protection: ResourceType,
    log: Arc<Mutex<SlaveLog>>,
}

fn ok(payload: &[u8]) -> Vec<u8> {
    let mut p = Vec::with_capacity(payload.len() + 1);
    p.push(0xFF);
    p.extend_from_slice(payload);
    p
}

fn err(code: u8) -> Vec<u8> {
    vec![0xFE, code]
}

impl SlaveState {
    fn new(config: SlaveConfig, log: Arc<Mutex<SlaveLog>>) -> SlaveState {
        let protection = ResourceType::PGM & config.resource;
        SlaveState {
            config,
            memory: (0..MEMORY_SIZE).map(pattern).collect(),
            mta: 0,
            connected: false,
            cal_page: 0,
            segment_mode: 0,
            packed_mode: DaqPackedMode::None,
            odt_entries: Vec::new(),
            daq_ptr: 0,
            daq_running: false,
            protection,
            log,
        }
    }

    fn order(&self) -> ByteOrder {
        self.config.byte_order
    }

    fn range(&self, addr: u32, len: usize) -> Option<std::ops::Range<usize>> {
        let start = addr as usize;
        let end = start.checked_add(len)?;
        if end > MEMORY_SIZE {
            None
        } else {
            Some(start..end)
        }
    }

    fn read_memory(&self, addr: u32, len: usize) -> Option<Vec<u8>> {
        let range = self.range(addr, len)?;
        let mut data = self.memory[range].to_vec();
        if let Some(c) = self.config.corrupt_addr {
            if c >= addr && (c as usize) < addr as usize + len {
                data[(c - addr) as usize] ^= 0xFF;
            }
        }
        Some(data)
    }

    fn write_memory(&mut self, addr: u32, data: &[u8]) -> bool {
        match self.range(addr, data.len()) {
            Some(range) => {
                self.memory[range].copy_from_slice(data);
                true
            }
            None => false,
        }
    }

    /// Handle one command packet, returns the packets to send with the request counter
    fn handle(&mut self, packet: &[u8]) -> Vec<Vec<u8>> {
        let Some(command) = Command::from_packet(packet) else {
            warn!("slave: unknown command {:02X?}", packet);
            return vec![err(ERR_CMD_UNKNOWN)];
        };
        self.log.lock().commands.push(command);
        debug!("slave: {}", command);

        if self.config.ignore.contains(&command) {
            return Vec::new();
        }
        if command == Command::Connect && self.connected && self.config.ignore_repeated_connect {
            return Vec::new();
        }

        let mut out: Vec<Vec<u8>> = self.config.send_before.iter().filter(|(c, _)| *c == command).map(|(_, p)| p.clone()).collect();

        if let Some((_, code)) = self.config.reject.iter().find(|(c, _)| *c == command) {
            out.push(err(*code));
            return out;
        }
        if let Some((c, n, code)) = self.config.reject_nth {
            if c == command && self.log.lock().commands.iter().filter(|x| **x == c).count() == n {
                out.push(err(code));
                return out;
            }
        }

        let params = &packet[command.opcode_width()..];
        let mut r = XcpReader::new("slave", params, self.order());
        match self.execute(command, &mut r) {
            Ok(mut responses) => out.append(&mut responses),
            Err(_) => out.push(err(ERR_OUT_OF_RANGE)),
        }
        out
    }

    fn execute(&mut self, command: Command, r: &mut XcpReader) -> Result<Vec<Vec<u8>>> {
        let order = self.order();
        let mut w = XcpWriter::new(order);
        match command {
            Command::Connect => {
                self.connected = true;
                let mut comm_mode_basic = CommModeBasic::SLAVE_BLOCK_MODE;
                if order == ByteOrder::Motorola {
                    comm_mode_basic |= CommModeBasic::BYTE_ORDER;
                }
                ConnectResponse {
                    resource: self.config.resource,
                    comm_mode_basic,
                    max_cto: self.config.max_cto,
                    max_dto: self.config.max_dto,
                    protocol_layer_version: 1,
                    transport_layer_version: 1,
                }
                .write(&mut w);
            }
            Command::Disconnect => {
                self.connected = false;
            }
            Command::GetStatus => {
                let mut session_status = SessionStatus::empty();
                if self.daq_running {
                    session_status |= SessionStatus::DAQ_RUNNING;
                }
                StatusResponse {
                    session_status,
                    resource_protection: self.protection,
                    session_configuration_id: 0x1234,
                }
                .write(&mut w);
            }
            Command::Synch => return Ok(vec![err(ERR_CMD_SYNCH)]),
            Command::GetCommModeInfo => CommModeInfo {
                comm_mode_optional: CommModeOptional::empty(),
                max_bs: 0,
                min_st: 0,
                queue_size: 0,
                driver_version: 0x10,
            }
            .write(&mut w),
            Command::GetVersion => VersionResponse {
                protocol_major: 1,
                protocol_minor: 4,
                transport_major: 1,
                transport_minor: 5,
            }
            .write(&mut w),
            Command::GetId => {
                let mode = r.u8()?;
                if mode == 1 {
                    IdResponse {
                        mode: 1,
                        length: SLAVE_ID.len() as u32,
                        identification: Some(bytes::Bytes::from_static(SLAVE_ID.as_bytes())),
                    }
                    .write(&mut w);
                } else {
                    // Identification is uploaded from the MTA
                    self.mta = 0x100;
                    self.write_memory(0x100, SLAVE_ID.as_bytes());
                    IdResponse {
                        mode: 0,
                        length: SLAVE_ID.len() as u32,
                        identification: None,
                    }
                    .write(&mut w);
                }
            }
            Command::SetRequest => {}
            Command::GetSeed => {
                let _first = r.u8()?;
                let resource = ResourceType::from_bits_retain(r.u8()?);
                if self.protection.contains(resource) {
                    SeedResponse {
                        length: SEED.len() as u8,
                        seed: bytes::Bytes::from_static(&SEED),
                    }
                    .write(&mut w);
                } else {
                    // Not protected, no key needed
                    w.u8(0);
                }
            }
            Command::Unlock => {
                let len = r.u8()? as usize;
                let key = r.bytes(len)?;
                if key != KEY.as_slice() {
                    return Ok(vec![err(ERR_ACCESS_LOCKED)]);
                }
                self.protection = ResourceType::empty();
                w.u8(self.protection.bits());
            }
            Command::SetMta => {
                r.skip(2)?;
                let _ext = r.u8()?;
                self.mta = r.u32()?;
            }
            Command::Upload => {
                let len = r.u8()?;
                self.log.lock().upload_sizes.push(len);
                let Some(data) = self.read_memory(self.mta, len as usize) else {
                    return Ok(vec![err(ERR_OUT_OF_RANGE)]);
                };
                self.mta += len as u32;
                if data.is_empty() {
                    return Ok(vec![ok(&[])]);
                }
                // Block mode if the data does not fit into one response
                let mut blocks: Vec<Vec<u8>> = data.chunks(self.config.max_cto as usize - 1).map(ok).collect();
                if let Some(code) = self.config.block_error {
                    if blocks.len() > 1 {
                        blocks.truncate(1);
                        blocks.push(err(code));
                    }
                }
                return Ok(blocks);
            }
            Command::ShortUpload => {
                let len = r.u8()?;
                r.skip(1)?;
                let _ext = r.u8()?;
                let addr = r.u32()?;
                let Some(data) = self.read_memory(addr, len as usize) else {
                    return Ok(vec![err(ERR_OUT_OF_RANGE)]);
                };
                w.slice(&data);
            }
            Command::BuildChecksum => {
                r.skip(3)?;
                let size = r.u32()? as usize;
                let Some(range) = self.range(self.mta, size) else {
                    return Ok(vec![err(ERR_OUT_OF_RANGE)]);
                };
                let value = match self.config.checksum_value {
                    Some(v) => v,
                    None => checksum(&self.memory[range], self.config.checksum_type, order)?,
                };
                BuildChecksumResponse {
                    checksum_type: self.config.checksum_type,
                    checksum: value,
                }
                .write(&mut w);
            }
            Command::UserCmd | Command::TransportLayerCmd => {
                // Echo
                w.slice(r.rest());
            }

            // CAL
            Command::Download | Command::DownloadNext | Command::Program | Command::ProgramNext => {
                let len = r.u8()? as usize;
                let data = r.bytes(len)?.to_vec();
                if !self.write_memory(self.mta, &data) {
                    return Ok(vec![err(ERR_OUT_OF_RANGE)]);
                }
                self.mta += len as u32;
            }
            Command::DownloadMax | Command::ProgramMax => {
                let data = r.rest().to_vec();
                if !self.write_memory(self.mta, &data) {
                    return Ok(vec![err(ERR_OUT_OF_RANGE)]);
                }
                self.mta += data.len() as u32;
            }
            Command::ShortDownload => {
                let len = r.u8()? as usize;
                r.skip(1)?;
                let _ext = r.u8()?;
                let addr = r.u32()?;
                let data = r.bytes(len)?.to_vec();
                if !self.write_memory(addr, &data) {
                    return Ok(vec![err(ERR_OUT_OF_RANGE)]);
                }
            }
            Command::ModifyBits => {
                let shift = r.u8()?;
                let and_mask = r.u16()? as u32;
                let xor_mask = r.u16()? as u32;
                let Some(range) = self.range(self.mta, 4) else {
                    return Ok(vec![err(ERR_OUT_OF_RANGE)]);
                };
                let x = order.unpack_dword(&self.memory[range.clone()])?;
                let x = (x & !(and_mask << shift)) ^ (xor_mask << shift);
                self.memory[range].copy_from_slice(&order.pack_dword(x));
            }

            // PAG
            Command::SetCalPage => {
                let _mode = r.u8()?;
                let segment = r.u8()?;
                let page = r.u8()?;
                if segment != 0 || page > 1 {
                    return Ok(vec![err(0x26)]);
                }
                self.cal_page = page;
            }
            Command::GetCalPage => {
                w.zeros(2).u8(self.cal_page);
            }
            Command::GetPagProcessorInfo => PagProcessorInfo {
                max_segments: 1,
                pag_properties: PagProperties::FREEZE_SUPPORTED,
            }
            .write(&mut w),
            Command::GetSegmentInfo => {
                let mode = SegmentInfoMode::from_value(r.u8()?)?;
                let info = match mode {
                    SegmentInfoMode::BasicAddress => SegmentInfo::BasicAddress { basic_info: 0x8000_0000 },
                    SegmentInfoMode::Standard => SegmentInfo::Standard {
                        max_pages: 2,
                        address_extension: 0,
                        max_mapping: 0,
                        compression_method: 0,
                        encryption_method: 0,
                    },
                    SegmentInfoMode::AddressMapping => SegmentInfo::AddressMapping { mapping_info: 0 },
                };
                w.slice(&info.encode(order));
            }
            Command::GetPageInfo => PageInfo {
                properties: PageProperties::ECU_ACCESS_WITHOUT_XCP | PageProperties::XCP_READ_ACCESS_WITHOUT_ECU,
                init_segment: 0,
            }
            .write(&mut w),
            Command::SetSegmentMode => {
                self.segment_mode = r.u8()?;
            }
            Command::GetSegmentMode => {
                w.zeros(1).u8(self.segment_mode);
            }
            Command::CopyCalPage => {}

            // DAQ
            Command::FreeDaq | Command::AllocDaq | Command::AllocOdt | Command::AllocOdtEntry => {}
            Command::ClearDaqList | Command::SetDaqListMode => {}
            Command::SetDaqPtr => {
                // Single ODT, the entry number is the index
                r.skip(4)?;
                self.daq_ptr = r.u8()? as usize;
            }
            Command::WriteDaq => {
                let entry = OdtEntry::read(r)?;
                if self.odt_entries.len() <= self.daq_ptr {
                    self.odt_entries.resize(self.daq_ptr + 1, entry);
                }
                self.odt_entries[self.daq_ptr] = entry;
                self.daq_ptr += 1;
            }
            Command::ReadDaq => {
                let Some(entry) = self.odt_entries.get(self.daq_ptr).copied() else {
                    return Ok(vec![err(ERR_OUT_OF_RANGE)]);
                };
                self.daq_ptr += 1;
                entry.write(&mut w);
            }
            Command::StartStopDaqList => {
                let mode = r.u8()?;
                let daq = r.u16()?;
                if mode == 1 {
                    self.daq_running = true;
                }
                w.u8(daq as u8 * 4);
            }
            Command::StartStopSynch => {
                self.daq_running = r.u8()? == 1;
            }
            Command::GetDaqClock => DaqClock { timestamp: 0x1234_5678 }.write(&mut w),
            Command::GetDaqProcessorInfo => DaqProcessorInfo {
                daq_properties: DaqProperties::DAQ_CONFIG_TYPE | DaqProperties::TIMESTAMP_SUPPORTED,
                max_daq: 0,
                max_event_channel: 2,
                min_daq: 0,
                daq_key_byte: DaqKeyByte {
                    identification_field: IdentificationField::RelOdtNumberAbsDaqListNumberWordAligned,
                    address_extension: AddressExtensionMode::SameForAllDaq,
                    optimisation_type: OptimisationType::Default,
                },
            }
            .write(&mut w),
            Command::SetDaqPackedMode => {
                let _daq = r.u16()?;
                self.packed_mode = DaqPackedMode::read_mode(r)?;
            }
            Command::GetDaqPackedMode => {
                let _daq = r.u16()?;
                self.packed_mode.write(&mut w);
            }

            // PGM
            Command::ProgramStart => ProgramStartResponse {
                comm_mode_pgm: CommModePgm::empty(),
                max_cto_pgm: self.config.max_cto,
                max_bs_pgm: 0,
                min_st_pgm: 0,
                queue_size_pgm: 0,
            }
            .write(&mut w),
            Command::ProgramClear => {
                let _mode = r.u8()?;
                r.skip(2)?;
                let size = r.u32()? as usize;
                let Some(range) = self.range(self.mta, size) else {
                    return Ok(vec![err(ERR_OUT_OF_RANGE)]);
                };
                self.memory[range].fill(0xFF);
            }
            Command::ProgramReset => {
                self.connected = false;
            }

            _ => return Ok(vec![err(ERR_CMD_UNKNOWN)]),
        }
        Ok(vec![ok(&w.to_vec())])
    }
}

//-----------------------------------------------------------------------------
// Slave task

pub struct TestSlave {
    pub addr: SocketAddr,
    log: Arc<Mutex<SlaveLog>>,
    task: JoinHandle<()>,
}

impl TestSlave {
    /// Bind an ephemeral localhost port and serve one master
    pub async fn start(config: SlaveConfig) -> TestSlave {
        let log = Arc::new(Mutex::new(SlaveLog::default()));
        let state = SlaveState::new(config.clone(), Arc::clone(&log));
        let (addr, task) = match config.transport {
            XcpTransportLayer::Tcp => {
                let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
                let addr = listener.local_addr().unwrap();
                (addr, tokio::spawn(serve_tcp(listener, state)))
            }
            XcpTransportLayer::Udp => {
                let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
                let addr = socket.local_addr().unwrap();
                (addr, tokio::spawn(serve_udp(socket, state)))
            }
        };
        info!("slave: listening on {} {}", config.transport.protocol_name(), addr);
        TestSlave { addr, log, task }
    }

    /// Master configuration for this slave
    pub fn master_config(&self, transport: XcpTransportLayer, timeout: Duration) -> XcpConfig {
        XcpMasterBuilder::new()
            .set_transport(transport)
            .set_host("127.0.0.1")
            .set_port(self.addr.port())
            .set_timeout(timeout)
            .set_log_level(OPTION_LOG_LEVEL)
            .build()
    }

    pub fn commands(&self) -> Vec<Command> {
        self.log.lock().commands.clone()
    }

    pub fn upload_sizes(&self) -> Vec<u8> {
        self.log.lock().upload_sizes.clone()
    }

    /// Stop serving, a TCP connection is closed
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for TestSlave {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// Collects responses, optionally holding SHORT_UPLOAD responses back to answer them in reverse order
struct ResponseQueue {
    batch: usize,
    held: Vec<Vec<Vec<u8>>>,
    hold: Option<(Command, Command)>,
    late: Vec<Vec<u8>>,
}

impl ResponseQueue {
    fn new(config: &SlaveConfig) -> ResponseQueue {
        ResponseQueue {
            batch: config.reverse_batch,
            held: Vec::new(),
            hold: config.hold,
            late: Vec::new(),
        }
    }

    /// Messages of one request, returns the messages ready to be sent
    fn push(&mut self, request: &Frame, packets: Vec<Vec<u8>>) -> Vec<Vec<u8>> {
        let command = Command::from_packet(&request.payload);
        let mut messages: Vec<Vec<u8>> = packets.iter().map(|p| encode_frame(request.counter, p).to_vec()).collect();
        if let Some((held, release)) = self.hold {
            if command == Some(held) {
                self.late.append(&mut messages);
                return Vec::new();
            }
            if command == Some(release) && !self.late.is_empty() {
                let mut late = std::mem::take(&mut self.late);
                late.append(&mut messages);
                messages = late;
            }
        }
        if self.batch <= 1 || command != Some(Command::ShortUpload) {
            return messages;
        }
        self.held.push(messages);
        if self.held.len() < self.batch {
            return Vec::new();
        }
        self.held.drain(..).rev().flatten().collect()
    }
}

async fn serve_tcp(listener: TcpListener, mut state: SlaveState) {
    let (mut stream, peer) = match listener.accept().await {
        Ok(s) => s,
        Err(e) => {
            error!("slave: accept failed, {}", e);
            return;
        }
    };
    debug!("slave: master connected from {}", peer);
    let mut assembler = FrameAssembler::new();
    let mut queue = ResponseQueue::new(&state.config);
    let mut buf = vec![0u8; 4096];
    loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) | Err(_) => {
                debug!("slave: master disconnected");
                return;
            }
            Ok(n) => n,
        };
        let mut out = Vec::new();
        for frame in assembler.push(&buf[..n]) {
            let packets = state.handle(&frame.payload);
            for m in queue.push(&frame, packets) {
                out.extend_from_slice(&m);
            }
        }
        if !out.is_empty() && stream.write_all(&out).await.is_err() {
            return;
        }
    }
}

async fn serve_udp(socket: UdpSocket, mut state: SlaveState) {
    let mut queue = ResponseQueue::new(&state.config);
    let mut buf = vec![0u8; 4096];
    loop {
        let (n, peer) = match socket.recv_from(&mut buf).await {
            Ok(r) => r,
            Err(e) => {
                error!("slave: recv failed, {}", e);
                return;
            }
        };
        for frame in split_datagram(&buf[..n]) {
            let packets = state.handle(&frame.payload);
            for m in queue.push(&frame, packets) {
                if socket.send_to(&m, peer).await.is_err() {
                    return;
                }
            }
        }
    }
}
