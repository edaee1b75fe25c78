//----------------------------------------------------------------------------------------------
// Module protocol
// XCP protocol definitions: command catalog, packet identifiers, error codes and command building

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::ByteOrder;
use crate::error::{Result, XcpError};

// Submodule types, response layouts
pub mod types;

// Submodule event, asynchronous EV, SERV and DAQ packets
pub mod event;

//----------------------------------------------------------------------------------------------
// Command category

/// Resource group a command belongs to, used to decide which resource must be unlocked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandCategory {
    Std = 0,
    Cal = 1,
    Pag = 2,
    Daq = 3,
    Pgm = 4,
}

//----------------------------------------------------------------------------------------------
// Command codes

/// XCP command codes
/// Standard commands use a one byte code (0xFF down to 0xC5), extended commands a two byte code 0xC0xx
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Command {
    // STD
    Connect = 0xFF,
    Disconnect = 0xFE,
    GetStatus = 0xFD,
    Synch = 0xFC,
    GetCommModeInfo = 0xFB,
    GetId = 0xFA,
    SetRequest = 0xF9,
    GetSeed = 0xF8,
    Unlock = 0xF7,
    SetMta = 0xF6,
    Upload = 0xF5,
    ShortUpload = 0xF4,
    BuildChecksum = 0xF3,
    TransportLayerCmd = 0xF2,
    UserCmd = 0xF1,
    GetVersion = 0xC000,

    // CAL
    Download = 0xF0,
    DownloadNext = 0xEF,
    DownloadMax = 0xEE,
    ShortDownload = 0xED,
    ModifyBits = 0xEC,

    // PAG
    SetCalPage = 0xEB,
    GetCalPage = 0xEA,
    GetPagProcessorInfo = 0xE9,
    GetSegmentInfo = 0xE8,
    GetPageInfo = 0xE7,
    SetSegmentMode = 0xE6,
    GetSegmentMode = 0xE5,
    CopyCalPage = 0xE4,

    // DAQ
    ClearDaqList = 0xE3,
    SetDaqPtr = 0xE2,
    WriteDaq = 0xE1,
    SetDaqListMode = 0xE0,
    GetDaqListMode = 0xDF,
    StartStopDaqList = 0xDE,
    StartStopSynch = 0xDD,
    GetDaqClock = 0xDC,
    ReadDaq = 0xDB,
    GetDaqProcessorInfo = 0xDA,
    GetDaqResolutionInfo = 0xD9,
    GetDaqListInfo = 0xD8,
    GetDaqEventInfo = 0xD7,
    FreeDaq = 0xD6,
    AllocDaq = 0xD5,
    AllocOdt = 0xD4,
    AllocOdtEntry = 0xD3,
    WriteDaqMultiple = 0xC7,
    DtoCtrProperties = 0xC5,
    SetDaqPackedMode = 0xC001,
    GetDaqPackedMode = 0xC002,

    // PGM
    ProgramStart = 0xD2,
    ProgramClear = 0xD1,
    Program = 0xD0,
    ProgramReset = 0xCF,
    GetPgmProcessorInfo = 0xCE,
    GetSectorInfo = 0xCD,
    ProgramPrepare = 0xCC,
    ProgramFormat = 0xCB,
    ProgramNext = 0xCA,
    ProgramMax = 0xC9,
    ProgramVerify = 0xC8,

    // Time correlation
    TimeCorrelationProperties = 0xC6,
}

/// Prefix byte of all two byte command codes
pub const CC_EXTENDED: u8 = 0xC0;

impl Command {
    /// All commands of the catalog
    pub const ALL: [Command; 62] = [
        Command::Connect,
        Command::Disconnect,
        Command::GetStatus,
        Command::Synch,
        Command::GetCommModeInfo,
        Command::GetId,
        Command::SetRequest,
        Command::GetSeed,
        Command::Unlock,
        Command::SetMta,
        Command::Upload,
        Command::ShortUpload,
        Command::BuildChecksum,
        Command::TransportLayerCmd,
        Command::UserCmd,
        Command::GetVersion,
        Command::Download,
        Command::DownloadNext,
        Command::DownloadMax,
        Command::ShortDownload,
        Command::ModifyBits,
        Command::SetCalPage,
        Command::GetCalPage,
        Command::GetPagProcessorInfo,
        Command::GetSegmentInfo,
        Command::GetPageInfo,
        Command::SetSegmentMode,
        Command::GetSegmentMode,
        Command::CopyCalPage,
        Command::ClearDaqList,
        Command::SetDaqPtr,
        Command::WriteDaq,
        Command::SetDaqListMode,
        Command::GetDaqListMode,
        Command::StartStopDaqList,
        Command::StartStopSynch,
        Command::GetDaqClock,
        Command::ReadDaq,
        Command::GetDaqProcessorInfo,
        Command::GetDaqResolutionInfo,
        Command::GetDaqListInfo,
        Command::GetDaqEventInfo,
        Command::FreeDaq,
        Command::AllocDaq,
        Command::AllocOdt,
        Command::AllocOdtEntry,
        Command::WriteDaqMultiple,
        Command::DtoCtrProperties,
        Command::SetDaqPackedMode,
        Command::GetDaqPackedMode,
        Command::ProgramStart,
        Command::ProgramClear,
        Command::Program,
        Command::ProgramReset,
        Command::GetPgmProcessorInfo,
        Command::GetSectorInfo,
        Command::ProgramPrepare,
        Command::ProgramFormat,
        Command::ProgramNext,
        Command::ProgramMax,
        Command::ProgramVerify,
        Command::TimeCorrelationProperties,
    ];

    /// Numeric command code, 0xC0xx for two byte codes
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Number of bytes the command code occupies on the wire
    pub fn opcode_width(self) -> usize {
        if self.code() >= 0xC000 {
            2
        } else {
            1
        }
    }

    /// Command code as it appears on the wire, the 0xC0 prefix comes first
    pub fn opcode_bytes(self) -> ([u8; 2], usize) {
        let code = self.code();
        if self.opcode_width() == 2 {
            ([(code >> 8) as u8, code as u8], 2)
        } else {
            ([code as u8, 0], 1)
        }
    }

    /// Look up a command by its numeric code
    pub fn from_code(code: u16) -> Option<Command> {
        Command::ALL.iter().copied().find(|c| c.code() == code)
    }

    /// Decode the command code at the start of a command packet
    pub fn from_packet(packet: &[u8]) -> Option<Command> {
        match packet {
            [CC_EXTENDED, sub, ..] => Command::from_code(0xC000 | *sub as u16),
            [cc, ..] => Command::from_code(*cc as u16),
            [] => None,
        }
    }

    pub fn category(self) -> CommandCategory {
        use Command::*;
        match self {
            Connect | Disconnect | GetStatus | Synch | GetCommModeInfo | GetId | SetRequest | GetSeed | Unlock | SetMta | Upload | ShortUpload | BuildChecksum
            | TransportLayerCmd | UserCmd | GetVersion | TimeCorrelationProperties => CommandCategory::Std,
            Download | DownloadNext | DownloadMax | ShortDownload | ModifyBits => CommandCategory::Cal,
            SetCalPage | GetCalPage | GetPagProcessorInfo | GetSegmentInfo | GetPageInfo | SetSegmentMode | GetSegmentMode | CopyCalPage => CommandCategory::Pag,
            ClearDaqList | SetDaqPtr | WriteDaq | SetDaqListMode | GetDaqListMode | StartStopDaqList | StartStopSynch | GetDaqClock | ReadDaq | GetDaqProcessorInfo
            | GetDaqResolutionInfo | GetDaqListInfo | GetDaqEventInfo | FreeDaq | AllocDaq | AllocOdt | AllocOdtEntry | WriteDaqMultiple | DtoCtrProperties
            | SetDaqPackedMode | GetDaqPackedMode => CommandCategory::Daq,
            ProgramStart | ProgramClear | Program | ProgramReset | GetPgmProcessorInfo | GetSectorInfo | ProgramPrepare | ProgramFormat | ProgramNext | ProgramMax
            | ProgramVerify => CommandCategory::Pgm,
        }
    }

    /// Layout of the positive response payload
    pub fn response_layout(self) -> ResponseLayout {
        use Command::*;
        match self {
            Connect => ResponseLayout::Connect,
            GetStatus => ResponseLayout::GetStatus,
            GetCommModeInfo => ResponseLayout::GetCommModeInfo,
            GetId => ResponseLayout::GetId,
            GetSeed => ResponseLayout::GetSeed,
            Unlock => ResponseLayout::ResourceProtection,
            Upload | ShortUpload => ResponseLayout::Data,
            BuildChecksum => ResponseLayout::BuildChecksum,
            GetVersion => ResponseLayout::GetVersion,
            GetCalPage => ResponseLayout::GetCalPage,
            GetPagProcessorInfo => ResponseLayout::GetPagProcessorInfo,
            GetSegmentInfo => ResponseLayout::SegmentInfo,
            GetPageInfo => ResponseLayout::PageInfo,
            GetSegmentMode => ResponseLayout::GetSegmentMode,
            GetDaqListMode => ResponseLayout::GetDaqListMode,
            StartStopDaqList => ResponseLayout::StartStopDaqList,
            GetDaqClock => ResponseLayout::GetDaqClock,
            ReadDaq => ResponseLayout::ReadDaq,
            GetDaqProcessorInfo => ResponseLayout::GetDaqProcessorInfo,
            GetDaqResolutionInfo => ResponseLayout::GetDaqResolutionInfo,
            GetDaqListInfo => ResponseLayout::GetDaqListInfo,
            GetDaqEventInfo => ResponseLayout::GetDaqEventInfo,
            GetDaqPackedMode => ResponseLayout::GetDaqPackedMode,
            ProgramStart => ResponseLayout::ProgramStart,
            GetPgmProcessorInfo => ResponseLayout::GetPgmProcessorInfo,
            GetSectorInfo => ResponseLayout::SectorInfo,
            TransportLayerCmd | UserCmd | DtoCtrProperties | TimeCorrelationProperties => ResponseLayout::Raw,
            _ => ResponseLayout::Ack,
        }
    }

    /// True if the response layout can only be selected with the mode byte the caller sent
    pub fn requires_mode(self) -> bool {
        self.response_layout().dispatch() == DispatchRule::ModeSelected
    }

    /// Command name as used in the XCP standard
    pub fn name(self) -> &'static str {
        use Command::*;
        match self {
            Connect => "CONNECT",
            Disconnect => "DISCONNECT",
            GetStatus => "GET_STATUS",
            Synch => "SYNCH",
            GetCommModeInfo => "GET_COMM_MODE_INFO",
            GetId => "GET_ID",
            SetRequest => "SET_REQUEST",
            GetSeed => "GET_SEED",
            Unlock => "UNLOCK",
            SetMta => "SET_MTA",
            Upload => "UPLOAD",
            ShortUpload => "SHORT_UPLOAD",
            BuildChecksum => "BUILD_CHECKSUM",
            TransportLayerCmd => "TRANSPORT_LAYER_CMD",
            UserCmd => "USER_CMD",
            GetVersion => "GET_VERSION",
            Download => "DOWNLOAD",
            DownloadNext => "DOWNLOAD_NEXT",
            DownloadMax => "DOWNLOAD_MAX",
            ShortDownload => "SHORT_DOWNLOAD",
            ModifyBits => "MODIFY_BITS",
            SetCalPage => "SET_CAL_PAGE",
            GetCalPage => "GET_CAL_PAGE",
            GetPagProcessorInfo => "GET_PAG_PROCESSOR_INFO",
            GetSegmentInfo => "GET_SEGMENT_INFO",
            GetPageInfo => "GET_PAGE_INFO",
            SetSegmentMode => "SET_SEGMENT_MODE",
            GetSegmentMode => "GET_SEGMENT_MODE",
            CopyCalPage => "COPY_CAL_PAGE",
            ClearDaqList => "CLEAR_DAQ_LIST",
            SetDaqPtr => "SET_DAQ_PTR",
            WriteDaq => "WRITE_DAQ",
            SetDaqListMode => "SET_DAQ_LIST_MODE",
            GetDaqListMode => "GET_DAQ_LIST_MODE",
            StartStopDaqList => "START_STOP_DAQ_LIST",
            StartStopSynch => "START_STOP_SYNCH",
            GetDaqClock => "GET_DAQ_CLOCK",
            ReadDaq => "READ_DAQ",
            GetDaqProcessorInfo => "GET_DAQ_PROCESSOR_INFO",
            GetDaqResolutionInfo => "GET_DAQ_RESOLUTION_INFO",
            GetDaqListInfo => "GET_DAQ_LIST_INFO",
            GetDaqEventInfo => "GET_DAQ_EVENT_INFO",
            FreeDaq => "FREE_DAQ",
            AllocDaq => "ALLOC_DAQ",
            AllocOdt => "ALLOC_ODT",
            AllocOdtEntry => "ALLOC_ODT_ENTRY",
            WriteDaqMultiple => "WRITE_DAQ_MULTIPLE",
            DtoCtrProperties => "DTO_CTR_PROPERTIES",
            SetDaqPackedMode => "SET_DAQ_PACKED_MODE",
            GetDaqPackedMode => "GET_DAQ_PACKED_MODE",
            ProgramStart => "PROGRAM_START",
            ProgramClear => "PROGRAM_CLEAR",
            Program => "PROGRAM",
            ProgramReset => "PROGRAM_RESET",
            GetPgmProcessorInfo => "GET_PGM_PROCESSOR_INFO",
            GetSectorInfo => "GET_SECTOR_INFO",
            ProgramPrepare => "PROGRAM_PREPARE",
            ProgramFormat => "PROGRAM_FORMAT",
            ProgramNext => "PROGRAM_NEXT",
            ProgramMax => "PROGRAM_MAX",
            ProgramVerify => "PROGRAM_VERIFY",
            TimeCorrelationProperties => "TIME_CORRELATION_PROPERTIES",
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

//----------------------------------------------------------------------------------------------
// Response layout selector

/// How the response layout of a command is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchRule {
    /// One fixed layout, possibly with fields conditional on earlier fields of the same message
    Fixed,
    /// The layout depends on the mode byte the caller put into the command
    ModeSelected,
    /// A bit flag byte followed by a plain byte, not a named structure
    FlagsAndByte,
}

/// Response layout of a positive response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseLayout {
    /// Positive acknowledge, payload ignored
    Ack,
    /// Command specific bytes returned as they are
    Raw,
    /// Uploaded data elements
    Data,
    Connect,
    GetStatus,
    GetCommModeInfo,
    GetId,
    GetSeed,
    ResourceProtection,
    BuildChecksum,
    GetVersion,
    GetCalPage,
    GetPagProcessorInfo,
    SegmentInfo,
    PageInfo,
    GetSegmentMode,
    GetDaqListMode,
    StartStopDaqList,
    GetDaqClock,
    ReadDaq,
    GetDaqProcessorInfo,
    GetDaqResolutionInfo,
    GetDaqListInfo,
    GetDaqEventInfo,
    GetDaqPackedMode,
    ProgramStart,
    GetPgmProcessorInfo,
    SectorInfo,
}

impl ResponseLayout {
    pub fn dispatch(self) -> DispatchRule {
        match self {
            ResponseLayout::SegmentInfo | ResponseLayout::SectorInfo => DispatchRule::ModeSelected,
            ResponseLayout::PageInfo => DispatchRule::FlagsAndByte,
            _ => DispatchRule::Fixed,
        }
    }

    /// True if decoding needs the negotiated byte order (the layout has WORD or DWORD fields)
    /// CONNECT carries its own byte order
    pub fn needs_byte_order(self) -> bool {
        !matches!(
            self,
            ResponseLayout::Ack
                | ResponseLayout::Connect
                | ResponseLayout::Raw
                | ResponseLayout::Data
                | ResponseLayout::GetSeed
                | ResponseLayout::ResourceProtection
                | ResponseLayout::GetCalPage
                | ResponseLayout::GetPagProcessorInfo
                | ResponseLayout::PageInfo
                | ResponseLayout::GetSegmentMode
                | ResponseLayout::StartStopDaqList
                | ResponseLayout::GetCommModeInfo
                | ResponseLayout::GetVersion
                | ResponseLayout::ProgramStart
                | ResponseLayout::GetPgmProcessorInfo
        )
    }
}

//----------------------------------------------------------------------------------------------
// Packet identifier, first byte of every slave packet

/// Response envelope discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pid {
    /// Positive command response
    Ok,
    /// Negative command response
    Err,
    /// Event packet
    Ev,
    /// Service request packet
    Serv,
    /// Data acquisition packet, the value is the absolute or relative ODT number
    Daq(u8),
}

pub const PID_RES: u8 = 0xFF;
pub const PID_ERR: u8 = 0xFE;
pub const PID_EV: u8 = 0xFD;
pub const PID_SERV: u8 = 0xFC;

impl From<u8> for Pid {
    fn from(pid: u8) -> Pid {
        match pid {
            PID_RES => Pid::Ok,
            PID_ERR => Pid::Err,
            PID_EV => Pid::Ev,
            PID_SERV => Pid::Serv,
            n => Pid::Daq(n),
        }
    }
}

impl Pid {
    pub fn to_u8(self) -> u8 {
        match self {
            Pid::Ok => PID_RES,
            Pid::Err => PID_ERR,
            Pid::Ev => PID_EV,
            Pid::Serv => PID_SERV,
            Pid::Daq(n) => n,
        }
    }

    /// OK and ERR packets answer a command, all others are asynchronous
    pub fn is_command_response(self) -> bool {
        matches!(self, Pid::Ok | Pid::Err)
    }
}

//----------------------------------------------------------------------------------------------
// XCP error codes

/// Error code of an ERR packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    CmdSynch,
    CmdBusy,
    DaqActive,
    PgmActive,
    CmdUnknown,
    CmdSyntax,
    OutOfRange,
    WriteProtected,
    AccessDenied,
    AccessLocked,
    PageNotValid,
    ModeNotValid,
    SegmentNotValid,
    Sequence,
    DaqConfig,
    MemoryOverflow,
    Generic,
    Verify,
    ResourceTemporaryNotAccessible,
    /// Reserved or vendor specific code outside the documented table
    Unknown(u8),
}

impl From<u8> for ErrorCode {
    fn from(code: u8) -> ErrorCode {
        match code {
            0x00 => ErrorCode::CmdSynch,
            0x10 => ErrorCode::CmdBusy,
            0x11 => ErrorCode::DaqActive,
            0x12 => ErrorCode::PgmActive,
            0x20 => ErrorCode::CmdUnknown,
            0x21 => ErrorCode::CmdSyntax,
            0x22 => ErrorCode::OutOfRange,
            0x23 => ErrorCode::WriteProtected,
            0x24 => ErrorCode::AccessDenied,
            0x25 => ErrorCode::AccessLocked,
            0x26 => ErrorCode::PageNotValid,
            0x27 => ErrorCode::ModeNotValid,
            0x28 => ErrorCode::SegmentNotValid,
            0x29 => ErrorCode::Sequence,
            0x2A => ErrorCode::DaqConfig,
            0x30 => ErrorCode::MemoryOverflow,
            0x31 => ErrorCode::Generic,
            0x32 => ErrorCode::Verify,
            0x33 => ErrorCode::ResourceTemporaryNotAccessible,
            n => ErrorCode::Unknown(n),
        }
    }
}

impl From<ErrorCode> for u8 {
    fn from(code: ErrorCode) -> u8 {
        match code {
            ErrorCode::CmdSynch => 0x00,
            ErrorCode::CmdBusy => 0x10,
            ErrorCode::DaqActive => 0x11,
            ErrorCode::PgmActive => 0x12,
            ErrorCode::CmdUnknown => 0x20,
            ErrorCode::CmdSyntax => 0x21,
            ErrorCode::OutOfRange => 0x22,
            ErrorCode::WriteProtected => 0x23,
            ErrorCode::AccessDenied => 0x24,
            ErrorCode::AccessLocked => 0x25,
            ErrorCode::PageNotValid => 0x26,
            ErrorCode::ModeNotValid => 0x27,
            ErrorCode::SegmentNotValid => 0x28,
            ErrorCode::Sequence => 0x29,
            ErrorCode::DaqConfig => 0x2A,
            ErrorCode::MemoryOverflow => 0x30,
            ErrorCode::Generic => 0x31,
            ErrorCode::Verify => 0x32,
            ErrorCode::ResourceTemporaryNotAccessible => 0x33,
            ErrorCode::Unknown(n) => n,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ErrorCode::CmdSynch => write!(f, "ERR_CMD_SYNCH"),
            ErrorCode::CmdBusy => write!(f, "ERR_CMD_BUSY"),
            ErrorCode::DaqActive => write!(f, "ERR_DAQ_ACTIVE"),
            ErrorCode::PgmActive => write!(f, "ERR_PGM_ACTIVE"),
            ErrorCode::CmdUnknown => write!(f, "ERR_CMD_UNKNOWN"),
            ErrorCode::CmdSyntax => write!(f, "ERR_CMD_SYNTAX"),
            ErrorCode::OutOfRange => write!(f, "ERR_OUT_OF_RANGE"),
            ErrorCode::WriteProtected => write!(f, "ERR_WRITE_PROTECTED"),
            ErrorCode::AccessDenied => write!(f, "ERR_ACCESS_DENIED"),
            ErrorCode::AccessLocked => write!(f, "ERR_ACCESS_LOCKED"),
            ErrorCode::PageNotValid => write!(f, "ERR_PAGE_NOT_VALID"),
            ErrorCode::ModeNotValid => write!(f, "ERR_MODE_NOT_VALID"),
            ErrorCode::SegmentNotValid => write!(f, "ERR_SEGMENT_NOT_VALID"),
            ErrorCode::Sequence => write!(f, "ERR_SEQUENCE"),
            ErrorCode::DaqConfig => write!(f, "ERR_DAQ_CONFIG"),
            ErrorCode::MemoryOverflow => write!(f, "ERR_MEMORY_OVERFLOW"),
            ErrorCode::Generic => write!(f, "ERR_GENERIC"),
            ErrorCode::Verify => write!(f, "ERR_VERIFY"),
            ErrorCode::ResourceTemporaryNotAccessible => write!(f, "ERR_RESOURCE_TEMPORARY_NOT_ACCESSIBLE"),
            ErrorCode::Unknown(n) => write!(f, "ERR_UNKNOWN(0x{:02X})", n),
        }
    }
}

//----------------------------------------------------------------------------------------------
// Build XCP command packets (without transport layer header)

pub struct XcpCommandBuilder {
    command: Command,
    data: BytesMut,
    order: Option<ByteOrder>,
    error: Option<XcpError>,
}

impl XcpCommandBuilder {
    /// Start a command, `order` is None as long as the slave byte order is unknown
    pub fn new(command: Command, order: Option<ByteOrder>) -> XcpCommandBuilder {
        let mut data = BytesMut::with_capacity(8);
        let (opcode, width) = command.opcode_bytes();
        data.put_slice(&opcode[..width]);
        XcpCommandBuilder { command, data, order, error: None }
    }

    pub fn add_u8(&mut self, value: u8) -> &mut Self {
        self.data.put_u8(value);
        self
    }

    pub fn add_u8_slice(&mut self, value: &[u8]) -> &mut Self {
        self.data.put_slice(value);
        self
    }

    pub fn add_u16(&mut self, value: u16) -> &mut Self {
        match self.order {
            Some(order) => self.data.put_slice(&order.pack_word(value)),
            None => self.set_state_error(),
        }
        self
    }

    pub fn add_u32(&mut self, value: u32) -> &mut Self {
        match self.order {
            Some(order) => self.data.put_slice(&order.pack_dword(value)),
            None => self.set_state_error(),
        }
        self
    }

    fn set_state_error(&mut self) {
        if self.error.is_none() {
            self.error = Some(XcpError::ProtocolState("byte order unknown before CONNECT"));
        }
    }

    pub fn command(&self) -> Command {
        self.command
    }

    /// Finish the command packet, fails if a WORD or DWORD was added without a known byte order
    pub fn build(&mut self) -> Result<Bytes> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        Ok(self.data.split().freeze())
    }
}

//----------------------------------------------------------------------------------------------
