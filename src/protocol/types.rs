//----------------------------------------------------------------------------------------------
// Module protocol::types
// Response layouts, bit flag bytes and enumerations of the XCP protocol layer
// All payloads are the bytes following the PID, WORD and DWORD fields use the negotiated byte order

use bitflags::bitflags;
use bytes::Bytes;

use crate::codec::{ByteOrder, XcpReader, XcpWriter};
use crate::error::{Result, XcpError};

//----------------------------------------------------------------------------------------------
// Enumerations with a closed value table
// A value outside the table is a malformed response

macro_rules! value_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident = $value:expr),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub fn from_value(value: u8) -> Result<$name> {
                match value {
                    $(v if v == $value => Ok($name::$variant),)+
                    _ => Err(XcpError::Malformed(format!("{}: value 0x{:02X} out of range", stringify!($name), value))),
                }
            }

            pub fn value(self) -> u8 {
                match self {
                    $($name::$variant => $value),+
                }
            }
        }
    };
}

//----------------------------------------------------------------------------------------------
// Response decoding

/// A positive response payload with a fixed layout
pub trait XcpResponse: Sized {
    /// Layout name used in error messages
    const NAME: &'static str;

    fn read(r: &mut XcpReader) -> Result<Self>;
    fn write(&self, w: &mut XcpWriter);

    /// Decode a response payload (PID removed)
    fn decode(payload: &[u8], order: ByteOrder) -> Result<Self> {
        let mut r = XcpReader::new(Self::NAME, payload, order);
        Self::read(&mut r)
    }

    /// Encode a response payload (without PID)
    fn encode(&self, order: ByteOrder) -> Bytes {
        let mut w = XcpWriter::new(order);
        self.write(&mut w);
        w.freeze()
    }
}

//----------------------------------------------------------------------------------------------
// Bit flag bytes

bitflags! {
    /// Resource availability (CONNECT) and protection status (GET_STATUS, UNLOCK)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceType: u8 {
        const DBG = 0x20;
        const PGM = 0x10;
        const STIM = 0x08;
        const DAQ = 0x04;
        const CALPAG = 0x01;
    }

    /// COMM_MODE_BASIC of the CONNECT response
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CommModeBasic: u8 {
        const OPTIONAL = 0x80;
        const SLAVE_BLOCK_MODE = 0x40;
        const ADDRESS_GRANULARITY_1 = 0x04;
        const ADDRESS_GRANULARITY_0 = 0x02;
        const BYTE_ORDER = 0x01;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SessionStatus: u8 {
        const RESUME = 0x80;
        const DAQ_RUNNING = 0x40;
        const CLEAR_DAQ_REQUEST = 0x08;
        const STORE_DAQ_REQUEST = 0x04;
        const STORE_CAL_REQUEST = 0x01;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CommModeOptional: u8 {
        const INTERLEAVED_MODE = 0x02;
        const MASTER_BLOCK_MODE = 0x01;
    }

    /// Mode byte of SET_REQUEST
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SetRequestMode: u8 {
        const CLEAR_DAQ_REQ = 0x08;
        const STORE_DAQ_REQ_RESUME = 0x04;
        const STORE_DAQ_REQ_NO_RESUME = 0x02;
        const STORE_CAL_REQ = 0x01;
    }

    /// Mode byte of SET_CAL_PAGE and GET_CAL_PAGE
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SetCalPageMode: u8 {
        const ALL = 0x80;
        const XCP = 0x02;
        const ECU = 0x01;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PagProperties: u8 {
        const FREEZE_SUPPORTED = 0x01;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PageProperties: u8 {
        const XCP_WRITE_ACCESS_WITH_ECU = 0x20;
        const XCP_WRITE_ACCESS_WITHOUT_ECU = 0x10;
        const XCP_READ_ACCESS_WITH_ECU = 0x08;
        const XCP_READ_ACCESS_WITHOUT_ECU = 0x04;
        const ECU_ACCESS_WITH_XCP = 0x02;
        const ECU_ACCESS_WITHOUT_XCP = 0x01;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DaqProperties: u8 {
        const OVERLOAD_EVENT = 0x80;
        const OVERLOAD_MSB = 0x40;
        const PID_OFF_SUPPORTED = 0x20;
        const TIMESTAMP_SUPPORTED = 0x10;
        const BIT_STIM_SUPPORTED = 0x08;
        const RESUME_SUPPORTED = 0x04;
        const PRESCALER_SUPPORTED = 0x02;
        const DAQ_CONFIG_TYPE = 0x01;
    }

    /// Current mode of a DAQ list (GET_DAQ_LIST_MODE), also the mode byte of SET_DAQ_LIST_MODE
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CurrentMode: u8 {
        const RESUME = 0x80;
        const RUNNING = 0x40;
        const PID_OFF = 0x20;
        const TIMESTAMP = 0x10;
        const DIRECTION = 0x02;
        const SELECTED = 0x01;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DaqListProperties: u8 {
        const PACKED = 0x10;
        const STIM = 0x08;
        const DAQ = 0x04;
        const EVENT_FIXED = 0x02;
        const PREDEFINED = 0x01;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CommModePgm: u8 {
        const SLAVE_BLOCK_MODE = 0x40;
        const INTERLEAVED_MODE = 0x02;
        const MASTER_BLOCK_MODE = 0x01;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PgmProperties: u8 {
        const NON_SEQ_PGM_REQUIRED = 0x80;
        const NON_SEQ_PGM_SUPPORTED = 0x40;
        const ENCRYPTION_REQUIRED = 0x20;
        const ENCRYPTION_SUPPORTED = 0x10;
        const COMPRESSION_REQUIRED = 0x08;
        const COMPRESSION_SUPPORTED = 0x04;
        const FUNCTIONAL_MODE = 0x02;
        const ABSOLUTE_MODE = 0x01;
    }
}

value_enum! {
    AddressGranularity {
        Byte = 0,
        Word = 1,
        Dword = 2,
        Reserved = 3,
    }
}

impl AddressGranularity {
    /// Size of one address unit in bytes, None for the reserved value
    pub fn size(self) -> Option<usize> {
        match self {
            AddressGranularity::Byte => Some(1),
            AddressGranularity::Word => Some(2),
            AddressGranularity::Dword => Some(4),
            AddressGranularity::Reserved => None,
        }
    }
}

impl CommModeBasic {
    pub fn byte_order(self) -> ByteOrder {
        ByteOrder::from_bit(self.bits())
    }

    pub fn address_granularity(self) -> AddressGranularity {
        match (self.bits() >> 1) & 0x03 {
            0 => AddressGranularity::Byte,
            1 => AddressGranularity::Word,
            2 => AddressGranularity::Dword,
            _ => AddressGranularity::Reserved,
        }
    }
}

//----------------------------------------------------------------------------------------------
// STD responses

/// CONNECT response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectResponse {
    pub resource: ResourceType,
    pub comm_mode_basic: CommModeBasic,
    pub max_cto: u8,
    pub max_dto: u16,
    pub protocol_layer_version: u8,
    pub transport_layer_version: u8,
}

impl ConnectResponse {
    /// Read only the leading byte sized fields (resource, comm mode, max cto), which tell the byte order
    pub fn peek_byte_order(payload: &[u8]) -> Result<ByteOrder> {
        let mut r = XcpReader::new("ConnectResponsePartial", payload, ByteOrder::Intel);
        let _resource = r.u8()?;
        let comm_mode_basic = CommModeBasic::from_bits_retain(r.u8()?);
        let _max_cto = r.u8()?;
        Ok(comm_mode_basic.byte_order())
    }

    /// Decode a CONNECT response, the byte order is taken from the response itself
    pub fn decode_self_describing(payload: &[u8]) -> Result<ConnectResponse> {
        let order = ConnectResponse::peek_byte_order(payload)?;
        ConnectResponse::decode(payload, order)
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.comm_mode_basic.byte_order()
    }

    pub fn address_granularity(&self) -> AddressGranularity {
        self.comm_mode_basic.address_granularity()
    }

    pub fn slave_block_mode(&self) -> bool {
        self.comm_mode_basic.contains(CommModeBasic::SLAVE_BLOCK_MODE)
    }
}

impl XcpResponse for ConnectResponse {
    const NAME: &'static str = "ConnectResponse";

    fn read(r: &mut XcpReader) -> Result<Self> {
        Ok(ConnectResponse {
            resource: ResourceType::from_bits_retain(r.u8()?),
            comm_mode_basic: CommModeBasic::from_bits_retain(r.u8()?),
            max_cto: r.u8()?,
            max_dto: r.u16()?,
            protocol_layer_version: r.u8()?,
            transport_layer_version: r.u8()?,
        })
    }

    fn write(&self, w: &mut XcpWriter) {
        w.u8(self.resource.bits())
            .u8(self.comm_mode_basic.bits())
            .u8(self.max_cto)
            .u16(self.max_dto)
            .u8(self.protocol_layer_version)
            .u8(self.transport_layer_version);
    }
}

/// GET_VERSION response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionResponse {
    pub protocol_major: u8,
    pub protocol_minor: u8,
    pub transport_major: u8,
    pub transport_minor: u8,
}

impl XcpResponse for VersionResponse {
    const NAME: &'static str = "GetVersionResponse";

    fn read(r: &mut XcpReader) -> Result<Self> {
        r.skip(1)?;
        Ok(VersionResponse {
            protocol_major: r.u8()?,
            protocol_minor: r.u8()?,
            transport_major: r.u8()?,
            transport_minor: r.u8()?,
        })
    }

    fn write(&self, w: &mut XcpWriter) {
        w.zeros(1).u8(self.protocol_major).u8(self.protocol_minor).u8(self.transport_major).u8(self.transport_minor);
    }
}

/// GET_STATUS response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusResponse {
    pub session_status: SessionStatus,
    pub resource_protection: ResourceType,
    pub session_configuration_id: u16,
}

impl XcpResponse for StatusResponse {
    const NAME: &'static str = "GetStatusResponse";

    fn read(r: &mut XcpReader) -> Result<Self> {
        let session_status = SessionStatus::from_bits_retain(r.u8()?);
        let resource_protection = ResourceType::from_bits_retain(r.u8()?);
        r.skip(1)?;
        Ok(StatusResponse {
            session_status,
            resource_protection,
            session_configuration_id: r.u16()?,
        })
    }

    fn write(&self, w: &mut XcpWriter) {
        w.u8(self.session_status.bits())
            .u8(self.resource_protection.bits())
            .zeros(1)
            .u16(self.session_configuration_id);
    }
}

/// GET_COMM_MODE_INFO response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommModeInfo {
    pub comm_mode_optional: CommModeOptional,
    pub max_bs: u8,
    pub min_st: u8,
    pub queue_size: u8,
    pub driver_version: u8,
}

impl XcpResponse for CommModeInfo {
    const NAME: &'static str = "GetCommModeInfoResponse";

    fn read(r: &mut XcpReader) -> Result<Self> {
        r.skip(1)?;
        let comm_mode_optional = CommModeOptional::from_bits_retain(r.u8()?);
        r.skip(1)?;
        Ok(CommModeInfo {
            comm_mode_optional,
            max_bs: r.u8()?,
            min_st: r.u8()?,
            queue_size: r.u8()?,
            driver_version: r.u8()?,
        })
    }

    fn write(&self, w: &mut XcpWriter) {
        w.zeros(1)
            .u8(self.comm_mode_optional.bits())
            .zeros(1)
            .u8(self.max_bs)
            .u8(self.min_st)
            .u8(self.queue_size)
            .u8(self.driver_version);
    }
}

/// Identification types of GET_ID
pub const XCP_IDT_ASCII: u8 = 0;
pub const XCP_IDT_ASAM_NAME: u8 = 1;
pub const XCP_IDT_ASAM_PATH: u8 = 2;
pub const XCP_IDT_ASAM_URL: u8 = 3;
pub const XCP_IDT_ASAM_UPLOAD: u8 = 4;

/// GET_ID response
/// With mode 1 the identification follows in the response, otherwise it has to be uploaded from the MTA
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdResponse {
    pub mode: u8,
    pub length: u32,
    pub identification: Option<Bytes>,
}

impl IdResponse {
    /// Identification as text, if contained in the response
    pub fn identification_str(&self) -> Option<String> {
        self.identification.as_ref().map(|b| String::from_utf8_lossy(b).into_owned())
    }
}

impl XcpResponse for IdResponse {
    const NAME: &'static str = "GetIDResponse";

    fn read(r: &mut XcpReader) -> Result<Self> {
        let mode = r.u8()?;
        r.skip(2)?;
        let length = r.u32()?;
        let identification = if mode == 1 {
            Some(Bytes::copy_from_slice(r.bytes(length as usize)?))
        } else {
            None
        };
        Ok(IdResponse { mode, length, identification })
    }

    fn write(&self, w: &mut XcpWriter) {
        w.u8(self.mode).zeros(2).u32(self.length);
        if let Some(id) = &self.identification {
            w.slice(id);
        }
    }
}

/// GET_SEED response
/// `length` is the remaining seed length, `seed` the part of it contained in this response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedResponse {
    pub length: u8,
    pub seed: Bytes,
}

impl XcpResponse for SeedResponse {
    const NAME: &'static str = "GetSeedResponse";

    fn read(r: &mut XcpReader) -> Result<Self> {
        let length = r.u8()?;
        let seed = if length > 0 {
            // The first part of a long seed is limited by MAX_CTO
            let n = (length as usize).min(r.remaining());
            Bytes::copy_from_slice(r.bytes(n)?)
        } else {
            Bytes::new()
        };
        Ok(SeedResponse { length, seed })
    }

    fn write(&self, w: &mut XcpWriter) {
        w.u8(self.length).slice(&self.seed);
    }
}

/// UNLOCK response, the current resource protection status
impl XcpResponse for ResourceType {
    const NAME: &'static str = "UnlockResponse";

    fn read(r: &mut XcpReader) -> Result<Self> {
        Ok(ResourceType::from_bits_retain(r.u8()?))
    }

    fn write(&self, w: &mut XcpWriter) {
        w.u8(self.bits());
    }
}

value_enum! {
    /// Checksum algorithms of BUILD_CHECKSUM
    ChecksumType {
        None = 0x00,
        Add11 = 0x01,
        Add12 = 0x02,
        Add14 = 0x03,
        Add22 = 0x04,
        Add24 = 0x05,
        Add44 = 0x06,
        Crc16 = 0x07,
        Crc16Ccitt = 0x08,
        Crc32 = 0x09,
        UserDefined = 0xFF,
    }
}

/// BUILD_CHECKSUM response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildChecksumResponse {
    pub checksum_type: ChecksumType,
    pub checksum: u32,
}

impl XcpResponse for BuildChecksumResponse {
    const NAME: &'static str = "BuildChecksumResponse";

    fn read(r: &mut XcpReader) -> Result<Self> {
        let checksum_type = ChecksumType::from_value(r.u8()?)?;
        r.skip(2)?;
        Ok(BuildChecksumResponse {
            checksum_type,
            checksum: r.u32()?,
        })
    }

    fn write(&self, w: &mut XcpWriter) {
        w.u8(self.checksum_type.value()).zeros(2).u32(self.checksum);
    }
}

//----------------------------------------------------------------------------------------------
// PAG responses

/// GET_PAG_PROCESSOR_INFO response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagProcessorInfo {
    pub max_segments: u8,
    pub pag_properties: PagProperties,
}

impl XcpResponse for PagProcessorInfo {
    const NAME: &'static str = "GetPagProcessorInfoResponse";

    fn read(r: &mut XcpReader) -> Result<Self> {
        Ok(PagProcessorInfo {
            max_segments: r.u8()?,
            pag_properties: PagProperties::from_bits_retain(r.u8()?),
        })
    }

    fn write(&self, w: &mut XcpWriter) {
        w.u8(self.max_segments).u8(self.pag_properties.bits());
    }
}

value_enum! {
    /// Mode byte of GET_SEGMENT_INFO
    SegmentInfoMode {
        BasicAddress = 0,
        Standard = 1,
        AddressMapping = 2,
    }
}

/// GET_SEGMENT_INFO response, the layout is selected by the mode of the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentInfo {
    BasicAddress {
        basic_info: u32,
    },
    Standard {
        max_pages: u8,
        address_extension: u8,
        max_mapping: u8,
        compression_method: u8,
        encryption_method: u8,
    },
    AddressMapping {
        mapping_info: u32,
    },
}

impl SegmentInfo {
    pub fn mode(&self) -> SegmentInfoMode {
        match self {
            SegmentInfo::BasicAddress { .. } => SegmentInfoMode::BasicAddress,
            SegmentInfo::Standard { .. } => SegmentInfoMode::Standard,
            SegmentInfo::AddressMapping { .. } => SegmentInfoMode::AddressMapping,
        }
    }

    pub fn decode(mode: SegmentInfoMode, payload: &[u8], order: ByteOrder) -> Result<SegmentInfo> {
        let mut r = XcpReader::new("GetSegmentInfoResponse", payload, order);
        Ok(match mode {
            SegmentInfoMode::BasicAddress => {
                r.skip(3)?;
                SegmentInfo::BasicAddress { basic_info: r.u32()? }
            }
            SegmentInfoMode::Standard => SegmentInfo::Standard {
                max_pages: r.u8()?,
                address_extension: r.u8()?,
                max_mapping: r.u8()?,
                compression_method: r.u8()?,
                encryption_method: r.u8()?,
            },
            SegmentInfoMode::AddressMapping => {
                r.skip(3)?;
                SegmentInfo::AddressMapping { mapping_info: r.u32()? }
            }
        })
    }

    pub fn encode(&self, order: ByteOrder) -> Bytes {
        let mut w = XcpWriter::new(order);
        match *self {
            SegmentInfo::BasicAddress { basic_info } => {
                w.zeros(3).u32(basic_info);
            }
            SegmentInfo::Standard {
                max_pages,
                address_extension,
                max_mapping,
                compression_method,
                encryption_method,
            } => {
                w.u8(max_pages).u8(address_extension).u8(max_mapping).u8(compression_method).u8(encryption_method);
            }
            SegmentInfo::AddressMapping { mapping_info } => {
                w.zeros(3).u32(mapping_info);
            }
        }
        w.freeze()
    }
}

/// GET_PAGE_INFO response, page properties and the init segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    pub properties: PageProperties,
    pub init_segment: u8,
}

impl XcpResponse for PageInfo {
    const NAME: &'static str = "GetPageInfoResponse";

    fn read(r: &mut XcpReader) -> Result<Self> {
        Ok(PageInfo {
            properties: PageProperties::from_bits_retain(r.u8()?),
            init_segment: r.u8()?,
        })
    }

    fn write(&self, w: &mut XcpWriter) {
        w.u8(self.properties.bits()).u8(self.init_segment);
    }
}

//----------------------------------------------------------------------------------------------
// DAQ responses

value_enum! {
    IdentificationField {
        AbsOdtNumber = 0,
        RelOdtNumberAbsDaqListNumberByte = 1,
        RelOdtNumberAbsDaqListNumberWord = 2,
        RelOdtNumberAbsDaqListNumberWordAligned = 3,
    }
}

value_enum! {
    AddressExtensionMode {
        DifferentWithinOdt = 0,
        SameForAllOdt = 1,
        NotAllowed = 2,
        SameForAllDaq = 3,
    }
}

value_enum! {
    OptimisationType {
        Default = 0,
        OdtType16 = 1,
        OdtType32 = 2,
        OdtType64 = 3,
        OdtTypeAlignment = 4,
        MaxEntrySize = 5,
    }
}

/// DAQ_KEY_BYTE of GET_DAQ_PROCESSOR_INFO
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaqKeyByte {
    pub identification_field: IdentificationField,
    pub address_extension: AddressExtensionMode,
    pub optimisation_type: OptimisationType,
}

impl DaqKeyByte {
    pub fn from_byte(b: u8) -> Result<DaqKeyByte> {
        Ok(DaqKeyByte {
            identification_field: IdentificationField::from_value(b >> 6)?,
            address_extension: AddressExtensionMode::from_value((b >> 4) & 0x03)?,
            optimisation_type: OptimisationType::from_value(b & 0x0F)?,
        })
    }

    pub fn to_byte(self) -> u8 {
        (self.identification_field.value() << 6) | (self.address_extension.value() << 4) | self.optimisation_type.value()
    }
}

/// GET_DAQ_PROCESSOR_INFO response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaqProcessorInfo {
    pub daq_properties: DaqProperties,
    pub max_daq: u16,
    pub max_event_channel: u16,
    pub min_daq: u8,
    pub daq_key_byte: DaqKeyByte,
}

impl XcpResponse for DaqProcessorInfo {
    const NAME: &'static str = "GetDaqProcessorInfoResponse";

    fn read(r: &mut XcpReader) -> Result<Self> {
        Ok(DaqProcessorInfo {
            daq_properties: DaqProperties::from_bits_retain(r.u8()?),
            max_daq: r.u16()?,
            max_event_channel: r.u16()?,
            min_daq: r.u8()?,
            daq_key_byte: DaqKeyByte::from_byte(r.u8()?)?,
        })
    }

    fn write(&self, w: &mut XcpWriter) {
        w.u8(self.daq_properties.bits())
            .u16(self.max_daq)
            .u16(self.max_event_channel)
            .u8(self.min_daq)
            .u8(self.daq_key_byte.to_byte());
    }
}

/// GET_DAQ_LIST_MODE response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaqListMode {
    pub current_mode: CurrentMode,
    pub event_channel: u16,
    pub prescaler: u8,
    pub priority: u8,
}

impl XcpResponse for DaqListMode {
    const NAME: &'static str = "GetDaqListModeResponse";

    fn read(r: &mut XcpReader) -> Result<Self> {
        let current_mode = CurrentMode::from_bits_retain(r.u8()?);
        r.skip(2)?;
        Ok(DaqListMode {
            current_mode,
            event_channel: r.u16()?,
            prescaler: r.u8()?,
            priority: r.u8()?,
        })
    }

    fn write(&self, w: &mut XcpWriter) {
        w.u8(self.current_mode.bits()).zeros(2).u16(self.event_channel).u8(self.prescaler).u8(self.priority);
    }
}

/// GET_DAQ_CLOCK response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaqClock {
    pub timestamp: u32,
}

impl XcpResponse for DaqClock {
    const NAME: &'static str = "GetDaqClockResponse";

    fn read(r: &mut XcpReader) -> Result<Self> {
        r.skip(3)?;
        Ok(DaqClock { timestamp: r.u32()? })
    }

    fn write(&self, w: &mut XcpWriter) {
        w.zeros(3).u32(self.timestamp);
    }
}

/// Parameters of an enabled DAQ packed mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaqPackedModeParams {
    pub timestamp_mode: u8,
    pub sample_count: u16,
}

/// DAQ packed mode, the parameters are present only if packing is enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaqPackedMode {
    None,
    ElementGrouped(DaqPackedModeParams),
    EventGrouped(DaqPackedModeParams),
}

impl DaqPackedMode {
    pub fn mode_value(&self) -> u8 {
        match self {
            DaqPackedMode::None => 0,
            DaqPackedMode::ElementGrouped(_) => 1,
            DaqPackedMode::EventGrouped(_) => 2,
        }
    }

    pub fn params(&self) -> Option<DaqPackedModeParams> {
        match self {
            DaqPackedMode::None => None,
            DaqPackedMode::ElementGrouped(p) | DaqPackedMode::EventGrouped(p) => Some(*p),
        }
    }

    /// Read the mode byte and, if packing is enabled, the timestamp mode and sample count
    pub fn read_mode(r: &mut XcpReader) -> Result<DaqPackedMode> {
        let mode = r.u8()?;
        match mode {
            0 => Ok(DaqPackedMode::None),
            1 | 2 => {
                let params = DaqPackedModeParams {
                    timestamp_mode: r.u8()?,
                    sample_count: r.u16()?,
                };
                Ok(if mode == 1 {
                    DaqPackedMode::ElementGrouped(params)
                } else {
                    DaqPackedMode::EventGrouped(params)
                })
            }
            n => Err(XcpError::Malformed(format!("DaqPackedMode: value 0x{:02X} out of range", n))),
        }
    }

    pub fn write_mode(&self, w: &mut XcpWriter) {
        w.u8(self.mode_value());
        if let Some(p) = self.params() {
            w.u8(p.timestamp_mode).u16(p.sample_count);
        }
    }
}

/// GET_DAQ_PACKED_MODE response
impl XcpResponse for DaqPackedMode {
    const NAME: &'static str = "GetDaqPackedModeResponse";

    fn read(r: &mut XcpReader) -> Result<Self> {
        r.skip(1)?;
        DaqPackedMode::read_mode(r)
    }

    fn write(&self, w: &mut XcpWriter) {
        w.zeros(1);
        self.write_mode(w);
    }
}

/// READ_DAQ response, the ODT entry at the DAQ pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OdtEntry {
    pub bit_offset: u8,
    pub size: u8,
    pub address_extension: u8,
    pub address: u32,
}

impl XcpResponse for OdtEntry {
    const NAME: &'static str = "ReadDaqResponse";

    fn read(r: &mut XcpReader) -> Result<Self> {
        Ok(OdtEntry {
            bit_offset: r.u8()?,
            size: r.u8()?,
            address_extension: r.u8()?,
            address: r.u32()?,
        })
    }

    fn write(&self, w: &mut XcpWriter) {
        w.u8(self.bit_offset).u8(self.size).u8(self.address_extension).u32(self.address);
    }
}

value_enum! {
    TimestampUnit {
        Unit1Ns = 0,
        Unit10Ns = 1,
        Unit100Ns = 2,
        Unit1Us = 3,
        Unit10Us = 4,
        Unit100Us = 5,
        Unit1Ms = 6,
        Unit10Ms = 7,
        Unit100Ms = 8,
        Unit1S = 9,
        Unit1Ps = 10,
        Unit10Ps = 11,
        Unit100Ps = 12,
    }
}

value_enum! {
    TimestampSize {
        NoTimestamp = 0,
        Size1 = 1,
        Size2 = 2,
        NotAllowed = 3,
        Size4 = 4,
    }
}

/// TIMESTAMP_MODE byte of GET_DAQ_RESOLUTION_INFO
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampMode {
    pub unit: TimestampUnit,
    pub fixed: bool,
    pub size: TimestampSize,
}

impl TimestampMode {
    pub fn from_byte(b: u8) -> Result<TimestampMode> {
        Ok(TimestampMode {
            unit: TimestampUnit::from_value(b >> 4)?,
            fixed: b & 0x08 != 0,
            size: TimestampSize::from_value(b & 0x07)?,
        })
    }

    pub fn to_byte(self) -> u8 {
        let fixed = if self.fixed { 0x08 } else { 0x00 };
        (self.unit.value() << 4) | fixed | self.size.value()
    }
}

/// GET_DAQ_RESOLUTION_INFO response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaqResolutionInfo {
    pub granularity_odt_entry_size_daq: u8,
    pub max_odt_entry_size_daq: u8,
    pub granularity_odt_entry_size_stim: u8,
    pub max_odt_entry_size_stim: u8,
    pub timestamp_mode: TimestampMode,
    pub timestamp_ticks: u16,
}

impl XcpResponse for DaqResolutionInfo {
    const NAME: &'static str = "GetDaqResolutionInfoResponse";

    fn read(r: &mut XcpReader) -> Result<Self> {
        Ok(DaqResolutionInfo {
            granularity_odt_entry_size_daq: r.u8()?,
            max_odt_entry_size_daq: r.u8()?,
            granularity_odt_entry_size_stim: r.u8()?,
            max_odt_entry_size_stim: r.u8()?,
            timestamp_mode: TimestampMode::from_byte(r.u8()?)?,
            timestamp_ticks: r.u16()?,
        })
    }

    fn write(&self, w: &mut XcpWriter) {
        w.u8(self.granularity_odt_entry_size_daq)
            .u8(self.max_odt_entry_size_daq)
            .u8(self.granularity_odt_entry_size_stim)
            .u8(self.max_odt_entry_size_stim)
            .u8(self.timestamp_mode.to_byte())
            .u16(self.timestamp_ticks);
    }
}

/// GET_DAQ_LIST_INFO response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaqListInfo {
    pub properties: DaqListProperties,
    pub max_odt: u8,
    pub max_odt_entries: u8,
    pub fixed_event: u16,
}

impl XcpResponse for DaqListInfo {
    const NAME: &'static str = "GetDaqListInfoResponse";

    fn read(r: &mut XcpReader) -> Result<Self> {
        Ok(DaqListInfo {
            properties: DaqListProperties::from_bits_retain(r.u8()?),
            max_odt: r.u8()?,
            max_odt_entries: r.u8()?,
            fixed_event: r.u16()?,
        })
    }

    fn write(&self, w: &mut XcpWriter) {
        w.u8(self.properties.bits()).u8(self.max_odt).u8(self.max_odt_entries).u16(self.fixed_event);
    }
}

value_enum! {
    Consistency {
        Odt = 0,
        Daq = 1,
        EventChannel = 2,
        None = 3,
    }
}

/// DAQ_EVENT_PROPERTIES of GET_DAQ_EVENT_INFO, a consistency field in bits 7-6 and flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaqEventProperties {
    pub consistency: Consistency,
    pub packed: bool,
    pub stim: bool,
    pub daq: bool,
}

impl DaqEventProperties {
    pub fn from_byte(b: u8) -> Result<DaqEventProperties> {
        Ok(DaqEventProperties {
            consistency: Consistency::from_value(b >> 6)?,
            packed: b & 0x10 != 0,
            stim: b & 0x08 != 0,
            daq: b & 0x04 != 0,
        })
    }

    pub fn to_byte(self) -> u8 {
        let mut b = self.consistency.value() << 6;
        if self.packed {
            b |= 0x10;
        }
        if self.stim {
            b |= 0x08;
        }
        if self.daq {
            b |= 0x04;
        }
        b
    }
}

/// GET_DAQ_EVENT_INFO response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventChannelInfo {
    pub properties: DaqEventProperties,
    pub max_daq_list: u8,
    pub name_length: u8,
    pub time_cycle: u8,
    pub time_unit: u8,
    pub priority: u8,
}

impl XcpResponse for EventChannelInfo {
    const NAME: &'static str = "GetEventChannelInfoResponse";

    fn read(r: &mut XcpReader) -> Result<Self> {
        Ok(EventChannelInfo {
            properties: DaqEventProperties::from_byte(r.u8()?)?,
            max_daq_list: r.u8()?,
            name_length: r.u8()?,
            time_cycle: r.u8()?,
            time_unit: r.u8()?,
            priority: r.u8()?,
        })
    }

    fn write(&self, w: &mut XcpWriter) {
        w.u8(self.properties.to_byte())
            .u8(self.max_daq_list)
            .u8(self.name_length)
            .u8(self.time_cycle)
            .u8(self.time_unit)
            .u8(self.priority);
    }
}

//----------------------------------------------------------------------------------------------
// PGM responses

/// PROGRAM_START response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramStartResponse {
    pub comm_mode_pgm: CommModePgm,
    pub max_cto_pgm: u8,
    pub max_bs_pgm: u8,
    pub min_st_pgm: u8,
    pub queue_size_pgm: u8,
}

impl XcpResponse for ProgramStartResponse {
    const NAME: &'static str = "ProgramStartResponse";

    fn read(r: &mut XcpReader) -> Result<Self> {
        r.skip(1)?;
        Ok(ProgramStartResponse {
            comm_mode_pgm: CommModePgm::from_bits_retain(r.u8()?),
            max_cto_pgm: r.u8()?,
            max_bs_pgm: r.u8()?,
            min_st_pgm: r.u8()?,
            queue_size_pgm: r.u8()?,
        })
    }

    fn write(&self, w: &mut XcpWriter) {
        w.zeros(1)
            .u8(self.comm_mode_pgm.bits())
            .u8(self.max_cto_pgm)
            .u8(self.max_bs_pgm)
            .u8(self.min_st_pgm)
            .u8(self.queue_size_pgm);
    }
}

/// GET_PGM_PROCESSOR_INFO response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PgmProcessorInfo {
    pub pgm_properties: PgmProperties,
    pub max_sector: u8,
}

impl XcpResponse for PgmProcessorInfo {
    const NAME: &'static str = "GetPgmProcessorInfoResponse";

    fn read(r: &mut XcpReader) -> Result<Self> {
        Ok(PgmProcessorInfo {
            pgm_properties: PgmProperties::from_bits_retain(r.u8()?),
            max_sector: r.u8()?,
        })
    }

    fn write(&self, w: &mut XcpWriter) {
        w.u8(self.pgm_properties.bits()).u8(self.max_sector);
    }
}

value_enum! {
    /// Mode byte of GET_SECTOR_INFO
    SectorInfoMode {
        StartAddress = 0,
        Length = 1,
        NameLength = 2,
    }
}

/// GET_SECTOR_INFO response, the layout is selected by the mode of the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectorInfo {
    /// Mode 0 (start address) and mode 1 (length)
    Sector {
        clear_sequence_number: u8,
        program_sequence_number: u8,
        programming_method: u8,
        sector_info: u32,
    },
    /// Mode 2
    NameLength { sector_name_length: u8 },
}

impl SectorInfo {
    pub fn decode(mode: SectorInfoMode, payload: &[u8], order: ByteOrder) -> Result<SectorInfo> {
        let mut r = XcpReader::new("GetSectorInfoResponse", payload, order);
        Ok(match mode {
            SectorInfoMode::StartAddress | SectorInfoMode::Length => SectorInfo::Sector {
                clear_sequence_number: r.u8()?,
                program_sequence_number: r.u8()?,
                programming_method: r.u8()?,
                sector_info: r.u32()?,
            },
            SectorInfoMode::NameLength => SectorInfo::NameLength { sector_name_length: r.u8()? },
        })
    }

    pub fn encode(&self, order: ByteOrder) -> Bytes {
        let mut w = XcpWriter::new(order);
        match *self {
            SectorInfo::Sector {
                clear_sequence_number,
                program_sequence_number,
                programming_method,
                sector_info,
            } => {
                w.u8(clear_sequence_number).u8(program_sequence_number).u8(programming_method).u32(sector_info);
            }
            SectorInfo::NameLength { sector_name_length } => {
                w.u8(sector_name_length);
            }
        }
        w.freeze()
    }
}

//----------------------------------------------------------------------------------------------
