//----------------------------------------------------------------------------------------------
// Module checksum
// Local computation of the BUILD_CHECKSUM algorithms, used to verify a memory range

use crc::{Crc, CRC_16_ARC, CRC_16_IBM_3740, CRC_32_ISO_HDLC};

use crate::codec::ByteOrder;
use crate::error::{Result, XcpError};
use crate::protocol::types::ChecksumType;

//----------------------------------------------------------------------------------------------
// CRC algorithms

// XCP_CRC_16: polynomial 0x8005, reflected, init 0x0000
const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_ARC);

// XCP_CRC_16_CITT: polynomial 0x1021, not reflected, init 0xFFFF
const CRC16_CCITT: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

// XCP_CRC_32: IEEE 802.3
const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

pub fn crc16(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}

pub fn crc16_ccitt(data: &[u8]) -> u16 {
    CRC16_CCITT.checksum(data)
}

pub fn crc32(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}

//----------------------------------------------------------------------------------------------
// Additive checksums

fn element_size(kind: ChecksumType) -> usize {
    match kind {
        ChecksumType::Add22 | ChecksumType::Add24 => 2,
        ChecksumType::Add44 => 4,
        _ => 1,
    }
}

fn add_words(data: &[u8], order: ByteOrder) -> Result<u32> {
    data.chunks_exact(2).try_fold(0u32, |sum, w| Ok(sum.wrapping_add(order.unpack_word(w)? as u32)))
}

fn add_dwords(data: &[u8], order: ByteOrder) -> Result<u32> {
    data.chunks_exact(4).try_fold(0u32, |sum, w| Ok(sum.wrapping_add(order.unpack_dword(w)?)))
}

/// Compute a checksum the way the slave computes it for BUILD_CHECKSUM
/// WORD and DWORD based sums read the elements in the slave byte order.
/// USER_DEFINED has no local algorithm and fails with ChecksumUnsupported.
pub fn checksum(data: &[u8], kind: ChecksumType, order: ByteOrder) -> Result<u32> {
    let size = element_size(kind);
    if data.len() % size != 0 {
        return Err(XcpError::InvalidArgument(format!("{:?} needs a multiple of {} bytes, got {}", kind, size, data.len())));
    }
    Ok(match kind {
        ChecksumType::None => 0,
        ChecksumType::Add11 => data.iter().fold(0u8, |s, &b| s.wrapping_add(b)) as u32,
        ChecksumType::Add12 => data.iter().fold(0u16, |s, &b| s.wrapping_add(b as u16)) as u32,
        ChecksumType::Add14 => data.iter().fold(0u32, |s, &b| s.wrapping_add(b as u32)),
        ChecksumType::Add22 => add_words(data, order)? & 0xFFFF,
        ChecksumType::Add24 => add_words(data, order)?,
        ChecksumType::Add44 => add_dwords(data, order)?,
        ChecksumType::Crc16 => crc16(data) as u32,
        ChecksumType::Crc16Ccitt => crc16_ccitt(data) as u32,
        ChecksumType::Crc32 => crc32(data),
        ChecksumType::UserDefined => return Err(XcpError::ChecksumUnsupported(kind)),
    })
}

//----------------------------------------------------------------------------------------------
