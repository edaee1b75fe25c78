//----------------------------------------------------------------------------------------------
// Module codec
// Byte order dependent packing of XCP WORD and DWORD fields
// The byte order is reported by the slave in the CONNECT response (COMM_MODE_BASIC bit 0),
// so it is selected at runtime and threaded explicitly into every encode and decode call

use byteorder::{BigEndian, ByteOrder as _, LittleEndian};
use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Result, XcpError};

//----------------------------------------------------------------------------------------------
// ByteOrder

/// Byte order of multi byte protocol fields, as negotiated by CONNECT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    /// Little endian
    Intel = 0,
    /// Big endian
    Motorola = 1,
}

impl ByteOrder {
    /// Decode the 1 bit byte order field of COMM_MODE_BASIC
    pub fn from_bit(bit: u8) -> ByteOrder {
        if bit & 0x01 == 0 {
            ByteOrder::Intel
        } else {
            ByteOrder::Motorola
        }
    }

    pub fn pack_word(self, value: u16) -> [u8; 2] {
        let mut buf = [0u8; 2];
        match self {
            ByteOrder::Intel => LittleEndian::write_u16(&mut buf, value),
            ByteOrder::Motorola => BigEndian::write_u16(&mut buf, value),
        }
        buf
    }

    pub fn pack_dword(self, value: u32) -> [u8; 4] {
        let mut buf = [0u8; 4];
        match self {
            ByteOrder::Intel => LittleEndian::write_u32(&mut buf, value),
            ByteOrder::Motorola => BigEndian::write_u32(&mut buf, value),
        }
        buf
    }

    /// Unpack a WORD, `bytes` must hold at least 2 bytes
    pub fn unpack_word(self, bytes: &[u8]) -> Result<u16> {
        if bytes.len() < 2 {
            return Err(XcpError::Malformed(format!("WORD needs 2 bytes, got {}", bytes.len())));
        }
        Ok(match self {
            ByteOrder::Intel => LittleEndian::read_u16(bytes),
            ByteOrder::Motorola => BigEndian::read_u16(bytes),
        })
    }

    /// Unpack a DWORD, `bytes` must hold at least 4 bytes
    pub fn unpack_dword(self, bytes: &[u8]) -> Result<u32> {
        if bytes.len() < 4 {
            return Err(XcpError::Malformed(format!("DWORD needs 4 bytes, got {}", bytes.len())));
        }
        Ok(match self {
            ByteOrder::Intel => LittleEndian::read_u32(bytes),
            ByteOrder::Motorola => BigEndian::read_u32(bytes),
        })
    }
}

//----------------------------------------------------------------------------------------------
// XcpReader
// Bounds checked cursor over a response payload (PID already removed)

#[derive(Debug)]
pub struct XcpReader<'a> {
    name: &'static str,
    buf: &'a [u8],
    pos: usize,
    order: ByteOrder,
}

impl<'a> XcpReader<'a> {
    /// `name` is the layout name used in error messages
    pub fn new(name: &'static str, buf: &'a [u8], order: ByteOrder) -> XcpReader<'a> {
        XcpReader { name, buf, pos: 0, order }
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(XcpError::Malformed(format!(
                "{}: need {} bytes at offset {}, payload has {}",
                self.name,
                n,
                self.pos,
                self.buf.len()
            )));
        }
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16> {
        let order = self.order;
        order.unpack_word(self.take(2)?)
    }

    pub fn u32(&mut self) -> Result<u32> {
        let order = self.order;
        order.unpack_dword(self.take(4)?)
    }

    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }

    /// All bytes not consumed yet
    pub fn rest(&mut self) -> &'a [u8] {
        let s = &self.buf[self.pos..];
        self.pos = self.buf.len();
        s
    }
}

//----------------------------------------------------------------------------------------------
// XcpWriter
// Builds a response payload (without PID), the inverse of XcpReader

#[derive(Debug)]
pub struct XcpWriter {
    data: BytesMut,
    order: ByteOrder,
}

impl XcpWriter {
    pub fn new(order: ByteOrder) -> XcpWriter {
        XcpWriter {
            data: BytesMut::with_capacity(16),
            order,
        }
    }

    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.data.put_u8(value);
        self
    }

    pub fn u16(&mut self, value: u16) -> &mut Self {
        self.data.put_slice(&self.order.pack_word(value));
        self
    }

    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.data.put_slice(&self.order.pack_dword(value));
        self
    }

    pub fn zeros(&mut self, n: usize) -> &mut Self {
        self.data.put_bytes(0, n);
        self
    }

    pub fn slice(&mut self, value: &[u8]) -> &mut Self {
        self.data.put_slice(value);
        self
    }

    pub fn freeze(self) -> Bytes {
        self.data.freeze()
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.data.to_vec()
    }
}

//----------------------------------------------------------------------------------------------
