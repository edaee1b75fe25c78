//----------------------------------------------------------------------------------------------
// Module transport::frame
// XCP on Ethernet transport layer message: 4 byte header (LEN, CTR, little endian) followed by LEN bytes of packet

use byteorder::{ByteOrder as _, LittleEndian};
use bytes::{BufMut, Bytes, BytesMut};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

/// Size of the transport layer header
pub const HEADER_SIZE: usize = 4;

/// Transport layer header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Length of the XCP packet following the header
    pub length: u16,
    /// Message counter
    pub counter: u16,
}

impl FrameHeader {
    pub fn decode(buf: &[u8]) -> Option<FrameHeader> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(FrameHeader {
            length: LittleEndian::read_u16(&buf[0..2]),
            counter: LittleEndian::read_u16(&buf[2..4]),
        })
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16_le(self.length);
        buf.put_u16_le(self.counter);
    }
}

/// A complete transport layer message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub counter: u16,
    /// XCP packet, the first byte is the PID
    pub payload: Bytes,
}

impl Frame {
    pub fn new(counter: u16, payload: Bytes) -> Frame {
        Frame { counter, payload }
    }

    /// First byte of the packet, None for an empty packet
    pub fn pid(&self) -> Option<u8> {
        self.payload.first().copied()
    }

    /// Packet without the PID
    pub fn data(&self) -> Bytes {
        if self.payload.is_empty() {
            Bytes::new()
        } else {
            self.payload.slice(1..)
        }
    }

    /// Header followed by packet, ready to be written to the socket
    pub fn encode(&self) -> Bytes {
        encode_frame(self.counter, &self.payload)
    }
}

/// Prefix a packet with the transport layer header
/// Packets are bounded by MAX_CTO/MAX_DTO, which always fits the 16 bit length field
pub fn encode_frame(counter: u16, packet: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + packet.len());
    FrameHeader {
        length: packet.len() as u16,
        counter,
    }
    .encode(&mut buf);
    buf.put_slice(packet);
    buf.freeze()
}

//----------------------------------------------------------------------------------------------
// Datagram transport
// A datagram may hold several messages back to back

/// Split a received datagram into frames
/// A message running past the end of the datagram is logged and the rest of the datagram is dropped
pub fn split_datagram(datagram: &[u8]) -> Vec<Frame> {
    let mut frames = Vec::new();
    let mut i = 0;
    while i < datagram.len() {
        let Some(header) = FrameHeader::decode(&datagram[i..]) else {
            warn!("split_datagram: {} trailing bytes, no complete header", datagram.len() - i);
            break;
        };
        let len = header.length as usize;
        let start = i + HEADER_SIZE;
        if len == 0 || start + len > datagram.len() {
            warn!("split_datagram: corrupt message at offset {}, len = {}, datagram size = {}", i, len, datagram.len());
            break;
        }
        trace!("split_datagram: i = {}, len = {}, ctr = {}", i, len, header.counter);
        frames.push(Frame::new(header.counter, Bytes::copy_from_slice(&datagram[start..start + len])));
        i = start + len;
    }
    frames
}

//----------------------------------------------------------------------------------------------
// Stream transport
// Reassembles messages from arbitrary partial reads

#[derive(Debug, Clone, Copy)]
enum State {
    WaitingForHeader,
    WaitingForPayload { header: FrameHeader },
}

/// Accumulates bytes read from a stream socket and extracts complete frames
#[derive(Debug)]
pub struct FrameAssembler {
    buffer: BytesMut,
    state: State,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAssembler {
    pub fn new() -> FrameAssembler {
        FrameAssembler {
            buffer: BytesMut::with_capacity(8 * 1024),
            state: State::WaitingForHeader,
        }
    }

    /// Append a chunk from the socket and return all frames completed by it
    /// A chunk may contain any number of frames, or only part of one
    pub fn push(&mut self, data: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(data);
        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one() {
            frames.push(frame);
        }
        frames
    }

    fn try_extract_one(&mut self) -> Option<Frame> {
        loop {
            match self.state {
                State::WaitingForHeader => {
                    let header = FrameHeader::decode(&self.buffer)?;
                    let _ = self.buffer.split_to(HEADER_SIZE);
                    if header.length == 0 {
                        // Nothing to deliver, keep scanning
                        warn!("FrameAssembler: empty message, ctr = {}", header.counter);
                        continue;
                    }
                    self.state = State::WaitingForPayload { header };
                }
                State::WaitingForPayload { header } => {
                    let len = header.length as usize;
                    if self.buffer.len() < len {
                        return None;
                    }
                    let payload = self.buffer.split_to(len).freeze();
                    self.state = State::WaitingForHeader;
                    return Some(Frame::new(header.counter, payload));
                }
            }
        }
    }

    /// Number of bytes buffered but not yet delivered as a frame
    #[cfg(test)]
    fn pending_bytes(&self) -> usize {
        match self.state {
            State::WaitingForHeader => self.buffer.len(),
            State::WaitingForPayload { .. } => self.buffer.len() + HEADER_SIZE,
        }
    }
}

//----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn messages() -> (Vec<Frame>, Vec<u8>) {
        let frames = vec![
            Frame::new(1, Bytes::from_static(&[0xFF, 0x15, 0xC0, 0x08, 0x00, 0x01, 0x01, 0x01])),
            Frame::new(2, Bytes::from_static(&[0xFE, 0x25])),
            Frame::new(0xFFFF, Bytes::from_static(&[0xFD, 0x07])),
        ];
        let mut stream = Vec::new();
        for f in &frames {
            stream.extend_from_slice(&f.encode());
        }
        (frames, stream)
    }

    #[test]
    fn test_encode_frame() {
        let b = encode_frame(0x0102, &[0xFF, 0x00]);
        assert_eq!(b.as_ref(), &[0x02, 0x00, 0x02, 0x01, 0xFF, 0x00]);
        let h = FrameHeader::decode(&b).unwrap();
        assert_eq!(h, FrameHeader { length: 2, counter: 0x0102 });
        assert!(FrameHeader::decode(&b[..3]).is_none());
    }

    #[test]
    fn test_assembler_whole_stream() {
        let (frames, stream) = messages();
        let mut a = FrameAssembler::new();
        assert_eq!(a.push(&stream), frames);
        assert_eq!(a.pending_bytes(), 0);
    }

    #[test]
    fn test_assembler_partial_reads() {
        // Every split into chunks of size n yields the same frames
        let (frames, stream) = messages();
        for n in 1..stream.len() {
            let mut a = FrameAssembler::new();
            let mut out = Vec::new();
            for chunk in stream.chunks(n) {
                out.extend(a.push(chunk));
            }
            assert_eq!(out, frames, "chunk size {}", n);
            assert_eq!(a.pending_bytes(), 0);
        }
    }

    #[test]
    fn test_assembler_incomplete() {
        let (_, stream) = messages();
        let mut a = FrameAssembler::new();
        // Header and 3 of 8 payload bytes
        assert!(a.push(&stream[..7]).is_empty());
        assert_eq!(a.pending_bytes(), 7);
        let out = a.push(&stream[7..12]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].counter, 1);
        assert_eq!(out[0].pid(), Some(0xFF));
        assert_eq!(out[0].data().len(), 7);
    }

    #[test]
    fn test_split_datagram() {
        let (frames, stream) = messages();
        assert_eq!(split_datagram(&stream), frames);

        // Last message truncated, the complete ones are kept
        let out = split_datagram(&stream[..stream.len() - 1]);
        assert_eq!(out, frames[..2].to_vec());

        // Length field larger than the datagram
        assert!(split_datagram(&[0x10, 0x00, 0x00, 0x00, 0xFF]).is_empty());
    }
}
