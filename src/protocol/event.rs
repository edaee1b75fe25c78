//----------------------------------------------------------------------------------------------
// Module protocol::event
// Asynchronous slave packets: events (EV), service requests (SERV) and DAQ data
// These packets have no requesting command and are never matched to a pending request

use bytes::Bytes;

use super::Pid;

//----------------------------------------------------------------------------------------------
// Event codes

pub const EV_RESUME_MODE: u8 = 0x00;
pub const EV_CLEAR_DAQ: u8 = 0x01;
pub const EV_STORE_DAQ: u8 = 0x02;
pub const EV_STORE_CAL: u8 = 0x03;
pub const EV_CMD_PENDING: u8 = 0x05;
pub const EV_DAQ_OVERLOAD: u8 = 0x06;
pub const EV_SESSION_TERMINATED: u8 = 0x07;
pub const EV_TIME_SYNC: u8 = 0x08;
pub const EV_STIM_TIMEOUT: u8 = 0x09;
pub const EV_SLEEP: u8 = 0x0A;
pub const EV_WAKE_UP: u8 = 0x0B;
pub const EV_USER: u8 = 0xFE;
pub const EV_TRANSPORT: u8 = 0xFF;

/// EV packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XcpEvent {
    ResumeMode(Bytes),
    ClearDaq,
    StoreDaq,
    StoreCal,
    CmdPending,
    DaqOverload,
    SessionTerminated,
    TimeSync(Bytes),
    StimTimeout(Bytes),
    Sleep,
    WakeUp,
    User(Bytes),
    Transport(Bytes),
    /// Event code not in the table, with its parameters
    Other { code: u8, data: Bytes },
}

impl XcpEvent {
    /// Decode an EV payload (PID removed), first byte is the event code
    pub fn decode(payload: &Bytes) -> XcpEvent {
        let Some(&code) = payload.first() else {
            return XcpEvent::Other { code: 0, data: Bytes::new() };
        };
        let data = payload.slice(1..);
        match code {
            EV_RESUME_MODE => XcpEvent::ResumeMode(data),
            EV_CLEAR_DAQ => XcpEvent::ClearDaq,
            EV_STORE_DAQ => XcpEvent::StoreDaq,
            EV_STORE_CAL => XcpEvent::StoreCal,
            EV_CMD_PENDING => XcpEvent::CmdPending,
            EV_DAQ_OVERLOAD => XcpEvent::DaqOverload,
            EV_SESSION_TERMINATED => XcpEvent::SessionTerminated,
            EV_TIME_SYNC => XcpEvent::TimeSync(data),
            EV_STIM_TIMEOUT => XcpEvent::StimTimeout(data),
            EV_SLEEP => XcpEvent::Sleep,
            EV_WAKE_UP => XcpEvent::WakeUp,
            EV_USER => XcpEvent::User(data),
            EV_TRANSPORT => XcpEvent::Transport(data),
            code => XcpEvent::Other { code, data },
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            XcpEvent::ResumeMode(_) => EV_RESUME_MODE,
            XcpEvent::ClearDaq => EV_CLEAR_DAQ,
            XcpEvent::StoreDaq => EV_STORE_DAQ,
            XcpEvent::StoreCal => EV_STORE_CAL,
            XcpEvent::CmdPending => EV_CMD_PENDING,
            XcpEvent::DaqOverload => EV_DAQ_OVERLOAD,
            XcpEvent::SessionTerminated => EV_SESSION_TERMINATED,
            XcpEvent::TimeSync(_) => EV_TIME_SYNC,
            XcpEvent::StimTimeout(_) => EV_STIM_TIMEOUT,
            XcpEvent::Sleep => EV_SLEEP,
            XcpEvent::WakeUp => EV_WAKE_UP,
            XcpEvent::User(_) => EV_USER,
            XcpEvent::Transport(_) => EV_TRANSPORT,
            XcpEvent::Other { code, .. } => *code,
        }
    }
}

//----------------------------------------------------------------------------------------------
// Service request codes

pub const SERV_RESET: u8 = 0x00;
pub const SERV_TEXT: u8 = 0x01;

/// SERV packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceRequest {
    /// The slave requests to be reset
    Reset,
    /// Plain text, up to the first NUL
    Text(String),
    Other { code: u8, data: Bytes },
}

impl ServiceRequest {
    pub fn decode(payload: &Bytes) -> ServiceRequest {
        let Some(&code) = payload.first() else {
            return ServiceRequest::Other { code: 0, data: Bytes::new() };
        };
        match code {
            SERV_RESET => ServiceRequest::Reset,
            SERV_TEXT => {
                let text = &payload[1..];
                let end = text.iter().position(|&c| c == 0).unwrap_or(text.len());
                ServiceRequest::Text(String::from_utf8_lossy(&text[..end]).into_owned())
            }
            code => ServiceRequest::Other { code, data: payload.slice(1..) },
        }
    }
}

//----------------------------------------------------------------------------------------------
// Asynchronous message, delivered on the event channel of the transport

/// Anything the slave sends that is not the answer to a pending request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AsyncMessage {
    Event(XcpEvent),
    Service(ServiceRequest),
    /// DAQ packet, `pid` is the (absolute or relative) ODT number, `data` the rest of the packet
    Daq { counter: u16, pid: u8, data: Bytes },
    /// OK or ERR packet whose counter does not match any outstanding request
    Unmatched { counter: u16, packet: Bytes },
}

impl AsyncMessage {
    /// Classify a complete packet (PID included) that was not delivered to a waiting caller
    pub fn from_packet(counter: u16, packet: &Bytes) -> Option<AsyncMessage> {
        let pid = *packet.first()?;
        Some(match Pid::from(pid) {
            Pid::Ev => AsyncMessage::Event(XcpEvent::decode(&packet.slice(1..))),
            Pid::Serv => AsyncMessage::Service(ServiceRequest::decode(&packet.slice(1..))),
            Pid::Ok | Pid::Err => AsyncMessage::Unmatched { counter, packet: packet.clone() },
            Pid::Daq(pid) => AsyncMessage::Daq {
                counter,
                pid,
                data: packet.slice(1..),
            },
        })
    }

    pub fn is_event(&self) -> bool {
        matches!(self, AsyncMessage::Event(_))
    }
}

//----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{PID_EV, PID_SERV};

    fn event_packet(code: u8, data: &[u8]) -> Vec<u8> {
        let mut p = vec![PID_EV, code];
        p.extend_from_slice(data);
        p
    }

    fn service_text_packet(text: &str) -> Vec<u8> {
        let mut p = vec![PID_SERV, SERV_TEXT];
        p.extend_from_slice(text.as_bytes());
        p.push(0);
        p
    }

    #[test]
    fn test_event_decode() {
        let m = AsyncMessage::from_packet(7, &Bytes::from(event_packet(EV_SESSION_TERMINATED, &[]))).unwrap();
        assert_eq!(m, AsyncMessage::Event(XcpEvent::SessionTerminated));
        assert!(m.is_event());

        let m = AsyncMessage::from_packet(7, &Bytes::from(event_packet(0x42, &[1, 2]))).unwrap();
        match m {
            AsyncMessage::Event(e) => {
                assert_eq!(e.code(), 0x42);
                assert_eq!(e, XcpEvent::Other { code: 0x42, data: Bytes::from_static(&[1, 2]) });
            }
            _ => panic!("expected event"),
        }
    }

    #[test]
    fn test_service_text() {
        let m = AsyncMessage::from_packet(0, &Bytes::from(service_text_packet("hello"))).unwrap();
        assert_eq!(m, AsyncMessage::Service(ServiceRequest::Text("hello".to_string())));

        // Missing terminator
        let s = ServiceRequest::decode(&Bytes::from_static(&[SERV_TEXT, b'a', b'b']));
        assert_eq!(s, ServiceRequest::Text("ab".to_string()));
        assert_eq!(ServiceRequest::decode(&Bytes::from_static(&[SERV_RESET])), ServiceRequest::Reset);
    }

    #[test]
    fn test_daq_and_unmatched() {
        let m = AsyncMessage::from_packet(3, &Bytes::from_static(&[0x02, 0xAA, 0xBB])).unwrap();
        assert_eq!(
            m,
            AsyncMessage::Daq {
                counter: 3,
                pid: 2,
                data: Bytes::from_static(&[0xAA, 0xBB])
            }
        );
        let m = AsyncMessage::from_packet(9, &Bytes::from_static(&[0xFE, 0x20])).unwrap();
        assert!(matches!(m, AsyncMessage::Unmatched { counter: 9, .. }));
        assert!(AsyncMessage::from_packet(0, &Bytes::new()).is_none());
    }
}
