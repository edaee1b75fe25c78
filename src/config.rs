//----------------------------------------------------------------------------------------------
// Module config
// Master configuration and builder

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::error::{Result, XcpError};
use crate::master::XcpMaster;

/// Default XCP on Ethernet port
pub const DEFAULT_XCP_PORT: u16 = 5555;

/// Default command response timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

//----------------------------------------------------------------------------------------------
// XCP log level

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]

/// Represents the log level of the master
pub enum XcpLogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl From<u8> for XcpLogLevel {
    fn from(item: u8) -> XcpLogLevel {
        match item {
            0 => XcpLogLevel::Off,
            1 => XcpLogLevel::Error,
            2 => XcpLogLevel::Warn,
            3 => XcpLogLevel::Info,
            4 => XcpLogLevel::Debug,
            5 => XcpLogLevel::Trace,
            _ => XcpLogLevel::Warn,
        }
    }
}

impl XcpLogLevel {
    /// Convert XcpLogLevel to log::LevelFilter
    pub fn to_log_level_filter(self) -> log::LevelFilter {
        match self {
            XcpLogLevel::Off => log::LevelFilter::Off,
            XcpLogLevel::Error => log::LevelFilter::Error,
            XcpLogLevel::Warn => log::LevelFilter::Warn,
            XcpLogLevel::Info => log::LevelFilter::Info,
            XcpLogLevel::Debug => log::LevelFilter::Debug,
            XcpLogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

//------------------------------------------------------------------------------------------
// XcpTransportLayer

/// enum to specify the transport layer to the slave
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XcpTransportLayer {
    /// UDP transport layer
    Udp = 0,
    /// TCP transport layer
    Tcp = 1,
}

impl XcpTransportLayer {
    /// Get the protocol name of the transport layer
    pub fn protocol_name(&self) -> &'static str {
        match self {
            XcpTransportLayer::Tcp => "TCP",
            XcpTransportLayer::Udp => "UDP",
        }
    }
}

//------------------------------------------------------------------------------------------
// XcpConfig

/// Everything needed to open a connection to a slave
#[derive(Debug, Clone)]
pub struct XcpConfig {
    pub transport: XcpTransportLayer,
    pub host: String,
    pub port: u16,
    pub ipv6: bool,
    /// Timeout for each command response
    pub timeout: Duration,
    pub log_level: XcpLogLevel,
}

impl Default for XcpConfig {
    fn default() -> Self {
        XcpConfig {
            transport: XcpTransportLayer::Tcp,
            host: "localhost".to_string(),
            port: DEFAULT_XCP_PORT,
            ipv6: false,
            timeout: DEFAULT_TIMEOUT,
            log_level: XcpLogLevel::Warn,
        }
    }
}

impl XcpConfig {
    /// Resolve the slave address
    /// "localhost" maps to the loopback address of the selected address family
    pub async fn resolve(&self) -> Result<SocketAddr> {
        if self.host.eq_ignore_ascii_case("localhost") {
            let ip: IpAddr = if self.ipv6 { Ipv6Addr::LOCALHOST.into() } else { Ipv4Addr::LOCALHOST.into() };
            return Ok(SocketAddr::new(ip, self.port));
        }
        if let Ok(ip) = self.host.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, self.port));
        }
        let mut addrs = tokio::net::lookup_host((self.host.as_str(), self.port)).await?;
        addrs
            .find(|a| a.is_ipv6() == self.ipv6)
            .ok_or_else(|| XcpError::InvalidArgument(format!("host {} has no {} address", self.host, if self.ipv6 { "IPv6" } else { "IPv4" })))
    }

    /// Local address to bind a UDP socket to, any interface and an ephemeral port
    pub fn bind_addr(&self, dest: &SocketAddr) -> SocketAddr {
        match dest {
            SocketAddr::V4(_) => SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), 0),
            SocketAddr::V6(_) => SocketAddr::new(Ipv6Addr::UNSPECIFIED.into(), 0),
        }
    }
}

//------------------------------------------------------------------------------------------
// XcpMasterBuilder

/// A builder pattern to configure and open a master
#[derive(Debug, Default)]
pub struct XcpMasterBuilder {
    config: XcpConfig,
}

impl XcpMasterBuilder {
    /// Create a XcpMasterBuilder with default settings (TCP, localhost:5555, 2s timeout)
    pub fn new() -> XcpMasterBuilder {
        XcpMasterBuilder { config: XcpConfig::default() }
    }

    pub fn set_transport(mut self, transport: XcpTransportLayer) -> Self {
        self.config.transport = transport;
        self
    }

    pub fn set_host(mut self, host: &str) -> Self {
        self.config.host = host.to_string();
        self
    }

    pub fn set_port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Use IPv6, "localhost" then means ::1
    pub fn set_ipv6(mut self, ipv6: bool) -> Self {
        self.config.ipv6 = ipv6;
        self
    }

    /// Set the command response timeout
    pub fn set_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set log level
    /// The master only emits log records, the log level is applied by the application logger
    pub fn set_log_level(mut self, log_level: XcpLogLevel) -> Self {
        self.config.log_level = log_level;
        self
    }

    pub fn build(self) -> XcpConfig {
        self.config
    }

    /// Open the transport and start the listener, the slave is not connected yet
    pub async fn open(self) -> Result<XcpMaster> {
        XcpMaster::open(self.config).await
    }
}

//----------------------------------------------------------------------------------------------
