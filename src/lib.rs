//-----------------------------------------------------------------------------
// Crate xcp_master
// Path: src/lib.rs

//
// XCP on Ethernet master
// Integration tests open localhost sockets, use cargo test -- --nocapture to see the log output

// This crate is a library
#![crate_type = "lib"]
// The library crate is named "xcp_master"
#![crate_name = "xcp_master"]
//
// Disabled clippy lints
#![warn(clippy::pedantic)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::struct_field_names)]
#![allow(clippy::unreadable_literal)]
#![allow(clippy::if_not_else)]
#![allow(clippy::wildcard_imports)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::struct_excessive_bools)]

//! A master side implementation of the XCP protocol on Ethernet (TCP and UDP).
//!
//! The crate is layered bottom up:
//! - [`codec`]: runtime selected Intel/Motorola word and dword packing
//! - [`protocol`]: the command catalog, the response layouts and the error codes
//! - [`transport`]: the socket owner with its background listener and the pending request table
//! - [`master`]: the [`XcpMaster`] facade, one async method per XCP service
//!
//! ## Example
//!
//! ```no_run
//! use xcp_master::*;
//!
//! # async fn demo() -> Result<()> {
//! let xcp = XcpMasterBuilder::new().set_transport(XcpTransportLayer::Tcp).set_host("127.0.0.1").set_port(5555).open().await?;
//! let connect = xcp.connect().await?;
//! println!("max_cto={} max_dto={}", connect.max_cto, connect.max_dto);
//! xcp.set_mta(0x1000, 0).await?;
//! let data = xcp.fetch(64, None).await?;
//! assert_eq!(data.len(), 64);
//! assert!(xcp.verify(0x1000, 64).await?.is_match());
//! xcp.disconnect().await?;
//! xcp.close().await;
//! # Ok(())
//! # }
//! ```

pub mod checksum;
pub mod codec;
pub mod config;
pub mod error;
pub mod master;
pub mod protocol;
pub mod transport;

pub use checksum::checksum;
pub use codec::ByteOrder;
pub use config::{XcpConfig, XcpLogLevel, XcpMasterBuilder, XcpTransportLayer};
pub use error::{Result, XcpError};
pub use master::{UserChecksumFn, VerifyReport, XcpMaster};
pub use protocol::event::AsyncMessage;
pub use protocol::types::*;
pub use protocol::{Command, CommandCategory, ErrorCode, Pid, ResponseLayout};
pub use transport::frame::Frame;
pub use transport::{EthTransport, TransportState};
