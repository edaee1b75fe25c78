//-----------------------------------------------------------------------------
// xcp_client - XCP master command line front end
// Connects to a XCP slave, prints the slave properties and optionally uploads or verifies a memory range
// The example uses the tokio runtime and async/await syntax.
//
// Run:
// cargo r -p xcp_client -- -h
// cargo r -p xcp_client -- --tcp -d 192.168.0.83 --addr 0x80010000 --len 256 --verify

use std::error::Error;
use std::time::Duration;

use xcp_master::protocol::event::{AsyncMessage, ServiceRequest};
use xcp_master::*;

//-----------------------------------------------------------------------------
// Command line arguments

use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    // -l --log-level
    /// Log level (Off=0, Error=1, Warn=2, Info=3, Debug=4, Trace=5)
    #[arg(short, long, default_value_t = 3)]
    log_level: u8,

    // -d --dest-addr
    /// XCP slave host name or address
    #[arg(short, long, default_value = "127.0.0.1")]
    dest_addr: String,

    // -p --port
    /// XCP slave port number
    #[arg(short, long, default_value_t = 5555)]
    port: u16,

    // --tcp
    /// Use TCP instead of UDP
    #[arg(long, default_value_t = false)]
    tcp: bool,

    // -6 --ipv6
    /// Use IPv6, localhost means ::1
    #[arg(short = '6', long, default_value_t = false)]
    ipv6: bool,

    // -t --timeout-ms
    /// Command response timeout in ms
    #[arg(short, long, default_value_t = 2000)]
    timeout_ms: u64,

    // -a --addr
    /// Start address of a memory range to upload (decimal or 0x hex)
    #[arg(short, long, value_parser = parse_addr)]
    addr: Option<u32>,

    // --ext
    /// Address extension
    #[arg(long, default_value_t = 0)]
    ext: u8,

    // --len
    /// Length of the memory range to upload
    #[arg(long, default_value_t = 64)]
    len: u32,

    // --verify
    /// Compare the slave checksum of the memory range with the uploaded data
    #[arg(long, default_value_t = false)]
    verify: bool,

    // --events
    /// Print events and service requests for the given time in ms
    #[arg(long, default_value_t = 0)]
    events_ms: u64,
}

fn parse_addr(s: &str) -> std::result::Result<u32, std::num::ParseIntError> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    }
}

//----------------------------------------------------------------------------------------------
// Logging

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

//------------------------------------------------------------------------
// Print the slave properties

async fn print_slave_info(xcp: &XcpMaster) -> Result<()> {
    let c = xcp.connect().await?;
    println!("Slave properties:");
    println!("  resources:      {:?}", c.resource);
    println!("  byte order:     {:?}", c.byte_order());
    println!("  granularity:    {:?}", c.address_granularity());
    println!("  max_cto:        {}", c.max_cto);
    println!("  max_dto:        {}", c.max_dto);
    println!("  block mode:     {}", c.slave_block_mode());
    println!("  protocol layer: {}", c.protocol_layer_version);

    let status = xcp.get_status().await?;
    println!("  session status: {:?}", status.session_status);
    println!("  protection:     {:?}", status.resource_protection);

    match xcp.get_id(1).await {
        Ok(id) => println!("  identification: {}", id.identification_str().unwrap_or_default()),
        Err(e) => warn!("GET_ID failed: {}", e),
    }

    // Optional commands, a slave may not implement them
    match xcp.get_version().await {
        Ok(v) => println!("  version:        protocol {}.{}, transport {}.{}", v.protocol_major, v.protocol_minor, v.transport_major, v.transport_minor),
        Err(e) => debug!("GET_VERSION failed: {}", e),
    }
    if xcp.supports_daq() {
        match xcp.get_daq_processor_info().await {
            Ok(info) => println!("  DAQ:            {:?}, {} event channels", info.daq_properties, info.max_event_channel),
            Err(e) => debug!("GET_DAQ_PROCESSOR_INFO failed: {}", e),
        }
    }
    if xcp.supports_calpag() {
        match xcp.get_pag_processor_info().await {
            Ok(info) => println!("  PAG:            {} segments", info.max_segments),
            Err(e) => debug!("GET_PAG_PROCESSOR_INFO failed: {}", e),
        }
    }
    println!();
    Ok(())
}

fn print_hex(addr: u32, data: &[u8]) {
    for (i, line) in data.chunks(16).enumerate() {
        println!("  {:08X}: {:02X?}", addr as usize + i * 16, line);
    }
}

//------------------------------------------------------------------------
// Main function

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let log_level = XcpLogLevel::from(args.log_level);
    env_logger::Builder::new()
        .target(env_logger::Target::Stdout)
        .filter_level(log_level.to_log_level_filter())
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .init();

    let xcp = XcpMasterBuilder::new()
        .set_transport(if args.tcp { XcpTransportLayer::Tcp } else { XcpTransportLayer::Udp })
        .set_host(&args.dest_addr)
        .set_port(args.port)
        .set_ipv6(args.ipv6)
        .set_timeout(Duration::from_millis(args.timeout_ms))
        .set_log_level(log_level)
        .open()
        .await?;
    info!("dest_addr: {}", xcp.transport().dest_addr());
    let mut async_rx = xcp.take_async_receiver();

    print_slave_info(&xcp).await?;

    // Upload and verify a memory range
    if let Some(addr) = args.addr {
        xcp.set_mta(addr, args.ext).await?;
        let data = xcp.fetch(args.len as usize, None).await?;
        println!("Upload {}:{:08X}, {} bytes:", args.ext, addr, data.len());
        print_hex(addr, &data);

        if args.verify {
            match xcp.verify(addr, args.len).await {
                Ok(report) if report.is_match() => println!("Checksum {:?} 0x{:08X} ok", report.checksum_type, report.slave),
                Ok(report) => println!("Checksum {:?} mismatch, slave 0x{:08X}, uploaded data 0x{:08X}", report.checksum_type, report.slave, report.local),
                Err(e) => error!("verify failed: {}", e),
            }
        }
    }

    // Print asynchronous messages
    if args.events_ms > 0 {
        if let Some(rx) = async_rx.as_mut() {
            let deadline = tokio::time::Instant::now() + Duration::from_millis(args.events_ms);
            while let Ok(Some(msg)) = tokio::time::timeout_at(deadline, rx.recv()).await {
                match msg {
                    AsyncMessage::Service(ServiceRequest::Text(text)) => println!("[SERV_TEXT] {}", text),
                    AsyncMessage::Daq { .. } => {}
                    msg => println!("{:?}", msg),
                }
            }
        }
    }

    // Disconnect
    xcp.disconnect().await?;
    xcp.close().await;
    Ok(())
}
