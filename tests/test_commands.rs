// test_commands
// Integration test for the CAL, PAG, DAQ and PGM commands of the XCP master
// Parameters are checked by the scripted slave in tests/slave, which decodes them with the negotiated byte order

// cargo test --test test_commands -- --nocapture

use std::time::Duration;

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use xcp_master::*;

mod slave;
use slave::*;

const TIMEOUT: Duration = Duration::from_millis(500);

async fn connect(byte_order: ByteOrder) -> (TestSlave, XcpMaster) {
    test_setup();
    let slave = TestSlave::start(SlaveConfig {
        byte_order,
        ..Default::default()
    })
    .await;
    let xcp = XcpMaster::open(slave.master_config(XcpTransportLayer::Tcp, TIMEOUT)).await.unwrap();
    xcp.connect().await.unwrap();
    (slave, xcp)
}

//-----------------------------------------------------------------------------
// CAL

#[tokio::test]
async fn test_download() {
    for byte_order in [ByteOrder::Intel, ByteOrder::Motorola] {
        let (_slave, xcp) = connect(byte_order).await;

        xcp.set_mta(0x600, 0).await.unwrap();
        xcp.download(&[1, 2, 3, 4]).await.unwrap();
        xcp.download_next(&[5, 6]).await.unwrap();
        assert_eq!(xcp.short_upload(6, 0x600, 0).await.unwrap().as_ref(), &[1, 2, 3, 4, 5, 6]);

        xcp.short_download(0x700, 0, &[9, 9]).await.unwrap();
        assert_eq!(xcp.short_upload(2, 0x700, 0).await.unwrap().as_ref(), &[9, 9]);
        // MTA not changed by SHORT_DOWNLOAD
        xcp.download_max(&[7; 63]).await.unwrap();
        assert_eq!(xcp.short_upload(63, 0x606, 0).await.unwrap().as_ref(), &[7; 63]);

        // Outside the slave memory
        let e = xcp.short_download(0xFFFF, 0, &[1, 2]).await.unwrap_err();
        assert_eq!(e.error_code(), Some(ErrorCode::OutOfRange));
    }
}

#[tokio::test]
async fn test_user_and_transport_layer_cmd() {
    let (_slave, xcp) = connect(ByteOrder::Intel).await;
    assert_eq!(xcp.user_cmd(0x01, &[0xAA, 0xBB]).await.unwrap().as_ref(), &[0x01, 0xAA, 0xBB]);
    assert_eq!(xcp.transport_layer_cmd(0xFF, &[]).await.unwrap().as_ref(), &[0xFF]);
}

//-----------------------------------------------------------------------------
// PAG

#[tokio::test]
async fn test_pages_and_segments() {
    let (_slave, xcp) = connect(ByteOrder::Intel).await;

    assert_eq!(xcp.get_cal_page(SetCalPageMode::XCP.bits(), 0).await.unwrap(), 0);
    xcp.set_cal_page(SetCalPageMode::ECU | SetCalPageMode::XCP, 0, 1).await.unwrap();
    assert_eq!(xcp.get_cal_page(SetCalPageMode::ECU.bits(), 0).await.unwrap(), 1);
    let e = xcp.set_cal_page(SetCalPageMode::ALL, 0, 5).await.unwrap_err();
    assert_eq!(e.error_code(), Some(ErrorCode::PageNotValid));

    let info = xcp.get_pag_processor_info().await.unwrap();
    assert_eq!(info.max_segments, 1);
    assert!(info.pag_properties.contains(PagProperties::FREEZE_SUPPORTED));

    match xcp.get_segment_info(SegmentInfoMode::Standard, 0, 0, 0).await.unwrap() {
        SegmentInfo::Standard { max_pages, .. } => assert_eq!(max_pages, 2),
        s => panic!("unexpected {:?}", s),
    }
    assert_eq!(
        xcp.get_segment_info(SegmentInfoMode::BasicAddress, 0, 0, 0).await.unwrap(),
        SegmentInfo::BasicAddress { basic_info: 0x8000_0000 }
    );

    let page = xcp.get_page_info(0, 0).await.unwrap();
    assert!(page.properties.contains(PageProperties::ECU_ACCESS_WITHOUT_XCP));
    assert_eq!(page.init_segment, 0);

    xcp.set_segment_mode(1, 0).await.unwrap();
    assert_eq!(xcp.get_segment_mode(0).await.unwrap(), 1);
    xcp.copy_cal_page(0, 0, 0, 1).await.unwrap();
}

//-----------------------------------------------------------------------------
// DAQ

#[tokio::test]
async fn test_daq_setup() {
    for byte_order in [ByteOrder::Intel, ByteOrder::Motorola] {
        let (slave, xcp) = connect(byte_order).await;

        let info = xcp.get_daq_processor_info().await.unwrap();
        assert_eq!(info.max_event_channel, 2);
        assert!(info.daq_properties.contains(DaqProperties::DAQ_CONFIG_TYPE));
        assert_eq!(info.daq_key_byte.address_extension, AddressExtensionMode::SameForAllDaq);

        xcp.free_daq().await.unwrap();
        xcp.alloc_daq(2).await.unwrap();
        xcp.alloc_odt(1, 1).await.unwrap();
        xcp.alloc_odt_entry(1, 0, 2).await.unwrap();
        xcp.set_daq_ptr(1, 0, 0).await.unwrap();
        xcp.write_daq(0xFF, 4, 0, 0x1000).await.unwrap();
        xcp.write_daq(0xFF, 2, 0, 0x1004).await.unwrap();
        xcp.set_daq_ptr(1, 0, 1).await.unwrap();
        let entry = xcp.read_daq().await.unwrap();
        assert_eq!(
            entry,
            OdtEntry {
                bit_offset: 0xFF,
                size: 2,
                address_extension: 0,
                address: 0x1004
            }
        );
        let e = xcp.read_daq().await.unwrap_err();
        assert!(matches!(e, XcpError::SlaveRejected { code: ErrorCode::OutOfRange, .. }));
        xcp.set_daq_list_mode(CurrentMode::TIMESTAMP, 1, 1, 1, 0).await.unwrap();
        xcp.clear_daq_list(0).await.unwrap();

        assert_eq!(xcp.start_stop_daq_list(2, 1).await.unwrap(), 4);
        xcp.start_stop_synch(1).await.unwrap();
        assert!(xcp.get_status().await.unwrap().session_status.contains(SessionStatus::DAQ_RUNNING));
        assert_eq!(xcp.get_daq_clock().await.unwrap(), 0x1234_5678);
        xcp.start_stop_synch(0).await.unwrap();
        assert!(!xcp.get_status().await.unwrap().session_status.contains(SessionStatus::DAQ_RUNNING));

        assert!(slave.commands().contains(&Command::AllocOdtEntry));
    }
}

#[tokio::test]
async fn test_daq_packed_mode() {
    let (_slave, xcp) = connect(ByteOrder::Motorola).await;

    assert_eq!(xcp.get_daq_packed_mode(0).await.unwrap(), DaqPackedMode::None);
    let mode = DaqPackedMode::EventGrouped(DaqPackedModeParams {
        timestamp_mode: 1,
        sample_count: 300,
    });
    xcp.set_daq_packed_mode(0, mode).await.unwrap();
    assert_eq!(xcp.get_daq_packed_mode(0).await.unwrap(), mode);
    xcp.set_daq_packed_mode(0, DaqPackedMode::None).await.unwrap();
    assert_eq!(xcp.get_daq_packed_mode(0).await.unwrap(), DaqPackedMode::None);
}

//-----------------------------------------------------------------------------
// PGM

#[tokio::test]
async fn test_programming_sequence() {
    let (slave, xcp) = connect(ByteOrder::Intel).await;

    let start = xcp.program_start().await.unwrap();
    assert_eq!(start.max_cto_pgm, 64);

    xcp.set_mta(0x800, 0).await.unwrap();
    xcp.program_clear(0, 16).await.unwrap();
    assert_eq!(xcp.short_upload(16, 0x800, 0).await.unwrap().as_ref(), &[0xFF; 16]);

    xcp.set_mta(0x800, 0).await.unwrap();
    xcp.program(&[1, 2, 3]).await.unwrap();
    xcp.program_next(&[4]).await.unwrap();
    xcp.program_max(&[5; 63]).await.unwrap();
    let data = xcp.short_upload(8, 0x800, 0).await.unwrap();
    assert_eq!(data.as_ref(), &[1, 2, 3, 4, 5, 5, 5, 5]);

    // Not implemented by the slave, parameters are still encoded
    let e = xcp.program_verify(1, 0x0200, 0xDEAD_BEEF).await.unwrap_err();
    assert_eq!(e.error_code(), Some(ErrorCode::CmdUnknown));
    assert_eq!(e.command(), Some(Command::ProgramVerify));
    assert!(xcp.program_prepare(0x100).await.is_err());
    assert!(xcp.program_format(0, 0, 0, 0).await.is_err());
    assert!(xcp.get_sector_info(SectorInfoMode::StartAddress, 0).await.is_err());
    assert!(xcp.get_pgm_processor_info().await.is_err());

    xcp.program_reset().await.unwrap();
    assert_eq!(slave.commands().last(), Some(&Command::ProgramReset));
}
