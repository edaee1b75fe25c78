//----------------------------------------------------------------------------------------------
// Module master::daq
// Data acquisition (DAQ) commands

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use super::XcpMaster;
use crate::error::Result;
use crate::protocol::types::*;
use crate::protocol::Command;

impl XcpMaster {
    //------------------------------------------------------------------------
    // DAQ list configuration

    pub async fn clear_daq_list(&self, daq: u16) -> Result<()> {
        let mut cmd = self.command(Command::ClearDaqList);
        cmd.add_u8(0).add_u16(daq);
        self.execute(&mut cmd).await?;
        Ok(())
    }

    /// Set the DAQ list pointer for WRITE_DAQ and READ_DAQ
    pub async fn set_daq_ptr(&self, daq: u16, odt: u8, entry: u8) -> Result<()> {
        let mut cmd = self.command(Command::SetDaqPtr);
        cmd.add_u8(0).add_u16(daq).add_u8(odt).add_u8(entry);
        self.execute(&mut cmd).await?;
        Ok(())
    }

    /// Write the ODT entry at the DAQ pointer, the pointer is post incremented
    pub async fn write_daq(&self, bit_offset: u8, size: u8, ext: u8, addr: u32) -> Result<()> {
        let mut cmd = self.command(Command::WriteDaq);
        cmd.add_u8(bit_offset).add_u8(size).add_u8(ext).add_u32(addr);
        self.execute(&mut cmd).await?;
        Ok(())
    }

    pub async fn set_daq_list_mode(&self, mode: CurrentMode, daq: u16, event: u16, prescaler: u8, priority: u8) -> Result<()> {
        let mut cmd = self.command(Command::SetDaqListMode);
        cmd.add_u8(mode.bits()).add_u16(daq).add_u16(event).add_u8(prescaler).add_u8(priority);
        self.execute(&mut cmd).await?;
        Ok(())
    }

    pub async fn get_daq_list_mode(&self, daq: u16) -> Result<DaqListMode> {
        let mut cmd = self.command(Command::GetDaqListMode);
        cmd.add_u8(0).add_u16(daq);
        self.execute_decode(&mut cmd).await
    }

    /// Start, stop or select a DAQ list (mode 0, 1, 2), returns the first PID of the list
    pub async fn start_stop_daq_list(&self, mode: u8, daq: u16) -> Result<u8> {
        let mut cmd = self.command(Command::StartStopDaqList);
        cmd.add_u8(mode).add_u16(daq);
        let first_pid = self.execute_bytes(&mut cmd, |r| r.u8()).await?;
        debug!("START_STOP_DAQ_LIST mode={} daq={} -> first_pid={}", mode, daq, first_pid);
        Ok(first_pid)
    }

    /// Stop all (0), start selected (1) or stop selected (2) DAQ lists
    pub async fn start_stop_synch(&self, mode: u8) -> Result<()> {
        let mut cmd = self.command(Command::StartStopSynch);
        cmd.add_u8(mode);
        self.execute(&mut cmd).await?;
        Ok(())
    }

    pub async fn get_daq_clock(&self) -> Result<u32> {
        let clock: DaqClock = self.execute_decode(&mut self.command(Command::GetDaqClock)).await?;
        Ok(clock.timestamp)
    }

    /// Read the ODT entry at the DAQ pointer
    pub async fn read_daq(&self) -> Result<OdtEntry> {
        self.execute_decode(&mut self.command(Command::ReadDaq)).await
    }

    //------------------------------------------------------------------------
    // DAQ information

    pub async fn get_daq_processor_info(&self) -> Result<DaqProcessorInfo> {
        self.execute_decode(&mut self.command(Command::GetDaqProcessorInfo)).await
    }

    pub async fn get_daq_resolution_info(&self) -> Result<DaqResolutionInfo> {
        self.execute_decode(&mut self.command(Command::GetDaqResolutionInfo)).await
    }

    pub async fn get_daq_list_info(&self, daq: u16) -> Result<DaqListInfo> {
        let mut cmd = self.command(Command::GetDaqListInfo);
        cmd.add_u8(0).add_u16(daq);
        self.execute_decode(&mut cmd).await
    }

    pub async fn get_daq_event_info(&self, event: u16) -> Result<EventChannelInfo> {
        let mut cmd = self.command(Command::GetDaqEventInfo);
        cmd.add_u8(0).add_u16(event);
        self.execute_decode(&mut cmd).await
    }

    //------------------------------------------------------------------------
    // Packed mode

    pub async fn set_daq_packed_mode(&self, daq: u16, mode: DaqPackedMode) -> Result<()> {
        let mut cmd = self.command(Command::SetDaqPackedMode);
        cmd.add_u16(daq).add_u8(mode.mode_value());
        if let Some(p) = mode.params() {
            cmd.add_u8(p.timestamp_mode).add_u16(p.sample_count);
        }
        self.execute(&mut cmd).await?;
        Ok(())
    }

    pub async fn get_daq_packed_mode(&self, daq: u16) -> Result<DaqPackedMode> {
        let mut cmd = self.command(Command::GetDaqPackedMode);
        cmd.add_u16(daq);
        self.execute_decode(&mut cmd).await
    }

    //------------------------------------------------------------------------
    // Dynamic DAQ configuration
    // FREE_DAQ, ALLOC_DAQ, ALLOC_ODT, ALLOC_ODT_ENTRY have to be sent in this order

    pub async fn free_daq(&self) -> Result<()> {
        self.execute(&mut self.command(Command::FreeDaq)).await?;
        Ok(())
    }

    pub async fn alloc_daq(&self, daq_count: u16) -> Result<()> {
        let mut cmd = self.command(Command::AllocDaq);
        cmd.add_u8(0).add_u16(daq_count);
        self.execute(&mut cmd).await?;
        Ok(())
    }

    pub async fn alloc_odt(&self, daq: u16, odt_count: u8) -> Result<()> {
        let mut cmd = self.command(Command::AllocOdt);
        cmd.add_u8(0).add_u16(daq).add_u8(odt_count);
        self.execute(&mut cmd).await?;
        Ok(())
    }

    pub async fn alloc_odt_entry(&self, daq: u16, odt: u8, odt_entries_count: u8) -> Result<()> {
        let mut cmd = self.command(Command::AllocOdtEntry);
        cmd.add_u8(0).add_u16(daq).add_u8(odt).add_u8(odt_entries_count);
        self.execute(&mut cmd).await?;
        Ok(())
    }
}
