//----------------------------------------------------------------------------------------------
// Module master::cal
// Calibration (CAL) and page switching (PAG) commands

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use super::{data_len, XcpMaster};
use crate::error::Result;
use crate::protocol::types::*;
use crate::protocol::Command;

impl XcpMaster {
    //------------------------------------------------------------------------
    // CAL

    /// Write data to the MTA, the MTA is post incremented
    pub async fn download(&self, data: &[u8]) -> Result<()> {
        let mut cmd = self.command(Command::Download);
        cmd.add_u8(data_len(Command::Download, data)?).add_u8_slice(data);
        self.execute(&mut cmd).await?;
        Ok(())
    }

    /// Continue a block mode download
    pub async fn download_next(&self, data: &[u8]) -> Result<()> {
        let mut cmd = self.command(Command::DownloadNext);
        cmd.add_u8(data_len(Command::DownloadNext, data)?).add_u8_slice(data);
        self.execute(&mut cmd).await?;
        Ok(())
    }

    /// Download MAX_CTO-1 bytes, no length parameter
    pub async fn download_max(&self, data: &[u8]) -> Result<()> {
        let mut cmd = self.command(Command::DownloadMax);
        cmd.add_u8_slice(data);
        self.execute(&mut cmd).await?;
        Ok(())
    }

    /// Download with an explicit address, the MTA is not changed
    pub async fn short_download(&self, addr: u32, ext: u8, data: &[u8]) -> Result<()> {
        let mut cmd = self.command(Command::ShortDownload);
        cmd.add_u8(data_len(Command::ShortDownload, data)?).add_u8(0).add_u8(ext).add_u32(addr).add_u8_slice(data);
        self.execute(&mut cmd).await?;
        Ok(())
    }

    /// Modify the bits of the 32 bit word at the MTA
    /// x = ((x & ((!(and_mask << shift))) ^ (xor_mask << shift))
    pub async fn modify_bits(&self, shift: u8, and_mask: u16, xor_mask: u16) -> Result<()> {
        let mut cmd = self.command(Command::ModifyBits);
        cmd.add_u8(shift).add_u16(and_mask).add_u16(xor_mask);
        self.execute(&mut cmd).await?;
        Ok(())
    }

    //------------------------------------------------------------------------
    // PAG

    pub async fn set_cal_page(&self, mode: SetCalPageMode, segment: u8, page: u8) -> Result<()> {
        let mut cmd = self.command(Command::SetCalPage);
        cmd.add_u8(mode.bits()).add_u8(segment).add_u8(page);
        self.execute(&mut cmd).await?;
        Ok(())
    }

    /// Returns the logical page number active for ECU or XCP access (mode 1 or 2)
    pub async fn get_cal_page(&self, mode: u8, segment: u8) -> Result<u8> {
        let mut cmd = self.command(Command::GetCalPage);
        cmd.add_u8(mode).add_u8(segment);
        self.execute_bytes(&mut cmd, |r| {
            r.skip(2)?;
            r.u8()
        })
        .await
    }

    pub async fn get_pag_processor_info(&self) -> Result<PagProcessorInfo> {
        self.execute_bytes(&mut self.command(Command::GetPagProcessorInfo), |r| PagProcessorInfo::read(r)).await
    }

    /// The response layout depends on `mode`
    pub async fn get_segment_info(&self, mode: SegmentInfoMode, segment: u8, segment_info: u8, mapping_index: u8) -> Result<SegmentInfo> {
        let mut cmd = self.command(Command::GetSegmentInfo);
        cmd.add_u8(mode.value()).add_u8(segment).add_u8(segment_info).add_u8(mapping_index);
        let payload = self.execute(&mut cmd).await?;
        SegmentInfo::decode(mode, &payload, self.require_byte_order()?)
    }

    pub async fn get_page_info(&self, segment: u8, page: u8) -> Result<PageInfo> {
        let mut cmd = self.command(Command::GetPageInfo);
        cmd.add_u8(0).add_u8(segment).add_u8(page);
        self.execute_bytes(&mut cmd, |r| PageInfo::read(r)).await
    }

    pub async fn set_segment_mode(&self, mode: u8, segment: u8) -> Result<()> {
        let mut cmd = self.command(Command::SetSegmentMode);
        cmd.add_u8(mode).add_u8(segment);
        self.execute(&mut cmd).await?;
        Ok(())
    }

    pub async fn get_segment_mode(&self, segment: u8) -> Result<u8> {
        let mut cmd = self.command(Command::GetSegmentMode);
        cmd.add_u8(0).add_u8(segment);
        self.execute_bytes(&mut cmd, |r| {
            r.skip(1)?;
            r.u8()
        })
        .await
    }

    pub async fn copy_cal_page(&self, src_segment: u8, src_page: u8, dst_segment: u8, dst_page: u8) -> Result<()> {
        let mut cmd = self.command(Command::CopyCalPage);
        cmd.add_u8(src_segment).add_u8(src_page).add_u8(dst_segment).add_u8(dst_page);
        self.execute(&mut cmd).await?;
        debug!("COPY_CAL_PAGE {}:{} -> {}:{}", src_segment, src_page, dst_segment, dst_page);
        Ok(())
    }
}
