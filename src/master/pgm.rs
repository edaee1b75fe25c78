//----------------------------------------------------------------------------------------------
// Module master::pgm
// Flash programming (PGM) commands

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use super::{data_len, XcpMaster};
use crate::error::Result;
use crate::protocol::types::*;
use crate::protocol::Command;

impl XcpMaster {
    /// Begin a programming sequence
    pub async fn program_start(&self) -> Result<ProgramStartResponse> {
        let res = self.execute_bytes(&mut self.command(Command::ProgramStart), |r| ProgramStartResponse::read(r)).await?;
        info!("PROGRAM_START, max_cto_pgm = {}", res.max_cto_pgm);
        Ok(res)
    }

    /// Clear `clear_range` bytes at the MTA (mode 0) or functional areas (mode 1)
    pub async fn program_clear(&self, mode: u8, clear_range: u32) -> Result<()> {
        let mut cmd = self.command(Command::ProgramClear);
        cmd.add_u8(mode).add_u8(0).add_u8(0).add_u32(clear_range);
        self.execute(&mut cmd).await?;
        Ok(())
    }

    pub async fn program(&self, data: &[u8]) -> Result<()> {
        let mut cmd = self.command(Command::Program);
        cmd.add_u8(data_len(Command::Program, data)?).add_u8_slice(data);
        self.execute(&mut cmd).await?;
        Ok(())
    }

    pub async fn program_reset(&self) -> Result<()> {
        self.execute(&mut self.command(Command::ProgramReset)).await?;
        Ok(())
    }

    pub async fn get_pgm_processor_info(&self) -> Result<PgmProcessorInfo> {
        self.execute_bytes(&mut self.command(Command::GetPgmProcessorInfo), |r| PgmProcessorInfo::read(r)).await
    }

    /// The response layout depends on `mode`
    pub async fn get_sector_info(&self, mode: SectorInfoMode, sector: u8) -> Result<SectorInfo> {
        let mut cmd = self.command(Command::GetSectorInfo);
        cmd.add_u8(mode.value()).add_u8(sector);
        let payload = self.execute(&mut cmd).await?;
        SectorInfo::decode(mode, &payload, self.require_byte_order()?)
    }

    pub async fn program_prepare(&self, codesize: u16) -> Result<()> {
        let mut cmd = self.command(Command::ProgramPrepare);
        cmd.add_u8(0).add_u16(codesize);
        self.execute(&mut cmd).await?;
        Ok(())
    }

    pub async fn program_format(&self, compression_method: u8, encryption_method: u8, programming_method: u8, access_method: u8) -> Result<()> {
        let mut cmd = self.command(Command::ProgramFormat);
        cmd.add_u8(compression_method).add_u8(encryption_method).add_u8(programming_method).add_u8(access_method);
        self.execute(&mut cmd).await?;
        Ok(())
    }

    /// Continue a block mode programming sequence
    pub async fn program_next(&self, data: &[u8]) -> Result<()> {
        let mut cmd = self.command(Command::ProgramNext);
        cmd.add_u8(data_len(Command::ProgramNext, data)?).add_u8_slice(data);
        self.execute(&mut cmd).await?;
        Ok(())
    }

    pub async fn program_max(&self, data: &[u8]) -> Result<()> {
        let mut cmd = self.command(Command::ProgramMax);
        cmd.add_u8_slice(data);
        self.execute(&mut cmd).await?;
        Ok(())
    }

    pub async fn program_verify(&self, verification_mode: u8, verification_type: u16, verification_value: u32) -> Result<()> {
        let mut cmd = self.command(Command::ProgramVerify);
        cmd.add_u8(verification_mode).add_u16(verification_type).add_u32(verification_value);
        self.execute(&mut cmd).await?;
        Ok(())
    }
}
