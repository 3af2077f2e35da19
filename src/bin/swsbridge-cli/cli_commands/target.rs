// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 swsbridge contributors

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use swsbridge::serial::{SwsClient, hexdump};

use crate::CliArguments;
use crate::cli_commands::{open_client, parse_number};

/// Readouts are fetched in chunks of this many bytes
const BLOCK_SIZE: u32 = 1024;
/// Top of the 16-bit debug address space
const ADDRESS_SPACE_END: u32 = 0x1_0000;

#[derive(Args)]
pub struct TargetArguments
{
	#[command(subcommand)]
	subcommand: TargetCommands,
}

#[derive(Subcommand)]
#[command(arg_required_else_help(true))]
enum TargetCommands
{
	/// Print the target's SOC identity
	SocId,
	/// Hex dump a region of the target's memory
	Dump(DumpArguments),
	/// Save a region of the target's RAM to a file
	ReadRam(ReadoutArguments),
	/// Save a region of the target's SPI flash to a file
	ReadFlash(ReadoutArguments),
	/// Print the status byte of the target's SPI flash
	FlashStatus,
	/// Reset the target and let it run
	Reset,
}

#[derive(Args)]
struct DumpArguments
{
	#[arg(value_parser = parse_number::<u16>)]
	/// Address to start dumping from
	address: u16,
	#[arg(value_parser = parse_number::<u16>, default_value = "0x100")]
	/// Number of bytes to dump
	length: u16,
}

#[derive(Args)]
struct ReadoutArguments
{
	/// File to write the readout to
	filename: PathBuf,
	#[arg(value_parser = parse_number::<u32>)]
	/// Address to start reading from (default 0)
	address: Option<u32>,
	#[arg(value_parser = parse_number::<u32>)]
	/// Number of bytes to read (default 0xc000 for RAM, 0x7d000 for flash)
	length: Option<u32>,
}

impl TargetArguments
{
	pub fn subcommand(&self, cli_args: &CliArguments) -> Result<()>
	{
		let mut client = open_client(cli_args)?;
		client.connect().wrap_err("Failed to attach to the target")?;
		match &self.subcommand {
			TargetCommands::SocId => {
				println!("SOC ID: {:#06x}", client.soc_id()?);
				Ok(())
			},
			TargetCommands::Dump(dump_args) => {
				let data = client.read_bytes(dump_args.address, dump_args.length)?;
				print!("{}", hexdump(&data, u32::from(dump_args.address)));
				Ok(())
			},
			TargetCommands::ReadRam(readout_args) => read_ram(&mut client, readout_args),
			TargetCommands::ReadFlash(readout_args) => read_flash(&mut client, readout_args),
			TargetCommands::FlashStatus => {
				println!("Flash status byte: {:#04x}", client.flash_status()?);
				Ok(())
			},
			TargetCommands::Reset => {
				client.run()?;
				info!("Target reset and running");
				Ok(())
			},
		}
	}
}

fn read_ram<P: Read + Write>(client: &mut SwsClient<P>, readout_args: &ReadoutArguments) -> Result<()>
{
	let address = readout_args.address.unwrap_or(0);
	let length = readout_args.length.unwrap_or(0xc000);
	let end = region_end(address, length)?;
	if end > ADDRESS_SPACE_END {
		return Err(eyre!(
			"RAM region {:#06x}+{:#x} runs past the end of the debug address space",
			address,
			length
		));
	}
	println!(
		"Reading RAM from {:#06x}-{:#06x} into '{}':",
		address,
		end,
		readout_args.filename.display()
	);
	save_blocks(&readout_args.filename, address, end, |base, count| {
		// Both fit in 16 bits, checked against the address space above
		Ok(client.read_bytes(base as u16, count as u16)?)
	})
}

fn read_flash<P: Read + Write>(client: &mut SwsClient<P>, readout_args: &ReadoutArguments) -> Result<()>
{
	let address = readout_args.address.unwrap_or(0);
	let length = readout_args.length.unwrap_or(0x7d000);
	let end = region_end(address, length)?;
	println!(
		"Reading flash from {:#010x}-{:#010x} into '{}':",
		address,
		end,
		readout_args.filename.display()
	);
	save_blocks(&readout_args.filename, address, end, |base, count| {
		Ok(client.read_flash_block(base, count as usize)?)
	})
}

fn region_end(address: u32, length: u32) -> Result<u32>
{
	address
		.checked_add(length)
		.ok_or_else(|| eyre!("Region {:#x}+{:#x} overflows a 32-bit address", address, length))
}

/// Fetch `[address, end)` a block at a time with `read_block`, streaming it to `filename`
/// behind a progress bar
fn save_blocks<F>(filename: &Path, address: u32, end: u32, mut read_block: F) -> Result<()>
where
	F: FnMut(u32, u32) -> Result<Vec<u8>>,
{
	let file = File::create(filename).wrap_err_with(|| format!("Failed to create {}", filename.display()))?;
	let mut file = BufWriter::new(file);

	let progress_bar = ProgressBar::new(u64::from(end - address)).with_style(
		ProgressStyle::default_bar()
			.template(" {percent:>3}% |{bar:50}| {bytes}/{total_bytes} [{binary_bytes_per_sec} {elapsed}]")?,
	);

	for base in (address..end).step_by(BLOCK_SIZE as usize) {
		let count = BLOCK_SIZE.min(end - base);
		let block = read_block(base, count)?;
		file.write_all(&block)?;
		progress_bar.inc(u64::from(count));
	}
	progress_bar.finish();
	file.flush()?;
	Ok(())
}
