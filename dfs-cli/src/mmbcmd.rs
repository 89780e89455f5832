use std::error::Error;
use std::path::PathBuf;

use clap::Subcommand;
use dfs::MmbFile;
use dfs::mmb::status;
use dfs::store::Access;

use crate::cli::Cli;

#[derive(Subcommand, Debug)]
pub enum MmbCmd {
    /// Creates a fresh archive with 511 empty slots.
    Create { archive: PathBuf },
    /// Lists the archive index.
    Cat {
        archive: PathBuf,
        /// Also list uninitialized slots.
        #[arg(short, long)]
        all: bool,
    },
    /// Inserts an SSD image into a slot (the first free one by default).
    Put {
        archive: PathBuf,
        ssd: PathBuf,
        #[arg(long)]
        slot: Option<u16>,
    },
    /// Extracts a slot to an SSD file.
    Get {
        archive: PathBuf,
        slot: u16,
        output: PathBuf,
    },
    /// Marks a slot uninitialized; the payload bytes stay in place.
    Kill {
        archive: PathBuf,
        slot: u16,
        /// Also clear a locked slot.
        #[arg(long)]
        dunlock: bool,
    },
    /// Marks a slot initialized again.
    Restore {
        archive: PathBuf,
        slot: u16,
        /// Restore as locked.
        #[arg(long)]
        dlock: bool,
    },
    /// Refreshes every index title from the slot catalogs.
    Recat { archive: PathBuf },
    /// Points a boot drive (0-3) at a slot.
    Onboot {
        archive: PathBuf,
        drive: u8,
        slot: u16,
    },
}

pub fn run(cmd: &MmbCmd, _cli: &Cli) -> Result<(), Box<dyn Error>> {
    match cmd {
        MmbCmd::Create { archive } => {
            MmbFile::create(archive)?.close()?;
            println!("created {}", archive.display());
        }
        MmbCmd::Cat { archive, all } => {
            let mmb = MmbFile::open(archive, Access::Read)?;
            let onboot = mmb.onboot();
            println!(
                "onboot drives: 0={} 1={} 2={} 3={}",
                onboot[0], onboot[1], onboot[2], onboot[3]
            );
            let mut used = 0;
            for (i, entry) in mmb.entries().iter().enumerate() {
                if entry.is_initialized() {
                    used += 1;
                } else if !all {
                    continue;
                }
                let flag = match entry.status {
                    status::LOCKED => 'L',
                    status::UNLOCKED => ' ',
                    status::UNINITIALIZED => 'U',
                    status::INVALID => 'X',
                    _ => '?',
                };
                println!(
                    "{:>3} {flag} {}",
                    i + 1,
                    String::from_utf8_lossy(&entry.title_trimmed())
                );
            }
            println!("{used} of 511 slots in use");
            mmb.close()?;
        }
        MmbCmd::Put { archive, ssd, slot } => {
            let mut mmb = MmbFile::open(archive, Access::ReadWrite)?;
            let bytes = std::fs::read(ssd)?;
            let index = mmb.dput(*slot, &bytes)?;
            mmb.close()?;
            println!("inserted {} into slot {index}", ssd.display());
        }
        MmbCmd::Get {
            archive,
            slot,
            output,
        } => {
            let mut mmb = MmbFile::open(archive, Access::Read)?;
            let bytes = mmb.dget(*slot)?;
            std::fs::write(output, bytes)?;
            mmb.close()?;
            println!("extracted slot {slot} to {}", output.display());
        }
        MmbCmd::Kill {
            archive,
            slot,
            dunlock,
        } => {
            let mut mmb = MmbFile::open(archive, Access::ReadWrite)?;
            mmb.dkill(*slot, *dunlock)?;
            mmb.close()?;
        }
        MmbCmd::Restore {
            archive,
            slot,
            dlock,
        } => {
            let mut mmb = MmbFile::open(archive, Access::ReadWrite)?;
            mmb.drestore(*slot, *dlock)?;
            mmb.close()?;
        }
        MmbCmd::Recat { archive } => {
            let mut mmb = MmbFile::open(archive, Access::ReadWrite)?;
            let updated = mmb.drecat()?;
            mmb.close()?;
            println!("{updated} title(s) refreshed");
        }
        MmbCmd::Onboot {
            archive,
            drive,
            slot,
        } => {
            let mut mmb = MmbFile::open(archive, Access::ReadWrite)?;
            mmb.set_onboot(*drive, *slot)?;
            mmb.close()?;
        }
    }
    Ok(())
}
