use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand, ValueEnum};
use dfs::store::Access;
use dfs::{
    BootOption, GeometryHint, Image, Layout, MmbFile, OpContext, OpenMode, OpenOptions, WarnMode,
};

use crate::maintain::{
    AttribCmd, CompactCmd, ConvertCmd, CreateCmd, DeleteCmd, DigestCmd, FormatCmd, RenameCmd,
    ValidateCmd,
};
use crate::mmbcmd::MmbCmd;
use crate::transfer::{CopyCmd, ExportCmd, ImportCmd};
use crate::{InfoCmd, ListCmd};

#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Operate on side 1 of a double-sided image.
    #[arg(short = '1', long, global = true)]
    pub side1: bool,
    /// Operate on side 2 of a double-sided image.
    #[arg(short = '2', long, global = true)]
    pub side2: bool,

    /// Treat the image as interleaved (`.dsd` layout).
    #[arg(short = 'I', long, global = true)]
    pub interleaved: bool,
    /// Treat the image as linear (double-sided `.ssd` layout).
    #[arg(short = 'L', long, global = true)]
    pub linear: bool,

    /// Treat the image as 40 tracks per side.
    #[arg(short = '4', long = "tracks40", global = true)]
    pub tracks_40: bool,
    /// Treat the image as 80 tracks per side.
    #[arg(short = '8', long = "tracks80", global = true)]
    pub tracks_80: bool,

    /// Treat the image as double sided (needed for double-sided linear
    /// `.ssd` files, whose size alone is ambiguous).
    #[arg(short = 'd', long, global = true)]
    pub double_sided: bool,
    /// Treat the image as single sided.
    #[arg(short = 's', long, global = true)]
    pub single_sided: bool,

    /// Create the image; fail if it already exists.
    #[arg(long, global = true)]
    pub new: bool,
    /// Open the image; fail if it does not exist.
    #[arg(long, global = true)]
    pub existing: bool,
    /// Open the image, creating it when absent.
    #[arg(long, global = true)]
    pub always: bool,

    /// Validation warning mode.
    #[arg(long, global = true, value_enum, default_value_t = WarnArg::First)]
    pub warn: WarnArg,
    /// Keep processing a batch after a recoverable per-file failure.
    #[arg(long, global = true)]
    pub continue_on_error: bool,
    /// Tolerate missing files on delete and similar soft lookups.
    #[arg(long, global = true)]
    pub silent: bool,

    /// Pad the image to its full geometry size on close.
    #[arg(long, global = true)]
    pub expand: bool,
    /// Truncate trailing zero sectors on close.
    #[arg(long, global = true)]
    pub shrink: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(ValueEnum, Copy, Clone, Debug)]
pub enum WarnArg {
    None,
    First,
    All,
}

impl From<WarnArg> for WarnMode {
    fn from(arg: WarnArg) -> Self {
        match arg {
            WarnArg::None => WarnMode::None,
            WarnArg::First => WarnMode::First,
            WarnArg::All => WarnMode::All,
        }
    }
}

#[derive(ValueEnum, Copy, Clone, Debug, Default)]
pub enum BootArg {
    #[default]
    Off,
    Load,
    Run,
    Exec,
}

impl From<BootArg> for BootOption {
    fn from(arg: BootArg) -> Self {
        match arg {
            BootArg::Off => BootOption::None,
            BootArg::Load => BootOption::Load,
            BootArg::Run => BootOption::Run,
            BootArg::Exec => BootOption::Exec,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Lists the catalog of an image.
    List(ListCmd),
    /// Shows named properties of files, sides and the image.
    Info(InfoCmd),
    /// Creates and formats a fresh image.
    Create(CreateCmd),
    /// Imports host files into an image.
    Import(ImportCmd),
    /// Exports files from an image to the host.
    Export(ExportCmd),
    /// Copies files from one image to another.
    Copy(CopyCmd),
    /// Renames a file.
    Rename(RenameCmd),
    /// Deletes files.
    Delete(DeleteCmd),
    /// Changes the locked attribute or load/exec addresses.
    Attrib(AttribCmd),
    /// Repacks file regions to eliminate free-space gaps.
    Compact(CompactCmd),
    /// Wipes a side back to an empty catalog.
    Format(FormatCmd),
    /// Rewrites an image at a different side layout.
    Convert(ConvertCmd),
    /// Runs the structural validator and prints its findings.
    Validate(ValidateCmd),
    /// Computes file or side digests.
    Digest(DigestCmd),
    /// MMB archive operations.
    #[command(subcommand)]
    Mmb(MmbCmd),
}

impl Cli {
    pub fn context(&self) -> OpContext {
        OpContext {
            warn_mode: self.warn.into(),
            continue_on_error: self.continue_on_error,
            silent: self.silent,
        }
    }

    pub fn open_mode(&self) -> Result<OpenMode, String> {
        match (self.new, self.existing, self.always) {
            (false, false, false) | (false, true, false) => Ok(OpenMode::Existing),
            (true, false, false) => Ok(OpenMode::New),
            (false, false, true) => Ok(OpenMode::Always),
            _ => Err("--new, --existing and --always are mutually exclusive".into()),
        }
    }

    pub fn geometry_hint(&self) -> Result<GeometryHint, String> {
        let layout = match (self.interleaved, self.linear) {
            (false, false) => None,
            (true, false) => Some(Layout::Interleaved),
            (false, true) => Some(Layout::Linear),
            (true, true) => return Err("-I and -L are mutually exclusive".into()),
        };
        let tracks = match (self.tracks_40, self.tracks_80) {
            (false, false) => None,
            (true, false) => Some(40),
            (false, true) => Some(80),
            (true, true) => return Err("-4 and -8 are mutually exclusive".into()),
        };
        let sides = match (self.double_sided, self.single_sided) {
            (false, false) => None,
            (true, false) => Some(2),
            (false, true) => Some(1),
            (true, true) => return Err("-d and -s are mutually exclusive".into()),
        };
        Ok(GeometryHint {
            sides,
            tracks,
            layout,
        })
    }

    /// The side mutating operations are narrowed to.
    pub fn side(&self) -> Result<u8, String> {
        match (self.side1, self.side2) {
            (false, false) | (true, false) => Ok(0),
            (false, true) => Ok(1),
            (true, true) => Err("-1 and -2 are mutually exclusive".into()),
        }
    }

    pub fn open_options(&self, access: Access) -> Result<OpenOptions, String> {
        Ok(OpenOptions {
            mode: self.open_mode()?,
            access,
            geometry: self.geometry_hint()?,
            expand: self.expand,
            shrink: self.shrink,
        })
    }
}

/// An image argument: a path, optionally with an MMB slot index appended as
/// `archive.mmb:12`.
#[derive(Debug, Clone)]
pub struct ImageRef {
    pub path: PathBuf,
    pub slot: Option<u16>,
}

impl FromStr for ImageRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((path, slot)) = s.rsplit_once(':') {
            // Keep Windows drive prefixes intact: only a numeric tail is a
            // slot index.
            if !path.is_empty() && slot.chars().all(|c| c.is_ascii_digit()) && !slot.is_empty() {
                let slot: u16 = slot.parse().map_err(|_| "slot index out of range")?;
                return Ok(ImageRef {
                    path: PathBuf::from(path),
                    slot: Some(slot),
                });
            }
        }
        Ok(ImageRef {
            path: PathBuf::from(s),
            slot: None,
        })
    }
}

/// Opens the referenced image (plain file or MMB slot), hands it to `f`,
/// then flushes or discards per `access`.
pub fn with_image<R>(
    cli: &Cli,
    image_ref: &ImageRef,
    access: Access,
    f: impl FnOnce(&mut Image) -> Result<R, Box<dyn std::error::Error>>,
) -> Result<R, Box<dyn std::error::Error>> {
    let ctx = cli.context();
    match image_ref.slot {
        None => {
            let mut image = Image::open(&image_ref.path, &cli.open_options(access)?, &ctx)?;
            let result = f(&mut image)?;
            image.close()?;
            Ok(result)
        }
        Some(slot) => {
            let mut mmb = MmbFile::open(&image_ref.path, access)?;
            let mut view = mmb.image(slot, &ctx)?;
            let result = f(&mut view)?;
            if access == Access::ReadWrite {
                view.save()?;
            } else {
                drop(view);
            }
            mmb.close()?;
            Ok(result)
        }
    }
}

/// Splits a `D.NAME` file argument into directory and name.
pub fn parse_file_arg(arg: &str) -> (u8, &str) {
    let bytes = arg.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b'.' {
        (bytes[0], &arg[2..])
    } else {
        (b'$', arg)
    }
}

pub fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
