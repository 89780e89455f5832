use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use dfs::store::Access;
use dfs::{
    AttribPatch, DigestMode, Geometry, HashAlgorithm, Image, Layout, OpenMode, SideDigestMode,
    ops, validate,
};

use crate::cli::{BootArg, Cli, ImageRef, hex_string, parse_file_arg, with_image};
use crate::names::matches_pattern;
use crate::transfer::parse_hex;

#[derive(Parser, Debug)]
pub struct CreateCmd {
    pub image: PathBuf,
    /// Disk title, up to 12 characters.
    #[arg(long, default_value = "")]
    pub title: String,
    /// Boot option (`*OPT 4` value).
    #[arg(long, value_enum, default_value_t = BootArg::Off)]
    pub boot: BootArg,
}

pub fn create(cmd: &CreateCmd, cli: &Cli) -> Result<(), Box<dyn Error>> {
    let hint = cli.geometry_hint()?;
    let sides = hint.sides.unwrap_or(match hint.layout {
        Some(Layout::Interleaved) => 2,
        _ => 1,
    });
    let geometry = Geometry {
        sides,
        tracks: hint.tracks.unwrap_or(80),
        layout: hint.layout.unwrap_or(Layout::Linear),
    };
    let mode = if cli.always {
        OpenMode::Always
    } else {
        OpenMode::New
    };
    let image = Image::create(
        &cmd.image,
        mode,
        geometry,
        cmd.title.as_bytes(),
        cmd.boot.into(),
    )?;
    image.close()?;
    println!("created {}", cmd.image.display());
    Ok(())
}

#[derive(Parser, Debug)]
pub struct RenameCmd {
    pub image: ImageRef,
    /// Current name, e.g. `$.OLD`.
    pub from: String,
    /// New name, e.g. `B.NEW`.
    pub to: String,

    /// Replace an existing file under the new name.
    #[arg(short, long)]
    pub replace: bool,
    /// Override locked-entry guards.
    #[arg(long)]
    pub ignore_access: bool,
}

pub fn rename(cmd: &RenameCmd, cli: &Cli) -> Result<(), Box<dyn Error>> {
    with_image(cli, &cmd.image, Access::ReadWrite, |image| {
        let side = cli.side()?;
        image.rename(
            side,
            parse_file_arg(&cmd.from),
            parse_file_arg(&cmd.to),
            cmd.replace,
            cmd.ignore_access,
        )?;
        Ok(())
    })
}

#[derive(Parser, Debug)]
pub struct DeleteCmd {
    pub image: ImageRef,
    /// File patterns to delete.
    #[arg(required = true)]
    pub patterns: Vec<String>,

    /// Override locked-entry guards.
    #[arg(long)]
    pub ignore_access: bool,
}

pub fn delete(cmd: &DeleteCmd, cli: &Cli) -> Result<(), Box<dyn Error>> {
    let ctx = cli.context();
    with_image(cli, &cmd.image, Access::ReadWrite, |image| {
        let side = cli.side()?;
        let targets: Vec<(u8, String)> = image
            .side(side)
            .entries()
            .iter()
            .filter(|e| cmd.patterns.iter().any(|p| matches_pattern(p, e)))
            .map(|e| (e.dir, e.name.clone()))
            .collect();
        if targets.is_empty() && !ctx.silent {
            return Err("no files match".into());
        }
        for (dir, name) in targets {
            image.delete(side, dir, &name, cmd.ignore_access, &ctx)?;
            println!("deleted {}.{name}", dir as char);
        }
        Ok(())
    })
}

#[derive(Parser, Debug)]
pub struct AttribCmd {
    pub image: ImageRef,
    /// File patterns to change.
    #[arg(required = true)]
    pub patterns: Vec<String>,

    /// Set the locked attribute.
    #[arg(short, long)]
    pub lock: bool,
    /// Clear the locked attribute.
    #[arg(short, long, conflicts_with = "lock")]
    pub unlock: bool,
    /// New load address (hex).
    #[arg(long, value_parser = parse_hex)]
    pub load: Option<u32>,
    /// New execution address (hex).
    #[arg(long, value_parser = parse_hex)]
    pub exec: Option<u32>,
}

pub fn attrib(cmd: &AttribCmd, cli: &Cli) -> Result<(), Box<dyn Error>> {
    let patch = AttribPatch {
        locked: match (cmd.lock, cmd.unlock) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        },
        load_addr: cmd.load,
        exec_addr: cmd.exec,
    };
    with_image(cli, &cmd.image, Access::ReadWrite, |image| {
        let side = cli.side()?;
        let targets: Vec<(u8, String)> = image
            .side(side)
            .entries()
            .iter()
            .filter(|e| cmd.patterns.iter().any(|p| matches_pattern(p, e)))
            .map(|e| (e.dir, e.name.clone()))
            .collect();
        if targets.is_empty() && !cli.silent {
            return Err("no files match".into());
        }
        for (dir, name) in targets {
            image.set_attrib(side, dir, &name, &patch)?;
        }
        Ok(())
    })
}

#[derive(Parser, Debug)]
pub struct CompactCmd {
    pub image: ImageRef,
}

pub fn compact(cmd: &CompactCmd, cli: &Cli) -> Result<(), Box<dyn Error>> {
    with_image(cli, &cmd.image, Access::ReadWrite, |image| {
        let side = cli.side()?;
        image.compact(side)?;
        println!(
            "compacted: {} sectors free in one block",
            image.side(side).free_sectors()
        );
        Ok(())
    })
}

#[derive(Parser, Debug)]
pub struct FormatCmd {
    pub image: ImageRef,
    /// Disk title, up to 12 characters.
    #[arg(long, default_value = "")]
    pub title: String,
    /// Boot option (`*OPT 4` value).
    #[arg(long, value_enum, default_value_t = BootArg::Off)]
    pub boot: BootArg,
}

pub fn format(cmd: &FormatCmd, cli: &Cli) -> Result<(), Box<dyn Error>> {
    with_image(cli, &cmd.image, Access::ReadWrite, |image| {
        let side = cli.side()?;
        image.format(side, cmd.title.as_bytes(), cmd.boot.into())?;
        Ok(())
    })
}

#[derive(Parser, Debug)]
pub struct ConvertCmd {
    /// Source image.
    pub from: ImageRef,
    /// Destination image file.
    pub to: PathBuf,
}

pub fn convert(cmd: &ConvertCmd, cli: &Cli) -> Result<(), Box<dyn Error>> {
    // The geometry flags describe the source, as everywhere else; the
    // destination layout follows its extension.
    let extension = cmd
        .to
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    let layout = match extension.as_deref() {
        Some("dsd") => Layout::Interleaved,
        Some("ssd") => Layout::Linear,
        _ => return Err("destination must end in .ssd or .dsd".into()),
    };
    let mode = if cli.always {
        OpenMode::Always
    } else {
        OpenMode::New
    };
    with_image(cli, &cmd.from, Access::Read, |image| {
        ops::convert(image, &cmd.to, layout, mode)?;
        Ok(())
    })
}

#[derive(Parser, Debug)]
pub struct ValidateCmd {
    pub image: ImageRef,
}

pub fn validate_cmd(cmd: &ValidateCmd, cli: &Cli) -> Result<(), Box<dyn Error>> {
    with_image(cli, &cmd.image, Access::Read, |image| {
        let mut clean = true;
        for side in 0..image.side_count() {
            let findings = validate::apply_mode(image.warnings(side).to_vec(), cli.warn.into());
            for finding in &findings {
                println!("side {}: {finding}", side + 1);
            }
            clean &= image.side(side).is_valid();
        }
        if clean {
            println!("catalog is clean");
            Ok(())
        } else {
            Err("validation failed".into())
        }
    })
}

#[derive(ValueEnum, Copy, Clone, Debug, Default)]
pub enum AlgoArg {
    #[default]
    Sha1,
    Sha256,
}

impl From<AlgoArg> for HashAlgorithm {
    fn from(arg: AlgoArg) -> Self {
        match arg {
            AlgoArg::Sha1 => HashAlgorithm::Sha1,
            AlgoArg::Sha256 => HashAlgorithm::Sha256,
        }
    }
}

#[derive(ValueEnum, Copy, Clone, Debug, Default)]
pub enum FileDigestArg {
    /// File data only.
    #[default]
    Data,
    /// Data plus load and execution addresses.
    Addrs,
    /// Data plus addresses plus the locked attribute.
    All,
}

#[derive(ValueEnum, Copy, Clone, Debug, Default)]
pub enum SideDigestArg {
    /// The entire side surface.
    #[default]
    Surface,
    /// Catalog plus used sectors only.
    Used,
    /// File contents in name order.
    Files,
}

#[derive(Parser, Debug)]
pub struct DigestCmd {
    pub image: ImageRef,
    /// File patterns; without any, the whole side is digested.
    pub patterns: Vec<String>,

    #[arg(long, value_enum, default_value_t = AlgoArg::Sha1)]
    pub algorithm: AlgoArg,
    /// Per-file digest coverage.
    #[arg(long, value_enum, default_value_t = FileDigestArg::Data)]
    pub mode: FileDigestArg,
    /// Side digest coverage, when no patterns are given.
    #[arg(long, value_enum, default_value_t = SideDigestArg::Surface)]
    pub scope: SideDigestArg,
    /// Digest a raw sector range instead, e.g. `0-1`.
    #[arg(long)]
    pub sectors: Option<String>,
}

pub fn digest(cmd: &DigestCmd, cli: &Cli) -> Result<(), Box<dyn Error>> {
    let algo: HashAlgorithm = cmd.algorithm.into();
    with_image(cli, &cmd.image, Access::Read, |image| {
        let side = cli.side()?;
        if let Some(range) = &cmd.sectors {
            let (start, count) = parse_sector_range(range)?;
            let digest = ops::sector_digest_with(algo, image, side, start, count)?;
            println!("{}", hex_string(&digest));
            return Ok(());
        }
        if cmd.patterns.is_empty() {
            let scope = match cmd.scope {
                SideDigestArg::Surface => SideDigestMode::Surface,
                SideDigestArg::Used => SideDigestMode::Used,
                SideDigestArg::Files => SideDigestMode::Files,
            };
            let digest = ops::side_digest_with(algo, image, side, scope)?;
            println!("{}", hex_string(&digest));
            return Ok(());
        }
        let mode = match cmd.mode {
            FileDigestArg::Data => DigestMode::Data,
            FileDigestArg::Addrs => DigestMode::DataAddrs,
            FileDigestArg::All => DigestMode::DataAttrs,
        };
        let targets: Vec<(u8, String)> = image
            .side(side)
            .entries()
            .iter()
            .filter(|e| cmd.patterns.iter().any(|p| matches_pattern(p, e)))
            .map(|e| (e.dir, e.name.clone()))
            .collect();
        if targets.is_empty() && !cli.silent {
            return Err("no files match".into());
        }
        for (dir, name) in targets {
            let digest = ops::file_digest_with(algo, image, side, dir, &name, mode)?;
            println!("{}  {}.{name}", hex_string(&digest), dir as char);
        }
        Ok(())
    })
}

/// Parses `START-END` (inclusive) or a single sector number.
fn parse_sector_range(range: &str) -> Result<(u16, u16), Box<dyn Error>> {
    let parse = |s: &str| -> Result<u16, Box<dyn Error>> {
        s.trim()
            .parse()
            .map_err(|_| format!("bad sector number {s:?}").into())
    };
    if let Some((start, end)) = range.split_once('-') {
        let (start, end) = (parse(start)?, parse(end)?);
        if end < start {
            return Err(format!("empty sector range {range:?}").into());
        }
        Ok((start, end - start + 1))
    } else {
        Ok((parse(range)?, 1))
    }
}
