use std::error::Error;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use dfs::store::Access;
use dfs::{AddOptions, FileMeta, ImportOptions, InfPolicy, ops};
use log::warn;

use crate::cli::{Cli, ImageRef, with_image};
use crate::inf::{format_inf, parse_inf};
use crate::names::{dfs_to_host, host_to_dfs, matches_pattern};

#[derive(ValueEnum, Copy, Clone, Debug, Default)]
pub enum InfArg {
    Never,
    #[default]
    Auto,
    Always,
}

impl From<InfArg> for InfPolicy {
    fn from(arg: InfArg) -> Self {
        match arg {
            InfArg::Never => InfPolicy::Never,
            InfArg::Auto => InfPolicy::Auto,
            InfArg::Always => InfPolicy::Always,
        }
    }
}

#[derive(Parser, Debug)]
pub struct ImportCmd {
    pub image: ImageRef,
    /// Host files to import.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Sidecar policy.
    #[arg(long, value_enum, default_value_t = InfArg::Auto)]
    pub inf: InfArg,
    /// DFS name to import a single file under, e.g. `B.GAME`.
    #[arg(long)]
    pub dfs_name: Option<String>,
    /// Load address (hex) overriding the sidecar.
    #[arg(long, value_parser = parse_hex)]
    pub load: Option<u32>,
    /// Execution address (hex) overriding the sidecar.
    #[arg(long, value_parser = parse_hex)]
    pub exec: Option<u32>,
    /// Import as locked.
    #[arg(long)]
    pub locked: bool,

    /// Replace existing files.
    #[arg(short, long)]
    pub replace: bool,
    /// Override locked-entry guards.
    #[arg(long)]
    pub ignore_access: bool,
    /// Compact the side when free space is fragmented.
    #[arg(long)]
    pub compact: bool,
}

pub fn parse_hex(s: &str) -> Result<u32, String> {
    u32::from_str_radix(s.trim_start_matches("0x"), 16)
        .map_err(|_| format!("{s:?} is not a hex address"))
}

pub fn import(cmd: &ImportCmd, cli: &Cli) -> Result<(), Box<dyn Error>> {
    if cmd.dfs_name.is_some() && cmd.files.len() > 1 {
        return Err("--dfs-name only applies to a single file".into());
    }
    let ctx = cli.context();
    with_image(cli, &cmd.image, Access::ReadWrite, |image| {
        let side = cli.side()?;
        for host_path in &cmd.files {
            let data = std::fs::read(host_path)?;
            let fallback = fallback_meta(cmd, host_path);
            let sidecar = read_sidecar(host_path)?;
            let mut meta = sidecar;
            if let Some(meta) = meta.as_mut() {
                apply_overrides(cmd, meta);
            }
            let result = ops::import(
                image,
                side,
                &fallback,
                meta.as_ref(),
                &data,
                &ImportOptions {
                    inf: cmd.inf.into(),
                    add: AddOptions {
                        replace: cmd.replace,
                        ignore_access: cmd.ignore_access,
                        compact: cmd.compact,
                    },
                },
            );
            match result {
                Ok(()) => println!("imported {}", host_path.display()),
                Err(err) if ctx.continue_on_error => {
                    warn!("skipping {}: {err}", host_path.display());
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    })
}

fn fallback_meta(cmd: &ImportCmd, host_path: &Path) -> FileMeta {
    let (dir, name) = match &cmd.dfs_name {
        Some(arg) => {
            let (dir, name) = crate::cli::parse_file_arg(arg);
            (dir, name.to_string())
        }
        None => {
            let stem = host_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            host_to_dfs(&stem)
        }
    };
    let mut meta = FileMeta {
        name,
        dir,
        load_addr: 0,
        exec_addr: 0,
        locked: false,
    };
    apply_overrides(cmd, &mut meta);
    meta
}

fn apply_overrides(cmd: &ImportCmd, meta: &mut FileMeta) {
    if let Some(load) = cmd.load {
        meta.load_addr = load;
    }
    if let Some(exec) = cmd.exec {
        meta.exec_addr = exec;
    }
    if cmd.locked {
        meta.locked = true;
    }
}

fn read_sidecar(host_path: &Path) -> Result<Option<FileMeta>, Box<dyn Error>> {
    let mut inf_path = host_path.as_os_str().to_owned();
    inf_path.push(".inf");
    let inf_path = PathBuf::from(inf_path);
    if !inf_path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(&inf_path)?;
    let Some(line) = text.lines().next() else {
        return Ok(None);
    };
    Ok(parse_inf(line))
}

#[derive(Parser, Debug)]
pub struct ExportCmd {
    pub image: ImageRef,
    /// File patterns to export.
    #[arg(required = true)]
    pub patterns: Vec<String>,

    /// Destination directory.
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,
    /// Sidecar policy: `never` skips `.inf` files.
    #[arg(long, value_enum, default_value_t = InfArg::Auto)]
    pub inf: InfArg,
}

pub fn export(cmd: &ExportCmd, cli: &Cli) -> Result<(), Box<dyn Error>> {
    with_image(cli, &cmd.image, Access::Read, |image| {
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
        std::fs::create_dir_all(&cmd.output)?;
        for (dir, name) in targets {
            let exported = ops::export(image, side, dir, &name)?;
            let host_name = dfs_to_host(dir, &name);
            let host_path = cmd.output.join(&host_name);
            std::fs::write(&host_path, &exported.data)?;
            if !matches!(cmd.inf, InfArg::Never) {
                let line = format_inf(&exported.meta, exported.data.len() as u32);
                std::fs::write(
                    cmd.output.join(format!("{host_name}.inf")),
                    format!("{line}\n"),
                )?;
            }
            println!("exported {}", host_path.display());
        }
        Ok(())
    })
}

#[derive(Parser, Debug)]
pub struct CopyCmd {
    /// Source image.
    pub from: ImageRef,
    /// Destination image.
    pub to: ImageRef,
    /// File patterns to copy.
    #[arg(required = true)]
    pub patterns: Vec<String>,

    /// Replace existing files on the destination.
    #[arg(short, long)]
    pub replace: bool,
    /// Override locked-entry guards.
    #[arg(long)]
    pub ignore_access: bool,
    /// Carry the locked attribute onto the destination.
    #[arg(long)]
    pub preserve_attr: bool,
}

pub fn copy(cmd: &CopyCmd, cli: &Cli) -> Result<(), Box<dyn Error>> {
    let ctx = cli.context();
    let side = cli.side()?;
    let patterns = cmd.patterns.clone();
    with_image(cli, &cmd.from, Access::Read, |src| {
        with_image(cli, &cmd.to, Access::ReadWrite, |dest| {
            let stats = ops::copy_over(
                src,
                side,
                dest,
                side,
                &|entry| patterns.iter().any(|p| matches_pattern(p, entry)),
                &ops::CopyOptions {
                    replace: cmd.replace,
                    ignore_access: cmd.ignore_access,
                    preserve_attr: cmd.preserve_attr,
                },
                &ctx,
            )?;
            if stats.copied == 0 && !cli.silent {
                return Err("no files match".into());
            }
            println!("copied {} file(s), skipped {}", stats.copied, stats.skipped);
            Ok(())
        })
    })
}
