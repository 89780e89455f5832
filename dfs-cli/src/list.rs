use std::error::Error;

use clap::Parser;
use dfs::store::Access;
use dfs::{FileProperty, Image, ImageProperty, SideProperty, Value};

use crate::cli::{Cli, ImageRef, with_image};
use crate::names::matches_pattern;

#[derive(Parser, Debug)]
pub struct ListCmd {
    pub image: ImageRef,
}

pub fn list(cmd: &ListCmd, cli: &Cli) -> Result<(), Box<dyn Error>> {
    with_image(cli, &cmd.image, Access::Read, |image| {
        for side_index in sides_to_show(cli, image)? {
            print_side(image, side_index);
        }
        Ok(())
    })
}

fn sides_to_show(cli: &Cli, image: &Image) -> Result<Vec<u8>, Box<dyn Error>> {
    if cli.side1 || cli.side2 {
        let side = cli.side()?;
        if side >= image.side_count() {
            return Err(format!("image has no side {}", side + 1).into());
        }
        Ok(vec![side])
    } else {
        Ok((0..image.side_count()).collect())
    }
}

fn print_side(image: &Image, index: u8) {
    let side = image.side(index);
    println!(
        "{} ({:02X}) side {} of {}",
        side.title_string(),
        side.sequence(),
        index + 1,
        image.side_count()
    );
    println!(
        "boot {}, {} files, {} of {} sectors free{}",
        side.boot_option(),
        side.entries().len(),
        side.free_sectors(),
        side.total_sectors(),
        if side.is_valid() { "" } else { "  (catalog damaged)" }
    );
    for entry in side.entries() {
        println!(
            "  {:<9} {} {:06X} {:06X} {:06X} {:>4}",
            entry.full_name(),
            if entry.locked { 'L' } else { ' ' },
            entry.load_addr,
            entry.exec_addr,
            entry.length,
            entry.start_sector
        );
    }
}

#[derive(Parser, Debug)]
pub struct InfoCmd {
    pub image: ImageRef,
    /// File patterns; without any, side and image properties are shown.
    pub patterns: Vec<String>,
    /// Comma-separated property names to show instead of all of them.
    #[arg(long)]
    pub properties: Option<String>,
}

pub fn info(cmd: &InfoCmd, cli: &Cli) -> Result<(), Box<dyn Error>> {
    with_image(cli, &cmd.image, Access::Read, |image| {
        let side = cli.side()?;
        if cmd.patterns.is_empty() {
            for prop in ImageProperty::all() {
                println!("{}: {}", prop.key(), prop.get(image));
            }
            let selected: Vec<SideProperty> = match &cmd.properties {
                Some(names) => lookup_all(names, SideProperty::lookup)?,
                None => SideProperty::all().collect(),
            };
            for prop in selected {
                println!("{}: {}", prop.key(), prop.get(image.side(side)));
            }
            return Ok(());
        }

        let selected: Vec<FileProperty> = match &cmd.properties {
            Some(names) => lookup_all(names, FileProperty::lookup)?,
            None => FileProperty::all().collect(),
        };
        let mut shown = 0;
        for entry in image.side(side).entries() {
            if !cmd.patterns.iter().any(|p| matches_pattern(p, entry)) {
                continue;
            }
            shown += 1;
            let values: Vec<String> = selected
                .iter()
                .map(|&prop| format!("{}={}", prop.key(), render_file_value(prop, entry)))
                .collect();
            println!("{}", values.join(" "));
        }
        if shown == 0 && !cli.silent {
            return Err("no files match".into());
        }
        Ok(())
    })
}

/// Addresses read better in hex; everything else uses the value's own form.
fn render_file_value(prop: FileProperty, entry: &dfs::Entry) -> String {
    match (prop, prop.get(entry)) {
        (FileProperty::LoadAddr | FileProperty::ExecAddr, Value::Int(addr)) => {
            format!("{addr:06X}")
        }
        (_, value) => value.to_string(),
    }
}

fn lookup_all<P>(
    names: &str,
    lookup: impl Fn(&str) -> Option<P>,
) -> Result<Vec<P>, Box<dyn Error>> {
    names
        .split(',')
        .map(|name| {
            let name = name.trim();
            lookup(name).ok_or_else(|| format!("unknown property {name:?}").into())
        })
        .collect()
}
