//! Byte-identity and inverse-operation properties.

mod common;

use common::TempPath;
use dfs::store::Access;
use dfs::{
    AddOptions, BootOption, DigestMode, Geometry, HashAlgorithm, Image, Layout, NewFile,
    OpContext, OpenMode, OpenOptions, ops,
};

fn fresh_image(path: &std::path::Path, tracks: u8) -> Image {
    Image::create(
        path,
        OpenMode::New,
        Geometry {
            sides: 1,
            tracks,
            layout: Layout::Linear,
        },
        b"ROUND",
        BootOption::None,
    )
    .unwrap()
}

fn reopen(path: &std::path::Path, access: Access) -> Image {
    Image::open(
        path,
        &OpenOptions {
            mode: OpenMode::Existing,
            access,
            ..Default::default()
        },
        &OpContext::default(),
    )
    .unwrap()
}

fn new_file<'a>(name: &'a str, load: u32, exec: u32, locked: bool) -> NewFile<'a> {
    NewFile {
        name,
        dir: b'$',
        load_addr: load,
        exec_addr: exec,
        locked,
    }
}

#[test]
fn test_open_close_is_byte_identical() {
    let path = TempPath::new("identity.ssd");
    let mut image = fresh_image(&path, 80);
    image
        .add_file(0, &new_file("DATA", 0x1900, 0x1900, false), &[9u8; 5000], &AddOptions::default())
        .unwrap();
    image.close().unwrap();
    let before = std::fs::read(&*path).unwrap();

    // Read-only pass.
    reopen(&path, Access::Read).close().unwrap();
    assert_eq!(std::fs::read(&*path).unwrap(), before);

    // Writable pass without mutation: no sequence bump, no resize.
    reopen(&path, Access::ReadWrite).close().unwrap();
    assert_eq!(std::fs::read(&*path).unwrap(), before);
}

#[test]
fn test_unsaved_mutation_is_discarded() {
    let path = TempPath::new("discard.ssd");
    let mut image = fresh_image(&path, 40);
    image
        .add_file(0, &new_file("STAY", 0, 0, false), b"stay", &AddOptions::default())
        .unwrap();
    image.close().unwrap();
    let before = std::fs::read(&*path).unwrap();

    let mut image = reopen(&path, Access::ReadWrite);
    image
        .delete(0, b'$', "STAY", false, &OpContext::default())
        .unwrap();
    drop(image);

    // The catalog was never flushed, so the entry is still there.
    let mut image = reopen(&path, Access::Read);
    assert!(image.side(0).find(b'$', "STAY").is_some());
    assert_eq!(std::fs::read(&*path).unwrap(), before);
    image.close().unwrap();
}

#[test]
fn test_import_export_identity() {
    let path = TempPath::new("inverse.ssd");
    let mut image = fresh_image(&path, 80);
    for (i, len) in [0usize, 1, 255, 256, 257, 1000, 70_000].into_iter().enumerate() {
        let name = format!("F{i}");
        let data: Vec<u8> = (0..len).map(|j| (j % 251) as u8).collect();
        image
            .add_file(0, &new_file(&name, 0, 0, false), &data, &AddOptions::default())
            .unwrap();
        let back = ops::export(&mut image, 0, b'$', &name).unwrap();
        assert_eq!(back.data, data, "length {len} did not round-trip");
        assert_eq!(back.meta.name, name);
    }
    image.close().unwrap();
}

#[test]
fn test_digest_modes() {
    let path = TempPath::new("digests.ssd");
    let mut image = fresh_image(&path, 80);
    let payload = b"identical payload";
    image
        .add_file(0, &new_file("PLAIN", 0x1900, 0x1900, false), payload, &AddOptions::default())
        .unwrap();
    image
        .add_file(0, &new_file("ROMMED", 0xFF_1900, 0xFF_8023, true), payload, &AddOptions::default())
        .unwrap();

    let data_digest = |image: &mut Image, name| {
        ops::file_digest_with(HashAlgorithm::Sha1, image, 0, b'$', name, DigestMode::Data).unwrap()
    };
    let attr_digest = |image: &mut Image, name| {
        ops::file_digest_with(HashAlgorithm::Sha1, image, 0, b'$', name, DigestMode::DataAttrs)
            .unwrap()
    };

    // Addresses and access do not affect the data digest.
    assert_eq!(data_digest(&mut image, "PLAIN"), data_digest(&mut image, "ROMMED"));
    assert_ne!(attr_digest(&mut image, "PLAIN"), attr_digest(&mut image, "ROMMED"));

    // Changing an attribute moves only the attribute digest.
    let before_data = data_digest(&mut image, "PLAIN");
    let before_attr = attr_digest(&mut image, "PLAIN");
    image
        .set_attrib(
            0,
            b'$',
            "PLAIN",
            &dfs::AttribPatch {
                locked: Some(true),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(data_digest(&mut image, "PLAIN"), before_data);
    assert_ne!(attr_digest(&mut image, "PLAIN"), before_attr);
    image.close().unwrap();
}

#[test]
fn test_shrink_and_expand_on_close() {
    let path = TempPath::new("sizes.ssd");
    let mut image = fresh_image(&path, 80);
    image
        .add_file(0, &new_file("SMALL", 0, 0, false), &[3u8; 256], &AddOptions::default())
        .unwrap();
    image.close().unwrap();
    // The single file sits at the top sector, so the image is full length.
    assert_eq!(std::fs::metadata(&*path).unwrap().len(), 204_800);

    // Delete it and shrink: only the catalog sectors remain.
    let mut image = Image::open(
        &path,
        &OpenOptions {
            mode: OpenMode::Existing,
            access: Access::ReadWrite,
            shrink: true,
            ..Default::default()
        },
        &OpContext::default(),
    )
    .unwrap();
    image
        .delete(0, b'$', "SMALL", false, &OpContext::default())
        .unwrap();
    // The freed sector keeps stale bytes; zero it so shrink can drop it.
    image.write_sectors(0, 799, &[0u8; 256]).unwrap();
    image.close().unwrap();
    assert_eq!(std::fs::metadata(&*path).unwrap().len(), 512);

    // A truncated image still opens at its promoted geometry and can be
    // padded back out.
    let image = Image::open(
        &path,
        &OpenOptions {
            mode: OpenMode::Existing,
            access: Access::ReadWrite,
            geometry: dfs::GeometryHint {
                tracks: Some(80),
                ..Default::default()
            },
            expand: true,
            ..Default::default()
        },
        &OpContext::default(),
    )
    .unwrap();
    assert_eq!(image.geometry().tracks, 80);
    image.close().unwrap();
    assert_eq!(std::fs::metadata(&*path).unwrap().len(), 204_800);
}

#[test]
fn test_truncated_image_reads_zero() {
    let path = TempPath::new("trunc.ssd");
    let mut image = fresh_image(&path, 40);
    image.close().unwrap();
    // File holds only the catalog; sector 300 is past EOF.
    let mut image = reopen(&path, Access::Read);
    assert_eq!(image.read_sectors(0, 300, 1).unwrap(), vec![0u8; 256]);
    image.close().unwrap();
}
