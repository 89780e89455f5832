//! MMB archive scenarios.

mod common;

use common::TempPath;
use dfs::store::Access;
use dfs::{
    AddOptions, BootOption, Error, Geometry, Image, Layout, MmbFile, NewFile, OpContext, OpenMode,
};
use dfs_fmt::mmb::status;

/// Builds a small SSD on disk and returns its bytes.
fn sample_ssd(title: &[u8]) -> Vec<u8> {
    let path = TempPath::new("sample.ssd");
    let mut image = Image::create(
        &path,
        OpenMode::New,
        Geometry {
            sides: 1,
            tracks: 80,
            layout: Layout::Linear,
        },
        title,
        BootOption::None,
    )
    .unwrap();
    image
        .add_file(
            0,
            &NewFile {
                name: "HELLO",
                dir: b'$',
                load_addr: 0x1900,
                exec_addr: 0x1900,
                locked: false,
            },
            b"hello from inside the archive",
            &AddOptions::default(),
        )
        .unwrap();
    image.close().unwrap();
    std::fs::read(&*path).unwrap()
}

#[test]
fn test_create_and_reopen() {
    let path = TempPath::new("fresh.mmb");
    MmbFile::create(&path).unwrap().close().unwrap();

    let mmb = MmbFile::open(&path, Access::Read).unwrap();
    assert_eq!(mmb.entries().len(), 511);
    assert!(mmb.entries().iter().all(|e| !e.is_initialized()));
    assert_eq!(mmb.onboot(), [1, 2, 3, 4]);
    assert!(matches!(mmb.entry(0), Err(Error::AddressOutOfRange { .. })));
    assert!(mmb.entry(511).is_ok());
    mmb.close().unwrap();
}

#[test]
fn test_dput_dkill_drestore_preserves_payload() {
    let path = TempPath::new("killer.mmb");
    let ssd = sample_ssd(b"DISC-A");
    let mut mmb = MmbFile::create(&path).unwrap();

    assert_eq!(mmb.dput(Some(12), &ssd).unwrap(), 12);
    assert_eq!(mmb.entry(12).unwrap().status, status::UNLOCKED);
    assert_eq!(mmb.entry(12).unwrap().title_trimmed(), b"DISC-A");

    mmb.dkill(12, false).unwrap();
    assert_eq!(mmb.entry(12).unwrap().status, status::UNINITIALIZED);
    assert!(matches!(mmb.dget(12), Err(Error::SlotUninitialized(12))));

    mmb.drestore(12, false).unwrap();
    assert_eq!(mmb.entry(12).unwrap().status, status::UNLOCKED);
    let payload = mmb.dget(12).unwrap();
    assert_eq!(&payload[..ssd.len()], &ssd[..]);
    assert!(payload[ssd.len()..].iter().all(|&b| b == 0));
    mmb.close().unwrap();
}

#[test]
fn test_locked_slot_guard() {
    let path = TempPath::new("lockslot.mmb");
    let ssd = sample_ssd(b"KEEP");
    let mut mmb = MmbFile::create(&path).unwrap();
    mmb.dput(Some(3), &ssd).unwrap();
    mmb.drestore(3, true).unwrap();
    assert_eq!(mmb.entry(3).unwrap().status, status::LOCKED);

    assert!(matches!(mmb.dkill(3, false), Err(Error::Locked(_))));
    mmb.dkill(3, true).unwrap();
    assert_eq!(mmb.entry(3).unwrap().status, status::UNINITIALIZED);
    mmb.close().unwrap();
}

#[test]
fn test_slot_view_mutation() {
    let path = TempPath::new("view.mmb");
    let ssd = sample_ssd(b"LIVE");
    let mut mmb = MmbFile::create(&path).unwrap();
    mmb.dput(Some(7), &ssd).unwrap();

    let ctx = OpContext::default();
    let mut view = mmb.image(7, &ctx).unwrap();
    assert_eq!(view.side(0).title_string(), "LIVE");
    assert!(view.side(0).find(b'$', "HELLO").is_some());
    view.add_file(
        0,
        &NewFile {
            name: "EXTRA",
            dir: b'$',
            load_addr: 0,
            exec_addr: 0,
            locked: false,
        },
        b"added through the slot view",
        &AddOptions::default(),
    )
    .unwrap();
    view.save().unwrap();
    mmb.close().unwrap();

    let mut mmb = MmbFile::open(&path, Access::ReadWrite).unwrap();
    let view = mmb.image(7, &ctx).unwrap();
    assert!(view.side(0).find(b'$', "EXTRA").is_some());
    drop(view);
    mmb.close().unwrap();
}

#[test]
fn test_discarded_view_changes_nothing() {
    let path = TempPath::new("discard.mmb");
    let ssd = sample_ssd(b"SAFE");
    let mut mmb = MmbFile::create(&path).unwrap();
    mmb.dput(Some(1), &ssd).unwrap();

    let ctx = OpContext::default();
    let mut view = mmb.image(1, &ctx).unwrap();
    view.delete(0, b'$', "HELLO", false, &ctx).unwrap();
    drop(view);

    let view = mmb.image(1, &ctx).unwrap();
    assert!(view.side(0).find(b'$', "HELLO").is_some());
    drop(view);
    mmb.close().unwrap();
}

#[test]
fn test_drecat_refreshes_titles() {
    let path = TempPath::new("recat.mmb");
    let ssd = sample_ssd(b"TRUTH");
    let mut mmb = MmbFile::create(&path).unwrap();
    mmb.dput(Some(5), &ssd).unwrap();
    mmb.set_title(5, b"STALE").unwrap();
    assert_eq!(mmb.entry(5).unwrap().title_trimmed(), b"STALE");

    let updated = mmb.drecat().unwrap();
    assert_eq!(updated, 1);
    assert_eq!(mmb.entry(5).unwrap().title_trimmed(), b"TRUTH");
    mmb.close().unwrap();
}

#[test]
fn test_onboot_record() {
    let path = TempPath::new("onboot.mmb");
    let mut mmb = MmbFile::create(&path).unwrap();
    mmb.set_onboot(0, 12).unwrap();
    mmb.set_onboot(3, 500).unwrap();
    assert!(mmb.set_onboot(4, 1).is_err());
    assert!(mmb.set_onboot(0, 512).is_err());
    mmb.close().unwrap();

    let mmb = MmbFile::open(&path, Access::Read).unwrap();
    assert_eq!(mmb.onboot(), [12, 2, 3, 500]);
    mmb.close().unwrap();
}
