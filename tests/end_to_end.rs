use std::path::PathBuf;

use sfs::{
    block_store::{BlockStore, MemBlockStore, MmapBlockStore},
    mkfs::{format, mkfs, FormatOptions},
    FileKind, Inode, MountOptions, Sfs, SfsError, Volume, BLOCK_SIZE, DIRECT_POINTERS,
    MAX_FILE_SIZE, ROOT_INODE,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn formatted(data_blocks: u64) -> MemBlockStore {
    let options = FormatOptions { data_blocks };
    let mut store = MemBlockStore::new(options.block_count(), BLOCK_SIZE);
    format(&mut store, &options).unwrap();
    store
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}

#[test]
fn write_and_read_back_a_two_block_file() {
    init_logger();
    let fs = Sfs::mount(formatted(100), MountOptions::default()).unwrap();
    let file = fs.create(fs.root(), "f", 0o644).unwrap();
    let data = pattern(5000);

    assert_eq!(fs.write(file.ino, 0, &data).unwrap(), 5000);
    assert_eq!(fs.read(file.ino, 0, 5000).unwrap(), data);
    let attr = fs.getattr(file.ino).unwrap();
    assert_eq!(attr.size, 5000);
    assert_eq!(attr.blocks, 2);
}

#[test]
fn writes_of_every_size_up_to_the_cap_read_back() {
    init_logger();
    let fs = Sfs::mount(formatted(100), MountOptions::default()).unwrap();
    for (i, len) in [0, 1, 4095, 4096, 4097, 12_345, MAX_FILE_SIZE as usize]
        .into_iter()
        .enumerate()
    {
        let file = fs.create(fs.root(), &format!("f{i}"), 0o644).unwrap();
        let data = pattern(len);
        assert_eq!(fs.write(file.ino, 0, &data).unwrap(), len);
        assert_eq!(fs.read(file.ino, 0, len).unwrap(), data);
    }
}

#[test]
fn write_ending_at_the_cap_succeeds_and_one_past_fails() {
    init_logger();
    let fs = Sfs::mount(formatted(100), MountOptions::default()).unwrap();
    let file = fs.create(fs.root(), "big", 0o644).unwrap();
    fs.write(file.ino, MAX_FILE_SIZE - 10, &[1u8; 10]).unwrap();
    assert_eq!(fs.getattr(file.ino).unwrap().size, MAX_FILE_SIZE);

    let other = fs.create(fs.root(), "other", 0o644).unwrap();
    fs.write(other.ino, 0, b"keep").unwrap();
    let before = fs.inode(other.ino).unwrap();
    assert!(matches!(
        fs.write(other.ino, MAX_FILE_SIZE - 3, b"four"),
        Err(SfsError::FileTooLarge { .. })
    ));
    assert_eq!(fs.inode(other.ino).unwrap(), before);
}

#[test]
fn directory_fills_all_ten_direct_blocks() {
    init_logger();
    let mut volume = Volume::mount(formatted(20), MountOptions::default()).unwrap();
    let mut root = volume.find_inode(ROOT_INODE).unwrap();
    let per_block = (BLOCK_SIZE / 16) as u64;

    for i in 0..per_block * DIRECT_POINTERS as u64 {
        volume
            .dir_insert(&mut root, &format!("e{i}"), (i % 51) as u16)
            .unwrap();
    }
    assert_eq!(root.direct_blocks().len(), DIRECT_POINTERS);
    assert!(matches!(
        volume.dir_insert(&mut root, "eleventh", 1),
        Err(SfsError::DirectoryFull)
    ));
}

#[test]
fn directory_round_trip() {
    init_logger();
    let mut volume = Volume::mount(formatted(10), MountOptions::default()).unwrap();
    let mut root = volume.find_inode(ROOT_INODE).unwrap();
    volume.dir_insert(&mut root, "a.txt", 7).unwrap();
    assert_eq!(volume.dir_search(&root, "a.txt").unwrap(), 7);
    volume.dir_remove(&root, "a.txt").unwrap();
    assert!(matches!(
        volume.dir_search(&root, "a.txt"),
        Err(SfsError::NotFound)
    ));
}

#[test]
fn nested_tree_survives_remount() {
    init_logger();
    let fs = Sfs::mount(formatted(30), MountOptions::default()).unwrap();
    let etc = fs.mkdir(fs.root(), "etc", 0o755).unwrap();
    let conf = fs.mkdir(etc.ino, "conf.d", 0o750).unwrap();
    let file = fs.create(conf.ino, "app.toml", 0o600).unwrap();
    fs.write(file.ino, 0, b"level = \"debug\"\n").unwrap();
    let store = fs.unmount().unwrap();

    let fs = Sfs::mount(store, MountOptions::default()).unwrap();
    let attr = fs.resolve("/etc/conf.d/app.toml").unwrap();
    assert_eq!(attr.kind, FileKind::RegularFile);
    assert_eq!(attr.perm, 0o600);
    assert_eq!(
        fs.read(attr.ino, 0, 100).unwrap(),
        b"level = \"debug\"\n".to_vec()
    );
    let names: Vec<_> = fs
        .readdir(etc.ino, 0)
        .unwrap()
        .into_iter()
        .map(|slot| slot.entry.name)
        .collect();
    assert_eq!(names, vec!["conf.d"]);
}

#[test]
fn removal_in_the_middle_hides_later_entries_only_in_legacy_mode() {
    init_logger();
    let fs = Sfs::mount(formatted(10), MountOptions::default()).unwrap();
    for name in ["a", "b", "c"] {
        fs.create(fs.root(), name, 0o644).unwrap();
    }
    fs.unlink(fs.root(), "b").unwrap();
    assert_eq!(fs.readdir(fs.root(), 0).unwrap().len(), 2);
    assert!(fs.lookup(fs.root(), "c").is_ok());
    let store = fs.unmount().unwrap();

    let legacy = Sfs::mount(store, MountOptions::legacy()).unwrap();
    let entries = legacy.readdir(legacy.root(), 0).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].entry.name, "a");
    assert!(matches!(
        legacy.lookup(legacy.root(), "c"),
        Err(SfsError::NotFound)
    ));
}

#[test]
fn legacy_removal_never_frees_the_inode() {
    init_logger();
    let fs = Sfs::mount(formatted(10), MountOptions::legacy()).unwrap();
    let first = fs.create(fs.root(), "tmp", 0o644).unwrap();
    fs.unlink(fs.root(), "tmp").unwrap();
    let second = fs.create(fs.root(), "tmp", 0o644).unwrap();
    assert_eq!(first.ino, 1);
    assert_eq!(second.ino, 2);
}

#[test]
fn mount_rejects_a_foreign_image() {
    init_logger();
    let store = MemBlockStore::new(105, BLOCK_SIZE);
    assert!(matches!(
        Sfs::mount(store, MountOptions::default()),
        Err(SfsError::Validation(_))
    ));
}

#[test]
fn image_file_round_trip() {
    init_logger();
    let tmp_file = PathBuf::from("/tmp/sfs_end_to_end.img");
    if tmp_file.exists() {
        std::fs::remove_file(&tmp_file).unwrap();
    }
    mkfs(&tmp_file, &FormatOptions::default()).unwrap();

    let store = MmapBlockStore::open(&tmp_file, BLOCK_SIZE).unwrap();
    assert_eq!(store.block_count(), 105);
    let fs = Sfs::mount(store, MountOptions::default()).unwrap();
    let file = fs.create(fs.root(), "f", 0o644).unwrap();
    fs.write(file.ino, 0, &pattern(5000)).unwrap();
    fs.sync().unwrap();
    drop(fs);

    let store = MmapBlockStore::open(&tmp_file, BLOCK_SIZE).unwrap();
    let fs = Sfs::mount(store, MountOptions::default()).unwrap();
    let attr = fs.lookup(fs.root(), "f").unwrap();
    assert_eq!(fs.read(attr.ino, 0, 5000).unwrap(), pattern(5000));
    let root: Inode = fs.inode(ROOT_INODE).unwrap();
    assert_eq!(root.direct_blocks[0], 5);
    drop(fs);

    // the same bytes mount from memory
    let image = std::fs::read(&tmp_file).unwrap();
    let fs = Sfs::mount(MemBlockStore::from_vec(image, BLOCK_SIZE), MountOptions::default()).unwrap();
    let attr = fs.lookup(fs.root(), "f").unwrap();
    assert_eq!(attr.size, 5000);

    std::fs::remove_file(&tmp_file).unwrap()
}
