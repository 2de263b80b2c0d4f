//! one facade call per subcommand
use std::io::Write;

use anyhow::{anyhow, Context};
use log::debug;

use super::{MkfsArgs, PutArgs, SfsCli, TargetArgs};
use crate::{
    block_store::MmapBlockStore,
    fs::{FileKind, InodeAttr, MountOptions, Sfs, SfsError, BLOCK_SIZE, MAX_FILE_SIZE},
    mkfs::{self, FormatOptions},
};

/// run a parsed command line, printing results to `out`
pub fn run<W: Write>(cli: SfsCli, out: &mut W) -> anyhow::Result<()> {
    match cli {
        SfsCli::Mkfs(MkfsArgs {
            image_file_path,
            data_blocks,
        }) => mkfs::mkfs(image_file_path, &FormatOptions { data_blocks }),
        SfsCli::Ls(args) => ls(&args, out),
        SfsCli::Cat(args) => cat(&args, out),
        SfsCli::Put(args) => put(&args, out),
        SfsCli::Mkdir(args) => {
            let fs = open(&args.image_file_path, args.legacy)?;
            let (parent, name) = split_parent(&args.target)?;
            let parent = fs.resolve(parent)?;
            let attr = fs.mkdir(parent.ino, name, 0o755)?;
            writeln!(out, "{}", describe(&attr, &args.target))?;
            Ok(())
        }
        SfsCli::Rm(args) => {
            let fs = open(&args.image_file_path, args.legacy)?;
            let (parent, name) = split_parent(&args.target)?;
            let parent = fs.resolve(parent)?;
            match fs.lookup(parent.ino, name)?.kind {
                FileKind::Directory => fs.rmdir(parent.ino, name)?,
                _ => fs.unlink(parent.ino, name)?,
            }
            Ok(())
        }
        SfsCli::Stat(args) => stat(&args, out),
    }
}

fn open(image_file_path: &str, legacy: bool) -> anyhow::Result<Sfs<MmapBlockStore>> {
    let options = if legacy {
        MountOptions::legacy()
    } else {
        MountOptions::default()
    };
    let store = MmapBlockStore::open(image_file_path, BLOCK_SIZE)
        .with_context(|| format!("can't open image {image_file_path}"))?;
    Sfs::mount(store, options).with_context(|| format!("can't mount {image_file_path}"))
}

/// `/a/b` into `/a` and `b`
fn split_parent(path: &str) -> anyhow::Result<(&str, &str)> {
    let (parent, name) = path
        .trim_end_matches('/')
        .rsplit_once('/')
        .ok_or_else(|| anyhow!("{path:?} is not an absolute path"))?;
    if name.is_empty() {
        return Err(anyhow!("{path:?} names no entry"));
    }
    Ok((if parent.is_empty() { "/" } else { parent }, name))
}

fn describe(attr: &InodeAttr, name: &str) -> String {
    let kind = match attr.kind {
        FileKind::Directory => 'd',
        FileKind::RegularFile => '-',
        FileKind::Unknown => '?',
    };
    format!(
        "{kind}{:04o} {:>3} {:>6} {name}",
        attr.perm, attr.ino, attr.size
    )
}

fn ls<W: Write>(args: &TargetArgs, out: &mut W) -> anyhow::Result<()> {
    let fs = open(&args.image_file_path, args.legacy)?;
    let attr = fs.resolve(&args.target)?;
    if attr.kind != FileKind::Directory {
        writeln!(out, "{}", describe(&attr, &args.target))?;
        return Ok(());
    }
    let mut cursor = 0;
    loop {
        let slots = fs.readdir(attr.ino, cursor)?;
        let Some(last) = slots.last() else {
            break;
        };
        cursor = last.position + 1;
        for slot in &slots {
            let child = fs.getattr(slot.entry.inode_number as u64)?;
            writeln!(out, "{}", describe(&child, &slot.entry.name))?;
        }
    }
    Ok(())
}

fn cat<W: Write>(args: &TargetArgs, out: &mut W) -> anyhow::Result<()> {
    let fs = open(&args.image_file_path, args.legacy)?;
    let attr = fs.resolve(&args.target)?;
    let content = fs.read(attr.ino, 0, attr.size as usize)?;
    out.write_all(&content)?;
    Ok(())
}

fn put<W: Write>(args: &PutArgs, out: &mut W) -> anyhow::Result<()> {
    let data = std::fs::read(&args.source)
        .with_context(|| format!("can't read host file {}", args.source))?;
    args.offset
        .checked_add(data.len() as u64)
        .filter(|end| *end <= MAX_FILE_SIZE)
        .ok_or_else(|| {
            anyhow!(
                "{} bytes of {} at offset {} don't fit, files hold at most {MAX_FILE_SIZE} bytes",
                data.len(),
                args.source,
                args.offset
            )
        })?;
    let fs = open(&args.image_file_path, args.legacy)?;
    let (parent, name) = split_parent(&args.target)?;
    let parent = fs.resolve(parent)?;
    let attr = match fs.lookup(parent.ino, name) {
        Ok(attr) => attr,
        Err(SfsError::NotFound) => fs.create(parent.ino, name, 0o644)?,
        Err(e) => return Err(e.into()),
    };
    let written = fs.write(attr.ino, args.offset, &data)?;
    debug!("copied {written} bytes from {} to {}", args.source, args.target);
    writeln!(out, "{}", describe(&fs.getattr(attr.ino)?, &args.target))?;
    Ok(())
}

fn stat<W: Write>(args: &TargetArgs, out: &mut W) -> anyhow::Result<()> {
    let fs = open(&args.image_file_path, args.legacy)?;
    let attr = fs.resolve(&args.target)?;
    writeln!(out, "{}", describe(&attr, &args.target))?;
    writeln!(out, "blocks: {} of {} bytes", attr.blocks, attr.block_size)?;
    if attr.ino == fs.root() {
        let statfs = fs.statfs()?;
        writeln!(
            out,
            "data blocks: {} free of {}, inodes: {} free of {}",
            statfs.free_blocks, statfs.total_blocks, statfs.free_inodes, statfs.total_inodes
        )?;
    }
    Ok(())
}
