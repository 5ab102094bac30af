//! `fuser::Filesystem` implementation forwarding to the LazyFS core.

use super::inodes::{InodeTable, ROOT_INO};
use fuser::{
    FileAttr, FileType, Filesystem, KernelConfig, ReplyAttr, ReplyCreate, ReplyData,
    ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyLock, ReplyOpen, ReplyWrite, ReplyXattr,
    Request, TimeOrNow,
};
use lazyfs_core::{
    FileAttributes, FileHandle, FileKind, LazyError, LazyFs, LazyOperations, OpenFlags,
    VirtualPath,
};
use libc::{c_int, EINVAL, ENOENT, ERANGE};
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

const TTL: Duration = Duration::from_secs(1);
const GENERATION: u64 = 0;

/// Builds the kernel view of an entry's attributes.
pub fn file_attr(ino: u64, attrs: &FileAttributes) -> FileAttr {
    FileAttr {
        ino,
        size: attrs.size,
        blocks: attrs.blocks,
        atime: attrs.accessed,
        mtime: attrs.modified,
        ctime: attrs.changed,
        crtime: attrs.changed,
        kind: match attrs.kind {
            FileKind::Directory => FileType::Directory,
            FileKind::RegularFile => FileType::RegularFile,
        },
        perm: attrs.perm,
        nlink: attrs.nlink,
        uid: attrs.uid,
        gid: attrs.gid,
        rdev: attrs.rdev,
        blksize: attrs.blksize,
        flags: 0,
    }
}

fn errno(err: LazyError) -> c_int {
    err.errno()
}

/// A mounted [`LazyFs`] as seen by the kernel.
pub struct LazyFuse {
    fs: Arc<LazyFs>,
    inodes: InodeTable,
}

impl LazyFuse {
    pub fn new(fs: Arc<LazyFs>) -> Self {
        Self {
            fs,
            inodes: InodeTable::new(),
        }
    }

    pub fn inodes(&self) -> &InodeTable {
        &self.inodes
    }

    fn resolve(&self, ino: u64) -> Result<VirtualPath, c_int> {
        self.inodes.path(ino).cloned().ok_or(ENOENT)
    }

    /// Path of `name` inside `parent`; only the root has children.
    fn child(&self, parent: u64, name: &OsStr) -> Result<VirtualPath, c_int> {
        if parent != ROOT_INO {
            return Err(ENOENT);
        }
        let name = name.to_str().ok_or(EINVAL)?;
        Ok(VirtualPath::child(name))
    }

    fn attr_for(&mut self, path: &VirtualPath) -> Result<FileAttr, c_int> {
        let attrs = self.fs.getattr(path).map_err(errno)?;
        let ino = self.inodes.assign(path);
        Ok(file_attr(ino, &attrs))
    }

    fn lookup_child(&mut self, parent: u64, name: &OsStr) -> Result<FileAttr, c_int> {
        let path = self.child(parent, name)?;
        self.attr_for(&path)
    }

    fn set_attributes(
        &mut self,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        fh: Option<u64>,
    ) -> Result<FileAttr, c_int> {
        let path = self.resolve(ino)?;

        if let Some(mode) = mode {
            self.fs.chmod(&path, mode).map_err(errno)?;
        }
        if uid.is_some() || gid.is_some() {
            self.fs.chown(&path, uid, gid).map_err(errno)?;
        }
        if let Some(size) = size {
            match fh {
                Some(fh) => self.fs.ftruncate(&path, FileHandle::new(fh), size),
                None => self.fs.truncate(&path, size),
            }
            .map_err(errno)?;
        }
        self.attr_for(&path)
    }

    fn create_child(
        &mut self,
        parent: u64,
        name: &OsStr,
        mode: u32,
        umask: u32,
        flags: i32,
    ) -> Result<(FileAttr, FileHandle), c_int> {
        let path = self.child(parent, name)?;
        let flags = OpenFlags::from_libc(flags) | OpenFlags::CREATE;
        let handle = self.fs.create(&path, mode & !umask, flags).map_err(errno)?;
        let attr = self.attr_for(&path)?;
        Ok((attr, handle))
    }

    fn rename_child(
        &mut self,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        flags: u32,
    ) -> Result<(), c_int> {
        let old = self.child(parent, name)?;
        let new = self.child(newparent, newname)?;
        // The target is never replaced, so RENAME_NOREPLACE holds anyway
        if flags & !libc::RENAME_NOREPLACE != 0 {
            return Err(EINVAL);
        }
        self.fs.rename(&old, &new).map_err(errno)?;
        self.inodes.rename(&old, &new);
        Ok(())
    }

    fn unlink_child(&mut self, parent: u64, name: &OsStr) -> Result<(), c_int> {
        let path = self.child(parent, name)?;
        self.fs.unlink(&path).map_err(errno)?;
        self.inodes.forget(&path);
        Ok(())
    }

    /// Directory listing with the inode and type of every name.
    fn list(&mut self, ino: u64) -> Result<Vec<(u64, FileType, String)>, c_int> {
        let path = self.resolve(ino)?;
        let names = self.fs.readdir(&path).map_err(errno)?;

        Ok(names
            .into_iter()
            .map(|name| match name.as_str() {
                "." | ".." => (ROOT_INO, FileType::Directory, name),
                _ => {
                    let ino = self.inodes.assign(&VirtualPath::child(&name));
                    (ino, FileType::RegularFile, name)
                }
            })
            .collect())
    }
}

impl Filesystem for LazyFuse {
    fn init(&mut self, _req: &Request<'_>, _config: &mut KernelConfig) -> Result<(), c_int> {
        self.fs.init().map_err(errno)
    }

    fn destroy(&mut self) {
        info!("unmounting, releasing {} inodes", self.inodes.len());
        self.fs.destroy();
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        match self.lookup_child(parent, name) {
            Ok(attr) => reply.entry(&TTL, &attr, GENERATION),
            Err(errno) => reply.error(errno),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        match self.resolve(ino).and_then(|path| self.attr_for(&path)) {
            Ok(attr) => reply.attr(&TTL, &attr),
            Err(errno) => reply.error(errno),
        }
    }

    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        match self.set_attributes(ino, mode, uid, gid, size, fh) {
            Ok(attr) => reply.attr(&TTL, &attr),
            Err(errno) => reply.error(errno),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        let result = self
            .resolve(ino)
            .and_then(|path| self.fs.open(&path, OpenFlags::from_libc(flags)).map_err(errno));
        match result {
            Ok(handle) => reply.opened(handle.id(), 0),
            Err(errno) => reply.error(errno),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        if offset < 0 {
            reply.error(EINVAL);
            return;
        }
        let result = self.resolve(ino).and_then(|path| {
            self.fs
                .read(&path, FileHandle::new(fh), offset as u64, size as usize)
                .map_err(errno)
        });
        match result {
            Ok(data) => reply.data(&data),
            Err(errno) => reply.error(errno),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        if offset < 0 {
            reply.error(EINVAL);
            return;
        }
        let result = self.resolve(ino).and_then(|path| {
            self.fs
                .write(&path, FileHandle::new(fh), offset as u64, data)
                .map_err(errno)
        });
        match result {
            Ok(written) => reply.written(written as u32),
            Err(errno) => reply.error(errno),
        }
    }

    fn flush(&mut self, _req: &Request<'_>, ino: u64, fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
        let result = self
            .resolve(ino)
            .and_then(|path| self.fs.flush(&path, FileHandle::new(fh)).map_err(errno));
        match result {
            Ok(()) => reply.ok(),
            Err(errno) => reply.error(errno),
        }
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        // An unlinked file may still be released; the core ignores it.
        if let Ok(path) = self.resolve(ino) {
            let _ = self.fs.release(&path, FileHandle::new(fh));
        }
        reply.ok();
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        umask: u32,
        flags: i32,
        reply: ReplyCreate,
    ) {
        match self.create_child(parent, name, mode, umask, flags) {
            Ok((attr, handle)) => reply.created(&TTL, &attr, GENERATION, handle.id(), 0),
            Err(errno) => reply.error(errno),
        }
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        flags: u32,
        reply: ReplyEmpty,
    ) {
        match self.rename_child(parent, name, newparent, newname, flags) {
            Ok(()) => reply.ok(),
            Err(errno) => reply.error(errno),
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        match self.unlink_child(parent, name) {
            Ok(()) => reply.ok(),
            Err(errno) => reply.error(errno),
        }
    }

    fn opendir(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        let result = self
            .resolve(ino)
            .and_then(|path| self.fs.opendir(&path).map_err(errno));
        match result {
            Ok(()) => reply.opened(0, 0),
            Err(errno) => reply.error(errno),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let entries = match self.list(ino) {
            Ok(entries) => entries,
            Err(errno) => {
                reply.error(errno);
                return;
            }
        };

        for (i, (ino, kind, name)) in entries.into_iter().enumerate().skip(offset.max(0) as usize) {
            if reply.add(ino, (i + 1) as i64, kind, name) {
                break;
            }
        }
        reply.ok();
    }

    fn access(&mut self, _req: &Request<'_>, ino: u64, mask: i32, reply: ReplyEmpty) {
        let result = self
            .resolve(ino)
            .and_then(|path| self.fs.access(&path, mask).map_err(errno));
        match result {
            Ok(()) => reply.ok(),
            Err(errno) => reply.error(errno),
        }
    }

    fn getxattr(&mut self, _req: &Request<'_>, ino: u64, name: &OsStr, size: u32, reply: ReplyXattr) {
        let result = self.resolve(ino).and_then(|path| {
            let name = name.to_str().ok_or(EINVAL)?;
            self.fs.getxattr(&path, name).map_err(errno)
        });
        match result {
            Ok(value) if size == 0 => reply.size(value.len() as u32),
            Ok(value) if value.len() > size as usize => reply.error(ERANGE),
            Ok(value) => reply.data(&value),
            Err(errno) => reply.error(errno),
        }
    }

    fn setxattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        name: &OsStr,
        value: &[u8],
        _flags: i32,
        _position: u32,
        reply: ReplyEmpty,
    ) {
        let result = self.resolve(ino).and_then(|path| {
            self.fs
                .setxattr(&path, &name.to_string_lossy(), value)
                .map_err(errno)
        });
        match result {
            Ok(()) => reply.ok(),
            Err(errno) => reply.error(errno),
        }
    }

    fn listxattr(&mut self, _req: &Request<'_>, ino: u64, _size: u32, reply: ReplyXattr) {
        match self.resolve(ino).and_then(|path| self.fs.listxattr(&path).map_err(errno)) {
            Ok(names) => {
                let mut buf = Vec::new();
                for name in names {
                    buf.extend_from_slice(name.as_bytes());
                    buf.push(0);
                }
                reply.data(&buf);
            }
            Err(errno) => reply.error(errno),
        }
    }

    fn removexattr(&mut self, _req: &Request<'_>, ino: u64, name: &OsStr, reply: ReplyEmpty) {
        let result = self.resolve(ino).and_then(|path| {
            self.fs
                .removexattr(&path, &name.to_string_lossy())
                .map_err(errno)
        });
        match result {
            Ok(()) => reply.ok(),
            Err(errno) => reply.error(errno),
        }
    }

    fn getlk(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        _lock_owner: u64,
        _start: u64,
        _end: u64,
        _typ: i32,
        _pid: u32,
        reply: ReplyLock,
    ) {
        let result = self
            .resolve(ino)
            .and_then(|path| self.fs.lock(&path, FileHandle::new(fh)).map_err(errno));
        match result {
            Ok(()) => reply.locked(0, 0, libc::F_UNLCK as i32, 0),
            Err(errno) => reply.error(errno),
        }
    }

    fn setlk(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        _lock_owner: u64,
        _start: u64,
        _end: u64,
        _typ: i32,
        _pid: u32,
        _sleep: bool,
        reply: ReplyEmpty,
    ) {
        let result = self
            .resolve(ino)
            .and_then(|path| self.fs.lock(&path, FileHandle::new(fh)).map_err(errno));
        match result {
            Ok(()) => reply.ok(),
            Err(errno) => reply.error(errno),
        }
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let result = self
            .child(parent, name)
            .and_then(|path| self.fs.mkdir(&path, mode).map_err(errno));
        match result {
            Ok(()) => reply.error(ENOENT),
            Err(errno) => reply.error(errno),
        }
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let result = self
            .child(parent, name)
            .and_then(|path| self.fs.rmdir(&path).map_err(errno));
        match result {
            Ok(()) => reply.ok(),
            Err(errno) => reply.error(errno),
        }
    }

    fn mknod(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        rdev: u32,
        reply: ReplyEntry,
    ) {
        let result = self
            .child(parent, name)
            .and_then(|path| self.fs.mknod(&path, mode, rdev).map_err(errno));
        match result {
            Ok(()) => reply.error(ENOENT),
            Err(errno) => reply.error(errno),
        }
    }

    fn symlink(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        link_name: &OsStr,
        target: &Path,
        reply: ReplyEntry,
    ) {
        let result = self.child(parent, link_name).and_then(|path| {
            self.fs
                .symlink(&target.to_string_lossy(), &path)
                .map_err(errno)
        });
        match result {
            Ok(()) => reply.error(ENOENT),
            Err(errno) => reply.error(errno),
        }
    }

    fn readlink(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyData) {
        match self.resolve(ino).and_then(|path| self.fs.readlink(&path).map_err(errno)) {
            Ok(target) => reply.data(target.as_bytes()),
            Err(errno) => reply.error(errno),
        }
    }

    fn link(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        newparent: u64,
        newname: &OsStr,
        reply: ReplyEntry,
    ) {
        let result = self.resolve(ino).and_then(|existing| {
            let new = self.child(newparent, newname)?;
            self.fs.link(&existing, &new).map_err(errno)
        });
        match result {
            Ok(()) => reply.error(ENOENT),
            Err(errno) => {
                debug!("link refused with errno {}", errno);
                reply.error(errno)
            }
        }
    }
}
