//! Append-only log engine.
//!
//! Every write appends an entry `[key_len u32][value_len i32][key][value]`
//! (big-endian lengths, `value_len == -1` marks a delete). An in-memory key
//! directory maps each live key to its value's position in the file and is
//! rebuilt by replaying the log on open. An entry cut short by a crash is
//! truncated away on open.

use std::{
    collections::{BTreeMap, btree_map},
    fs::{self, File, OpenOptions},
    io::{BufReader, Read, Seek, SeekFrom, Write},
    ops::RangeBounds,
    path::{Path, PathBuf},
};

use crate::{
    error::{Error, Result},
    storage::engine::{Engine, EngineIterator},
};

const HEADER_LEN: u64 = 8;
const TOMBSTONE: i32 = -1;

/// Position and length of a value inside the log file
type KeyDir = BTreeMap<Vec<u8>, (u64, u32)>;

pub struct DiskEngine {
    path: PathBuf,
    file: File,
    keydir: KeyDir,
}

impl DiskEngine {
    /// Opens (or creates) the log at `path` and rebuilds the key directory
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        let keydir = Self::replay(&mut file)?;
        tracing::debug!(path = %path.display(), keys = keydir.len(), "opened log");
        Ok(Self { path, file, keydir })
    }

    fn replay(file: &mut File) -> Result<KeyDir> {
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(&mut *file);
        reader.seek(SeekFrom::Start(0))?;

        let mut keydir = KeyDir::new();
        let mut pos = 0u64;
        while pos < file_len {
            match Self::read_entry(&mut reader, pos, file_len)? {
                Some((key, value_pos, value_len)) => {
                    match value_len {
                        TOMBSTONE => {
                            keydir.remove(&key);
                        }
                        len => {
                            keydir.insert(key, (value_pos, len as u32));
                        }
                    }
                    pos = value_pos + value_len.max(0) as u64;
                }
                None => {
                    tracing::warn!(offset = pos, "truncating incomplete log entry");
                    drop(reader);
                    file.set_len(pos)?;
                    break;
                }
            }
        }
        Ok(keydir)
    }

    /// Reads the entry at `pos`; `None` when it runs past the end of the file
    fn read_entry(
        reader: &mut BufReader<&mut File>,
        pos: u64,
        file_len: u64,
    ) -> Result<Option<(Vec<u8>, u64, i32)>> {
        if pos + HEADER_LEN > file_len {
            return Ok(None);
        }
        let mut len_buf = [0u8; 4];
        reader.read_exact(&mut len_buf)?;
        let key_len = u32::from_be_bytes(len_buf);
        reader.read_exact(&mut len_buf)?;
        let value_len = i32::from_be_bytes(len_buf);
        if value_len < TOMBSTONE {
            return Ok(None);
        }

        let value_pos = pos + HEADER_LEN + key_len as u64;
        if value_pos + value_len.max(0) as u64 > file_len {
            return Ok(None);
        }
        let mut key = vec![0; key_len as usize];
        reader.read_exact(&mut key)?;
        reader.seek_relative(value_len.max(0) as i64)?;
        Ok(Some((key, value_pos, value_len)))
    }

    /// Appends one entry and returns the position of its value
    fn append(&mut self, key: &[u8], value: Option<&[u8]>) -> Result<u64> {
        let key_len = u32::try_from(key.len())
            .map_err(|_| Error::Internal(format!("key of {} bytes is too large", key.len())))?;
        let value_len = match value {
            Some(v) => i32::try_from(v.len()).map_err(|_| {
                Error::Internal(format!("value of {} bytes is too large", v.len()))
            })?,
            None => TOMBSTONE,
        };

        let pos = self.file.seek(SeekFrom::End(0))?;
        let mut entry = Vec::with_capacity(HEADER_LEN as usize + key.len());
        entry.extend_from_slice(&key_len.to_be_bytes());
        entry.extend_from_slice(&value_len.to_be_bytes());
        entry.extend_from_slice(key);
        if let Some(v) = value {
            entry.extend_from_slice(v);
        }
        self.file.write_all(&entry)?;
        Ok(pos + HEADER_LEN + key_len as u64)
    }

    fn read_value(file: &mut File, (pos, len): (u64, u32)) -> Result<Vec<u8>> {
        let mut value = vec![0; len as usize];
        file.seek(SeekFrom::Start(pos))?;
        file.read_exact(&mut value)?;
        Ok(value)
    }

    /// Rewrites the log so it holds only live entries
    pub fn compact(&mut self) -> Result<()> {
        let tmp_path = self.path.with_extension("compact");
        let mut tmp = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;

        let mut keydir = KeyDir::new();
        let mut pos = 0u64;
        for (key, location) in &self.keydir {
            let value = Self::read_value(&mut self.file, *location)?;
            tmp.write_all(&(key.len() as u32).to_be_bytes())?;
            tmp.write_all(&(value.len() as i32).to_be_bytes())?;
            tmp.write_all(key)?;
            tmp.write_all(&value)?;
            let value_pos = pos + HEADER_LEN + key.len() as u64;
            keydir.insert(key.clone(), (value_pos, value.len() as u32));
            pos = value_pos + value.len() as u64;
        }
        tmp.sync_all()?;
        fs::rename(&tmp_path, &self.path)?;

        tracing::debug!(path = %self.path.display(), keys = keydir.len(), "compacted log");
        self.file = tmp;
        self.keydir = keydir;
        Ok(())
    }

    /// Current size of the log file in bytes
    pub fn log_size(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }
}

impl Engine for DiskEngine {
    type EngineIterator<'a> = DiskEngineIterator<'a>;

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        let pos = self.append(&key, Some(&value))?;
        self.keydir.insert(key, (pos, value.len() as u32));
        Ok(())
    }

    fn get(&mut self, key: Vec<u8>) -> Result<Option<Vec<u8>>> {
        match self.keydir.get(&key) {
            Some(location) => Ok(Some(Self::read_value(&mut self.file, *location)?)),
            None => Ok(None),
        }
    }

    fn delete(&mut self, key: Vec<u8>) -> Result<()> {
        if self.keydir.contains_key(&key) {
            self.append(&key, None)?;
            self.keydir.remove(&key);
        }
        Ok(())
    }

    fn scan(&mut self, range: impl RangeBounds<Vec<u8>>) -> Self::EngineIterator<'_> {
        DiskEngineIterator {
            inner: self.keydir.range(range),
            file: &mut self.file,
        }
    }

    fn flush(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}

pub struct DiskEngineIterator<'a> {
    inner: btree_map::Range<'a, Vec<u8>, (u64, u32)>,
    file: &'a mut File,
}

impl DiskEngineIterator<'_> {
    fn load(&mut self, (key, location): (&Vec<u8>, &(u64, u32))) -> Result<(Vec<u8>, Vec<u8>)> {
        Ok((key.clone(), DiskEngine::read_value(self.file, *location)?))
    }
}

impl EngineIterator for DiskEngineIterator<'_> {}

impl Iterator for DiskEngineIterator<'_> {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.inner.next()?;
        Some(self.load(item))
    }
}

impl DoubleEndedIterator for DiskEngineIterator<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let item = self.inner.next_back()?;
        Some(self.load(item))
    }
}

#[cfg(test)]
mod tests {
    use std::fs::OpenOptions;
    use std::io::Write;

    use super::DiskEngine;
    use crate::{error::Result, storage::engine::Engine};

    #[test]
    fn test_reopen() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("db.lsql");
        {
            let mut eng = DiskEngine::open(&path)?;
            eng.set(b"a".to_vec(), b"1".to_vec())?;
            eng.set(b"b".to_vec(), b"2".to_vec())?;
            eng.set(b"a".to_vec(), b"3".to_vec())?;
            eng.delete(b"b".to_vec())?;
            eng.flush()?;
        }

        let mut eng = DiskEngine::open(&path)?;
        assert_eq!(eng.get(b"a".to_vec())?, Some(b"3".to_vec()));
        assert_eq!(eng.get(b"b".to_vec())?, None);
        Ok(())
    }

    #[test]
    fn test_torn_tail() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("db.lsql");
        {
            let mut eng = DiskEngine::open(&path)?;
            eng.set(b"kept".to_vec(), b"value".to_vec())?;
        }
        let intact = std::fs::metadata(&path)?.len();
        {
            // header promising a 4 byte key and 100 byte value, then nothing
            let mut file = OpenOptions::new().append(true).open(&path)?;
            file.write_all(&[0, 0, 0, 4, 0, 0, 0, 100, b'l', b'o'])?;
        }

        let mut eng = DiskEngine::open(&path)?;
        assert_eq!(eng.log_size()?, intact);
        assert_eq!(eng.get(b"kept".to_vec())?, Some(b"value".to_vec()));
        eng.set(b"next".to_vec(), b"ok".to_vec())?;
        drop(eng);

        let mut eng = DiskEngine::open(&path)?;
        assert_eq!(eng.get(b"next".to_vec())?, Some(b"ok".to_vec()));
        Ok(())
    }

    #[test]
    fn test_compact() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("db.lsql");
        let mut eng = DiskEngine::open(&path)?;
        for i in 0..10u8 {
            eng.set(b"key".to_vec(), vec![i; 16])?;
        }
        eng.set(b"other".to_vec(), b"x".to_vec())?;
        eng.delete(b"other".to_vec())?;
        let before = eng.log_size()?;

        eng.compact()?;
        assert!(eng.log_size()? < before);
        assert_eq!(eng.get(b"key".to_vec())?, Some(vec![9; 16]));
        drop(eng);

        let mut eng = DiskEngine::open(&path)?;
        assert_eq!(eng.get(b"key".to_vec())?, Some(vec![9; 16]));
        assert_eq!(eng.get(b"other".to_vec())?, None);
        Ok(())
    }
}
