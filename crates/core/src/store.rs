//! The persistent dictionary file
//!
//! On-disk layout (all integers little-endian):
//!
//! ```text
//! magic(7)                  "SDICT" 0x01 0x00
//! reserved_words   u32      capacity of each index table
//! words_sect_size  u32      capacity of the word section
//! num_words        u32      current word count
//! word_inds[reserved_words] u32 each; 1-based offset into the word
//!                           section, 0 = empty slot
//! def_inds[reserved_words]  u32 each; 1-based offset into the defs
//!                           section, 0 = empty slot
//! words section             NUL-terminated words, tightly packed,
//!                           remainder zero-filled (words_sect_size bytes)
//! defs section              concatenated `size:u32 | hash:u64 | bytes`
//!                           records, appended as words are added
//! ```
//!
//! The index tables and word section have fixed capacities; when either
//! would overflow, the whole file is rewritten with power-of-two-grown
//! capacities into a `.tmp` sibling and renamed over the original.
//! Identical definition bodies are stored once and shared between words.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::codec::{self, MAGIC};
use crate::dedup::DedupMap;
use crate::hash::{fnv1a, fnv1a_with, FNV_OFFSET_BASIS};
use crate::index::{WordEntry, WordIndex};
use crate::{Error, Result};

/// Index-table capacity of a freshly created file. Capacities only grow
/// as power-of-two multiples of this, so it must match to read existing
/// files.
pub const INIT_RESERVED_WORDS: u32 = 32;
/// Word-section capacity of a freshly created file.
pub const INIT_WORDS_SECT_SIZE: u32 = 256;

/// Definition bodies are read and copied in chunks of this many bytes,
/// capping peak memory regardless of record size.
const BATCH_SIZE: usize = 4096;

/// Bytes of `size | hash` preceding a definition body.
const DEF_HEADER_LEN: u64 = 12;

const fn inds_section_offset() -> u64 {
    MAGIC.len() as u64 + 12
}

/// The `num_words` header field sits directly before the index tables.
const NUM_WORDS_OFFSET: u64 = inds_section_offset() - 4;

fn words_section_offset_for(reserved_words: u32) -> u64 {
    inds_section_offset() + reserved_words as u64 * 8
}

fn defs_section_offset_for(reserved_words: u32, words_sect_size: u32) -> u64 {
    words_section_offset_for(reserved_words) + words_sect_size as u64
}

/// Options for [`DictFile::open_with`].
#[derive(Debug, Clone)]
pub struct OpenConfig {
    /// Create a new dictionary when the path does not exist.
    pub create_if_not_exists: bool,
    /// Keep an in-memory map of existing definitions so identical bodies
    /// are stored once.
    pub deduplicate: bool,
    /// Recompute and verify every definition hash while opening
    /// (expensive on large files).
    pub check_defs: bool,
}

impl Default for OpenConfig {
    fn default() -> Self {
        Self {
            create_if_not_exists: true,
            deduplicate: true,
            check_defs: true,
        }
    }
}

/// Options for [`DictFile::add_word_with`].
#[derive(Debug, Clone, Copy)]
pub struct AddOptions {
    /// Flush the word index after the insert. Definitions are always
    /// written immediately; disabling this batches the index updates
    /// until an explicit [`DictFile::flush`].
    pub flush_words: bool,
    /// Skip the existing-word lookup. Only safe when the caller knows the
    /// word is new; inserting a duplicate this way surfaces as
    /// [`Error::PendingDuplicates`] at flush time.
    pub skip_dup_check: bool,
}

impl Default for AddOptions {
    fn default() -> Self {
        Self {
            flush_words: true,
            skip_dup_check: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Closed,
    Read,
    ReadWrite,
}

/// A dictionary file handle.
///
/// All I/O is blocking and single-threaded. Mutations re-open the handle
/// read-only once they reach disk; `add_word` with `flush_words: false`
/// keeps it read-write between batched inserts. Dropping a handle with
/// pending entries attempts a best-effort flush.
#[derive(Debug)]
pub struct DictFile {
    path: PathBuf,
    file: Option<File>,
    mode: Mode,
    reserved_words: u32,
    words_sect_size: u32,
    index: WordIndex,
    dedup: Option<DedupMap>,
    created_file: bool,
}

impl DictFile {
    /// Open `path` with the default configuration (create if missing,
    /// deduplicate, verify definition hashes).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, OpenConfig::default())
    }

    /// Open or create the dictionary file at `path`.
    pub fn open_with<P: AsRef<Path>>(path: P, config: OpenConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut dict = Self {
            path,
            file: None,
            mode: Mode::Closed,
            reserved_words: INIT_RESERVED_WORDS,
            words_sect_size: INIT_WORDS_SECT_SIZE,
            index: WordIndex::new(),
            dedup: config.deduplicate.then(DedupMap::new),
            created_file: false,
        };

        match fs::metadata(&dict.path) {
            Ok(meta) if meta.is_file() => {
                dict.read_file()?;
                dict.load_existing_defs(config.check_defs)?;
                info!(
                    "opened dictionary file {:?} with {} words",
                    dict.path,
                    dict.index.len()
                );
            }
            Ok(_) => return Err(Error::NotARegularFile(dict.path.clone())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if !config.create_if_not_exists {
                    return Err(Error::DoesNotExist(dict.path.clone()));
                }
                dict.create_file()?;
                dict.created_file = true;
            }
            Err(e) => return Err(e.into()),
        }
        Ok(dict)
    }

    /// Whether this handle created a new file rather than reading one.
    pub fn created_file(&self) -> bool {
        self.created_file
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current capacity of each index table.
    pub fn reserved_words(&self) -> u32 {
        self.reserved_words
    }

    /// Current capacity of the word section in bytes.
    pub fn words_sect_size(&self) -> u32 {
        self.words_sect_size
    }

    /// Number of words in the dictionary, including unflushed ones.
    pub fn num_words(&self) -> usize {
        self.index.len()
    }

    /// Whether `word` is present. No file access.
    pub fn contains(&self, word: impl AsRef<[u8]>) -> bool {
        self.index.contains(word.as_ref())
    }

    /// Look up `word` and read its definition body.
    pub fn find(&mut self, word: impl AsRef<[u8]>) -> Result<Option<Vec<u8>>> {
        self.find_impl(word.as_ref(), false)
    }

    /// Like [`DictFile::find`], but recomputes the stored hash over the
    /// body and fails with [`Error::HashMismatch`] if it disagrees.
    pub fn find_checked(&mut self, word: impl AsRef<[u8]>) -> Result<Option<Vec<u8>>> {
        self.find_impl(word.as_ref(), true)
    }

    /// Insert a word with the default options (flush immediately, check
    /// for duplicates).
    ///
    /// Returns false without changing anything when the word is already
    /// present; existing definitions are never overwritten.
    pub fn add_word(&mut self, word: impl AsRef<[u8]>, def: impl AsRef<[u8]>) -> Result<bool> {
        self.add_word_with(word, def, AddOptions::default())
    }

    /// Insert a word.
    ///
    /// The definition record is appended to the file right away (unless
    /// an identical body already exists, in which case it is shared);
    /// the word and index entries reach disk on flush.
    pub fn add_word_with(
        &mut self,
        word: impl AsRef<[u8]>,
        def: impl AsRef<[u8]>,
        opts: AddOptions,
    ) -> Result<bool> {
        let word = word.as_ref();
        let def = def.as_ref();
        if def.is_empty() {
            return Err(Error::EmptyDefinition);
        }

        if !opts.skip_dup_check && self.index.contains(word) {
            return Ok(false);
        }

        let def_ind = match self.existing_def_ind(def)? {
            Some(shared) => shared,
            None => self.append_def(def)?,
        };
        self.index.insert_pending(word.to_vec(), def_ind);

        if opts.flush_words {
            self.flush()?;
        }
        Ok(true)
    }

    /// Write pending words and index entries out.
    ///
    /// When the pending entries still fit the reserved index tables and
    /// word section, this is an in-place incremental write; otherwise the
    /// whole file is rewritten with grown capacities. Returns whether the
    /// file was modified.
    pub fn flush(&mut self) -> Result<bool> {
        let Some(first_new) = self.index.first_new() else {
            self.reopen_read_only()?;
            return Ok(false);
        };

        let word_bytes = |e: &WordEntry| e.word.len() as u64 + 1;
        let cur_words_total_len: u64 = self.index.entries()[..first_new]
            .iter()
            .map(word_bytes)
            .sum();
        let words_total_len: u64 = cur_words_total_len
            + self.index.entries()[first_new..]
                .iter()
                .map(word_bytes)
                .sum::<u64>();

        let old_words_sect_size = self.words_sect_size;
        while (self.words_sect_size as u64) < words_total_len {
            self.words_sect_size *= 2;
        }
        if self.words_sect_size != old_words_sect_size
            || (self.reserved_words as usize) < self.index.len()
        {
            self.index.consolidate()?;
            let old_reserved_words = self.reserved_words;
            while (self.reserved_words as usize) < self.index.len() {
                self.reserved_words *= 2;
            }
            self.rewrite_file(old_reserved_words, old_words_sect_size)?;
            return Ok(true);
        }

        debug!(
            "flushing {} pending words to {:?}",
            self.index.len() - first_new,
            self.path
        );

        let num_words = self.index.len() as u32;
        let words_off = words_section_offset_for(self.reserved_words);
        let reserved_words = self.reserved_words as u64;
        self.writable()?;
        let file = self.file.as_mut().expect("handle open");
        let pending = &self.index.entries()[first_new..];

        file.seek(SeekFrom::Start(NUM_WORDS_OFFSET))?;
        codec::write_u32(file, num_words)?;

        // append the pending words to the word section
        file.seek(SeekFrom::Start(words_off + cur_words_total_len))?;
        let mut word_inds = Vec::with_capacity(pending.len());
        let mut bytes_written: u64 = 0;
        for e in pending {
            word_inds.push(cur_words_total_len + bytes_written);
            file.write_all(&e.word)?;
            file.write_all(&[0])?;
            bytes_written += e.word.len() as u64 + 1;
        }

        // fill the corresponding index-table slots; entries are 1-based
        file.seek(SeekFrom::Start(inds_section_offset() + first_new as u64 * 4))?;
        for ind in &word_inds {
            codec::write_u32(file, *ind as u32 + 1)?;
        }

        file.seek(SeekFrom::Start(
            inds_section_offset() + (reserved_words + first_new as u64) * 4,
        ))?;
        for e in pending {
            codec::write_u32(file, e.def_ind + 1)?;
        }

        self.index.consolidate()?;
        self.reopen_read_only()?;
        Ok(true)
    }

    /// Drop the OS handle. Pending entries stay in memory and are written
    /// by the next [`DictFile::flush`] (or on drop); any other operation
    /// reopens the file as needed.
    pub fn close(&mut self) {
        self.file = None;
        self.mode = Mode::Closed;
    }

    // ---- open / create ----

    fn create_file(&mut self) -> Result<()> {
        self.reserved_words = INIT_RESERVED_WORDS;
        self.words_sect_size = INIT_WORDS_SECT_SIZE;

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)?;
        let mut w = BufWriter::new(file);
        w.write_all(&MAGIC)?;
        codec::write_u32(&mut w, self.reserved_words)?;
        codec::write_u32(&mut w, self.words_sect_size)?;
        codec::write_u32(&mut w, 0)?;
        codec::write_nulls(&mut w, self.reserved_words as usize * 8)?;
        codec::write_nulls(&mut w, self.words_sect_size as usize)?;
        // no defs section yet: records are appended at the end of file
        w.flush()?;
        drop(w);

        self.reopen_read_only()?;
        info!("created dictionary file {:?}", self.path);
        Ok(())
    }

    /// Parse the header, index tables and word section, rebuilding the
    /// in-memory index.
    fn read_file(&mut self) -> Result<()> {
        let file = File::open(&self.path)?;
        let file_size = file.metadata()?.len();
        let mut r = BufReader::new(file);

        codec::check_magic(&mut r)?;
        let reserved_words = codec::read_u32(&mut r)?;
        if reserved_words == 0 {
            return Err(Error::Corrupt("read 0 reserved words"));
        }
        let words_sect_size = codec::read_u32(&mut r)?;
        if words_sect_size == 0 {
            return Err(Error::Corrupt("read 0 word section size"));
        }
        let num_words = codec::read_u32(&mut r)? as usize;
        if num_words > reserved_words as usize {
            return Err(Error::Corrupt("word count exceeds reserved capacity"));
        }
        if defs_section_offset_for(reserved_words, words_sect_size) > file_size {
            return Err(Error::Corrupt("reported section sizes exceed file size"));
        }

        // zero entries mark unused slots; exactly num_words must be set
        let mut word_inds = Vec::new();
        for _ in 0..reserved_words {
            let ind = codec::read_u32(&mut r)?;
            if ind != 0 {
                word_inds.push(ind - 1);
            }
        }
        let mut def_inds = Vec::new();
        for _ in 0..reserved_words {
            let ind = codec::read_u32(&mut r)?;
            if ind != 0 {
                def_inds.push(ind - 1);
            }
        }
        if word_inds.len() != num_words || def_inds.len() != num_words {
            return Err(Error::Corrupt("incorrect number of valid indices"));
        }

        // word offsets must be unique; def offsets may be shared
        let mut pairs: Vec<(u32, u32)> = word_inds.into_iter().zip(def_inds).collect();
        pairs.sort_unstable_by_key(|&(word_ind, _)| word_ind);
        if pairs.windows(2).any(|w| w[0].0 == w[1].0) {
            return Err(Error::Corrupt("found repeated indices"));
        }

        // the reader sits at the word section now; take it whole
        let mut words_sect = vec![0u8; words_sect_size as usize];
        codec::read_bytes(&mut r, &mut words_sect)?;

        let mut entries = Vec::with_capacity(num_words);
        for (word_off, def_off) in pairs {
            let start = word_off as usize;
            if start >= words_sect.len() {
                return Err(Error::Corrupt("word index outside the word section"));
            }
            let rest = &words_sect[start..];
            let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
            entries.push(WordEntry {
                word: rest[..end].to_vec(),
                def_ind: def_off,
            });
        }

        self.reserved_words = reserved_words;
        self.words_sect_size = words_sect_size;
        self.index = WordIndex::load(entries)?;
        self.file = Some(r.into_inner());
        self.mode = Mode::Read;
        Ok(())
    }

    /// Register every existing definition in the dedup map and, when
    /// asked, verify its stored hash against the body.
    fn load_existing_defs(&mut self, check_defs: bool) -> Result<()> {
        if self.dedup.is_none() && !check_defs {
            return Ok(());
        }
        let def_inds: Vec<u32> = self.index.entries().iter().map(|e| e.def_ind).collect();
        for def_ind in def_inds {
            let (size, hash) = self.def_size_and_hash(def_ind)?;
            if let Some(dedup) = self.dedup.as_mut() {
                dedup.register(size, hash, def_ind);
            }
            if check_defs && hash != self.hash_existing_def(def_ind)? {
                return Err(Error::HashMismatch);
            }
        }
        if let Some(dedup) = &self.dedup {
            debug!("registered {} existing definition records", dedup.num_records());
        }
        Ok(())
    }

    // ---- handle mode machine ----

    /// A handle usable for reads: the current one if it is readable,
    /// otherwise a fresh read-only open.
    fn readable(&mut self) -> Result<&mut File> {
        if !matches!(self.mode, Mode::Read | Mode::ReadWrite) || self.file.is_none() {
            self.file = Some(File::open(&self.path)?);
            self.mode = Mode::Read;
        }
        Ok(self.file.as_mut().expect("handle just opened"))
    }

    /// A read-write handle, reopening if the current one is weaker.
    fn writable(&mut self) -> Result<&mut File> {
        if self.mode != Mode::ReadWrite || self.file.is_none() {
            self.file = Some(OpenOptions::new().read(true).write(true).open(&self.path)?);
            self.mode = Mode::ReadWrite;
        }
        Ok(self.file.as_mut().expect("handle just opened"))
    }

    /// Re-open read-only after a mutation. This is the commit boundary:
    /// closing the write handle hands all written bytes to the OS.
    fn reopen_read_only(&mut self) -> Result<()> {
        if self.mode != Mode::Read || self.file.is_none() {
            self.file = Some(File::open(&self.path)?);
            self.mode = Mode::Read;
        }
        Ok(())
    }

    // ---- definition records ----

    fn defs_section_offset(&self) -> u64 {
        defs_section_offset_for(self.reserved_words, self.words_sect_size)
    }

    fn find_impl(&mut self, word: &[u8], check_def: bool) -> Result<Option<Vec<u8>>> {
        match self.index.find(word) {
            Some(def_ind) => Ok(Some(self.read_def_whole(def_ind, check_def)?)),
            None => Ok(None),
        }
    }

    fn read_def_whole(&mut self, def_ind: u32, check_def: bool) -> Result<Vec<u8>> {
        let defs_off = self.defs_section_offset();
        let file = self.readable()?;
        file.seek(SeekFrom::Start(defs_off + def_ind as u64))?;
        let size = codec::read_u32(file)?;
        if size == 0 {
            return Err(Error::Corrupt("read 0 definition size"));
        }
        let hash = codec::read_u64(file)?;
        let mut bytes = vec![0u8; size as usize];
        codec::read_bytes(file, &mut bytes)?;
        if check_def && hash != fnv1a(&bytes) {
            return Err(Error::HashMismatch);
        }
        Ok(bytes)
    }

    /// Read the `(size, hash)` header of a definition record.
    fn def_size_and_hash(&mut self, def_ind: u32) -> Result<(u32, u64)> {
        let defs_off = self.defs_section_offset();
        let file = self.readable()?;
        file.seek(SeekFrom::Start(defs_off + def_ind as u64))?;
        let size = codec::read_u32(file)?;
        if size == 0 {
            return Err(Error::Corrupt("read 0 definition size"));
        }
        let hash = codec::read_u64(file)?;
        Ok((size, hash))
    }

    /// Like [`def_size_and_hash`], but returns None when the record's
    /// size differs from `expected_size`.
    fn def_hash_if_size(&mut self, def_ind: u32, expected_size: u32) -> Result<Option<u64>> {
        let (size, hash) = self.def_size_and_hash(def_ind)?;
        Ok((size == expected_size).then_some(hash))
    }

    /// Recompute the FNV-1a hash of a record body straight off the disk,
    /// in batches. Used to verify stored hashes on open.
    fn hash_existing_def(&mut self, def_ind: u32) -> Result<u64> {
        let defs_off = self.defs_section_offset();
        let file = self.readable()?;
        file.seek(SeekFrom::Start(defs_off + def_ind as u64))?;
        let size = codec::read_u32(file)?;
        if size == 0 {
            return Err(Error::Corrupt("read 0 definition size"));
        }
        let _stored = codec::read_u64(file)?;

        let mut hash = FNV_OFFSET_BASIS;
        let mut buf = [0u8; BATCH_SIZE];
        let mut done = 0usize;
        while done < size as usize {
            let n = (size as usize - done).min(BATCH_SIZE);
            codec::read_bytes(file, &mut buf[..n])?;
            hash = fnv1a_with(hash, &buf[..n]);
            done += n;
        }
        Ok(hash)
    }

    /// Find an existing record with the same size, hash and — verified by
    /// re-reading its header — a plausible identity with `def`.
    ///
    /// Byte-for-byte comparison is deferred to rewrite time; the
    /// one-in-2^64 collision at ingest is accepted and re-verified there.
    fn existing_def_ind(&mut self, def: &[u8]) -> Result<Option<u32>> {
        let size = def.len() as u32;
        let Some(dedup) = self.dedup.as_ref() else {
            return Ok(None);
        };
        if !dedup.has_size(size) {
            return Ok(None);
        }
        let hash = fnv1a(def);
        let candidates = dedup.candidates(size, hash).to_vec();
        for cand in candidates {
            if self.def_hash_if_size(cand, size)? == Some(hash) {
                return Ok(Some(cand));
            }
        }
        Ok(None)
    }

    /// Append a new definition record at the end of the file and register
    /// it for deduplication. Returns its offset in the defs section.
    fn append_def(&mut self, def: &[u8]) -> Result<u32> {
        let defs_off = self.defs_section_offset();
        let hash = fnv1a(def);

        let file = self.writable()?;
        let end = file.seek(SeekFrom::End(0))?;
        if end < defs_off {
            return Err(Error::Corrupt("file size too small"));
        }
        let def_ind = (end - defs_off) as u32;
        codec::write_u32(file, def.len() as u32)?;
        codec::write_u64(file, hash)?;
        file.write_all(def)?;

        if let Some(dedup) = self.dedup.as_mut() {
            dedup.register(def.len() as u32, hash, def_ind);
        }
        Ok(def_ind)
    }

    // ---- rewrite ----

    /// Rewrite the whole file with the current (grown) capacities into a
    /// `.tmp` sibling, then rename it over the original. Expects the
    /// in-memory index to be consolidated.
    fn rewrite_file(&mut self, old_reserved_words: u32, old_words_sect_size: u32) -> Result<()> {
        debug_assert!(!self.index.has_pending());
        debug_assert!(self.reserved_words as usize >= self.index.len());

        let num_words = self.index.len();
        let new_reserved_words = self.reserved_words;
        let new_words_sect_size = self.words_sect_size;
        let old_defs_off = defs_section_offset_for(old_reserved_words, old_words_sect_size);
        let new_defs_off = defs_section_offset_for(new_reserved_words, new_words_sect_size);

        debug!(
            "rewriting {:?}: reserved_words {} -> {}, words_sect_size {} -> {}",
            self.path, old_reserved_words, new_reserved_words, old_words_sect_size,
            new_words_sect_size
        );

        let tmp_path = {
            let mut s = self.path.as_os_str().to_os_string();
            s.push(".tmp");
            PathBuf::from(s)
        };
        let mut new_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;

        self.readable()?;
        let do_dedup = self.dedup.is_some();
        let DictFile { file, index, .. } = self;
        let old_file = file.as_mut().expect("handle open");
        let entries = index.entries_mut();

        // header, word index table, def table placeholder, word section
        {
            let mut w = BufWriter::new(&mut new_file);
            w.write_all(&MAGIC)?;
            codec::write_u32(&mut w, new_reserved_words)?;
            codec::write_u32(&mut w, new_words_sect_size)?;
            codec::write_u32(&mut w, num_words as u32)?;

            let mut word_off: u32 = 0;
            for e in entries.iter() {
                codec::write_u32(&mut w, word_off + 1)?;
                word_off += e.word.len() as u32 + 1;
            }
            codec::write_nulls(&mut w, (new_reserved_words as usize - num_words) * 4)?;
            // def offsets are unknown until the records are copied below
            codec::write_nulls(&mut w, new_reserved_words as usize * 4)?;

            let mut sect_used = 0usize;
            for e in entries.iter() {
                w.write_all(&e.word)?;
                w.write_all(&[0])?;
                sect_used += e.word.len() + 1;
            }
            codec::write_nulls(&mut w, new_words_sect_size as usize - sect_used)?;
            w.flush()?;
        }

        // copy the defs section, deduplicating against records already
        // written into the new file
        let mut new_dedup = do_dedup.then(DedupMap::new);
        let mut buf = [0u8; BATCH_SIZE];

        for entry in entries.iter_mut() {
            let cur_def_off = old_defs_off + entry.def_ind as u64;
            old_file.seek(SeekFrom::Start(cur_def_off))?;
            let size = codec::read_u32(old_file)?;
            if size == 0 {
                return Err(Error::Corrupt("read 0 definition size"));
            }

            let mut old_hash = None;
            if let Some(dedup) = new_dedup.as_ref() {
                let hash = codec::read_u64(old_file)?;
                old_hash = Some(hash);
                let mut shared = None;
                for &cand in dedup.candidates(size, hash) {
                    new_file.seek(SeekFrom::Start(new_defs_off + cand as u64))?;
                    if codec::read_u32(&mut new_file)? != size {
                        continue;
                    }
                    if codec::read_u64(&mut new_file)? != hash {
                        continue;
                    }
                    // equal size and hash is not proof; compare the bytes
                    if records_equal(
                        old_file,
                        cur_def_off + DEF_HEADER_LEN,
                        &mut new_file,
                        new_defs_off + cand as u64 + DEF_HEADER_LEN,
                        size,
                        &mut buf,
                    )? {
                        shared = Some(cand);
                        break;
                    }
                }
                if let Some(cand) = shared {
                    entry.def_ind = cand;
                    continue;
                }
            }

            let new_tell = new_file.seek(SeekFrom::End(0))?;
            debug_assert!(new_tell >= new_defs_off);
            let new_ind = (new_tell - new_defs_off) as u32;
            entry.def_ind = new_ind;

            // without dedup the hash was never read; write a placeholder
            // now and patch it with the value computed during the copy
            let header_hash = old_hash.unwrap_or(FNV_OFFSET_BASIS);
            codec::write_u32(&mut new_file, size)?;
            codec::write_u64(&mut new_file, header_hash)?;

            let mut computed = FNV_OFFSET_BASIS;
            let mut copied = 0usize;
            while copied < size as usize {
                let n = (size as usize - copied).min(BATCH_SIZE);
                old_file.seek(SeekFrom::Start(cur_def_off + DEF_HEADER_LEN + copied as u64))?;
                codec::read_bytes(old_file, &mut buf[..n])?;
                new_file.write_all(&buf[..n])?;
                if new_dedup.is_none() {
                    computed = fnv1a_with(computed, &buf[..n]);
                }
                copied += n;
            }

            match new_dedup.as_mut() {
                Some(dedup) => dedup.register(size, header_hash, new_ind),
                None => {
                    new_file.seek(SeekFrom::Start(new_defs_off + new_ind as u64 + 4))?;
                    codec::write_u64(&mut new_file, computed)?;
                }
            }
        }

        // the def index table, now that every record has its final offset
        new_file.seek(SeekFrom::Start(
            inds_section_offset() + new_reserved_words as u64 * 4,
        ))?;
        for e in entries.iter() {
            codec::write_u32(&mut new_file, e.def_ind + 1)?;
        }
        codec::write_nulls(&mut new_file, (new_reserved_words as usize - num_words) * 4)?;

        self.close();
        drop(new_file);
        fs::rename(&tmp_path, &self.path)?;

        self.dedup = new_dedup;
        self.reopen_read_only()?;
        Ok(())
    }
}

impl Drop for DictFile {
    fn drop(&mut self) {
        if self.index.has_pending() {
            if let Err(e) = self.flush() {
                warn!(
                    "failed to flush dictionary file {:?} on drop: {}",
                    self.path, e
                );
            }
        }
    }
}

/// Compare `size` bytes at two file positions in batches.
fn records_equal(
    a: &mut File,
    a_off: u64,
    b: &mut File,
    b_off: u64,
    size: u32,
    buf: &mut [u8; BATCH_SIZE],
) -> Result<bool> {
    let mut other = [0u8; BATCH_SIZE];
    let mut done = 0usize;
    while done < size as usize {
        let n = (size as usize - done).min(BATCH_SIZE);
        a.seek(SeekFrom::Start(a_off + done as u64))?;
        codec::read_bytes(a, &mut buf[..n])?;
        b.seek(SeekFrom::Start(b_off + done as u64))?;
        codec::read_bytes(b, &mut other[..n])?;
        if buf[..n] != other[..n] {
            return Ok(false);
        }
        done += n;
    }
    Ok(true)
}
