//! End-to-end tests for the dictionary file: create/reopen round-trips,
//! deduplication, capacity growth, and integrity checking.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

use sdict_core::{AddOptions, DictFile, Error, OpenConfig};

fn dict_path(dir: &TempDir, name: &str) -> PathBuf {
    dir.path().join(name)
}

fn random_word(rng: &mut StdRng, min_len: usize, max_len: usize) -> Vec<u8> {
    let len = rng.gen_range(min_len..=max_len);
    (0..len).map(|_| rng.gen_range(b' '..=b'~')).collect()
}

fn random_def(rng: &mut StdRng, min_len: usize, max_len: usize) -> Vec<u8> {
    let len = rng.gen_range(min_len..=max_len);
    (0..len).map(|_| rng.gen::<u8>()).collect()
}

/// Word/definition fixture with heavily repeated definitions: 33 words
/// sharing 6 distinct bodies.
const WORDS_DEFS: [(&str, &str); 33] = [
    ("word1", "definition1"),
    ("word2", "definition2"),
    ("word3", "definition3"),
    ("word4", "definition4"),
    ("word5", "definition1"),
    ("word6", "definition1"),
    ("word7", "definition2"),
    ("word8", "definition2"),
    ("word9", "definition2"),
    ("word10", "definition3"),
    ("word11", "definition3"),
    ("word12", "definition3"),
    ("word13", "definition4"),
    ("word14", "definition4"),
    ("word15", "definition1"),
    ("word16", "definition1"),
    ("word17", "definition1"),
    ("word18", "definition1"),
    ("word19", "definition3"),
    ("word20", "definition3"),
    ("word21", "definition2"),
    ("word22", "definition2"),
    ("word23", "definition4"),
    ("word24", "definition2"),
    ("word25", "definition1"),
    ("word26", "definition4"),
    ("word27", "definition1"),
    ("word28", "definition3"),
    ("word29", "definition2"),
    ("word30", "definition5"),
    ("word31", "definition1"),
    ("word32", "definition6"),
    ("word33", "definition2"),
];

fn verify_fixture(path: &Path) {
    let mut dict = DictFile::open(path).unwrap();
    assert!(!dict.created_file());
    assert_eq!(dict.num_words(), WORDS_DEFS.len());
    for (word, def) in WORDS_DEFS {
        assert!(dict.contains(word));
        assert_eq!(dict.find_checked(word).unwrap().unwrap(), def.as_bytes());
    }

    // 33 words grew the index tables once (32 -> 64) but only 6 distinct
    // definition records were ever written.
    assert_eq!(dict.reserved_words(), 64);
    assert_eq!(dict.words_sect_size(), 256);
    let defs_off = 19 + dict.reserved_words() as u64 * 8 + dict.words_sect_size() as u64;
    let distinct_defs = 6;
    let def_record_bytes = distinct_defs * (12 + "definition1".len() as u64);
    assert_eq!(fs::metadata(path).unwrap().len(), defs_off + def_record_bytes);
}

#[test]
fn open_empty_file_fails() {
    let dir = TempDir::new().unwrap();
    let path = dict_path(&dir, "test.sdict");
    fs::File::create(&path).unwrap();

    let err = DictFile::open(&path).unwrap_err();
    assert!(matches!(err, Error::UnexpectedEof));
}

#[test]
fn open_directory_fails() {
    let dir = TempDir::new().unwrap();
    let path = dict_path(&dir, "test.sdict");
    fs::create_dir(&path).unwrap();

    let err = DictFile::open(&path).unwrap_err();
    assert!(matches!(err, Error::NotARegularFile(_)));
}

#[cfg(unix)]
#[test]
fn open_follows_symlink_to_regular_file() {
    let dir = TempDir::new().unwrap();
    let target = dict_path(&dir, "target.sdict");
    {
        let mut dict = DictFile::open(&target).unwrap();
        dict.add_word("linked", "through a symlink").unwrap();
    }

    let link = dict_path(&dir, "link.sdict");
    std::os::unix::fs::symlink(&target, &link).unwrap();

    let mut dict = DictFile::open(&link).unwrap();
    assert!(!dict.created_file());
    assert_eq!(
        dict.find("linked").unwrap().unwrap(),
        b"through a symlink"
    );
}

#[test]
fn open_missing_without_create_fails() {
    let dir = TempDir::new().unwrap();
    let path = dict_path(&dir, "absent.sdict");

    let err = DictFile::open_with(
        &path,
        OpenConfig {
            create_if_not_exists: false,
            ..OpenConfig::default()
        },
    )
    .unwrap_err();
    assert!(matches!(err, Error::DoesNotExist(_)));
    assert!(!path.exists());
}

#[test]
fn create_add_and_reopen_single_word() {
    let dir = TempDir::new().unwrap();
    let path = dict_path(&dir, "test.sdict");

    {
        let mut dict = DictFile::open(&path).unwrap();
        assert!(dict.created_file());
        assert_eq!(dict.num_words(), 0);
        assert!(dict.add_word("word1", "definition1").unwrap());
    }

    let mut dict = DictFile::open(&path).unwrap();
    assert!(!dict.created_file());
    assert_eq!(dict.num_words(), 1);
    assert_eq!(dict.find("word1").unwrap().unwrap(), b"definition1");
    assert!(!dict.contains("missing"));
    assert!(dict.find("missing").unwrap().is_none());
}

#[test]
fn fixture_flush_every_word() {
    let dir = TempDir::new().unwrap();
    let path = dict_path(&dir, "test.sdict");

    {
        let mut dict = DictFile::open(&path).unwrap();
        assert!(dict.created_file());
        for (word, def) in WORDS_DEFS {
            assert!(dict.add_word(word, def).unwrap());
        }
    }
    verify_fixture(&path);
}

#[test]
fn fixture_single_flush_at_end() {
    let dir = TempDir::new().unwrap();
    let path = dict_path(&dir, "test.sdict");

    {
        let mut dict = DictFile::open(&path).unwrap();
        let opts = AddOptions {
            flush_words: false,
            skip_dup_check: true,
        };
        for (word, def) in WORDS_DEFS {
            assert!(dict.add_word_with(word, def, opts).unwrap());
        }
        assert!(dict.flush().unwrap());
    }
    verify_fixture(&path);
}

#[test]
fn large_definition_round_trips() {
    let dir = TempDir::new().unwrap();
    let path = dict_path(&dir, "test.sdict");
    let mut rng = StdRng::seed_from_u64(0x5d1c7_1);

    let word = random_word(&mut rng, 1, 32);
    let def = random_def(&mut rng, 2048, 4096);
    {
        let mut dict = DictFile::open(&path).unwrap();
        assert!(dict.add_word(&word, &def).unwrap());
        assert_eq!(dict.num_words(), 1);
        assert!(dict.contains(&word));
        assert_eq!(dict.find(&word).unwrap().unwrap(), def);
    }

    let mut dict = DictFile::open(&path).unwrap();
    assert_eq!(dict.find_checked(&word).unwrap().unwrap(), def);
}

#[test]
fn definition_larger_than_one_batch() {
    let dir = TempDir::new().unwrap();
    let path = dict_path(&dir, "test.sdict");

    // Crosses several 4096-byte batches so chunked hashing and copying
    // are exercised, including a partial final chunk.
    let def: Vec<u8> = (0..3 * 4096 + 123u32).map(|i| (i % 251) as u8).collect();
    {
        let mut dict = DictFile::open(&path).unwrap();
        assert!(dict.add_word("big", &def).unwrap());
    }

    // Reopening verifies the stored hash batch-by-batch.
    let mut dict = DictFile::open(&path).unwrap();
    assert_eq!(dict.find_checked("big").unwrap().unwrap(), def);
}

#[test]
fn large_word_grows_word_section() {
    let dir = TempDir::new().unwrap();
    let path = dict_path(&dir, "test.sdict");
    let mut rng = StdRng::seed_from_u64(0x5d1c7_2);

    let word = random_word(&mut rng, 512, 1024);
    let def = random_def(&mut rng, 1, 256);
    {
        let mut dict = DictFile::open(&path).unwrap();
        assert!(dict.add_word(&word, &def).unwrap());
        assert_eq!(dict.num_words(), 1);
    }

    let mut dict = DictFile::open(&path).unwrap();
    assert!(dict.contains(&word));
    assert_eq!(dict.find(&word).unwrap().unwrap(), def);
    // the word section grew to the next power-of-two multiple of 256
    assert!(dict.words_sect_size() > 256);
    assert_eq!(dict.words_sect_size() % 256, 0);
    assert!((dict.words_sect_size() / 256).is_power_of_two());
}

#[test]
fn add_1024_random_words_flushing_each() {
    let dir = TempDir::new().unwrap();
    let path = dict_path(&dir, "test.sdict");
    let mut rng = StdRng::seed_from_u64(0x5d1c7_3);
    let mut expected: HashMap<Vec<u8>, Vec<u8>> = HashMap::new();

    {
        let mut dict = DictFile::open(&path).unwrap();
        for _ in 0..1024 {
            let word = random_word(&mut rng, 1, 32);
            let def = random_def(&mut rng, 1, 256);

            let inserted = dict.add_word(&word, &def).unwrap();
            assert_eq!(inserted, !expected.contains_key(&word));
            assert_eq!(
                dict.num_words(),
                expected.len() + usize::from(inserted)
            );
            assert!(dict.contains(&word));
            if inserted {
                assert_eq!(dict.find(&word).unwrap().unwrap(), def);
                expected.insert(word, def);
            }
        }
    }

    let mut dict = DictFile::open(&path).unwrap();
    assert_eq!(dict.num_words(), expected.len());
    for (word, def) in &expected {
        assert_eq!(dict.find(word).unwrap().unwrap(), *def);
    }
}

#[test]
fn add_16384_random_words_single_flush() {
    let dir = TempDir::new().unwrap();
    let path = dict_path(&dir, "test.sdict");
    let mut rng = StdRng::seed_from_u64(0x5d1c7_4);
    let mut expected: HashMap<Vec<u8>, Vec<u8>> = HashMap::new();

    {
        let mut dict = DictFile::open(&path).unwrap();
        let opts = AddOptions {
            flush_words: false,
            skip_dup_check: true,
        };
        while expected.len() < 16384 {
            let word = random_word(&mut rng, 1, 32);
            if expected.contains_key(&word) {
                continue;
            }
            let def = random_def(&mut rng, 1, 256);
            assert!(dict.add_word_with(&word, &def, opts).unwrap());
            expected.insert(word, def);
        }
        assert!(dict.flush().unwrap());
    }

    // the default open verifies every stored hash
    let mut dict = DictFile::open(&path).unwrap();
    assert_eq!(dict.num_words(), expected.len());
    for (word, def) in &expected {
        assert_eq!(dict.find(word).unwrap().unwrap(), *def);
    }
}

#[test]
fn duplicate_checking_over_batched_adds() {
    let dir = TempDir::new().unwrap();
    let path = dict_path(&dir, "test.sdict");
    let mut rng = StdRng::seed_from_u64(0x5d1c7_5);

    // draw from a small pool so repeats actually happen
    let pool: Vec<Vec<u8>> = (0..512).map(|_| random_word(&mut rng, 1, 16)).collect();
    let mut expected: HashMap<Vec<u8>, Vec<u8>> = HashMap::new();

    {
        let mut dict = DictFile::open(&path).unwrap();
        let opts = AddOptions {
            flush_words: false,
            skip_dup_check: false,
        };
        for _ in 0..4096 {
            let word = pool[rng.gen_range(0..pool.len())].clone();
            let def = random_def(&mut rng, 1, 256);

            let inserted = dict.add_word_with(&word, &def, opts).unwrap();
            assert_eq!(inserted, !expected.contains_key(&word));
            if inserted {
                expected.insert(word, def);
            }
        }
        dict.flush().unwrap();
    }

    let mut dict = DictFile::open(&path).unwrap();
    assert_eq!(dict.num_words(), expected.len());
    for (word, def) in &expected {
        assert_eq!(dict.find(word).unwrap().unwrap(), *def);
    }
}

#[test]
fn re_adding_a_word_is_ignored() {
    let dir = TempDir::new().unwrap();
    let path = dict_path(&dir, "test.sdict");

    {
        let mut dict = DictFile::open(&path).unwrap();
        assert!(dict.add_word("stable", "original").unwrap());
        assert!(!dict.add_word("stable", "original").unwrap());
        assert!(!dict.add_word("stable", "replacement").unwrap());
        assert_eq!(dict.num_words(), 1);
        assert_eq!(dict.find("stable").unwrap().unwrap(), b"original");
    }

    let mut dict = DictFile::open(&path).unwrap();
    assert!(!dict.add_word("stable", "replacement").unwrap());
    assert_eq!(dict.num_words(), 1);
    assert_eq!(dict.find("stable").unwrap().unwrap(), b"original");
}

#[test]
fn growth_preserves_all_data() {
    let dir = TempDir::new().unwrap();
    let path = dict_path(&dir, "test.sdict");
    let mut expected: HashMap<Vec<u8>, Vec<u8>> = HashMap::new();

    {
        let mut dict = DictFile::open(&path).unwrap();
        for i in 0..100u32 {
            let word = format!("entry-{i:04}").into_bytes();
            // one oversized body so the rewrite copies across batches
            let def = if i == 57 {
                (0..5000u32).map(|j| (j % 241) as u8).collect()
            } else {
                format!("body of entry {i}").into_bytes()
            };
            assert!(dict.add_word(&word, &def).unwrap());
            expected.insert(word, def);
        }
    }

    let mut dict = DictFile::open(&path).unwrap();
    assert_eq!(dict.num_words(), 100);
    // 100 words need a 128-slot table; capacities stay power-of-two
    // multiples of their initial values
    assert_eq!(dict.reserved_words(), 128);
    assert_eq!(dict.words_sect_size() % 256, 0);
    assert!((dict.words_sect_size() / 256).is_power_of_two());
    for (word, def) in &expected {
        assert_eq!(dict.find_checked(word).unwrap().unwrap(), *def);
    }
}

#[test]
fn hash_verification_catches_corruption() {
    let dir = TempDir::new().unwrap();
    let path = dict_path(&dir, "test.sdict");

    {
        let mut dict = DictFile::open(&path).unwrap();
        dict.add_word("victim", "some definition body").unwrap();
    }

    // definitions sit at the tail of the file; flip the last byte
    let mut bytes = fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    fs::write(&path, &bytes).unwrap();

    let err = DictFile::open(&path).unwrap_err();
    assert!(matches!(err, Error::HashMismatch));

    // without verification the open succeeds and the damage surfaces
    // only on a checked read
    let mut dict = DictFile::open_with(
        &path,
        OpenConfig {
            check_defs: false,
            ..OpenConfig::default()
        },
    )
    .unwrap();
    assert!(dict.find("victim").unwrap().is_some());
    let err = dict.find_checked("victim").unwrap_err();
    assert!(matches!(err, Error::HashMismatch));
}

#[test]
fn truncated_header_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dict_path(&dir, "test.sdict");

    {
        let mut dict = DictFile::open(&path).unwrap();
        dict.add_word("present", "body").unwrap();
    }

    // cut the file inside the index tables
    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..64]).unwrap();

    let err = DictFile::open(&path).unwrap_err();
    assert!(matches!(
        err,
        Error::Corrupt(_) | Error::UnexpectedEof
    ));
}

#[test]
fn empty_definition_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dict_path(&dir, "test.sdict");

    let mut dict = DictFile::open(&path).unwrap();
    let err = dict.add_word("word", "").unwrap_err();
    assert!(matches!(err, Error::EmptyDefinition));
    assert_eq!(dict.num_words(), 0);
}

#[test]
fn flush_reports_whether_file_changed() {
    let dir = TempDir::new().unwrap();
    let path = dict_path(&dir, "test.sdict");

    let mut dict = DictFile::open(&path).unwrap();
    assert!(!dict.flush().unwrap());

    dict.add_word_with(
        "pending",
        "body",
        AddOptions {
            flush_words: false,
            skip_dup_check: false,
        },
    )
    .unwrap();
    assert!(dict.flush().unwrap());
    assert!(!dict.flush().unwrap());
}

#[test]
fn operations_reopen_after_close() {
    let dir = TempDir::new().unwrap();
    let path = dict_path(&dir, "test.sdict");

    let mut dict = DictFile::open(&path).unwrap();
    dict.add_word("alpha", "first").unwrap();
    dict.close();

    // the handle transparently reopens for reads and writes
    assert_eq!(dict.find("alpha").unwrap().unwrap(), b"first");
    dict.close();
    assert!(dict.add_word("beta", "second").unwrap());
    assert_eq!(dict.num_words(), 2);
}

#[test]
fn drop_flushes_pending_words() {
    let dir = TempDir::new().unwrap();
    let path = dict_path(&dir, "test.sdict");

    {
        let mut dict = DictFile::open(&path).unwrap();
        let opts = AddOptions {
            flush_words: false,
            skip_dup_check: true,
        };
        dict.add_word_with("dropped", "but not lost", opts).unwrap();
        // no explicit flush; Drop has to write the index
    }

    let mut dict = DictFile::open(&path).unwrap();
    assert_eq!(dict.find("dropped").unwrap().unwrap(), b"but not lost");
}

#[test]
fn identical_defs_share_storage_across_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dict_path(&dir, "test.sdict");
    let def = "a shared definition body";

    {
        let mut dict = DictFile::open(&path).unwrap();
        dict.add_word("first", def).unwrap();
    }
    let size_one = fs::metadata(&path).unwrap().len();

    {
        let mut dict = DictFile::open(&path).unwrap();
        dict.add_word("other", def).unwrap();
    }
    // the second word reuses the record written by the first session
    let size_two = fs::metadata(&path).unwrap().len();
    assert_eq!(size_one, size_two);

    let mut dict = DictFile::open(&path).unwrap();
    assert_eq!(dict.find("first").unwrap().unwrap(), def.as_bytes());
    assert_eq!(dict.find("other").unwrap().unwrap(), def.as_bytes());
}
