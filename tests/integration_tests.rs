//! Integration tests for complete write/read workflows.

use bytes::Bytes;
use columnstore::{
    Cipher, ColumnInfo, ColumnProperties, ColumnType, ColumnstoreReader, ColumnstoreWriter,
    Compression, DocId, Encryption, Error, FsDirectory, MemoryDirectory, Options, Version,
    EOF_DOC, INVALID_DOC,
};
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tempfile::TempDir;

/// Offset-keyed XOR cipher; the encryption header is the key.
#[derive(Debug)]
struct XorCipher(Vec<u8>);

impl Cipher for XorCipher {
    fn encrypt(&self, offset: u64, data: &mut [u8]) -> columnstore::Result<()> {
        let n = self.0.len() as u64;
        for (i, b) in data.iter_mut().enumerate() {
            *b ^= self.0[((offset + i as u64) % n) as usize];
        }
        Ok(())
    }

    fn decrypt(&self, offset: u64, data: &mut [u8]) -> columnstore::Result<()> {
        self.encrypt(offset, data)
    }
}

#[derive(Debug)]
struct XorEncryption(Vec<u8>);

impl Encryption for XorEncryption {
    fn create_cipher(&self, _file_name: &str) -> columnstore::Result<(Vec<u8>, Arc<dyn Cipher>)> {
        Ok((self.0.clone(), Arc::new(XorCipher(self.0.clone()))))
    }

    fn open_cipher(&self, _file_name: &str, header: &[u8]) -> columnstore::Result<Arc<dyn Cipher>> {
        Ok(Arc::new(XorCipher(header.to_vec())))
    }
}

/// Write one column per entry of `columns` into segment `_0`.
fn write_segment(
    dir: &MemoryDirectory,
    options: &Options,
    columns: &[(ColumnInfo, Vec<(DocId, Vec<u8>)>)],
) -> bool {
    let mut writer = ColumnstoreWriter::new(options.clone()).unwrap();
    writer.prepare(Arc::new(dir.clone()), "_0").unwrap();
    for (info, docs) in columns {
        let id = writer.push_column(*info).unwrap();
        for (doc, value) in docs {
            writer.write(id, *doc, value).unwrap();
        }
    }
    writer.commit().unwrap()
}

fn open_segment(dir: &MemoryDirectory, options: &Options) -> ColumnstoreReader {
    ColumnstoreReader::open(dir, "_0", options).unwrap().unwrap()
}

fn read_all(reader: &ColumnstoreReader, id: usize) -> Vec<(DocId, Vec<u8>)> {
    reader
        .column(id)
        .unwrap()
        .iter()
        .map(|r| r.map(|(d, v)| (d, v.to_vec())))
        .collect::<columnstore::Result<_>>()
        .unwrap()
}

/// Documents with irregular ids and lengths.
fn irregular_docs(n: u32) -> Vec<(DocId, Vec<u8>)> {
    (0..n)
        .map(|i| {
            let doc = 1 + i * 3 + (i % 5);
            let value = format!("value-{}-{}", i, "x".repeat((i % 13) as usize));
            (doc, value.into_bytes())
        })
        .collect()
}

/// Test seeking a small sparse column on disk.
#[test]
fn integration_sparse_seek() {
    let tmp = TempDir::new().unwrap();
    let dir = Arc::new(FsDirectory::open(tmp.path()).unwrap());
    let options = Options::default();

    let mut writer = ColumnstoreWriter::new(options.clone()).unwrap();
    writer.prepare(dir.clone(), "_1").unwrap();
    let id = writer.push_column(ColumnInfo::default()).unwrap();
    writer.write(id, 1, b"a").unwrap();
    writer.write(id, 2, b"bb").unwrap();
    writer.write(id, 5, b"ccc").unwrap();
    assert!(writer.commit().unwrap());
    assert!(tmp.path().join("_1.cs").exists());

    let reader = ColumnstoreReader::open(&*dir, "_1", &options)
        .unwrap()
        .unwrap();
    let column = reader.column(id).unwrap();
    assert_eq!(column.size(), 3);

    let mut docs = column.iter();
    assert_eq!(docs.value(), INVALID_DOC);
    assert_eq!(docs.seek(3).unwrap(), 5);
    assert_eq!(docs.payload().as_ref(), b"ccc");
    assert_eq!(docs.seek(6).unwrap(), EOF_DOC);
    assert_eq!(docs.seek(6).unwrap(), EOF_DOC);
    assert!(!docs.next().unwrap());
}

/// Test that gapless fixed-length columns locate blocks without searching.
#[test]
fn integration_dense_fixed_lookup() {
    let dir = MemoryDirectory::new();
    let options = Options::default();
    let docs: Vec<_> = (1..=2000u32).map(|d| (d, d.to_le_bytes().to_vec())).collect();
    write_segment(&dir, &options, &[(ColumnInfo::default(), docs)]);

    let reader = open_segment(&dir, &options);
    let column = reader.column(0).unwrap();
    assert_eq!(column.column_type(), ColumnType::DenseFixed);
    assert!(column.block_count() > 1);

    let mut iter = column.iter();
    assert_eq!(iter.seek(1000).unwrap(), 1000);
    assert_eq!(iter.payload().as_ref(), &1000u32.to_le_bytes());
    assert_eq!(iter.seek(1500).unwrap(), 1500);
    assert_eq!(iter.payload().as_ref(), &1500u32.to_le_bytes());
    assert_eq!(column.get(2000).unwrap().unwrap().as_ref(), &2000u32.to_le_bytes());
    assert_eq!(column.stats().block_search_steps.load(Ordering::Relaxed), 0);
}

/// Test that sparse columns do search for blocks.
#[test]
fn integration_sparse_lookup_counts_steps() {
    let dir = MemoryDirectory::new();
    let options = Options::builder().block_size(128).build().unwrap();
    write_segment(&dir, &options, &[(ColumnInfo::default(), irregular_docs(500))]);

    let reader = open_segment(&dir, &options);
    let column = reader.column(0).unwrap();
    assert_eq!(column.column_type(), ColumnType::Sparse);
    column.iter().seek(700).unwrap();
    assert!(column.stats().block_search_steps.load(Ordering::Relaxed) > 0);
}

/// Test round trip over many blocks for every compression.
#[test]
fn integration_roundtrip_all_compressions() {
    let dir = MemoryDirectory::new();
    let options = Options::builder().block_size(256).build().unwrap();
    let docs = irregular_docs(3000);
    let columns: Vec<_> = [Compression::None, Compression::Lz4, Compression::Snappy]
        .iter()
        .map(|&c| (ColumnInfo::new(c), docs.clone()))
        .collect();
    write_segment(&dir, &options, &columns);

    let reader = open_segment(&dir, &options);
    assert_eq!(reader.size(), 3);
    for id in 0..3 {
        let column = reader.column(id).unwrap();
        assert!(column.block_count() > 10);
        assert_eq!(column.size(), 3000);
        assert_eq!(read_all(&reader, id), docs);
        for (doc, value) in docs.iter().step_by(97) {
            assert_eq!(column.get(*doc).unwrap().unwrap().as_ref(), &value[..]);
            assert!(column.contains(*doc).unwrap());
        }
    }
}

/// Test absent documents between and around present ones.
#[test]
fn integration_absent_documents() {
    let dir = MemoryDirectory::new();
    let options = Options::default();
    let docs: Vec<_> = (0..300u32).map(|i| (10 + i * 2, vec![i as u8; 3])).collect();
    write_segment(&dir, &options, &[(ColumnInfo::default(), docs)]);

    let reader = open_segment(&dir, &options);
    let column = reader.column(0).unwrap();
    assert_eq!(column.doc_range(), Some((10, 608)));
    assert_eq!(column.get(9).unwrap(), None);
    assert_eq!(column.get(11).unwrap(), None);
    assert_eq!(column.get(609).unwrap(), None);
    assert!(!column.contains(11).unwrap());
    assert!(column.contains(12).unwrap());
    assert!(!column.contains(EOF_DOC - 1).unwrap());
}

/// Test a sparse column spread up to the largest valid document id.
#[test]
fn integration_wide_sparse_ids() {
    let dir = MemoryDirectory::new();
    let options = Options::default();
    let mut docs: Vec<_> = (0..200u32)
        .map(|i| (1 + i * 21_000_000 + (i % 5) * 7, vec![i as u8]))
        .collect();
    docs.push((EOF_DOC - 1, b"last".to_vec()));
    write_segment(&dir, &options, &[(ColumnInfo::default(), docs.clone())]);

    // sized by the documents, not by the id range
    let size = dir.contents("_0.cs").unwrap().len();
    assert!(size < 16 * 1024, "{} bytes for {} documents", size, docs.len());

    let reader = open_segment(&dir, &options);
    let column = reader.column(0).unwrap();
    assert_ne!(column.header().docs_index_offset, 0);
    assert_eq!(column.doc_range(), Some((1, EOF_DOC - 1)));

    for (doc, _) in &docs {
        assert!(column.contains(*doc).unwrap());
        assert!(!column.contains(doc + 1).unwrap());
    }
    // answered by the presence index alone
    assert_eq!(column.stats().block_loads.load(Ordering::Relaxed), 0);
    assert_eq!(read_all(&reader, 0), docs);

    let mut iter = column.iter();
    assert_eq!(iter.seek(2).unwrap(), docs[1].0);
    assert_eq!(iter.seek(docs[199].0 + 1).unwrap(), EOF_DOC - 1);
    assert_eq!(iter.payload().as_ref(), b"last");
    assert_eq!(iter.seek(EOF_DOC - 1).unwrap(), EOF_DOC - 1);
    assert!(!iter.next().unwrap());
    assert_eq!(iter.value(), EOF_DOC);
}

/// Test seek then next across block boundaries.
#[test]
fn integration_seek_and_next_mixed() {
    let dir = MemoryDirectory::new();
    let options = Options::builder().block_entries(16).build().unwrap();
    let docs: Vec<_> = (1..=100u32).map(|d| (d * 10, d.to_string().into_bytes())).collect();
    write_segment(&dir, &options, &[(ColumnInfo::default(), docs)]);

    let reader = open_segment(&dir, &options);
    let column = reader.column(0).unwrap();
    let mut iter = column.iter();

    assert_eq!(iter.seek(1).unwrap(), 10);
    assert!(iter.next().unwrap());
    assert_eq!(iter.value(), 20);
    assert_eq!(iter.seek(155).unwrap(), 160);
    assert!(iter.next().unwrap());
    assert_eq!(iter.value(), 170);
    assert_eq!(iter.payload().as_ref(), b"17");
    // backwards seek keeps the position
    assert_eq!(iter.seek(50).unwrap(), 170);
    assert_eq!(iter.seek(1000).unwrap(), 1000);
    assert!(!iter.next().unwrap());
    assert_eq!(iter.value(), EOF_DOC);
}

/// Test that incompressible payloads are stored raw and still read back.
#[test]
fn integration_incompressible_payloads() {
    let dir = MemoryDirectory::new();
    let options = Options::default();
    let mut state = 0x2545_f491_4f6c_dd1du64;
    let docs: Vec<_> = (1..=200u32)
        .map(|d| {
            let value: Vec<u8> = (0..32)
                .map(|_| {
                    state ^= state << 13;
                    state ^= state >> 7;
                    state ^= state << 17;
                    state as u8
                })
                .collect();
            (d, value)
        })
        .collect();
    write_segment(&dir, &options, &[(ColumnInfo::new(Compression::Lz4), docs.clone())]);

    let reader = open_segment(&dir, &options);
    assert_eq!(read_all(&reader, 0), docs);
}

/// Test that encrypted payloads never hit the file in clear text.
#[test]
fn integration_encryption_roundtrip() {
    let dir = MemoryDirectory::new();
    let options = Options::builder()
        .encryption(Arc::new(XorEncryption(b"secret-key".to_vec())))
        .build()
        .unwrap();
    let docs: Vec<_> = (1..=50u32)
        .map(|d| (d, format!("confidential-{:04}", d).into_bytes()))
        .collect();
    let info = ColumnInfo::new(Compression::None).encrypted();
    write_segment(&dir, &options, &[(info, docs.clone())]);

    let raw = dir.contents("_0.cs").unwrap();
    assert!(!raw.windows(12).any(|w| w == b"confidential"));

    let reader = open_segment(&dir, &options);
    let column = reader.column(0).unwrap();
    assert!(column.properties().contains(ColumnProperties::ENCRYPTED));
    assert_eq!(read_all(&reader, 0), docs);
}

/// Test that encrypted columns cannot be opened without a cipher.
#[test]
fn integration_missing_cipher() {
    let dir = MemoryDirectory::new();
    let options = Options::builder()
        .encryption(Arc::new(XorEncryption(b"k".to_vec())))
        .build()
        .unwrap();
    let info = ColumnInfo::default().encrypted();
    write_segment(&dir, &options, &[(info, vec![(1, b"x".to_vec())])]);

    let err = ColumnstoreReader::open(&dir, "_0", &Options::default()).unwrap_err();
    assert!(matches!(err, Error::MissingCipher(_)));
    assert!(err.is_format_error());
}

/// Test that plain columns of an encrypted file need no cipher.
#[test]
fn integration_plain_column_in_encrypted_file() {
    let dir = MemoryDirectory::new();
    let options = Options::builder()
        .encryption(Arc::new(XorEncryption(b"k".to_vec())))
        .build()
        .unwrap();
    write_segment(&dir, &options, &[(ColumnInfo::default(), vec![(1, b"x".to_vec())])]);

    let reader = open_segment(&dir, &Options::default());
    assert_eq!(read_all(&reader, 0), vec![(1, b"x".to_vec())]);
}

/// Test that a segment without values leaves no file behind.
#[test]
fn integration_empty_commit() {
    let dir = MemoryDirectory::new();
    let options = Options::default();
    let committed = write_segment(
        &dir,
        &options,
        &[(ColumnInfo::default(), vec![]), (ColumnInfo::default(), vec![])],
    );

    assert!(!committed);
    assert!(dir.list().is_empty());
    assert!(ColumnstoreReader::open(&dir, "_0", &options)
        .unwrap()
        .is_none());
}

/// Test that trailing empty columns are dropped and inner ones kept.
#[test]
fn integration_empty_columns() {
    let dir = MemoryDirectory::new();
    let options = Options::default();
    write_segment(
        &dir,
        &options,
        &[
            (ColumnInfo::default(), vec![(1, b"a".to_vec())]),
            (ColumnInfo::default(), vec![]),
            (ColumnInfo::default(), vec![(7, b"b".to_vec())]),
            (ColumnInfo::default(), vec![]),
        ],
    );

    let reader = open_segment(&dir, &options);
    assert_eq!(reader.size(), 3);
    let empty = reader.column(1).unwrap();
    assert!(empty.is_empty());
    assert_eq!(empty.iter().seek(1).unwrap(), EOF_DOC);
    assert!(!empty.iter().next().unwrap());
    assert_eq!(empty.get(1).unwrap(), None);
    assert!(reader.column(3).is_none());
}

/// Test that reset discards a value that failed half way.
#[test]
fn integration_reset_discards_document() {
    let dir = MemoryDirectory::new();
    let options = Options::default();
    let mut writer = ColumnstoreWriter::new(options.clone()).unwrap();
    writer.prepare(Arc::new(dir.clone()), "_0").unwrap();
    let id = writer.push_column(ColumnInfo::default()).unwrap();

    writer.write(id, 1, b"one").unwrap();
    let column = writer.prepare_document(id, 2).unwrap();
    column.write_bytes(b"partial");
    column.reset();
    writer.write(id, 3, b"three").unwrap();
    writer.commit().unwrap();

    let reader = open_segment(&dir, &options);
    assert_eq!(
        read_all(&reader, 0),
        vec![(1, b"one".to_vec()), (3, b"three".to_vec())]
    );
}

/// Test that values may be streamed in pieces.
#[test]
fn integration_streamed_values() {
    use std::io::Write;

    let dir = MemoryDirectory::new();
    let options = Options::default();
    let mut writer = ColumnstoreWriter::new(options.clone()).unwrap();
    writer.prepare(Arc::new(dir.clone()), "_0").unwrap();
    let id = writer.push_column(ColumnInfo::default()).unwrap();

    for doc in 1..=3u32 {
        let column = writer.prepare_document(id, doc).unwrap();
        write!(column, "doc={}", doc).unwrap();
        column.write_byte(b';');
    }
    writer.commit().unwrap();

    let reader = open_segment(&dir, &options);
    assert_eq!(
        reader.column(0).unwrap().get(2).unwrap(),
        Some(Bytes::from_static(b"doc=2;"))
    );
}

/// Test that rollback leaves nothing behind.
#[test]
fn integration_rollback() {
    let dir = MemoryDirectory::new();
    let mut writer = ColumnstoreWriter::new(Options::default()).unwrap();
    writer.prepare(Arc::new(dir.clone()), "_0").unwrap();
    let id = writer.push_column(ColumnInfo::default()).unwrap();
    writer.write(id, 1, b"a").unwrap();
    writer.rollback();

    assert!(dir.list().is_empty());
    assert!(matches!(writer.commit(), Err(Error::NotPrepared)));
}

/// Test the oldest format version.
#[test]
fn integration_min_version() {
    let dir = MemoryDirectory::new();
    let options = Options::builder().version(Version::Min).build().unwrap();
    let docs = irregular_docs(400);
    write_segment(&dir, &options, &[(ColumnInfo::new(Compression::Snappy), docs.clone())]);

    let reader = open_segment(&dir, &options);
    assert_eq!(reader.header().version, Version::Min);
    assert_eq!(reader.column(0).unwrap().header().compression, Compression::Lz4);
    assert_eq!(read_all(&reader, 0), docs);
}

/// Test mask columns built from empty values.
#[test]
fn integration_mask_columns() {
    let dir = MemoryDirectory::new();
    let options = Options::default();
    let sparse: Vec<_> = (1..=100u32).map(|d| (d * 7, Vec::new())).collect();
    let dense: Vec<_> = (5..=2500u32).map(|d| (d, Vec::new())).collect();
    write_segment(
        &dir,
        &options,
        &[(ColumnInfo::default(), sparse.clone()), (ColumnInfo::default(), dense)],
    );

    let reader = open_segment(&dir, &options);
    let sparse_column = reader.column(0).unwrap();
    assert_eq!(sparse_column.column_type(), ColumnType::Mask);
    assert_eq!(read_all(&reader, 0), sparse);
    assert!(sparse_column.contains(14).unwrap());
    assert!(!sparse_column.contains(15).unwrap());

    let dense_column = reader.column(1).unwrap();
    assert_eq!(dense_column.column_type(), ColumnType::Mask);
    let mut iter = dense_column.iter();
    assert_eq!(iter.seek(1).unwrap(), 5);
    assert_eq!(iter.seek(2000).unwrap(), 2000);
    assert!(iter.payload().is_empty());
    assert_eq!(dense_column.iter().count(), 2496);
    assert_eq!(dense_column.stats().block_loads.load(Ordering::Relaxed), 0);
}

/// Test that visit walks values without publishing blocks.
#[test]
fn integration_visit() {
    let dir = MemoryDirectory::new();
    let options = Options::builder().block_size(64).build().unwrap();
    let docs = irregular_docs(200);
    write_segment(&dir, &options, &[(ColumnInfo::default(), docs.clone())]);

    let reader = open_segment(&dir, &options);
    let column = reader.column(0).unwrap();

    let mut seen = Vec::new();
    assert!(column
        .visit(|doc, value| {
            seen.push((doc, value.to_vec()));
            true
        })
        .unwrap());
    assert_eq!(seen, docs);
    assert_eq!(column.stats().published.load(Ordering::Relaxed), 0);

    let mut visited = 0;
    assert!(!column
        .visit(|_, _| {
            visited += 1;
            visited < 10
        })
        .unwrap());
    assert_eq!(visited, 10);
}

/// Test that repeated lookups are served from the published block.
#[test]
fn integration_block_cache_hits() {
    let dir = MemoryDirectory::new();
    let options = Options::default();
    write_segment(&dir, &options, &[(ColumnInfo::default(), irregular_docs(100))]);

    let reader = open_segment(&dir, &options);
    let column = reader.column(0).unwrap();
    for _ in 0..5 {
        column.get(1).unwrap();
    }
    let stats = column.stats();
    assert_eq!(stats.block_loads.load(Ordering::Relaxed), 1);
    assert_eq!(stats.published.load(Ordering::Relaxed), 1);
    assert_eq!(stats.cache_hits.load(Ordering::Relaxed), 4);
}

/// Test detection of damaged files.
#[test]
fn integration_corruption_detected() {
    let dir = MemoryDirectory::new();
    let options = Options::default();
    write_segment(&dir, &options, &[(ColumnInfo::default(), irregular_docs(50))]);
    let good = dir.contents("_0.cs").unwrap();

    // truncated trailer
    dir.put("_0.cs", good.slice(..good.len() - 3));
    assert!(ColumnstoreReader::open(&dir, "_0", &options)
        .unwrap_err()
        .is_format_error());

    // bad header magic
    let mut data = good.to_vec();
    data[0] ^= 0x55;
    dir.put("_0.cs", Bytes::from(data));
    assert!(ColumnstoreReader::open(&dir, "_0", &options)
        .unwrap_err()
        .is_format_error());
}

/// Test that out-of-order documents are rejected.
#[test]
#[should_panic(expected = "is not after")]
fn integration_out_of_order_document() {
    let dir = MemoryDirectory::new();
    let mut writer = ColumnstoreWriter::new(Options::default()).unwrap();
    writer.prepare(Arc::new(dir), "_0").unwrap();
    let id = writer.push_column(ColumnInfo::default()).unwrap();
    writer.write(id, 10, b"a").unwrap();
    let _ = writer.write(id, 9, b"b");
}

/// Small clustered ids mixed with ids spread over the whole valid range.
fn doc_id() -> impl Strategy<Value = DocId> {
    prop_oneof![3 => 1u32..5000, 1 => 1u32..EOF_DOC]
}

fn doc_map() -> impl Strategy<Value = BTreeMap<DocId, Vec<u8>>> {
    prop::collection::btree_map(doc_id(), prop::collection::vec(any::<u8>(), 0..24), 1..400)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_roundtrip(docs in doc_map(), block_size in 16usize..512) {
        let dir = MemoryDirectory::new();
        let options = Options::builder().block_size(block_size).build().unwrap();
        let docs: Vec<_> = docs.into_iter().collect();
        write_segment(&dir, &options, &[(ColumnInfo::default(), docs.clone())]);

        let reader = open_segment(&dir, &options);
        prop_assert_eq!(reader.column(0).unwrap().size() as usize, docs.len());
        prop_assert_eq!(read_all(&reader, 0), docs.clone());

        let column = reader.column(0).unwrap();
        let present: BTreeMap<DocId, Vec<u8>> = docs.into_iter().collect();
        for (&doc, _) in present.iter().step_by(7) {
            prop_assert!(column.contains(doc).unwrap());
            let next = doc.saturating_add(1);
            prop_assert_eq!(column.contains(next).unwrap(), present.contains_key(&next));
        }
    }

    #[test]
    fn prop_seek_finds_lower_bound(
        docs in doc_map(),
        mut targets in prop::collection::vec(doc_id(), 1..50),
    ) {
        let dir = MemoryDirectory::new();
        let options = Options::builder().block_entries(32).build().unwrap();
        let expected: Vec<_> = docs.into_iter().collect();
        write_segment(&dir, &options, &[(ColumnInfo::default(), expected.clone())]);

        let reader = open_segment(&dir, &options);
        let column = reader.column(0).unwrap();
        let mut iter = column.iter();
        targets.sort_unstable();

        let mut last = INVALID_DOC;
        for target in targets {
            let found = iter.seek(target).unwrap();
            prop_assert!(found >= last);
            let want = expected
                .iter()
                .map(|(d, _)| *d)
                .find(|&d| d >= target.max(last))
                .unwrap_or(EOF_DOC);
            prop_assert_eq!(found, want);
            last = found;
        }
    }
}
