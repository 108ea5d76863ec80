//! Tar archive fixtures.
//!
//! [`ArchiveFixture`] describes the entries of a release archive and renders
//! it as plain tar or tar.gz bytes; [`ArchiveBytes`] turns those bytes into
//! the chunked streams the extractor consumes.

use bytes::Bytes;
use flate2::Compression;
use flate2::write::GzEncoder;
use futures::Stream;
use std::io::Write;
use tar::{EntryType, Header};

#[derive(Clone, Debug)]
enum FixtureEntry {
    Dir(String),
    File {
        path: String,
        contents: Vec<u8>,
        mode: u32,
    },
    Link {
        kind: EntryType,
        path: String,
        target: String,
    },
    Special {
        kind: EntryType,
        path: String,
    },
}

/// Builder for tar archives used in extractor and update tests.
#[derive(Clone, Debug, Default)]
pub struct ArchiveFixture {
    entries: Vec<FixtureEntry>,
}

impl ArchiveFixture {
    /// An archive with no entries.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The layout of a published release:
    ///
    /// ```text
    /// <version>/
    /// <version>/bin/
    /// <version>/bin/<bin>        (0755)
    /// <version>/package.json
    /// ```
    pub fn release(version: &str, bin: &str) -> Self {
        Self::empty()
            .with_dir(&format!("{version}/"))
            .with_dir(&format!("{version}/bin/"))
            .with_executable(
                &format!("{version}/bin/{bin}"),
                format!("#!/bin/sh\necho {bin} {version}\n").as_bytes(),
            )
            .with_file(
                &format!("{version}/package.json"),
                format!("{{\"name\": \"{bin}\", \"version\": \"{version}\"}}\n").as_bytes(),
            )
    }

    pub fn with_dir(mut self, path: &str) -> Self {
        self.entries.push(FixtureEntry::Dir(path.to_string()));
        self
    }

    pub fn with_file(mut self, path: &str, contents: &[u8]) -> Self {
        self.entries.push(FixtureEntry::File {
            path: path.to_string(),
            contents: contents.to_vec(),
            mode: 0o644,
        });
        self
    }

    pub fn with_executable(mut self, path: &str, contents: &[u8]) -> Self {
        self.entries.push(FixtureEntry::File {
            path: path.to_string(),
            contents: contents.to_vec(),
            mode: 0o755,
        });
        self
    }

    pub fn with_symlink(mut self, path: &str, target: &str) -> Self {
        self.entries.push(FixtureEntry::Link {
            kind: EntryType::Symlink,
            path: path.to_string(),
            target: target.to_string(),
        });
        self
    }

    pub fn with_hard_link(mut self, path: &str, target: &str) -> Self {
        self.entries.push(FixtureEntry::Link {
            kind: EntryType::Link,
            path: path.to_string(),
            target: target.to_string(),
        });
        self
    }

    pub fn with_fifo(mut self, path: &str) -> Self {
        self.entries.push(FixtureEntry::Special {
            kind: EntryType::Fifo,
            path: path.to_string(),
        });
        self
    }

    /// Render as an uncompressed tar.
    pub fn tar(&self) -> ArchiveBytes {
        let mut builder = tar::Builder::new(Vec::new());

        for entry in &self.entries {
            let mut header = Header::new_gnu();
            header.set_mtime(1_700_000_000);
            match entry {
                FixtureEntry::Dir(path) => {
                    header.set_entry_type(EntryType::Directory);
                    header.set_path(path).expect("valid fixture path");
                    header.set_mode(0o755);
                    header.set_size(0);
                    header.set_cksum();
                    builder.append(&header, std::io::empty()).expect("append directory");
                }
                FixtureEntry::File {
                    path,
                    contents,
                    mode,
                } => {
                    header.set_entry_type(EntryType::Regular);
                    header.set_path(path).expect("valid fixture path");
                    header.set_mode(*mode);
                    header.set_size(contents.len() as u64);
                    header.set_cksum();
                    builder.append(&header, contents.as_slice()).expect("append file");
                }
                FixtureEntry::Link { kind, path, target } => {
                    header.set_entry_type(*kind);
                    header.set_path(path).expect("valid fixture path");
                    header.set_link_name(target).expect("valid link target");
                    header.set_mode(0o777);
                    header.set_size(0);
                    header.set_cksum();
                    builder.append(&header, std::io::empty()).expect("append link");
                }
                FixtureEntry::Special { kind, path } => {
                    header.set_entry_type(*kind);
                    header.set_path(path).expect("valid fixture path");
                    header.set_mode(0o644);
                    header.set_size(0);
                    header.set_cksum();
                    builder.append(&header, std::io::empty()).expect("append special entry");
                }
            }
        }

        ArchiveBytes(Bytes::from(builder.into_inner().expect("finish tar")))
    }

    /// Render as a gzip-compressed tar.
    pub fn tar_gz(&self) -> ArchiveBytes {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(self.tar().bytes()).expect("compress tar");
        ArchiveBytes(Bytes::from(encoder.finish().expect("finish gzip")))
    }
}

/// Rendered archive bytes.
#[derive(Clone, Debug)]
pub struct ArchiveBytes(Bytes);

impl ArchiveBytes {
    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    /// The archive as a stream of `chunk`-sized pieces.
    pub fn stream(
        &self,
        chunk: usize,
    ) -> impl Stream<Item = std::io::Result<Bytes>> + Send + Unpin + use<> {
        futures::stream::iter(chunked(&self.0, chunk).into_iter().map(Ok::<Bytes, std::io::Error>))
    }

    /// Like [`stream`](Self::stream) but fails once `fail_after` bytes were sent.
    pub fn failing_stream(
        &self,
        chunk: usize,
        fail_after: usize,
    ) -> impl Stream<Item = std::io::Result<Bytes>> + Send + Unpin + use<> {
        let end = fail_after.min(self.0.len());
        let mut items: Vec<std::io::Result<Bytes>> =
            chunked(&self.0.slice(..end), chunk).into_iter().map(Ok).collect();
        let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset");
        items.push(Err(reset));
        futures::stream::iter(items)
    }
}

/// Split `bytes` into `chunk`-sized slices without copying.
pub fn chunked(bytes: &Bytes, chunk: usize) -> Vec<Bytes> {
    let chunk = chunk.max(1);
    (0..bytes.len())
        .step_by(chunk)
        .map(|start| bytes.slice(start..(start + chunk).min(bytes.len())))
        .collect()
}
