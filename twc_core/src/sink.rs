//! Destinations for the rendered documents.

use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use crate::pickup::Zone;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DocumentKind {
    Calendar,
    Table,
}

impl DocumentKind {
    pub fn extension(self) -> &'static str {
        match self {
            DocumentKind::Calendar => "ics",
            DocumentKind::Table => "csv",
        }
    }

    pub fn directory(self) -> &'static str {
        self.extension()
    }
}

/// Receives the documents of each zone.
pub trait Sink {
    fn write(&mut self, zone: &Zone, kind: DocumentKind, document: &[u8]) -> io::Result<()>;
}

/// Writes `<root>/ics/<zone>.ics` and `<root>/csv/<zone>.csv`.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        DirectorySink { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, zone: &Zone, kind: DocumentKind) -> PathBuf {
        self.root
            .join(kind.directory())
            .join(format!("{zone}.{}", kind.extension()))
    }
}

impl Sink for DirectorySink {
    /// Replace the document atomically: write a sibling temporary file, then rename it.
    fn write(&mut self, zone: &Zone, kind: DocumentKind, document: &[u8]) -> io::Result<()> {
        let path = self.path(zone, kind);
        let directory = self.root.join(kind.directory());
        fs::create_dir_all(&directory)?;
        let temporary = directory.join(format!(".{zone}.{}.tmp", kind.extension()));
        fs::write(&temporary, document)?;
        fs::rename(&temporary, &path).map_err(|err| {
            let _ = fs::remove_file(&temporary);
            err
        })
    }
}

/// Keeps documents in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    pub documents: BTreeMap<(Zone, DocumentKind), Vec<u8>>,
}

impl MemorySink {
    pub fn get(&self, zone: &Zone, kind: DocumentKind) -> Option<&[u8]> {
        self.documents.get(&(zone.clone(), kind)).map(Vec::as_slice)
    }
}

impl Sink for MemorySink {
    fn write(&mut self, zone: &Zone, kind: DocumentKind, document: &[u8]) -> io::Result<()> {
        self.documents
            .insert((zone.clone(), kind), document.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_sink_layout() {
        let directory = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::new(directory.path());
        let zone = Zone::parse("Tuesday1").unwrap();
        sink.write(&zone, DocumentKind::Calendar, b"BEGIN:VCALENDAR\r\n")
            .unwrap();
        sink.write(&zone, DocumentKind::Table, b"Subject\r\n")
            .unwrap();

        let calendar = directory.path().join("ics").join("Tuesday1.ics");
        let table = directory.path().join("csv").join("Tuesday1.csv");
        assert_eq!(sink.path(&zone, DocumentKind::Calendar), calendar);
        assert_eq!(fs::read(&calendar).unwrap(), b"BEGIN:VCALENDAR\r\n");
        assert_eq!(fs::read(&table).unwrap(), b"Subject\r\n");
        let temporary = directory.path().join("ics").join(".Tuesday1.ics.tmp");
        assert!(!temporary.exists());
    }

    #[test]
    fn test_directory_sink_replaces_documents() {
        let directory = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::new(directory.path());
        let zone = Zone::parse("Monday2").unwrap();
        sink.write(&zone, DocumentKind::Table, b"old").unwrap();
        sink.write(&zone, DocumentKind::Table, b"new").unwrap();
        assert_eq!(
            fs::read(sink.path(&zone, DocumentKind::Table)).unwrap(),
            b"new"
        );
    }
}
