use crate::managers::fetcher::{Download, Transport};
use anyhow::Result;
use common::JansError;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Write};
use std::path::Path;

/// Serves canned bodies by URL and remembers every URL it opened.
#[derive(Default)]
pub struct MemoryTransport {
    files: HashMap<String, Vec<u8>>,
    fallback: Option<Vec<u8>>,
    opened: RefCell<Vec<String>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, body: &[u8]) -> Self {
        self.files.insert(url.to_string(), body.to_vec());
        self
    }

    /// Body returned for URLs without a dedicated entry.
    pub fn with_fallback(mut self, body: &[u8]) -> Self {
        self.fallback = Some(body.to_vec());
        self
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.borrow().clone()
    }
}

impl Transport for MemoryTransport {
    fn open(&self, url: &str) -> Result<Download> {
        self.opened.borrow_mut().push(url.to_string());

        let body = match self.files.get(url).or(self.fallback.as_ref()) {
            Some(body) => body.clone(),
            None => return Err(JansError::Network(format!("404 Not Found: {url}")).into()),
        };

        Ok(Download {
            length: Some(body.len() as u64),
            reader: Box::new(Cursor::new(body)),
        })
    }
}

/// Builds a zip archive in memory; names ending in `/` become directories.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();

    for (name, body) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            writer.write_all(body).unwrap();
        }
    }

    writer.finish().unwrap().into_inner()
}

pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    File::create(path)
        .unwrap()
        .write_all(&zip_bytes(entries))
        .unwrap();
}

pub fn tar_gz_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for (name, body) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, *body).unwrap();
    }

    builder.into_inner().unwrap().finish().unwrap()
}
