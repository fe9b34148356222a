#![allow(dead_code)]

use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;

pub const WORDML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

pub fn document_xml(runs: &[&str]) -> String {
    let body: String = runs
        .iter()
        .map(|r| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", r))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="{}"><w:body>{}</w:body></w:document>"#,
        WORDML_NS, body
    )
}

pub fn build_container(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, data) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Minimal container whose primary entry holds one text run.
pub fn docx(text: &str) -> Vec<u8> {
    build_container(&[
        ("[Content_Types].xml", b"<Types/>".as_slice()),
        ("word/document.xml", document_xml(&[text]).as_bytes()),
    ])
}

pub fn docx_with_media(text: &str, media: &[&str]) -> Vec<u8> {
    let xml = document_xml(&[text]);
    let mut entries: Vec<(&str, &[u8])> = vec![("word/document.xml", xml.as_bytes())];
    for name in media {
        entries.push((*name, b"\x89PNG\r\n\x1a\n".as_slice()));
    }
    build_container(&entries)
}

/// Container with the primary entry replaced by an encrypted package entry.
pub fn encrypted_docx() -> Vec<u8> {
    build_container(&[
        ("EncryptionInfo", [0x04u8; 32].as_slice()),
        ("EncryptedPackage", [0x5Au8; 256].as_slice()),
    ])
}

pub fn doc(streams: &[&str]) -> Vec<u8> {
    let sized: Vec<(&str, usize)> = streams.iter().map(|name| (*name, 256)).collect();
    doc_with_streams(&sized)
}

/// Compound file whose root streams have the given sizes.
pub fn doc_with_streams(streams: &[(&str, usize)]) -> Vec<u8> {
    let mut compound =
        cfb::CompoundFile::create_with_version(cfb::Version::V3, Cursor::new(Vec::new()))
            .unwrap();
    for (name, len) in streams {
        let mut stream = compound.create_stream(format!("/{}", name)).unwrap();
        stream.write_all(&vec![0x11u8; *len]).unwrap();
    }
    compound.flush().unwrap();
    compound.into_inner().into_inner()
}

/// Deterministic filler that contains neither magic.
pub fn noise(len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| ((i.wrapping_mul(131).wrapping_add(17)) % 251) as u8)
        .map(|b| if b == 0x50 || b == 0xD0 { 0x00 } else { b })
        .collect()
}

pub fn write_image(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    let mut file = fs::File::create(&path).unwrap();
    file.write_all(data).unwrap();
    file.sync_all().unwrap();
    path
}
