//! Document builders shared by unit tests.

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;

pub fn build_container(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, data) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

pub fn document_xml(runs: &[&str]) -> String {
    let body: String = runs
        .iter()
        .map(|r| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", r))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    )
}

pub fn container_with_text(text: &str) -> Vec<u8> {
    build_container(&[("word/document.xml", document_xml(&[text]).as_bytes())])
}

pub fn encrypted_container() -> Vec<u8> {
    build_container(&[("EncryptedPackage", [0x5Au8; 64].as_slice())])
}

/// Version 3 compound file with one small stream per name at the root.
pub fn build_compound(streams: &[&str]) -> Vec<u8> {
    let sized: Vec<(&str, usize)> = streams.iter().map(|name| (*name, 256)).collect();
    build_compound_with(&sized)
}

/// Version 3 compound file with root streams of the given sizes, created in order.
pub fn build_compound_with(streams: &[(&str, usize)]) -> Vec<u8> {
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
