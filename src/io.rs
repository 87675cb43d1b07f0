//src/io.rs

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use flate2::read::MultiGzDecoder;

/// Open a text file for line reading, transparently decompressing `.gz`.
pub fn open_reader<P: AsRef<Path>>(path: P) -> io::Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let f = File::open(path)?;

    let is_gz = path
        .extension()
        .map(|ext| ext == "gz")
        .unwrap_or(false);

    let reader: Box<dyn BufRead> = if is_gz {
        Box::new(BufReader::new(MultiGzDecoder::new(f)))
    } else {
        Box::new(BufReader::new(f))
    };
    Ok(reader)
}

pub fn create_writer<P: AsRef<Path>>(path: P) -> io::Result<BufWriter<File>> {
    Ok(BufWriter::new(File::create(path)?))
}

/// Iterate the lines of `reader` with their 1-based line numbers,
/// dropping a trailing `\r` left by CRLF files.
pub fn numbered_lines<R: BufRead>(reader: R) -> impl Iterator<Item = io::Result<(usize, String)>> {
    reader.lines().enumerate().map(|(i, line)| {
        line.map(|mut l| {
            if l.ends_with('\r') {
                l.pop();
            }
            (i + 1, l)
        })
    })
}

/// Write one tab-separated record.
pub fn write_tsv_row<W: Write, S: AsRef<str>>(out: &mut W, fields: &[S]) -> io::Result<()> {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.write_all(b"\t")?;
        }
        out.write_all(field.as_ref().as_bytes())?;
    }
    out.write_all(b"\n")
}
