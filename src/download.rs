use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

use crate::error::Result;
use crate::response::Response;

/// io::copy's buffer is only 8 KiB, which noticeably slows down large
/// downloads. This size stops paying off somewhere above 128 KiB.
const BUFFER_SIZE: usize = 128 * 1024;

pub(crate) fn copy_largebuf(reader: &mut impl Read, writer: &mut impl Write) -> io::Result<u64> {
    let mut buf = vec![0; BUFFER_SIZE];
    let mut written: u64 = 0;
    loop {
        match reader.read(&mut buf) {
            Ok(0) => return Ok(written),
            Ok(len) => {
                writer.write_all(&buf[..len])?;
                written += len as u64;
            }
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Stream a response body to `path`, creating or truncating the file.
/// Returns the number of bytes written.
pub(crate) fn save_body(response: &mut Response, path: &Path) -> Result<u64> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let written = copy_largebuf(&mut response.body_reader(), &mut writer)?;
    writer.flush()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_everything_and_counts() {
        let data = vec![7u8; BUFFER_SIZE * 2 + 13];
        let mut out = Vec::new();
        let written = copy_largebuf(&mut data.as_slice(), &mut out).unwrap();
        assert_eq!(written, data.len() as u64);
        assert_eq!(out, data);
    }
}
