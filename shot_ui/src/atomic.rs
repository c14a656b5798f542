use std::{fs, io::Write, path::Path};

/// Write via a sibling temp file and rename, so a reader (the web server)
/// never sees a half-written frame.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("part");
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(tmp, path)
}
