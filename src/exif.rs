use exif::Reader;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Whether the file carries any EXIF fields.
///
/// Unreadable files and containers without EXIF both report `false`; EXIF
/// presence only feeds the quality score, so it never fails an image.
pub fn has_exif(file_path: &Path) -> bool {
    let file = match File::open(file_path) {
        Ok(f) => f,
        Err(_) => return false,
    };

    let mut buf_reader = BufReader::new(file);
    match Reader::new().read_from_container(&mut buf_reader) {
        Ok(exif) => exif.fields().next().is_some(),
        Err(e) => {
            log::trace!("No EXIF in {}: {}", file_path.display(), e);
            false
        }
    }
}
