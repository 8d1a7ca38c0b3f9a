use std::fs;
use std::io::{self, BufRead, Read};
use std::path::PathBuf;

/// Parses a manifest (spec §6 "Manifest format"): one file per line,
/// `<relative_path>` optionally followed by a tab and a decimal size.
/// `path == "-"` reads the manifest from stdin instead of a file. Empty
/// lines are rejected rather than silently skipped, since a blank line in a
/// hand-edited manifest is far more likely to be a mistake than a file with
/// an empty name.
///
/// # Errors
///
/// Returns an [`io::Error`] if the manifest can't be read, contains an empty
/// line, or carries a non-numeric size field.
pub fn parse(path: &str) -> io::Result<Vec<(PathBuf, Option<u64>)>> {
    let text = if path == "-" {
        let mut buf = String::new();
        io::stdin().lock().read_to_string(&mut buf)?;
        buf
    } else {
        fs::read_to_string(path)?
    };
    parse_str(&text)
}

fn parse_str(text: &str) -> io::Result<Vec<(PathBuf, Option<u64>)>> {
    let mut entries = Vec::new();
    for line in text.lines() {
        if line.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "manifest contains an empty line",
            ));
        }
        let mut fields = line.splitn(2, '\t');
        let relative_path = PathBuf::from(fields.next().expect("splitn always yields one field"));
        let size = match fields.next() {
            Some(raw) => Some(raw.parse::<u64>().map_err(|_| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("manifest size field is not a number: {raw:?}"),
                )
            })?),
            None => None,
        };
        entries.push((relative_path, size));
    }
    Ok(entries)
}
