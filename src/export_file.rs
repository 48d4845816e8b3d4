use std::path::Path;

use color_eyre::eyre::{OptionExt, Result, WrapErr, eyre};

use crate::models::Track;

const ARTIST_COLUMN: &str = "Artist";
const TITLE_COLUMN: &str = "Track Title";

/// Read the tracks of a playlist exported from rekordbox ("Export a
/// playlist to a file for KUVO/other"): UTF-16 text, tab separated, with a
/// header row naming the columns.
pub fn read_tracks(path: &Path) -> Result<Vec<Track>> {
    let bytes = std::fs::read(path)
        .wrap_err_with(|| format!("Failed to read playlist file: {}", path.display()))?;
    let text = decode(&bytes)
        .wrap_err_with(|| format!("Failed to decode playlist file: {}", path.display()))?;
    parse_tracks(&text)
        .wrap_err_with(|| format!("Failed to parse playlist file: {}", path.display()))
}

fn decode_utf16(bytes: &[u8], from_bytes: fn([u8; 2]) -> u16) -> Result<String> {
    if bytes.len() % 2 != 0 {
        return Err(eyre!("UTF-16 data has an odd number of bytes"));
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| from_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).wrap_err("Invalid UTF-16 data")
}

fn decode(bytes: &[u8]) -> Result<String> {
    match bytes {
        [0xFF, 0xFE, rest @ ..] => decode_utf16(rest, u16::from_le_bytes),
        [0xFE, 0xFF, rest @ ..] => decode_utf16(rest, u16::from_be_bytes),
        [0xEF, 0xBB, 0xBF, rest @ ..] => {
            String::from_utf8(rest.to_vec()).wrap_err("Invalid UTF-8 data")
        }
        _ => String::from_utf8(bytes.to_vec()).wrap_err("Invalid UTF-8 data"),
    }
}

fn parse_tracks(text: &str) -> Result<Vec<Track>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .has_headers(false)
        .from_reader(text.as_bytes());
    let mut records = reader.records();

    let header = records
        .next()
        .ok_or_eyre("Playlist file is empty")?
        .wrap_err("Failed to read header row")?;

    let column = |name: &str| {
        header
            .iter()
            .position(|field| field.trim() == name)
            .ok_or_else(|| eyre!("Playlist file has no '{}' column", name))
    };
    let artist_column = column(ARTIST_COLUMN)?;
    let title_column = column(TITLE_COLUMN)?;

    let mut tracks = Vec::new();
    for record in records {
        let record = record.wrap_err("Failed to read playlist row")?;
        // blank and truncated lines
        if record.len() < 4 {
            continue;
        }
        if let (Some(artist), Some(title)) = (record.get(artist_column), record.get(title_column)) {
            tracks.push(Track::new(artist, title));
        }
    }

    Ok(tracks)
}
