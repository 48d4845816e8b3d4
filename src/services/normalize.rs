//! Search-string normalization for local tracks.
//!
//! Spotify search does poorly with the "(Original Mix)" / "(Someone Remix)"
//! suffixes dance music libraries carry, and with "feat." credits. These
//! functions strip that noise before a track is searched.

use crate::models::Track;

/// Literals removed from titles, applied in order on the lower-cased title.
const TITLE_NOISE: [&str; 4] = ["original mix", "(", ")", "feat."];

/// Lower-case the title and remove "original mix", parentheses and "feat.".
///
/// Removal repeats until nothing changes, so the result is a fixed point:
/// `normalize_title(normalize_title(x)) == normalize_title(x)`.
pub fn normalize_title(title: &str) -> String {
    let mut normalized = title.to_lowercase();
    loop {
        let stripped = TITLE_NOISE
            .iter()
            .fold(normalized.clone(), |acc, noise| acc.replace(noise, ""));
        if stripped == normalized {
            return normalized;
        }
        normalized = stripped;
    }
}

/// Drop a trailing credit like "Artist (feat. X)" by cutting at the first
/// opening parenthesis. A leading parenthesis is left alone.
pub fn normalize_artist(artist: &str) -> String {
    match artist.find('(') {
        Some(index) if index > 0 => artist[..index].to_string(),
        _ => artist.to_string(),
    }
}

/// The free-text query issued for a track: `"<artist> <title>"`.
pub fn search_query(track: &Track) -> String {
    format!(
        "{} {}",
        normalize_artist(&track.artist),
        normalize_title(&track.title)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_title_original_mix() {
        assert_eq!(normalize_title("Midnight (Original Mix)"), "midnight ");
    }

    #[test]
    fn test_normalize_title_feat() {
        assert_eq!(
            normalize_title("Hold On (FEAT. Someone)"),
            "hold on  someone"
        );
    }

    #[test]
    fn test_normalize_title_leaves_other_characters() {
        assert_eq!(normalize_title("Ça Va - Remix [2019]!"), "ça va - remix [2019]!");
    }

    #[test]
    fn test_normalize_title_spliced_noise_is_removed() {
        // "original (mix)" becomes "original mix" after the parentheses go
        assert_eq!(normalize_title("Original (Mix)"), "");
        assert_eq!(normalize_title("origfeat.inal mix"), "");
    }

    #[test]
    fn test_normalize_artist_drops_credit() {
        assert_eq!(normalize_artist("Artist (feat. X)"), "Artist ");
    }

    #[test]
    fn test_normalize_artist_unchanged() {
        assert_eq!(normalize_artist("Plain Artist"), "Plain Artist");
        assert_eq!(normalize_artist("(Parens) First"), "(Parens) First");
        assert_eq!(normalize_artist(""), "");
    }

    #[test]
    fn test_normalizers_are_idempotent() {
        let titles = [
            "Midnight (Original Mix)",
            "Original (Mix)",
            "((feat.feat.))",
            "Strobe (Club Edit) feat. Nobody",
            "already normalized",
            "",
        ];
        for title in titles {
            let once = normalize_title(title);
            assert_eq!(normalize_title(&once), once, "title: {title:?}");
        }

        let artists = ["Artist (feat. X)", "(A) B (C)", "A ((B", "Solo", "("];
        for artist in artists {
            let once = normalize_artist(artist);
            assert_eq!(normalize_artist(&once), once, "artist: {artist:?}");
        }
    }

    #[test]
    fn test_search_query() {
        let track = Track::new("Artist (feat. X)", "Midnight (Original Mix)");
        assert_eq!(search_query(&track), "Artist  midnight ");
    }
}
