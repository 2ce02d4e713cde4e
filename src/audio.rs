//! Playback URLs for audio files hosted on Wikimedia Commons.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::model::Sound;

const FILE_PATH_URL: &str = "https://commons.wikimedia.org/wiki/Special:FilePath/";
const TRANSCODED_URL: &str = "https://upload.wikimedia.org/wikipedia/commons/transcoded/";

/// Characters left unescaped in file names: letters, digits and `_.-~/`.
const FILE_NAME: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~')
    .remove(b'/');

fn quote(name: &str) -> String {
    utf8_percent_encode(name, FILE_NAME).to_string()
}

/// URL of the server-side transcode of `filename` into `suffix` format.
///
/// Commons stores files under an md5-derived directory of the canonical
/// name, which has an upper-case first letter and underscores for spaces.
pub fn transcode_url(filename: &str, suffix: &str) -> String {
    let mut chars = filename.chars();
    let canonical: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    let canonical = canonical.replace(' ', "_");
    let digest = format!("{:x}", md5::compute(canonical.as_bytes()));
    let quoted = quote(&canonical);
    format!(
        "{TRANSCODED_URL}{}/{}/{quoted}/{quoted}.{suffix}",
        &digest[..1],
        &digest[..2]
    )
}

/// Sets `audio` and the derived URL fields on `sound`. The file's own
/// format links to the original; ogg and mp3 fall back to transcodes.
pub fn set_audio(sound: &mut Sound, filename: &str) {
    let filename = filename.trim_matches(|c: char| c == ' ' || c == '\u{200e}');
    if filename.is_empty() {
        return;
    }
    sound.audio = filename.to_string();
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    let own_url = format!("{FILE_PATH_URL}{}", quote(filename));
    match extension.as_str() {
        "ogg" | "oga" => sound.ogg_url = own_url,
        "mp3" => sound.mp3_url = own_url,
        "wav" => sound.wav_url = own_url,
        "flac" => sound.flac_url = own_url,
        _ => {}
    }
    if sound.ogg_url.is_empty() {
        sound.ogg_url = transcode_url(filename, "ogg");
    }
    if sound.mp3_url.is_empty() {
        sound.mp3_url = transcode_url(filename, "mp3");
    }
}

pub fn audio_sound(filename: &str) -> Sound {
    let mut sound = Sound::default();
    set_audio(&mut sound, filename);
    sound
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ogg_file_links_itself_and_transcodes_mp3() {
        let sound = audio_sound("la-cls-os-long.ogg");
        assert_eq!(sound.audio, "la-cls-os-long.ogg");
        assert_eq!(
            sound.ogg_url,
            "https://commons.wikimedia.org/wiki/Special:FilePath/la-cls-os-long.ogg"
        );
        assert_eq!(
            sound.mp3_url,
            "https://upload.wikimedia.org/wikipedia/commons/transcoded/1/18/La-cls-os-long.ogg/La-cls-os-long.ogg.mp3"
        );
        assert!(sound.wav_url.is_empty());
    }

    #[test]
    fn wav_file_gets_both_transcodes() {
        let sound = audio_sound("LL-Q1860 (eng)-Vealhurl-manga.wav");
        assert_eq!(
            sound.wav_url,
            "https://commons.wikimedia.org/wiki/Special:FilePath/LL-Q1860%20%28eng%29-Vealhurl-manga.wav"
        );
        assert_eq!(
            sound.ogg_url,
            "https://upload.wikimedia.org/wikipedia/commons/transcoded/4/46/LL-Q1860_%28eng%29-Vealhurl-manga.wav/LL-Q1860_%28eng%29-Vealhurl-manga.wav.ogg"
        );
    }

    #[test]
    fn transcode_directory_comes_from_md5() {
        assert_eq!(
            transcode_url("Zh-dajia.ogg", "mp3"),
            "https://upload.wikimedia.org/wikipedia/commons/transcoded/8/84/Zh-dajia.ogg/Zh-dajia.ogg.mp3"
        );
    }

    #[test]
    fn blank_name_sets_nothing() {
        assert_eq!(audio_sound("  "), Sound::default());
    }
}
