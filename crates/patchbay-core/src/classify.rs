// ── Essence classification ──
//
// Devices rarely agree on how they describe what a sender carries, so
// classification walks a fixed ladder of hints and stops at the first
// one that says anything: format URN, receiver caps, label, description,
// tags. Within each text hint ancillary patterns are checked before
// video and audio.

use patchbay_api::NmosResource;

use crate::model::EssenceKind;

const FORMAT_VIDEO: &str = "urn:x-nmos:format:video";
const FORMAT_AUDIO: &str = "urn:x-nmos:format:audio";
const FORMAT_DATA: &str = "urn:x-nmos:format:data";

/// Classify a discovered sender or receiver.
pub fn classify(res: &NmosResource) -> EssenceKind {
    if let Some(kind) = res.format.as_deref().and_then(from_format) {
        return kind;
    }

    if let Some(kind) = res
        .caps
        .as_ref()
        .and_then(|caps| from_media_types(&caps.media_types))
    {
        return kind;
    }

    if let Some(kind) = from_text(&res.label) {
        return kind;
    }

    if let Some(kind) = from_text(&res.description) {
        return kind;
    }

    res.tags
        .values()
        .flatten()
        .find_map(|tag| from_text(tag))
        .unwrap_or(EssenceKind::Unknown)
}

fn from_format(format: &str) -> Option<EssenceKind> {
    if format.contains(FORMAT_VIDEO) {
        Some(EssenceKind::Video)
    } else if format.contains(FORMAT_AUDIO) {
        Some(EssenceKind::Audio)
    } else if format.contains(FORMAT_DATA) {
        Some(EssenceKind::Ancillary)
    } else {
        None
    }
}

fn from_media_types(media_types: &[String]) -> Option<EssenceKind> {
    let lowered: Vec<String> = media_types.iter().map(|m| m.to_lowercase()).collect();

    if lowered
        .iter()
        .any(|m| m.contains("smpte291") || m.contains("smpte2110-40"))
    {
        Some(EssenceKind::Ancillary)
    } else if lowered.iter().any(|m| m.starts_with("audio/")) {
        Some(EssenceKind::Audio)
    } else if lowered.iter().any(|m| m.starts_with("video/")) {
        Some(EssenceKind::Video)
    } else {
        None
    }
}

fn from_text(text: &str) -> Option<EssenceKind> {
    let lowered = text.to_lowercase();
    let mut words = lowered.split(|c: char| !c.is_ascii_alphanumeric());

    // Word match: "anc" inside "balance" must not count.
    if words.any(|w| w.starts_with("anc") || w == "data") {
        return Some(EssenceKind::Ancillary);
    }
    if lowered.contains("vid") || lowered.contains("vision") {
        return Some(EssenceKind::Video);
    }
    if lowered.contains("aud") {
        return Some(EssenceKind::Audio);
    }
    None
}
