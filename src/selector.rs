// Format selection — pure, deterministic, no I/O
//
// Preference order:
// 1. Best muxed (video+audio) representation at or below the ceiling
// 2. Best video-only + best audio-only pair (DASH), video below the ceiling
// 3. Nothing usable -> None

use crate::models::{FormatDescriptor, Selection};

/// Fixed quality ceiling in pixels. Arbitrary-resolution selection is out
/// of scope; everything above this is ignored.
pub const QUALITY_CEILING: u32 = 720;

/// Choose a representation plan from a candidate list.
///
/// Total over its input: any list maps to exactly one of the three
/// outcomes, independent of input order among non-tied candidates.
pub fn select(formats: &[FormatDescriptor], ceiling: u32) -> Option<Selection> {
    if let Some(best) = best_progressive(formats, ceiling) {
        return Some(Selection::Progressive(best.clone()));
    }

    let video = best_video_only(formats, ceiling)?;
    let audio = best_audio_only(formats)?;

    Some(Selection::Dash {
        video: video.clone(),
        audio: audio.clone(),
    })
}

/// Bitrate as a sortable integer; missing bitrate sorts lowest.
fn bitrate_key(b: Option<f32>) -> u64 {
    b.map(|v| (v * 100.0) as u64).unwrap_or(0)
}

fn best_progressive(formats: &[FormatDescriptor], ceiling: u32) -> Option<&FormatDescriptor> {
    formats
        .iter()
        .filter(|f| f.has_video() && f.has_audio())
        .filter(|f| f.height.map_or(false, |h| h <= ceiling))
        .max_by_key(|f| (f.height.unwrap_or(0), bitrate_key(f.tbr)))
}

fn best_video_only(formats: &[FormatDescriptor], ceiling: u32) -> Option<&FormatDescriptor> {
    formats
        .iter()
        .filter(|f| f.has_video() && !f.has_audio())
        .filter(|f| f.height.map_or(false, |h| h <= ceiling))
        .max_by_key(|f| (f.height.unwrap_or(0), bitrate_key(f.tbr)))
}

fn best_audio_only(formats: &[FormatDescriptor]) -> Option<&FormatDescriptor> {
    formats
        .iter()
        .filter(|f| f.has_audio() && !f.has_video())
        .max_by_key(|f| (bitrate_key(f.abr), bitrate_key(f.tbr)))
}
