use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::VideoId;

/// Orientation filter/derivation used by the catalog search service and
/// block configuration. Wire representation is `mixed|wide|tall` (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Mixed,
    Wide,
    Tall,
}

impl Orientation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mixed => "mixed",
            Self::Wide => "wide",
            Self::Tall => "tall",
        }
    }

    /// Derive the orientation of a frame from its dimensions. `square`
    /// (width == height) is unused by any filter and is treated as mixed.
    #[must_use]
    pub fn derive(width: i32, height: i32) -> Self {
        match width.cmp(&height) {
            std::cmp::Ordering::Greater => Self::Wide,
            std::cmp::Ordering::Less => Self::Tall,
            std::cmp::Ordering::Equal => Self::Mixed,
        }
    }

    /// Whether a frame of the given dimensions satisfies this filter.
    #[must_use]
    pub fn matches(self, width: i32, height: i32) -> bool {
        match self {
            Self::Mixed => true,
            Self::Wide => width > height,
            Self::Tall => height > width,
        }
    }
}

/// The set of opaque media encodings a catalog post carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaEncodings {
    pub source: String,
    pub md: Option<String>,
    pub thumbnail: Option<String>,
    pub gif: Option<String>,
}

/// Minimal creator info carried alongside a video record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatorInfo {
    pub id: String,
    pub username: String,
    pub display_name: String,
}

/// A video post as read from the (external, read-only) Catalog Store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRecord {
    pub video_id: VideoId,
    pub creator: CreatorInfo,
    pub text: String,
    pub posted_at: DateTime<Utc>,
    pub permalink: String,
    pub width: i32,
    pub height: i32,
    pub encodings: MediaEncodings,
}

impl VideoRecord {
    #[must_use]
    pub fn orientation(&self) -> Orientation {
        Orientation::derive(self.width, self.height)
    }

    /// Denormalize into the closed payload record stored on a timeline entry,
    /// per the REDESIGN FLAG retiring opaque JSON blobs (SPEC_FULL §3).
    #[must_use]
    pub fn to_payload(&self) -> VideoPayload {
        VideoPayload {
            id: self.video_id.clone(),
            text: self.text.clone(),
            permalink: self.permalink.clone(),
            url_source: self.encodings.source.clone(),
            url_md: self.encodings.md.clone(),
            url_thumbnail: self.encodings.thumbnail.clone(),
            width: self.width,
            height: self.height,
            creator_id: self.creator.id.clone(),
            creator_username: self.creator.username.clone(),
            creator_display_name: self.creator.display_name.clone(),
        }
    }
}

/// Closed, typed denormalization of a `VideoRecord` sufficient for
/// playback without re-reading the catalog. Fields the catalog adds in
/// the future are not part of this contract (SPEC_FULL §3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VideoPayload {
    pub id: VideoId,
    pub text: String,
    pub permalink: String,
    pub url_source: String,
    pub url_md: Option<String>,
    pub url_thumbnail: Option<String>,
    pub width: i32,
    pub height: i32,
    pub creator_id: String,
    pub creator_username: String,
    pub creator_display_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orientation_derivation_matches_spec() {
        assert_eq!(Orientation::derive(20, 10), Orientation::Wide);
        assert_eq!(Orientation::derive(10, 20), Orientation::Tall);
        assert_eq!(Orientation::derive(10, 10), Orientation::Mixed);
    }

    #[test]
    fn orientation_matches_is_exact() {
        assert!(Orientation::Wide.matches(20, 10));
        assert!(!Orientation::Wide.matches(10, 20));
        assert!(Orientation::Tall.matches(10, 20));
        assert!(!Orientation::Tall.matches(20, 10));
        assert!(Orientation::Mixed.matches(5, 5));
    }
}
