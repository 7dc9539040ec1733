//! Client-side view of the aggregate.
//!
//! [`ProfileView::from_profile`] is the single normalisation step every
//! client path goes through, whether the aggregate came from an HTTP response
//! or from a relay message. [`ProfileViewState`] keeps the newest snapshot and
//! refuses relay snapshots older than what it already shows.

use serde_json::Value;

use super::model::{Platform, Profile};

/// Parts of the profile counted towards completeness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Name,
    Bio,
    Skills,
    Experience,
    Education,
    Certifications,
    GitHub,
}

impl Section {
    pub const ALL: [Section; 7] = [
        Section::Name,
        Section::Bio,
        Section::Skills,
        Section::Experience,
        Section::Education,
        Section::Certifications,
        Section::GitHub,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Section::Name => "Name",
            Section::Bio => "Bio",
            Section::Skills => "Skills",
            Section::Experience => "Experience",
            Section::Education => "Education",
            Section::Certifications => "Certifications",
            Section::GitHub => "GitHub",
        }
    }

    /// Whether an empty section is listed as a hint. Name, bio and skills
    /// count towards the score only.
    fn is_hinted(self) -> bool {
        !matches!(self, Section::Name | Section::Bio | Section::Skills)
    }

    fn is_filled(self, p: &Profile) -> bool {
        let text = |s: &str| !s.trim().is_empty();
        match self {
            Section::Name => text(&p.name),
            Section::Bio => text(&p.bio),
            Section::Skills => !p.skills.is_empty(),
            Section::Experience => !p.experience.is_empty(),
            Section::Education => !p.education.is_empty(),
            Section::Certifications => !p.certifications.is_empty(),
            Section::GitHub => text(&p.socials.github),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileView {
    pub profile: Profile,
    /// 0..=100, share of [`Section::ALL`] that is filled in.
    pub completeness: u8,
    /// Empty hinted sections, in [`Section::ALL`] order.
    pub missing: Vec<Section>,
    pub experience_count: usize,
    pub skill_count: usize,
    pub total_endorsements: u64,
    pub linked_platforms: Vec<Platform>,
}

impl ProfileView {
    pub fn from_profile(profile: Profile) -> Self {
        let empty: Vec<Section> = Section::ALL
            .into_iter()
            .filter(|s| !s.is_filled(&profile))
            .collect();
        let filled = Section::ALL.len() - empty.len();
        let missing = empty.into_iter().filter(|s| s.is_hinted()).collect();
        let completeness = ((filled * 100 + Section::ALL.len() / 2) / Section::ALL.len()) as u8;

        Self {
            completeness,
            missing,
            experience_count: profile.experience.len(),
            skill_count: profile.skills.len(),
            total_endorsements: profile.skills.iter().map(|s| u64::from(s.endorsements)).sum(),
            linked_platforms: profile.socials.linked().map(|(p, _)| p).collect(),
            profile,
        }
    }

    pub fn version(&self) -> i64 {
        self.profile.version
    }
}

/// What happened to a snapshot offered to [`ProfileViewState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Replaced,
    /// Older than the snapshot already shown; dropped.
    Stale { current: i64, offered: i64 },
    /// Relay payload that is not a profile document; dropped.
    Malformed,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileViewState {
    current: Option<ProfileView>,
}

impl ProfileViewState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> Option<&ProfileView> {
        self.current.as_ref()
    }

    /// Apply an aggregate returned by the store.
    pub fn apply(&mut self, profile: Profile) -> ApplyOutcome {
        if let Some(cur) = &self.current {
            if profile.version < cur.version() {
                return ApplyOutcome::Stale {
                    current: cur.version(),
                    offered: profile.version,
                };
            }
        }
        self.current = Some(ProfileView::from_profile(profile));
        ApplyOutcome::Replaced
    }

    /// Apply the opaque `data` of a relay message.
    pub fn apply_remote(&mut self, payload: &Value) -> ApplyOutcome {
        match snapshot_from(payload) {
            Some(profile) => self.apply(profile),
            None => ApplyOutcome::Malformed,
        }
    }
}

fn snapshot_from(payload: &Value) -> Option<Profile> {
    // must at least look like an aggregate
    payload.get("_id")?;
    serde_json::from_value(payload.clone()).ok()
}
