//! Pure in-memory mutations of the aggregate.
//!
//! Each function reports whether it changed anything so the service can
//! skip the write (and the version bump) for no-op requests.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::contract::model::{
    Certification, CertificationPatch, Collection, Education, EducationPatch, EntryPatch,
    Experience, ExperiencePatch, NewEntry, Profile, ProfilePatch, Skill, SkillInput,
};
use crate::domain::error::DomainError;

const SEED_SKILLS: [&str; 3] = ["JavaScript", "React", "Node.js"];

/// Aggregate handed out on the very first read.
pub(crate) fn default_profile(key: &str, now: DateTime<Utc>) -> Profile {
    Profile {
        key: key.to_owned(),
        name: "Test Name".into(),
        title: "Final Year Student".into(),
        bio: "Passionate about technology and problem solving.".into(),
        email: "youremail@example.com".into(),
        skills: SEED_SKILLS
            .iter()
            .map(|name| Skill {
                id: Uuid::new_v4(),
                name: (*name).into(),
                endorsements: 0,
            })
            .collect(),
        version: 1,
        updated_at: now,
        ..Default::default()
    }
}

fn assign<T: PartialEq>(slot: &mut T, value: Option<T>) -> bool {
    match value {
        Some(v) if *slot != v => {
            *slot = v;
            true
        }
        _ => false,
    }
}

pub(crate) fn apply_patch(p: &mut Profile, patch: ProfilePatch) -> bool {
    let mut changed = false;
    changed |= assign(&mut p.name, patch.name);
    changed |= assign(&mut p.title, patch.title);
    changed |= assign(&mut p.bio, patch.bio);
    changed |= assign(&mut p.email, patch.email);
    changed |= assign(&mut p.location, patch.location);
    changed |= assign(&mut p.image, patch.image);
    changed |= assign(&mut p.avatar_url, patch.avatar_url);
    changed |= assign(&mut p.socials, patch.socials);
    if let Some(skills) = patch.skills {
        changed |= replace_skills(p, skills);
    }
    changed
}

/// Adds the entry under a fresh id. Education goes to the front, the rest to the back.
pub(crate) fn add_entry(p: &mut Profile, entry: NewEntry) -> Uuid {
    let id = Uuid::new_v4();
    match entry {
        NewEntry::Experience(e) => p.experience.push(Experience {
            id,
            role: e.role,
            company: e.company,
            location: e.location,
            join_date: e.join_date,
            leave_date: e.leave_date,
            current: e.current,
        }),
        NewEntry::Education(e) => p.education.insert(
            0,
            Education {
                id,
                college: e.college,
                degree: e.degree,
                field: e.field,
                location: e.location,
                start_date: e.start_date,
                end_date: e.end_date,
                is_current: e.is_current,
            },
        ),
        NewEntry::Certification(c) => p.certifications.push(Certification {
            id,
            name: c.name,
            provider: c.provider,
            certificate_url: c.certificate_url,
            certificate_id: c.certificate_id,
            issued_date: c.issued_date,
            expiry_date: c.expiry_date,
            description: c.description,
        }),
    }
    id
}

fn patch_experience(e: &mut Experience, patch: ExperiencePatch) -> bool {
    let mut changed = assign(&mut e.role, patch.role);
    changed |= assign(&mut e.company, patch.company);
    changed |= assign(&mut e.location, patch.location);
    changed |= assign(&mut e.join_date, patch.join_date);
    changed |= assign(&mut e.leave_date, patch.leave_date);
    changed |= assign(&mut e.current, patch.current);
    changed
}

fn patch_education(e: &mut Education, patch: EducationPatch) -> bool {
    let mut changed = assign(&mut e.college, patch.college);
    changed |= assign(&mut e.degree, patch.degree);
    changed |= assign(&mut e.field, patch.field);
    changed |= assign(&mut e.location, patch.location);
    changed |= assign(&mut e.start_date, patch.start_date);
    changed |= assign(&mut e.end_date, patch.end_date);
    changed |= assign(&mut e.is_current, patch.is_current);
    changed
}

fn patch_certification(c: &mut Certification, patch: CertificationPatch) -> bool {
    let mut changed = assign(&mut c.name, patch.name);
    changed |= assign(&mut c.provider, patch.provider);
    changed |= assign(&mut c.certificate_url, patch.certificate_url);
    changed |= assign(&mut c.certificate_id, patch.certificate_id);
    changed |= assign(&mut c.issued_date, patch.issued_date);
    changed |= assign(&mut c.expiry_date, patch.expiry_date);
    changed |= assign(&mut c.description, patch.description);
    changed
}

pub(crate) fn update_entry(
    p: &mut Profile,
    id: Uuid,
    patch: EntryPatch,
) -> Result<bool, DomainError> {
    let collection = patch.collection();
    let missing = || DomainError::entry_not_found(collection, id);
    match patch {
        EntryPatch::Experience(patch) => {
            let e = p.experience.iter_mut().find(|e| e.id == id).ok_or_else(missing)?;
            Ok(patch_experience(e, patch))
        }
        EntryPatch::Education(patch) => {
            let e = p.education.iter_mut().find(|e| e.id == id).ok_or_else(missing)?;
            Ok(patch_education(e, patch))
        }
        EntryPatch::Certification(patch) => {
            let c = p
                .certifications
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(missing)?;
            Ok(patch_certification(c, patch))
        }
    }
}

/// Missing ids are not an error.
pub(crate) fn remove_entry(p: &mut Profile, collection: Collection, id: Uuid) -> bool {
    fn pull<T>(items: &mut Vec<T>, keep: impl Fn(&T) -> bool) -> bool {
        let before = items.len();
        items.retain(keep);
        items.len() != before
    }
    match collection {
        Collection::Experience => pull(&mut p.experience, |e| e.id != id),
        Collection::Education => pull(&mut p.education, |e| e.id != id),
        Collection::Certifications => pull(&mut p.certifications, |c| c.id != id),
    }
}

/// The stored list becomes exactly `incoming`, deduplicated case-insensitively
/// (first occurrence wins). Skills already present keep their id and
/// endorsements and take the incoming spelling; new ones start at zero.
pub(crate) fn replace_skills(p: &mut Profile, incoming: Vec<SkillInput>) -> bool {
    let mut seen = HashSet::with_capacity(incoming.len());
    let mut next = Vec::with_capacity(incoming.len());
    for input in incoming {
        let name = input.name.trim().to_owned();
        let folded = name.to_lowercase();
        if !seen.insert(folded.clone()) {
            continue;
        }
        let skill = match p.skills.iter().find(|s| s.name.to_lowercase() == folded) {
            Some(existing) => Skill {
                id: existing.id,
                name,
                endorsements: existing.endorsements,
            },
            None => Skill {
                id: Uuid::new_v4(),
                name,
                endorsements: 0,
            },
        };
        next.push(skill);
    }
    let changed = next != p.skills;
    p.skills = next;
    changed
}

/// Exact-name match. Returns the new count.
pub(crate) fn endorse(p: &mut Profile, name: &str) -> Result<u32, DomainError> {
    let skill = p
        .skills
        .iter_mut()
        .find(|s| s.name == name)
        .ok_or_else(|| DomainError::skill_not_found(name))?;
    skill.endorsements = skill.endorsements.saturating_add(1);
    Ok(skill.endorsements)
}

pub(crate) fn remove_skill(p: &mut Profile, name: &str) -> bool {
    let folded = name.trim().to_lowercase();
    let before = p.skills.len();
    p.skills.retain(|s| s.name.to_lowercase() != folded);
    p.skills.len() != before
}
