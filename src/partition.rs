//! Splits the corpus into subcorpora by publisher.
//!
//! A post's `ID` starts with (or, for one account, merely contains) the
//! numeric identifier of the account that published it. The rules live in a
//! single table so that adding a publisher is a one-line change.

use crate::model::Post;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PublisherGroup {
    /// State-affiliated outlets, status 0.
    Control,
    /// Independent outlets, status 1.
    Free,
}

impl PublisherGroup {
    pub const ALL: [PublisherGroup; 2] = [PublisherGroup::Control, PublisherGroup::Free];

    pub fn status(self) -> u8 {
        match self {
            PublisherGroup::Control => 0,
            PublisherGroup::Free => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PublisherGroup::Control => "control",
            PublisherGroup::Free => "free",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdMatch {
    Prefix(&'static str),
    Contains(&'static str),
}

impl IdMatch {
    pub fn matches(self, id: &str) -> bool {
        match self {
            IdMatch::Prefix(p) => id.starts_with(p),
            IdMatch::Contains(p) => id.contains(p),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PublisherRule {
    pub publisher: &'static str,
    pub id_match: IdMatch,
    pub group: PublisherGroup,
}

pub const PUBLISHER_RULES: &[PublisherRule] = &[
    PublisherRule {
        publisher: "TASS",
        id_match: IdMatch::Contains("-26284064"),
        group: PublisherGroup::Control,
    },
    PublisherRule {
        publisher: "RT",
        id_match: IdMatch::Prefix("-40316705"),
        group: PublisherGroup::Control,
    },
    PublisherRule {
        publisher: "Meduza",
        id_match: IdMatch::Prefix("-76982440"),
        group: PublisherGroup::Free,
    },
    PublisherRule {
        publisher: "RBC",
        id_match: IdMatch::Prefix("-25232578"),
        group: PublisherGroup::Free,
    },
];

/// Returns the group of the first matching rule, or `None` for unknown publishers.
pub fn classify_publisher(id: &str) -> Option<PublisherGroup> {
    let id = id.trim();
    PUBLISHER_RULES
        .iter()
        .find(|rule| rule.id_match.matches(id))
        .map(|rule| rule.group)
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Subcorpora {
    pub control: Vec<Post>,
    pub free: Vec<Post>,
    /// Posts from publishers not in [`PUBLISHER_RULES`].
    pub unassigned: usize,
}

impl Subcorpora {
    pub fn get(&self, group: PublisherGroup) -> &[Post] {
        match group {
            PublisherGroup::Control => &self.control,
            PublisherGroup::Free => &self.free,
        }
    }
}

/// Moves every post into the subcorpus of its publisher.
pub fn partition(posts: Vec<Post>) -> Subcorpora {
    let mut out = Subcorpora::default();
    for post in posts {
        match classify_publisher(&post.publisher_id) {
            Some(PublisherGroup::Control) => out.control.push(post),
            Some(PublisherGroup::Free) => out.free.push(post),
            None => out.unassigned += 1,
        }
    }
    out
}
