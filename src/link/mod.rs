use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkKind {
    Same,
    Different,
    MaybeSame,
}

impl LinkKind {
    pub fn id(self) -> i64 {
        match self {
            LinkKind::Same => 1,
            LinkKind::Different => 2,
            LinkKind::MaybeSame => 3,
        }
    }

    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            1 => Some(LinkKind::Same),
            2 => Some(LinkKind::Different),
            3 => Some(LinkKind::MaybeSame),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LinkKind::Same => "same",
            LinkKind::Different => "different",
            LinkKind::MaybeSame => "maybe-same",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "same" => Some(LinkKind::Same),
            "different" => Some(LinkKind::Different),
            "maybe-same" | "maybe_same" | "maybesame" => Some(LinkKind::MaybeSame),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkStatus {
    /// Produced by the matching engine.
    Inferred,
    /// Confirmed by a human.
    Asserted,
    /// Withdrawn by a human.
    Retracted,
}

impl LinkStatus {
    pub fn id(self) -> i64 {
        match self {
            LinkStatus::Inferred => 1,
            LinkStatus::Asserted => 2,
            LinkStatus::Retracted => 3,
        }
    }

    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            1 => Some(LinkStatus::Inferred),
            2 => Some(LinkStatus::Asserted),
            3 => Some(LinkStatus::Retracted),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LinkStatus::Inferred => "inferred",
            LinkStatus::Asserted => "asserted",
            LinkStatus::Retracted => "retracted",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "inferred" => Some(LinkStatus::Inferred),
            "asserted" => Some(LinkStatus::Asserted),
            "retracted" => Some(LinkStatus::Retracted),
            _ => None,
        }
    }

    /// Human decisions (asserted or retracted) outrank engine output.
    pub fn is_human(self) -> bool {
        !matches!(self, LinkStatus::Inferred)
    }
}

/// One pairwise decision about two record identifiers.
///
/// The pair is kept in the order it was supplied: `(a, b)` and `(b, a)` are
/// different keys for [`crate::store::LinkStore::assert_link`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub id1: String,
    pub id2: String,
    pub kind: LinkKind,
    pub status: LinkStatus,
    pub timestamp: DateTime<Utc>,
}

impl Link {
    pub fn new(
        id1: impl Into<String>,
        id2: impl Into<String>,
        kind: LinkKind,
        status: LinkStatus,
    ) -> Self {
        Self {
            id1: id1.into(),
            id2: id2.into(),
            kind,
            status,
            timestamp: Utc::now(),
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn involves(&self, id: &str) -> bool {
        self.id1 == id || self.id2 == id
    }
}

/// Decides whether a newly submitted link replaces the stored link for the
/// same pair.
pub trait OverridePolicy {
    fn overrides(&self, candidate: &Link, existing: &Link) -> bool;
}

impl<F> OverridePolicy for F
where
    F: Fn(&Link, &Link) -> bool,
{
    fn overrides(&self, candidate: &Link, existing: &Link) -> bool {
        self(candidate, existing)
    }
}

/// Human decisions beat engine inferences; within the same rank a link only
/// replaces the stored one when it actually changes the decision.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssertionsWin;

impl OverridePolicy for AssertionsWin {
    fn overrides(&self, candidate: &Link, existing: &Link) -> bool {
        match (candidate.status.is_human(), existing.status.is_human()) {
            (false, true) => false,
            (true, false) => true,
            _ => candidate.kind != existing.kind || candidate.status != existing.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(kind: LinkKind, status: LinkStatus) -> Link {
        Link::new("a", "b", kind, status)
    }

    #[test]
    fn kind_and_status_codes_are_stable() {
        assert_eq!(LinkKind::Same.id(), 1);
        assert_eq!(LinkKind::Different.id(), 2);
        assert_eq!(LinkKind::MaybeSame.id(), 3);
        assert_eq!(LinkStatus::Inferred.id(), 1);
        assert_eq!(LinkStatus::Asserted.id(), 2);
        assert_eq!(LinkStatus::Retracted.id(), 3);
    }

    #[test]
    fn codes_decode_back_and_unknown_codes_are_rejected() {
        for kind in [LinkKind::Same, LinkKind::Different, LinkKind::MaybeSame] {
            assert_eq!(LinkKind::from_id(kind.id()), Some(kind));
            assert_eq!(LinkKind::parse(kind.name()), Some(kind));
        }
        for status in [LinkStatus::Inferred, LinkStatus::Asserted, LinkStatus::Retracted] {
            assert_eq!(LinkStatus::from_id(status.id()), Some(status));
            assert_eq!(LinkStatus::parse(status.name()), Some(status));
        }
        assert_eq!(LinkKind::from_id(0), None);
        assert_eq!(LinkStatus::from_id(4), None);
        assert_eq!(LinkKind::parse("equal"), None);
    }

    #[test]
    fn inferred_link_never_replaces_human_decision() {
        let existing = link(LinkKind::Same, LinkStatus::Asserted);
        let candidate = link(LinkKind::Different, LinkStatus::Inferred);
        assert!(!AssertionsWin.overrides(&candidate, &existing));

        let retracted = link(LinkKind::Same, LinkStatus::Retracted);
        assert!(!AssertionsWin.overrides(&candidate, &retracted));
    }

    #[test]
    fn human_decision_replaces_inferred_link() {
        let existing = link(LinkKind::Same, LinkStatus::Inferred);
        let candidate = link(LinkKind::Same, LinkStatus::Asserted);
        assert!(AssertionsWin.overrides(&candidate, &existing));
    }

    #[test]
    fn same_rank_replaces_only_on_change() {
        let existing = link(LinkKind::Same, LinkStatus::Inferred);
        assert!(!AssertionsWin.overrides(&link(LinkKind::Same, LinkStatus::Inferred), &existing));
        assert!(AssertionsWin.overrides(&link(LinkKind::MaybeSame, LinkStatus::Inferred), &existing));

        let asserted = link(LinkKind::Same, LinkStatus::Asserted);
        assert!(AssertionsWin.overrides(&link(LinkKind::Same, LinkStatus::Retracted), &asserted));
    }

    #[test]
    fn closures_are_policies() {
        let always = |_: &Link, _: &Link| true;
        let existing = link(LinkKind::Same, LinkStatus::Asserted);
        assert!(always.overrides(&link(LinkKind::Same, LinkStatus::Inferred), &existing));
    }

    #[test]
    fn involves_checks_both_sides() {
        let l = link(LinkKind::Same, LinkStatus::Inferred);
        assert!(l.involves("a"));
        assert!(l.involves("b"));
        assert!(!l.involves("c"));
    }
}
