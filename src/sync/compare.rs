//! Newer-side-wins comparison between two replicas.

use std::fmt;

use super::timestamp::ActivityTime;

/// One of the two places a resource lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replica {
    Local,
    Remote,
}

impl fmt::Display for Replica {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

/// Direction of a reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Local is the driving side; transfers push to the codespace.
    ToRemote,
    /// Remote is the driving side; transfers pull into the local tree.
    FromRemote,
}

impl Direction {
    /// Side that must win for a transfer to happen in this direction.
    pub fn source(self) -> Replica {
        match self {
            Self::ToRemote => Replica::Local,
            Self::FromRemote => Replica::Remote,
        }
    }

    /// Side that receives the transfer.
    pub fn destination(self) -> Replica {
        match self {
            Self::ToRemote => Replica::Remote,
            Self::FromRemote => Replica::Local,
        }
    }

    /// Past-tense verb used in reports ("Pushed", "Pulled").
    pub fn verb(self) -> &'static str {
        match self {
            Self::ToRemote => "Pushed",
            Self::FromRemote => "Pulled",
        }
    }
}

/// Outcome of comparing two optional instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The first side is strictly newer, or only the first side has an instant.
    First,
    /// The second side is newer, only the second side has an instant, or
    /// both are equal.
    SecondOrTie,
    /// Neither side has an instant.
    Neither,
}

impl Verdict {
    /// Whether a pass driven by the first side should transfer.
    pub fn transfers(self) -> bool {
        matches!(self, Self::First)
    }
}

/// Decide which of two replicas is authoritative.
///
/// Absent is older than any real instant. Equal instants never favor the
/// first side, so a pass never re-sends a resource the other side already
/// holds at the same point.
pub fn decide(first: Option<ActivityTime>, second: Option<ActivityTime>) -> Verdict {
    match (first, second) {
        (None, None) => Verdict::Neither,
        (Some(_), None) => Verdict::First,
        (None, Some(_)) => Verdict::SecondOrTie,
        (Some(a), Some(b)) if a > b => Verdict::First,
        (Some(_), Some(_)) => Verdict::SecondOrTie,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn ts(raw: &str) -> Option<ActivityTime> {
        Some(DateTime::parse_from_rfc3339(raw).unwrap())
    }

    #[test]
    fn test_newer_side_wins_both_ways() {
        let older = ts("2024-01-01T10:00:00Z");
        let newer = ts("2024-01-02T10:00:00Z");
        assert_eq!(decide(newer, older), Verdict::First);
        assert_eq!(decide(older, newer), Verdict::SecondOrTie);
    }

    #[test]
    fn test_absent_side_loses() {
        let real = ts("1970-01-01T00:00:01Z");
        assert_eq!(decide(real, None), Verdict::First);
        assert_eq!(decide(None, real), Verdict::SecondOrTie);
    }

    #[test]
    fn test_both_absent_skips() {
        assert_eq!(decide(None, None), Verdict::Neither);
        assert!(!decide(None, None).transfers());
    }

    #[test]
    fn test_tie_never_transfers() {
        let a = ts("2024-01-01T10:00:00Z");
        let b = ts("2024-01-01T11:00:00+01:00");
        assert_eq!(decide(a, b), Verdict::SecondOrTie);
        assert_eq!(decide(b, a), Verdict::SecondOrTie);
        assert!(!decide(a, a).transfers());
    }

    #[test]
    fn test_never_both_directions() {
        let samples = [
            None,
            ts("2024-01-01T00:00:00Z"),
            ts("2024-06-01T00:00:00Z"),
        ];
        for a in samples {
            for b in samples {
                assert!(
                    !(decide(a, b).transfers() && decide(b, a).transfers()),
                    "{a:?} vs {b:?} transferred both ways"
                );
            }
        }
    }

    #[test]
    fn test_direction_sides() {
        assert_eq!(Direction::ToRemote.source(), Replica::Local);
        assert_eq!(Direction::ToRemote.destination(), Replica::Remote);
        assert_eq!(Direction::FromRemote.source(), Replica::Remote);
        assert_eq!(Direction::FromRemote.destination(), Replica::Local);
        assert_eq!(Direction::FromRemote.verb(), "Pulled");
        assert_eq!(Replica::Remote.to_string(), "remote");
    }
}
