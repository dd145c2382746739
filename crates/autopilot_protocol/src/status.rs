use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Final colour of a step.
///
/// Variants are declared in severity order, so the derived `Ord` ranks `Green` as the most
/// favourable and `Unanswered` as the worst. `Failed` and `Error` mean the evaluation could not
/// run at all; they are not negative verdicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Green,
    Yellow,
    Red,
    Failed,
    Error,
    Na,
    Unanswered,
}

impl Status {
    pub const ALL: [Status; 7] = [
        Status::Green,
        Status::Yellow,
        Status::Red,
        Status::Failed,
        Status::Error,
        Status::Na,
        Status::Unanswered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Green => "GREEN",
            Status::Yellow => "YELLOW",
            Status::Red => "RED",
            Status::Failed => "FAILED",
            Status::Error => "ERROR",
            Status::Na => "NA",
            Status::Unanswered => "UNANSWERED",
        }
    }

    /// Least favourable of the given statuses, `None` for an empty iterator.
    pub fn worst(statuses: impl IntoIterator<Item = Status>) -> Option<Status> {
        statuses.into_iter().max()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ProtocolError::UnknownStatus(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_order_matches_declaration() {
        let mut shuffled = vec![
            Status::Na,
            Status::Green,
            Status::Unanswered,
            Status::Red,
            Status::Error,
            Status::Yellow,
            Status::Failed,
        ];
        shuffled.sort();
        assert_eq!(shuffled, Status::ALL.to_vec());
        assert_eq!(
            Status::worst([Status::Green, Status::Red, Status::Yellow]),
            Some(Status::Red)
        );
        assert_eq!(Status::worst([]), None);
    }

    #[test]
    fn round_trips_through_wire_names() {
        for status in Status::ALL {
            assert_eq!(status.as_str().parse::<Status>().unwrap(), status);
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
        assert!("green".parse::<Status>().is_err());
    }
}
