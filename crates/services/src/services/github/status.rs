//! The status↔label mapping contract shared by outbound and inbound sync.
//!
//! The label strings are bit-exact on both directions; changing one side
//! without the other silently breaks round-tripping. Option-name matching
//! for the typed project field is exact-first, then case-insensitive,
//! because operators rename options with different casing conventions.

use db::models::task::TaskStatus;

/// Canonical status label carried on the mirrored issue, per status.
pub const STATUS_LABELS: [(TaskStatus, &str); 5] = [
    (TaskStatus::Todo, "todo"),
    (TaskStatus::InProgress, "in-progress"),
    (TaskStatus::InReview, "in-review"),
    (TaskStatus::Done, "done"),
    (TaskStatus::Blocked, "blocked"),
];

/// When an issue carries several status labels at once, the first match in
/// this order wins.
const LABEL_PRECEDENCE: [TaskStatus; 5] = [
    TaskStatus::InProgress,
    TaskStatus::InReview,
    TaskStatus::Blocked,
    TaskStatus::Done,
    TaskStatus::Todo,
];

const ALL_STATUSES: [TaskStatus; 5] = [
    TaskStatus::Todo,
    TaskStatus::InProgress,
    TaskStatus::InReview,
    TaskStatus::Done,
    TaskStatus::Blocked,
];

pub fn status_label(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Todo => "todo",
        TaskStatus::InProgress => "in-progress",
        TaskStatus::InReview => "in-review",
        TaskStatus::Done => "done",
        TaskStatus::Blocked => "blocked",
    }
}

pub fn is_status_label(label: &str) -> bool {
    STATUS_LABELS.iter().any(|(_, l)| *l == label)
}

pub fn status_from_label(label: &str) -> Option<TaskStatus> {
    STATUS_LABELS
        .iter()
        .find(|(_, l)| *l == label)
        .map(|(s, _)| *s)
}

/// Derive a status from an issue's label set and open/closed state.
///
/// Recognized labels win by precedence; with no recognized label the
/// issue state decides (closed ⇒ Done, open ⇒ Todo).
pub fn status_from_labels<S: AsRef<str>>(labels: &[S], closed: bool) -> TaskStatus {
    for candidate in LABEL_PRECEDENCE {
        let wanted = status_label(candidate);
        if labels.iter().any(|l| l.as_ref() == wanted) {
            return candidate;
        }
    }
    if closed { TaskStatus::Done } else { TaskStatus::Todo }
}

/// Option name used in the typed project Status field.
pub fn status_option_name(status: TaskStatus) -> &'static str {
    status.column_name()
}

/// Inverse of [`status_option_name`]: exact match first, then
/// case-insensitive fallback.
pub fn status_from_option_name(name: &str) -> Option<TaskStatus> {
    ALL_STATUSES
        .iter()
        .copied()
        .find(|s| s.column_name() == name)
        .or_else(|| {
            ALL_STATUSES
                .iter()
                .copied()
                .find(|s| s.column_name().eq_ignore_ascii_case(name))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_round_trip() {
        for status in ALL_STATUSES {
            assert_eq!(status_from_label(status_label(status)), Some(status));
        }
    }

    #[test]
    fn test_option_name_round_trip() {
        for status in ALL_STATUSES {
            assert_eq!(
                status_from_option_name(status_option_name(status)),
                Some(status)
            );
        }
    }

    #[test]
    fn test_label_table_matches_forward_mapping() {
        for (status, label) in STATUS_LABELS {
            assert_eq!(status_label(status), label);
        }
    }

    #[test]
    fn test_precedence_with_multiple_labels() {
        let labels = ["done", "in-review", "in-progress"];
        assert_eq!(status_from_labels(&labels, false), TaskStatus::InProgress);

        let labels = ["done", "blocked"];
        assert_eq!(status_from_labels(&labels, false), TaskStatus::Blocked);

        let labels = ["done", "in-review"];
        assert_eq!(status_from_labels(&labels, true), TaskStatus::InReview);
    }

    #[test]
    fn test_state_fallback_when_no_recognized_label() {
        let labels = ["bug", "help wanted"];
        assert_eq!(status_from_labels(&labels, false), TaskStatus::Todo);
        assert_eq!(status_from_labels(&labels, true), TaskStatus::Done);

        let empty: [&str; 0] = [];
        assert_eq!(status_from_labels(&empty, true), TaskStatus::Done);
    }

    #[test]
    fn test_labels_match_exactly_not_case_insensitively() {
        // The label contract is bit-exact; "In-Progress" is not ours.
        let labels = ["In-Progress"];
        assert_eq!(status_from_labels(&labels, false), TaskStatus::Todo);
    }

    #[test]
    fn test_option_name_case_insensitive_fallback() {
        assert_eq!(
            status_from_option_name("IN PROGRESS"),
            Some(TaskStatus::InProgress)
        );
        assert_eq!(status_from_option_name("todo"), Some(TaskStatus::Todo));
        assert_eq!(status_from_option_name("Shipped"), None);
    }
}
