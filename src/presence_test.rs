use super::*;

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_owned()).collect()
}

#[test]
fn starts_empty_and_fresh() {
    let tracker = PresenceTracker::default();
    assert!(tracker.is_empty());
    assert_eq!(tracker.len(), 0);
    assert!(!tracker.is_stale());
}

#[test]
fn each_snapshot_replaces_previous_exactly() {
    let snapshots = [
        names(&["Bob", "Ana"]),
        names(&["Cy"]),
        names(&[]),
        names(&["Ana", "Bob", "Ana"]),
    ];
    let mut tracker = PresenceTracker::default();
    for snapshot in snapshots {
        tracker.replace(snapshot.clone());
        assert_eq!(tracker.users(), snapshot.as_slice());
        assert_eq!(tracker.len(), snapshot.len());
    }
}

#[test]
fn keeps_coordinator_order_and_duplicates() {
    let mut tracker = PresenceTracker::default();
    tracker.replace(names(&["Zed", "Ana", "Zed"]));
    assert_eq!(tracker.users(), names(&["Zed", "Ana", "Zed"]).as_slice());
    assert_eq!(tracker.len(), 3);
}

#[test]
fn contains_matches_whole_names_only() {
    let mut tracker = PresenceTracker::default();
    tracker.replace(names(&["Bob", "Ana"]));
    assert!(tracker.contains("Ana"));
    assert!(!tracker.contains("An"));
    assert!(!tracker.contains("ana"));
}

#[test]
fn disconnect_marks_stale_until_next_snapshot() {
    let mut tracker = PresenceTracker::default();
    tracker.replace(names(&["Bob"]));
    tracker.mark_stale();
    assert!(tracker.is_stale());
    assert_eq!(tracker.users(), names(&["Bob"]).as_slice());

    tracker.replace(names(&["Bob", "Ana"]));
    assert!(!tracker.is_stale());
}
