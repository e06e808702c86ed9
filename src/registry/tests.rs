use super::*;

fn registry() -> TopicRegistry {
    TopicRegistry::standard().expect("standard table is valid")
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_standard_table_builds() {
    let registry = registry();
    assert_eq!(registry.local_topics().count(), LOCAL_ENTRIES.len());
    assert_eq!(registry.remote_feed_ids().count(), REMOTE_ENTRIES.len());
}

#[test]
fn test_duplicate_local_topic_rejected() {
    let entries = [
        TopicEntry::new("/a/b", &[Group::HomeLux], "x"),
        TopicEntry::new("/a/b", &[Group::HomeLux], "y"),
    ];
    let err = TopicRegistry::new(&entries, &[]).unwrap_err();
    assert_eq!(err, RegistryError::DuplicateLocal("/a/b"));
}

#[test]
fn test_duplicate_remote_feed_rejected() {
    let entries = [
        TopicEntry::new("/a", &[Group::Weather], "current"),
        TopicEntry::new("/b", &[Group::Weather], "current"),
    ];
    let err = TopicRegistry::new(&[], &entries).unwrap_err();
    assert_eq!(err, RegistryError::DuplicateRemote("current"));
}

#[test]
fn test_wildcard_with_feed_id_rejected() {
    let entries = [TopicEntry::new("/a/#", &[Group::HomeLux], "x")];
    let err = TopicRegistry::new(&entries, &[]).unwrap_err();
    assert_eq!(err, RegistryError::WildcardWithFeedId("/a/#"));
}

#[test]
fn test_entry_without_groups_rejected() {
    let entries = [TopicEntry::new("/a", &[], "x")];
    let err = TopicRegistry::new(&entries, &[]).unwrap_err();
    assert_eq!(err, RegistryError::NoGroups("/a"));
}

// ============================================================================
// Local resolution
// ============================================================================

#[test]
fn test_every_local_entry_resolves_to_itself() {
    let registry = registry();
    for entry in LOCAL_ENTRIES {
        if entry.is_wildcard() {
            let topic = format!("{}anything", entry.prefix());
            let resolved = registry.resolve_local(&topic).expect("wildcard matches");
            assert_eq!(resolved.local, entry.local, "topic {}", topic);
        } else {
            let resolved = registry.resolve_local(entry.local).expect("exact match");
            assert_eq!(resolved, entry);
        }
    }
}

#[test]
fn test_wildcard_derives_feed_from_last_segment() {
    let registry = registry();
    let topic = "/electric_meter/inverter";
    let entry = registry.resolve_local(topic).unwrap();
    assert_eq!(entry.groups, &[Group::ElectricMeters]);
    assert_eq!(extract_feed_id(topic, entry), "inverter");
}

#[test]
fn test_wildcard_replaces_underscores() {
    let registry = registry();
    let topic = "/sense/device/hot_water_heater";
    let entry = registry.resolve_local(topic).unwrap();
    assert_eq!(entry.groups, &[Group::HomeDevice]);
    assert_eq!(extract_feed_id(topic, entry), "hot-water-heater");
}

#[test]
fn test_exact_entry_ignores_path_segment() {
    let registry = registry();
    let topic = "/garage_steps/oper_flag/motion";
    let entry = registry.resolve_local(topic).unwrap();
    assert_eq!(entry.groups, &[Group::HomeMotion]);
    assert_eq!(extract_feed_id(topic, entry), "garage");
}

#[test]
fn test_first_wildcard_wins_over_longer_prefix() {
    // "/electric_meter_baseline/x" starts with "/electric_meter" but not
    // "/electric_meter/", so the baseline entry must match.
    let registry = registry();
    let entry = registry
        .resolve_local("/electric_meter_baseline/house")
        .unwrap();
    assert_eq!(entry.groups, &[Group::BaselineElectric]);

    let entries = [
        TopicEntry::new("/a/#", &[Group::HomeLux], ""),
        TopicEntry::new("/a/b/#", &[Group::HomeZone], ""),
    ];
    let custom = TopicRegistry::new(&entries, &[]).unwrap();
    let entry = custom.resolve_local("/a/b/c").unwrap();
    assert_eq!(entry.groups, &[Group::HomeLux]);
}

#[test]
fn test_unknown_topic_not_found() {
    let registry = registry();
    assert!(registry.resolve_local("/nowhere/at/all").is_none());
    assert!(registry.resolve_local("").is_none());
}

#[test]
fn test_status_topic_fans_out_in_declared_order() {
    let registry = registry();
    let entry = registry.resolve_local("/kitchen_clock/status").unwrap();
    assert_eq!(
        entry.groups,
        &[Group::DeviceUptime, Group::DeviceFreeMemory]
    );
}

// ============================================================================
// Remote resolution
// ============================================================================

#[test]
fn test_remote_exact_match_only() {
    let registry = registry();
    let entry = registry.resolve_remote(FEED_ATTIC_MOTION).unwrap();
    assert_eq!(entry.local, "/attic/motion");
    assert!(registry.resolve_remote("home-motion").is_none());
    assert!(registry.resolve_remote("unknown").is_none());
}

#[test]
fn test_remote_feed_ids_in_table_order() {
    let registry = registry();
    let ids: Vec<_> = registry.remote_feed_ids().collect();
    assert_eq!(ids, vec![FEED_ATTIC_MOTION, "words", "current"]);
}

#[test]
fn test_group_identifiers() {
    assert_eq!(Group::SolarRate.as_str(), "solar-rate");
    assert_eq!(Group::LocalCommand.as_str(), TOPIC_LOCAL_CMD);
    assert_eq!(Group::EvBays.to_string(), "ev");
}
