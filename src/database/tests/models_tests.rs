use super::*;
use chrono::Duration;

#[test]
fn test_scope_key_display() {
    let scope = ScopeKey::new("EGWA", 1, "SBI-106");
    assert_eq!(
        scope.to_string(),
        "grantCode=EGWA | grantVersion=1 | sbi=SBI-106"
    );
}

#[test]
fn test_lock_row_into_record() {
    let row = LockRow {
        grant_code: "EGWA".into(),
        grant_version: 2,
        sbi: "SBI-106".into(),
        owner_id: "user-1".into(),
        locked_at: 1_700_000_000_000,
        expires_at: 1_700_000_060_000,
    };
    let record = LockRecord::from(row);
    assert_eq!(record.scope(), ScopeKey::new("EGWA", 2, "SBI-106"));
    assert_eq!(record.expires_at - record.locked_at, Duration::seconds(60));
}

#[test]
fn test_lock_is_active_strictly_before_deadline() {
    let now = Utc::now();
    let record = LockRecord {
        grant_code: "EGWA".into(),
        grant_version: 1,
        sbi: "SBI-106".into(),
        owner_id: "user-1".into(),
        locked_at: now,
        expires_at: now,
    };
    assert!(!record.is_active_at(now));
    assert!(record.is_active_at(now - Duration::milliseconds(1)));
}

#[test]
fn test_lock_record_serializes_camel_case() {
    let record = LockRecord::from(LockRow {
        grant_code: "EGWA".into(),
        grant_version: 1,
        sbi: "SBI-106".into(),
        owner_id: "user-1".into(),
        locked_at: 0,
        expires_at: 1_000,
    });
    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["ownerId"], "user-1");
    assert_eq!(json["grantVersion"], 1);
    assert!(json.get("expiresAt").is_some());
}

#[test]
fn test_millis_round_trip_keeps_precision() {
    let ts = from_millis(1_700_000_000_123);
    assert_eq!(to_millis(ts), 1_700_000_000_123);
}
