use std::sync::Arc;

use inspectsync_core::{
    AssetRef, CoreError, DraftKey, EntityId, FieldValue, RecordId, SectionData, SectionKind,
};
use inspectsync_engine::{CancellationToken, EngineError, MergeSource};
use inspectsync_harness::{FakeRemote, ManualClock, START_MS, TestApp, init_tracing};
use serde_json::json;

const CDN: &str = "https://cdn.example.com";

fn text(s: &str) -> FieldValue {
    FieldValue::Text(s.into())
}

fn remote_asset(name: &str) -> FieldValue {
    FieldValue::Asset(Some(AssetRef::Remote(format!("{CDN}/{name}"))))
}

fn local_asset(name: &str) -> FieldValue {
    FieldValue::Asset(Some(AssetRef::Local(format!("file:///captures/{name}"))))
}

fn legacy_record() -> serde_json::Value {
    json!({
        "_id": "rec-1",
        "Engine Details ": {
            "engineNo": "EN-9",
            "engineImage": { "url": format!("{CDN}/engine.jpg") },
            "isRunning": "Yes",
            "Remarks ": "starts cold",
        },
        "defectList": [
            { "image": format!("{CDN}/d1.jpg"), "remark": "dent" },
            { "imageUrl": format!("{CDN}/d2.jpg"), "description": "scratch" },
        ],
    })
}

// ============================================================================
// Opening a section
// ============================================================================

#[tokio::test]
async fn empty_draft_is_hydrated_from_remote() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let app = TestApp::new(FakeRemote::new().with_record("veh-1", legacy_record()))?;
    let key = DraftKey::new("veh-1", SectionKind::Engine);

    let opened = app.engine.open_section(&key, &CancellationToken::new()).await?;
    assert_eq!(opened.source, MergeSource::Remote);
    assert_eq!(opened.draft.remote_record_id, Some(RecordId::from("rec-1")));

    let SectionData::Form(fields) = &opened.draft.data else {
        panic!("engine section is a form");
    };
    assert_eq!(fields["engine_number"], text("EN-9"));
    assert_eq!(fields["engine_photo"], remote_asset("engine.jpg"));
    assert_eq!(fields["running_condition"], FieldValue::YesNo(Some(true)));
    assert_eq!(fields["oil_leak"], FieldValue::YesNo(None));
    assert_eq!(fields["remarks"], text("starts cold"));

    // Hydrated state is what the store now holds.
    assert_eq!(app.engine.draft(&key)?, Some(opened.draft));
    Ok(())
}

#[tokio::test]
async fn draft_with_content_wins_without_fetch() -> Result<(), Box<dyn std::error::Error>> {
    let app = TestApp::new(FakeRemote::new().with_record("veh-1", legacy_record()))?;
    let key = DraftKey::new("veh-1", SectionKind::Engine);
    app.engine.set_field(&key, "remarks", text("local note"))?;

    let opened = app.engine.open_section(&key, &CancellationToken::new()).await?;
    assert_eq!(opened.source, MergeSource::Draft);
    assert_eq!(app.remote().record_requests(), 0);

    let SectionData::Form(fields) = &opened.draft.data else {
        panic!("engine section is a form");
    };
    assert_eq!(fields["remarks"], text("local note"));
    // Never mixed with remote values.
    assert_eq!(fields["engine_number"], text(""));
    Ok(())
}

#[tokio::test]
async fn blank_defect_entry_loses_to_remote_entries() -> Result<(), Box<dyn std::error::Error>> {
    let app = TestApp::new(FakeRemote::new().with_record("veh-1", legacy_record()))?;
    let key = DraftKey::new("veh-1", SectionKind::Defects);
    // Opening the add/remove UI leaves one blank entry behind.
    app.engine.add_entry(&key)?;
    app.engine.remove_entry(&key, 1)?;
    assert_eq!(app.engine.draft(&key)?.map(|d| d.entry_count()), Some(1));

    let opened = app.engine.open_section(&key, &CancellationToken::new()).await?;
    assert_eq!(opened.source, MergeSource::Remote);
    let entries = opened.draft.data.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["image"], remote_asset("d1.jpg"));
    assert_eq!(entries[1]["image"], remote_asset("d2.jpg"));
    assert_eq!(entries[1]["remark"], text("scratch"));
    Ok(())
}

#[tokio::test]
async fn missing_remote_record_opens_blank() -> Result<(), Box<dyn std::error::Error>> {
    let app = TestApp::new(FakeRemote::new())?;
    let key = DraftKey::new("veh-404", SectionKind::Defects);

    let opened = app.engine.open_section(&key, &CancellationToken::new()).await?;
    assert_eq!(opened.source, MergeSource::Blank);
    assert_eq!(opened.draft.entry_count(), 1);
    assert!(!opened.draft.has_content());
    Ok(())
}

#[tokio::test]
async fn record_without_the_section_opens_blank_but_keeps_id() -> Result<(), Box<dyn std::error::Error>> {
    let app = TestApp::new(FakeRemote::new().with_record("veh-1", json!({ "id": "rec-7" })))?;
    let key = DraftKey::new("veh-1", SectionKind::Calendar);

    let opened = app.engine.open_section(&key, &CancellationToken::new()).await?;
    assert_eq!(opened.source, MergeSource::Blank);
    assert!(!opened.draft.has_content());
    assert_eq!(opened.draft.remote_record_id, Some(RecordId::from("rec-7")));
    Ok(())
}

#[tokio::test]
async fn inspection_level_values_stay_out_of_absent_sections() -> Result<(), Box<dyn std::error::Error>> {
    let record = json!({
        "_id": "rec-1",
        "date": "2024-01-01T00:00:00Z",
        "time": "09:00",
        "remarks": "overall ok",
        "location": "Yard 2",
        "engine": { "engineNumber": "EN-1", "running": true },
    });
    let app = TestApp::new(FakeRemote::new().with_record("veh-1", record))?;

    for section in [SectionKind::Frame, SectionKind::Calendar] {
        let key = DraftKey::new("veh-1", section);
        let opened = app.engine.open_section(&key, &CancellationToken::new()).await?;
        assert_eq!(opened.source, MergeSource::Blank, "{section:?}");
        assert!(!opened.draft.has_content(), "{section:?}");
        assert!(app.engine.submit(&key).await.is_err(), "{section:?}");
    }

    let engine = DraftKey::new("veh-1", SectionKind::Engine);
    let opened = app.engine.open_section(&engine, &CancellationToken::new()).await?;
    assert_eq!(opened.source, MergeSource::Remote);
    let SectionData::Form(fields) = &opened.draft.data else {
        panic!("engine section is a form");
    };
    assert_eq!(fields["remarks"], text(""));
    assert!(app.remote().submissions().is_empty());
    Ok(())
}

#[tokio::test]
async fn hydration_failure_leaves_store_untouched() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let app = TestApp::new(FakeRemote::new().with_record("veh-1", legacy_record()))?;
    app.remote().fail_records(true);
    let key = DraftKey::new("veh-1", SectionKind::Engine);

    let result = app.engine.open_section(&key, &CancellationToken::new()).await;
    assert!(matches!(result, Err(EngineError::Transport(_))));
    assert_eq!(app.engine.draft(&key)?, None);
    assert_eq!(app.draft_writes(), 0);
    Ok(())
}

#[tokio::test]
async fn cancelled_hydration_is_discarded() -> Result<(), Box<dyn std::error::Error>> {
    let app = TestApp::new(FakeRemote::new().with_record("veh-1", legacy_record()))?;
    let cancel = CancellationToken::new();
    app.remote().cancel_on_record_fetch(cancel.clone());
    let key = DraftKey::new("veh-1", SectionKind::Engine);

    let result = app.engine.open_section(&key, &cancel).await;
    assert!(matches!(result, Err(EngineError::Cancelled(_))));
    assert_eq!(app.remote().record_requests(), 1);
    assert_eq!(app.engine.draft(&key)?, None);
    Ok(())
}

// ============================================================================
// Editing
// ============================================================================

#[tokio::test]
async fn replacing_a_remote_photo_queues_it_once() -> Result<(), Box<dyn std::error::Error>> {
    let app = TestApp::new(FakeRemote::new().with_record("veh-1", legacy_record()))?;
    let key = DraftKey::new("veh-1", SectionKind::Engine);
    app.engine.open_section(&key, &CancellationToken::new()).await?;

    let draft = app.engine.set_field(&key, "engine_photo", local_asset("1.jpg"))?;
    assert_eq!(draft.pending_deletions.len(), 1);
    assert!(draft.pending_deletions.contains(&format!("{CDN}/engine.jpg")));

    let draft = app.engine.set_field(&key, "engine_photo", local_asset("2.jpg"))?;
    assert_eq!(draft.pending_deletions.len(), 1);

    // Persisted with the draft.
    let stored = app.engine.draft(&key)?.ok_or("draft missing")?;
    assert_eq!(stored.pending_deletions, draft.pending_deletions);
    Ok(())
}

#[tokio::test]
async fn restoring_the_original_photo_withdraws_it() -> Result<(), Box<dyn std::error::Error>> {
    let app = TestApp::new(FakeRemote::new().with_record("veh-1", legacy_record()))?;
    let key = DraftKey::new("veh-1", SectionKind::Engine);
    app.engine.open_section(&key, &CancellationToken::new()).await?;

    app.engine.set_field(&key, "engine_photo", local_asset("1.jpg"))?;
    let draft = app.engine.set_field(&key, "engine_photo", remote_asset("engine.jpg"))?;
    assert!(draft.pending_deletions.is_empty());
    Ok(())
}

#[tokio::test]
async fn removing_a_defect_queues_its_photo() -> Result<(), Box<dyn std::error::Error>> {
    let app = TestApp::new(FakeRemote::new().with_record("veh-1", legacy_record()))?;
    let key = DraftKey::new("veh-1", SectionKind::Defects);
    app.engine.open_section(&key, &CancellationToken::new()).await?;

    let draft = app.engine.remove_entry(&key, 0)?;
    assert_eq!(draft.entry_count(), 1);
    assert!(draft.pending_deletions.contains(&format!("{CDN}/d1.jpg")));

    // Removing the last entry leaves a blank one.
    let draft = app.engine.remove_entry(&key, 0)?;
    assert_eq!(draft.entry_count(), 1);
    assert!(!draft.has_content());
    assert_eq!(draft.pending_deletions.len(), 2);
    Ok(())
}

#[tokio::test]
async fn entry_edits_are_bounds_checked() -> Result<(), Box<dyn std::error::Error>> {
    let app = TestApp::new(FakeRemote::new())?;
    let defects = DraftKey::new("veh-1", SectionKind::Defects);
    app.engine.add_entry(&defects)?;
    app.engine.set_entry_field(&defects, 1, "remark", text("crack"))?;

    assert!(matches!(
        app.engine.set_entry_field(&defects, 5, "remark", text("x")),
        Err(EngineError::EntryOutOfRange { index: 5, len: 2, .. })
    ));
    assert!(matches!(
        app.engine.remove_entry(&defects, 2),
        Err(EngineError::EntryOutOfRange { .. })
    ));

    let engine = DraftKey::new("veh-1", SectionKind::Engine);
    assert!(matches!(app.engine.add_entry(&engine), Err(EngineError::NotRepeatable(_))));
    Ok(())
}

#[tokio::test]
async fn unknown_or_mistyped_fields_are_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let app = TestApp::new(FakeRemote::new())?;
    let key = DraftKey::new("veh-1", SectionKind::Frame);

    assert!(matches!(
        app.engine.set_field(&key, "colour", text("red")),
        Err(EngineError::Core(CoreError::UnknownField { .. }))
    ));
    assert!(matches!(
        app.engine.set_field(&key, "frame_damaged", text("yes")),
        Err(EngineError::Core(CoreError::FieldKindMismatch { .. }))
    ));
    assert_eq!(app.engine.draft(&key)?, None);
    Ok(())
}

#[tokio::test]
async fn promoted_asset_becomes_remote() -> Result<(), Box<dyn std::error::Error>> {
    let app = TestApp::new(FakeRemote::new())?;
    let key = DraftKey::new("veh-1", SectionKind::Frame);
    app.engine.set_field(&key, "chassis_photo", local_asset("c.jpg"))?;

    let draft = app.engine.promote_asset(&key, 0, "chassis_photo", &format!("{CDN}/c.jpg"))?;
    let SectionData::Form(fields) = &draft.data else {
        panic!("frame section is a form");
    };
    assert_eq!(fields["chassis_photo"], remote_asset("c.jpg"));
    assert!(draft.pending_deletions.is_empty());

    assert!(app.engine.promote_asset(&key, 0, "chassis_photo", "file:///x.jpg").is_err());
    Ok(())
}

// ============================================================================
// Persistence
// ============================================================================

#[tokio::test]
async fn identical_edits_are_written_once() -> Result<(), Box<dyn std::error::Error>> {
    let app = TestApp::new(FakeRemote::new())?;
    let key = DraftKey::new("veh-1", SectionKind::Calendar);

    app.engine.set_field(&key, "location", text("Depot 4"))?;
    assert_eq!(app.draft_writes(), 1);

    app.clock.advance(1_000);
    app.engine.set_field(&key, "location", text("Depot 4"))?;
    assert_eq!(app.draft_writes(), 1);

    app.engine.set_field(&key, "location", text("Depot 5"))?;
    assert_eq!(app.draft_writes(), 2);
    Ok(())
}

#[tokio::test]
async fn drafts_survive_a_restart() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("drafts.db");
    let clock = Arc::new(ManualClock::new(START_MS));
    let engine_key = DraftKey::new("veh-1", SectionKind::Engine);
    let calendar_key = DraftKey::new("veh-1", SectionKind::Calendar);

    {
        let remote = FakeRemote::new().with_record("veh-1", legacy_record());
        let app = TestApp::on_disk(&path, remote, clock.clone())?;
        app.engine.open_section(&engine_key, &CancellationToken::new()).await?;
        app.engine.set_field(&engine_key, "engine_photo", local_asset("new.jpg"))?;
        app.engine.set_field(&calendar_key, "time_slot", text("09:00"))?;
    }

    let app = TestApp::on_disk(&path, FakeRemote::new(), clock)?;
    let opened = app.engine.open_section(&engine_key, &CancellationToken::new()).await?;
    assert_eq!(opened.source, MergeSource::Draft);
    assert_eq!(app.remote().record_requests(), 0);
    assert!(opened.draft.pending_deletions.contains(&format!("{CDN}/engine.jpg")));

    let drafts = app.engine.drafts_for_entity(&EntityId::from("veh-1"))?;
    assert_eq!(drafts.len(), 2);

    // Unchanged content after a restart is still coalesced.
    app.engine.set_field(&calendar_key, "time_slot", text("09:00"))?;
    assert_eq!(app.draft_writes(), 0);
    Ok(())
}
