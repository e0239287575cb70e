use pda_assist::favorites::PresetToggle;
use pda_assist::gateway::{CatalogKind, FavoriteCategory};
use pda_assist::{AssistConfig, AssistError, ConfigValue, MemoryGateway, Session, SessionEvents};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::sync::Arc;

fn npc(name: &str, form_id: &str) -> Value {
    json!({
        "name": name,
        "editor_id": format!("Foo{name}"),
        "form_id": form_id,
        "base_id": "0x01000D61",
        "race": "NordRace",
        "gender": "Female"
    })
}

async fn with_catalogs() -> (Session<MemoryGateway>, SessionEvents, Arc<MemoryGateway>) {
    let gateway = Arc::new(MemoryGateway::new(ConfigValue::default()));
    gateway.set_catalog(
        CatalogKind::Npcs,
        json!({
            "timestamp": "2025-01-01 00:00:00",
            "plugins": {
                "Foo.esp": { "npcs": [npc("A", "0x1"), npc("B", "0x2"), npc("C", "0x3")] }
            }
        }),
    );
    gateway.set_catalog(
        CatalogKind::Equipment,
        json!({
            "plugins": {
                "Armor.esp": {
                    "armors": [{ "name": "Cuirass", "form_id": "0x800" }],
                    "weapons": [{ "name": "Sword", "form_id": "0x900" }]
                }
            }
        }),
    );
    let (mut session, events) = Session::new(Arc::clone(&gateway), &AssistConfig::default());
    session.bootstrap().await.expect("bootstrap");
    (session, events, gateway)
}

#[tokio::test(start_paused = true)]
async fn all_selected_tracks_catalog_total() {
    let (mut session, mut events, gateway) = with_catalogs().await;

    assert!(session.toggle_npc("Foo.esp", "0x1").unwrap());
    assert!(session.toggle_npc("Foo.esp", "0x2").unwrap());
    assert!(!session.favorites().npcs.all_selected("Foo.esp"));

    assert!(session.toggle_npc("Foo.esp", "0x3").unwrap());
    assert!(session.favorites().npcs.all_selected("Foo.esp"));

    assert!(!session.toggle_npc("Foo.esp", "0x2").unwrap());
    assert!(!session.favorites().npcs.all_selected("Foo.esp"));

    session.settle(&mut events).await;
    let stored = gateway.favorites(FavoriteCategory::Npcs).expect("npcs pushed");
    assert_eq!(stored["Foo.esp"]["allSelected"], json!(false));
    assert_eq!(
        stored["Foo.esp"]["npcs"],
        json!([
            { "name": "A", "editorId": "FooA", "formId": "0x1", "baseId": "0x01000D61", "race": "NordRace", "gender": "Female" },
            { "name": "C", "editorId": "FooC", "formId": "0x3", "baseId": "0x01000D61", "race": "NordRace", "gender": "Female" }
        ])
    );
    assert_eq!(gateway.favorite_saves().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn whole_plugin_toggle_fills_every_category() {
    let (mut session, mut events, gateway) = with_catalogs().await;

    assert_eq!(
        session
            .set_plugin_all(FavoriteCategory::Equipment, "Armor.esp", true)
            .unwrap(),
        2
    );
    assert!(session.favorites().equipment.all_selected("Armor.esp"));
    assert!(session.favorites().equipment.is_favorite("Armor.esp", "weapons", "0x900"));

    assert!(!session.toggle_equipment("Armor.esp", "armors", "0x800").unwrap());
    assert!(!session.favorites().equipment.all_selected("Armor.esp"));

    assert_eq!(
        session
            .set_plugin_all(FavoriteCategory::Equipment, "Armor.esp", false)
            .unwrap(),
        0
    );
    session.settle(&mut events).await;
    assert_eq!(gateway.favorites(FavoriteCategory::Equipment), Some(json!({})));

    let details: Vec<String> = gateway
        .log_events()
        .into_iter()
        .filter(|e| e.action == "favorite_plugin")
        .map(|e| e.detail)
        .collect();
    assert_eq!(
        details,
        vec![
            "equipment Armor.esp: all=true (0 -> 2 entries)".to_string(),
            "equipment Armor.esp: all=false (1 -> 0 entries)".to_string(),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn entries_missing_from_the_catalog_are_refused() {
    let (mut session, mut events, gateway) = with_catalogs().await;
    assert!(matches!(
        session.toggle_npc("Foo.esp", "0x99"),
        Err(AssistError::InvalidTarget(_))
    ));
    session.settle(&mut events).await;
    assert!(gateway.favorite_saves().is_empty());
}

#[tokio::test(start_paused = true)]
async fn catalog_refresh_recomputes_flags() {
    let (mut session, _events, gateway) = with_catalogs().await;
    session
        .set_plugin_all(FavoriteCategory::Npcs, "Foo.esp", true)
        .unwrap();
    assert!(session.favorites().npcs.all_selected("Foo.esp"));

    gateway.set_catalog(
        CatalogKind::Npcs,
        json!({ "plugins": { "Foo.esp": { "npcs": [
            npc("A", "0x1"), npc("B", "0x2"), npc("C", "0x3"), npc("D", "0x4")
        ] } } }),
    );
    assert_eq!(session.refresh_catalog(CatalogKind::Npcs).await.unwrap(), 1);
    assert!(!session.favorites().npcs.all_selected("Foo.esp"));
    assert_eq!(session.favorites().npcs.favorited_count("Foo.esp"), 3);
}

#[tokio::test(start_paused = true)]
async fn pinned_presets_cannot_be_removed() {
    let (mut session, mut events, gateway) = with_catalogs().await;
    assert_eq!(session.toggle_preset("- Zeroed Sliders -"), PresetToggle::Pinned);
    assert_eq!(session.toggle_preset("Curvy"), PresetToggle::Added);
    session.settle(&mut events).await;

    assert_eq!(
        gateway.favorites(FavoriteCategory::Presets),
        Some(json!({ "favorites": ["Curvy"] }))
    );
    assert_eq!(gateway.favorite_saves().len(), 1);
}
