mod util;

use chub_search::config::{ChubSettings, Endpoints};
use chub_search::model::types::TagCatalog;
use chub_search::remote::RemoteClient;
use chub_search::search::form::Trigger;
use chub_search::search::orchestrator::{ApplyOutcome, ContainerId};
use chub_search::ui::autocomplete::{AutocompleteKey, KeyOutcome};
use chub_search::ui::render::{HOVER_OFFSET, HoverOverlay, ListView, Point};
use chub_search::ui::session::{PopupSession, TagField};
use serde_json::json;
use std::time::{Duration, Instant};
use util::FakeTransport;

const SEARCH: &str = "https://api.chub.ai/search";

fn catalog_body() -> String {
    let long = "d".repeat(240);
    json!({ "data": { "nodes": [
        { "name": "Elara", "tagline": "Elven mage", "fullPath": "alice/elara", "topics": ["elf", "mage"] },
        { "name": "Bram", "description": long, "fullPath": "bob/bram", "topics": ["mage"] },
    ]}})
    .to_string()
}

#[tokio::test]
async fn autocomplete_commit_drives_search_render_and_hover() {
    let fake = FakeTransport::new()
        .on_post("https://api.chub.ai/tags", 200, r#"["mage","magic","warrior"]"#)
        .on_get(SEARCH, 200, "application/json", catalog_body());
    let client = RemoteClient::new(fake.clone(), Endpoints::default());

    let mut session = PopupSession::open(ContainerId(1), ChubSettings::default());
    session.set_tag_catalog(client.fetch_tag_catalog().await);

    let start = Instant::now();
    for c in "elf, ma".chars() {
        session.type_tag_char(TagField::Include, c, start);
    }
    assert_eq!(
        session.tag_input(TagField::Include).options(),
        &["mage".to_string(), "magic".to_string()]
    );
    assert!(session.tick(start + Duration::from_millis(100)).is_none());

    assert_eq!(
        session.tag_key(TagField::Include, AutocompleteKey::ArrowDown),
        KeyOutcome::Consumed
    );
    assert_eq!(
        session.tag_key(TagField::Include, AutocompleteKey::Enter),
        KeyOutcome::Consumed
    );
    assert_eq!(session.tag_input(TagField::Include).value(), "elf, mage");

    let settle = start + Duration::from_millis(200);
    assert!(session.tick(settle).is_none());
    let ticket = session
        .tick(settle + Duration::from_millis(600))
        .expect("debounced search fires");
    assert_eq!(ticket.query.include_tags, vec!["elf", "mage"]);
    assert!(session.is_busy());

    let records = client.search(&ticket.query).await;
    assert_eq!(session.apply(ticket.complete(records)), ApplyOutcome::Painted(2));
    assert!(!session.is_busy());

    let cards = session.renderer().cards();
    assert_eq!(cards[1].short_description.chars().count(), 181);

    let mut overlay = HoverOverlay::default();
    let pointer = Point { x: 40, y: 10 };
    overlay.track(Some(1), pointer, session.renderer());
    assert!(overlay.is_visible());
    assert_eq!(overlay.content(), "d".repeat(240));
    assert_eq!(
        overlay.position(),
        Point {
            x: 40 + HOVER_OFFSET,
            y: 10 + HOVER_OFFSET
        }
    );
    overlay.track(None, pointer, session.renderer());
    assert!(!overlay.is_visible());

    let sent = fake.targets();
    assert!(sent.iter().any(|t| t.contains("tags=elf%2Cmage")));
}

#[tokio::test]
async fn closed_popup_ignores_late_results() {
    let fake = FakeTransport::new().on_get(SEARCH, 200, "application/json", catalog_body());
    let client = RemoteClient::new(fake, Endpoints::default());
    let start = Instant::now();

    let mut first = PopupSession::with_debounce(ContainerId(1), ChubSettings::default(), Duration::ZERO);
    first.trigger(Trigger::SearchButton, start);
    let ticket = first.tick(start).expect("fires immediately");
    drop(first);

    let mut reopened = PopupSession::with_debounce(ContainerId(2), ChubSettings::default(), Duration::ZERO);
    reopened.set_tag_catalog(TagCatalog::default());
    let late = ticket.complete(client.search(&ticket.query).await);
    assert_eq!(reopened.apply(late), ApplyOutcome::Detached);
    assert_eq!(reopened.renderer().view(), &ListView::Cards(Vec::new()));
}

#[tokio::test]
async fn unreachable_catalog_shows_empty_state() {
    let fake = FakeTransport::new().fail_get(SEARCH);
    let client = RemoteClient::new(fake, Endpoints::default());
    let start = Instant::now();

    let mut session = PopupSession::with_debounce(ContainerId(3), ChubSettings::default(), Duration::ZERO);
    session.trigger(Trigger::Nsfw, start);
    let ticket = session.tick(start).expect("fires immediately");
    let records = client.search(&ticket.query).await;
    assert_eq!(session.apply(ticket.complete(records)), ApplyOutcome::EmptyState);
    assert_eq!(session.renderer().view(), &ListView::Empty);
}
