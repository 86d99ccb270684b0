mod util;

use chub_search::config::Endpoints;
use chub_search::host::{CardImporter, DirectoryImporter, Notifier};
use chub_search::model::types::{NO_DESCRIPTION, SearchQuery};
use chub_search::remote::RemoteClient;
use chub_search::remote::client::{DOWNLOAD_FAILED, TAG_FETCH_LIMIT};
use chub_search::remote::transport::ProxyMethod;
use serde_json::json;
use std::sync::Mutex;
use tempfile::TempDir;
use util::{FakeTransport, TestTracing};

const SEARCH: &str = "https://api.chub.ai/search";
const TAGS: &str = "https://api.chub.ai/tags";
const AVATARS: &str = "https://avatars.charhub.io/avatars";

fn client(fake: &FakeTransport) -> RemoteClient<FakeTransport> {
    RemoteClient::new(fake.clone(), Endpoints::default())
}

#[derive(Default)]
struct RecordingNotifier {
    seen: Mutex<Vec<(String, String)>>,
}

impl Notifier for RecordingNotifier {
    fn error(&self, title: &str, detail: &str) {
        self.seen
            .lock()
            .unwrap()
            .push((title.to_string(), detail.to_string()));
    }
}

impl RecordingNotifier {
    fn count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[tokio::test]
async fn search_normalizes_nodes_and_defaults() {
    let body = json!({
        "data": { "nodes": [
            {
                "id": 7,
                "name": "Elara",
                "tagline": "",
                "description": "An elven mage",
                "fullPath": "alice/elara",
                "topics": ["elf", "mage"],
                "avatar_url": "https://img/elara.webp",
                "max_res_url": "https://img/elara.png"
            },
            { "name": "Nobody", "fullPath": "solo" },
            "not a node"
        ]}
    });
    let fake = FakeTransport::new().on_get(SEARCH, 200, "application/json", body.to_string());
    let records = client(&fake).search(&SearchQuery::default()).await;

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].description, "An elven mage");
    assert_eq!(records[0].author, "alice");
    assert_eq!(records[0].tags, vec!["elf", "mage"]);
    assert_eq!(records[0].card_image_url, "https://img/elara.png");
    assert_eq!(records[1].description, NO_DESCRIPTION);
    assert_eq!(records[1].author, "Unknown");
}

#[tokio::test]
async fn search_sends_query_parameters_to_target() {
    let fake = FakeTransport::new().on_get(SEARCH, 200, "application/json", r#"{"data":{"nodes":[]}}"#);
    let query = SearchQuery {
        search_term: "elf queen".into(),
        include_tags: vec!["elf".into(), "mage".into()],
        page: 3,
        results_per_page: 25,
        ..SearchQuery::default()
    };
    client(&fake).search(&query).await;

    let target = &fake.targets()[0];
    let url = reqwest::Url::parse(target).unwrap();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    assert!(pairs.contains(&("search".into(), "elf queen".into())));
    assert!(pairs.contains(&("tags".into(), "elf,mage".into())));
    assert!(pairs.contains(&("page".into(), "3".into())));
    assert!(pairs.contains(&("first".into(), "25".into())));
    assert!(!pairs.iter().any(|(k, _)| k == "exclude_tags"));
}

#[tokio::test]
async fn search_failures_degrade_to_empty() {
    let tracing = TestTracing::new();
    let _guard = tracing.install();

    let failing = FakeTransport::new().fail_get(SEARCH);
    assert!(client(&failing).search(&SearchQuery::default()).await.is_empty());

    let rejected = FakeTransport::new().on_get(SEARCH, 503, "text/plain", "busy");
    assert!(client(&rejected).search(&SearchQuery::default()).await.is_empty());

    let garbage = FakeTransport::new().on_get(SEARCH, 200, "application/json", "<html>");
    assert!(client(&garbage).search(&SearchQuery::default()).await.is_empty());

    tracing.assert_contains("catalog search failed");
}

#[tokio::test]
async fn tag_catalog_prefers_post_and_reads_wrapped_records() {
    let fake = FakeTransport::new().on_post(
        TAGS,
        200,
        json!({ "tags": [{ "tag": "Warrior" }, "mage", { "tag": null }, 42, "  "] }).to_string(),
    );
    let catalog = client(&fake).fetch_tag_catalog().await;

    let tags: Vec<&str> = catalog.iter().collect();
    assert_eq!(tags, vec!["mage", "Warrior"]);
    let requests = fake.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, ProxyMethod::Post(json!({})));
}

#[tokio::test]
async fn tag_catalog_falls_back_to_get_with_limit() {
    let fake = FakeTransport::new()
        .on_post(TAGS, 405, "")
        .on_get(TAGS, 200, "application/json", r#"["elf","Dragon","angel"]"#);
    let catalog = client(&fake).fetch_tag_catalog().await;

    assert_eq!(catalog.iter().collect::<Vec<_>>(), vec!["angel", "Dragon", "elf"]);
    let targets = fake.targets();
    assert_eq!(targets.len(), 2);
    assert!(targets[1].ends_with(&format!("limit={TAG_FETCH_LIMIT}")));
}

#[tokio::test]
async fn tag_catalog_is_empty_when_both_attempts_fail() {
    let fake = FakeTransport::new().on_post(TAGS, 500, "");
    let catalog = client(&fake).fetch_tag_catalog().await;
    assert!(catalog.is_empty());
}

#[tokio::test]
async fn download_uses_png_and_names_file_from_path() {
    let dir = TempDir::new().unwrap();
    let fake = FakeTransport::new().on_get(
        &format!("{AVATARS}/alice/elara/chara_card_v2.png"),
        200,
        "image/png",
        vec![0x89, b'P', b'N', b'G'],
    );
    let importer = DirectoryImporter::new(dir.path());
    let notifier = RecordingNotifier::default();
    let written = client(&fake)
        .download_card("alice/elara", "", &importer, &notifier)
        .await;

    assert_eq!(written, vec![dir.path().join("alice_elara.png")]);
    assert_eq!(std::fs::read(&written[0]).unwrap(), vec![0x89, b'P', b'N', b'G']);
    assert_eq!(notifier.count(), 0);
}

#[tokio::test]
async fn download_falls_back_to_webp_avatar() {
    let dir = TempDir::new().unwrap();
    let fake = FakeTransport::new()
        .on_get("https://cards.example/elara.png", 404, "text/plain", "")
        .on_get(
            &format!("{AVATARS}/alice/elara/avatar.webp"),
            200,
            "image/webp",
            vec![1, 2, 3],
        );
    let importer = DirectoryImporter::new(dir.path());
    let written = client(&fake)
        .download_card(
            "alice/elara",
            "https://cards.example/elara.png",
            &importer,
            &RecordingNotifier::default(),
        )
        .await;

    assert_eq!(written, vec![dir.path().join("alice_elara.webp")]);
    assert_eq!(
        fake.targets(),
        vec![
            "https://cards.example/elara.png".to_string(),
            format!("{AVATARS}/alice/elara/avatar.webp"),
        ]
    );
}

#[tokio::test]
async fn download_double_failure_notifies_exactly_once() {
    let dir = TempDir::new().unwrap();
    let fake = FakeTransport::new()
        .fail_get(&format!("{AVATARS}/alice/elara/chara_card_v2.png"))
        .on_get(&format!("{AVATARS}/alice/elara/avatar.webp"), 500, "text/plain", "");
    let importer = DirectoryImporter::new(dir.path().join("drop"));
    let notifier = RecordingNotifier::default();
    let written = client(&fake)
        .download_card("alice/elara", "", &importer, &notifier)
        .await;

    assert!(written.is_empty());
    assert_eq!(notifier.count(), 1);
    assert_eq!(notifier.seen.lock().unwrap()[0].0, DOWNLOAD_FAILED);
    assert!(importer.imported().is_empty());
}

#[tokio::test]
async fn import_failure_is_reported_not_raised() {
    struct Refusing;
    impl CardImporter for Refusing {
        fn import(
            &self,
            _files: Vec<chub_search::model::types::CardFile>,
        ) -> anyhow::Result<Vec<std::path::PathBuf>> {
            anyhow::bail!("read-only drop folder")
        }
    }

    let fake = FakeTransport::new().on_get(AVATARS, 200, "image/png", vec![0]);
    let notifier = RecordingNotifier::default();
    let written = client(&fake)
        .download_card("alice/elara", "", &Refusing, &notifier)
        .await;

    assert!(written.is_empty());
    assert_eq!(notifier.count(), 1);
    assert!(notifier.seen.lock().unwrap()[0].1.contains("read-only"));
}
