//! Repair evaluation and application during refresh.

mod support;

use serde_json::json;

use notebridge_cache::{plan_repair, IssueKind, VaultCache};
use notebridge_core::frontmatter::parse_frontmatter;
use notebridge_core::{CacheConfig, SourceError, WriteCapabilities};

use support::{read_only, test_config, writable, MemorySource, Op};

const STRING_TAGS: &str = "---\ntitle: T\ntags: a, b\n---\nBody\n";

fn repairing(dry_run: bool) -> CacheConfig {
    CacheConfig {
        repair_enabled: true,
        repair_dry_run: dry_run,
        ..test_config()
    }
}

fn has_issue(cache: &VaultCache, path: &str, kind: IssueKind) -> bool {
    cache
        .get_diagnostics()
        .get(path)
        .is_some_and(|issues| issues.iter().any(|i| i.kind == kind))
}

fn frontmatter_tags_of(source: &MemorySource, path: &str) -> serde_json::Value {
    let content = source.content_of(path).unwrap();
    parse_frontmatter(&content).frontmatter()["tags"].clone()
}

#[tokio::test]
async fn repair_disabled_plans_nothing() {
    let source = MemorySource::with_files(&[("s.md", STRING_TAGS)]);
    let cache = writable(&source, test_config());

    let stats = cache.build_vault_cache().await.stats().cloned().unwrap();

    assert_eq!(stats.repairs_planned, 0);
    assert!(source.writes().is_empty());
    // The malformed field is still reported.
    assert!(has_issue(&cache, "s.md", IssueKind::TagsNotArray));
}

#[tokio::test]
async fn dry_run_plans_but_never_writes() {
    let source = MemorySource::with_files(&[("s.md", STRING_TAGS), ("none.md", "plain body")]);
    let cache = writable(&source, repairing(true));

    let stats = cache.build_vault_cache().await.stats().cloned().unwrap();

    assert_eq!(stats.repairs_planned, 2);
    assert_eq!(stats.repairs_applied, 0);
    assert!(source.writes().is_empty());
    assert_eq!(source.content_of("s.md").unwrap(), STRING_TAGS);

    let plan = plan_repair("s.md", &parse_frontmatter(STRING_TAGS), &["a".into(), "b".into()]).unwrap();
    assert!(!cache.apply_repair(&plan).await);
    assert!(source.writes().is_empty());
}

#[tokio::test]
async fn repair_rewrites_string_tags_as_array() {
    let source = MemorySource::with_files(&[("s.md", STRING_TAGS), ("ok.md", "---\ntags: [x]\n---\n")]);
    let cache = writable(&source, repairing(false));

    let stats = cache.build_vault_cache().await.stats().cloned().unwrap();

    assert_eq!(stats.repairs_planned, 1);
    assert_eq!(stats.repairs_applied, 1);
    assert_eq!(source.writes().len(), 1);
    assert_eq!(frontmatter_tags_of(&source, "s.md"), json!(["a", "b"]));

    let content = source.content_of("s.md").unwrap();
    assert!(content.ends_with("---\nBody\n"));
    assert!(content.contains("title: T"));

    // The index reflects the written file, so the next pass has nothing to do.
    assert_eq!(cache.get_metadata("s.md").unwrap().tags, vec!["a", "b"]);
    let again = cache.refresh_cache(false).await.stats().cloned().unwrap();
    assert_eq!(again.skipped, 2);
    assert_eq!(again.repairs_planned, 0);
    assert_eq!(source.writes().len(), 1);
}

#[tokio::test]
async fn recovered_note_gains_frontmatter() {
    let source = MemorySource::with_files(&[("r.md", "Body #mytag\n")]);
    source.fail_times(Op::Structured, "r.md", SourceError::Other("boom".into()), 1);
    let cache = writable(&source, repairing(false));

    let stats = cache.build_vault_cache().await.stats().cloned().unwrap();

    assert_eq!(stats.recovered, 1);
    assert_eq!(stats.repairs_applied, 1);
    assert!(has_issue(&cache, "r.md", IssueKind::MissingFrontmatter));
    let content = source.content_of("r.md").unwrap();
    assert!(content.starts_with("---\n"));
    assert!(content.ends_with("---\nBody #mytag\n"));
    assert_eq!(frontmatter_tags_of(&source, "r.md"), json!(["mytag"]));
}

#[tokio::test]
async fn repairs_stop_at_budget() {
    let source = MemorySource::new();
    for i in 0..5 {
        source.put(&format!("s{i}.md"), STRING_TAGS);
    }
    let config = CacheConfig {
        max_repairs_per_run: 2,
        refresh_concurrency: 1,
        ..repairing(false)
    };
    let cache = writable(&source, config);

    let stats = cache.build_vault_cache().await.stats().cloned().unwrap();

    // Files after the budget runs out are not evaluated at all.
    assert_eq!(stats.repairs_planned, 2);
    assert_eq!(stats.repairs_applied, 2);
    assert_eq!(source.writes().len(), 2);

    // A new pass gets a fresh budget for the remaining files.
    for i in 0..5 {
        source.put(&format!("s{i}.md"), &source.content_of(&format!("s{i}.md")).unwrap());
    }
    let next = cache.refresh_cache(false).await.stats().cloned().unwrap();
    assert_eq!(next.repairs_planned, 2);
    assert_eq!(next.repairs_applied, 2);
    assert_eq!(source.writes().len(), 4);
}

#[tokio::test]
async fn failed_write_returns_its_budget_slot() {
    let source = MemorySource::with_files(&[("a.md", STRING_TAGS), ("b.md", STRING_TAGS)]);
    source.fail(Op::Write, "a.md", SourceError::Other("read-only".into()));
    let config = CacheConfig {
        max_repairs_per_run: 1,
        refresh_concurrency: 1,
        ..repairing(false)
    };
    let cache = writable(&source, config);

    let stats = cache.build_vault_cache().await.stats().cloned().unwrap();

    assert_eq!(stats.repairs_applied, 1);
    assert!(has_issue(&cache, "a.md", IssueKind::RepairFailed));
    assert_eq!(source.writes(), vec![("b.md".to_string(), source.content_of("b.md").unwrap())]);
    assert_eq!(source.content_of("a.md").unwrap(), STRING_TAGS);
}

#[tokio::test]
async fn missing_write_capability_is_recorded() {
    let source = MemorySource::with_files(&[("s.md", STRING_TAGS)]);
    let cache = read_only(&source, repairing(false));

    let stats = cache.build_vault_cache().await.stats().cloned().unwrap();

    assert_eq!(stats.repairs_planned, 1);
    assert_eq!(stats.repairs_applied, 0);
    let issues = cache.get_diagnostics();
    let failed = issues["s.md"]
        .iter()
        .find(|i| i.kind == IssueKind::RepairFailed)
        .unwrap();
    assert_eq!(failed.detail.as_deref(), Some("no write capability"));
}

#[tokio::test]
async fn frontmatter_upsert_is_used_without_rewrite() {
    let source = MemorySource::with_files(&[("s.md", STRING_TAGS)]);
    let writers = WriteCapabilities {
        rewrite: None,
        upsert_frontmatter: Some(source.clone()),
    };
    let cache = VaultCache::new(source.clone(), writers, repairing(false));

    let stats = cache.build_vault_cache().await.stats().cloned().unwrap();

    assert_eq!(stats.repairs_applied, 1);
    assert_eq!(frontmatter_tags_of(&source, "s.md"), json!(["a", "b"]));
    assert_eq!(
        parse_frontmatter(&source.content_of("s.md").unwrap()).frontmatter()["title"],
        json!("T")
    );
}
