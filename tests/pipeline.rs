//! End-to-end ingestion pipeline tests.
//!
//! These exercise the full detect → parse → normalize → persist path over
//! the in-memory store.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use servicemap_kernel::{
    ConfidenceBand, EvidenceStore, IngestOptions, InMemoryEvidenceStore, KernelConfig,
    ServiceGraphKernel, ServiceName,
};

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn kernel() -> ServiceGraphKernel<InMemoryEvidenceStore> {
    ServiceGraphKernel::with_defaults(Arc::new(InMemoryEvidenceStore::new()))
}

fn cancel() -> CancellationToken {
    CancellationToken::new()
}

// ─────────────────────────────────────────────────────────────────────────────
// ROUTER LOG
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_router_log_single_line() {
    let kernel = kernel();
    let raw = "2024-07-04 10:30:45 [INFO] 192.168.1.100 -> 192.168.1.200:8080 GET /api/users 200 125ms";

    let result = kernel
        .ingest(raw, IngestOptions::new().with_source_id("router"), &cancel())
        .await
        .unwrap();

    assert_eq!(result.source_type, "router-log");
    assert_eq!(result.raw_claims_extracted, 1);
    assert_eq!(result.claims_after_normalization, 1);
    assert_eq!(result.claims_saved, 1);
    assert_eq!(result.error_count, 0);
    assert!(result.is_balanced());

    let claims = kernel
        .store()
        .find_by_edge(
            &ServiceName::new("web-portal"),
            &ServiceName::new("user-management-service"),
        )
        .await
        .unwrap();
    assert_eq!(claims.len(), 1);

    let claim = claims[0].claim();
    assert_eq!(claim.source(), "router-log");
    assert_eq!(claim.confidence_band(), ConfidenceBand::VeryHigh);
    let metadata = claim.metadata();
    assert_eq!(metadata.get("target_port").map(String::as_str), Some("8080"));
    assert_eq!(metadata.get("http_status").map(String::as_str), Some("200"));
    assert_eq!(metadata.get("response_time_ms").map(String::as_str), Some("125"));

    // Provenance kept the pre-calibration confidence.
    assert_eq!(claims[0].provenance().len(), 1);
    assert_eq!(claims[0].provenance()[0].original_confidence, 1.0);
}

// ─────────────────────────────────────────────────────────────────────────────
// CONFIGURATION FILE
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_configuration_with_kafka_and_jdbc() {
    let kernel = kernel();
    let raw = "kafka.brokers=kafka-service:9092\n\
               spring.datasource.url=jdbc:mysql://mysql-primary:3306/portal\n";

    let result = kernel
        .ingest(
            raw,
            IngestOptions::new().with_source_type("configuration-file"),
            &cancel(),
        )
        .await
        .unwrap();
    assert_eq!(result.claims_saved, 2);

    let all = kernel.store().find_all().await.unwrap();
    let targets: Vec<&str> = all.iter().map(|c| c.claim().to_service().as_str()).collect();
    assert!(targets.contains(&"kafka-service"));
    // Alias mysql-primary → mysql-database applied during normalization.
    assert!(targets.contains(&"mysql-database"));

    for claim in &all {
        assert_eq!(claim.claim().confidence_band(), ConfidenceBand::VeryHigh);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// DETECTION
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_content_probe_detection() {
    let kernel = kernel();

    let scan = "HOST: 10.0.0.1 (web)\nPORT: 80/tcp open http\n\
                HOST: 10.0.0.2 (db)\nPORT: 3306/tcp open mysql\n";
    let result = kernel.ingest(scan, IngestOptions::new(), &cancel()).await.unwrap();
    assert_eq!(result.source_type, "network-discovery");

    let spans = "span_id:x1 service:a downstream:b duration:40ms status:OK\n";
    let result = kernel.ingest(spans, IngestOptions::new(), &cancel()).await.unwrap();
    assert_eq!(result.source_type, "observability");
}

#[tokio::test]
async fn test_unknown_content_falls_back_to_router_log() {
    let kernel = kernel();
    let result = kernel
        .ingest("nothing recognizable here\n", IngestOptions::new(), &cancel())
        .await
        .unwrap();
    assert_eq!(result.source_type, "router-log");
    assert_eq!(result.raw_claims_extracted, 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// BOUNDARY BEHAVIOR
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_empty_and_whitespace_inputs() {
    let kernel = kernel();
    for raw in ["", "   ", "\n\r\n  \n"] {
        let result = kernel.ingest(raw, IngestOptions::new(), &cancel()).await.unwrap();
        assert_eq!(result.raw_claims_extracted, 0, "input {raw:?}");
        assert_eq!(result.claims_saved, 0);
        assert_eq!(result.error_count, 0);
    }
    assert_eq!(kernel.store().claim_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_self_loop_lines_silently_dropped() {
    let kernel = kernel();
    let result = kernel
        .ingest(
            "auth-service -> auth-service\nweb -> auth-service\n",
            IngestOptions::new().with_source_type("custom-text"),
            &cancel(),
        )
        .await
        .unwrap();
    assert_eq!(result.claims_saved, 1);
    assert_eq!(result.error_count, 0);
}

#[tokio::test]
async fn test_every_stored_claim_has_distinct_endpoints() {
    let kernel = kernel();
    kernel
        .ingest(
            "a -> b\nb -> c\nc -> a\na -> b 0.9 manual\n",
            IngestOptions::new().with_source_type("custom-text"),
            &cancel(),
        )
        .await
        .unwrap();

    for claim in kernel.store().find_all().await.unwrap() {
        assert_ne!(claim.claim().from_service(), claim.claim().to_service());
        assert!(!claim.provenance().is_empty());
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RE-INGESTION
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_reingest_doubles_multiplicity_keeps_winner() {
    let kernel = kernel();
    // Duplicates within one batch merge; the 0.9 beta claim is the base.
    let raw = "a -> b 0.7 alpha\na -> b 0.9 beta\n";
    let options = || IngestOptions::new().with_source_type("custom-text");

    let first = kernel.ingest(raw, options(), &cancel()).await.unwrap();
    assert_eq!(first.raw_claims_extracted, 2);
    assert_eq!(first.claims_after_normalization, 1);
    // The absorbed duplicate is a merge, not an error.
    assert_eq!(first.claims_merged, 1);
    assert_eq!(first.error_count, 0);
    assert!(first.is_balanced());
    assert_eq!(kernel.store().claim_count().await.unwrap(), 1);

    let winner_once = kernel
        .resolve()
        .await
        .unwrap()
        .winner(&ServiceName::new("a"), &ServiceName::new("b"))
        .unwrap()
        .source()
        .to_string();
    assert_eq!(winner_once, "beta");

    // Re-ingesting appends: multiplicity doubles, winner is unchanged.
    kernel.ingest(raw, options(), &cancel()).await.unwrap();
    assert_eq!(kernel.store().claim_count().await.unwrap(), 2);

    let edge_claims = kernel
        .store()
        .find_by_edge(&ServiceName::new("a"), &ServiceName::new("b"))
        .await
        .unwrap();
    assert_eq!(edge_claims.len(), 2);
    assert_eq!(edge_claims[0].merged_count(), 2);

    let winner_twice = kernel
        .resolve()
        .await
        .unwrap()
        .winner(&ServiceName::new("a"), &ServiceName::new("b"))
        .unwrap()
        .source()
        .to_string();
    assert_eq!(winner_once, winner_twice);
}

// ─────────────────────────────────────────────────────────────────────────────
// MULTI-SOURCE MERGE
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_mixed_sources_build_one_graph() {
    let kernel = ServiceGraphKernel::new(
        Arc::new(InMemoryEvidenceStore::new()),
        KernelConfig::default(),
    );
    let cancel = cancel();

    kernel
        .ingest(
            "2024-07-04 10:30:45 [INFO] 192.168.1.100 -> 192.168.1.200:8080 GET /api/users 200 125ms",
            IngestOptions::new(),
            &cancel,
        )
        .await
        .unwrap();
    kernel
        .ingest(
            "web-portal -> user-management-service\nuser-management-service -> mysql-primary\n",
            IngestOptions::new().with_source_type("custom-text"),
            &cancel,
        )
        .await
        .unwrap();

    let graph = kernel.resolve().await.unwrap();
    // Two distinct edges: the duplicated web-portal edge resolves to one.
    assert_eq!(graph.edge_count(), 2);
    assert!(graph
        .winner(
            &ServiceName::new("user-management-service"),
            &ServiceName::new("mysql-database"),
        )
        .is_some());

    let closure = kernel.transitive().await.unwrap();
    let reach: Vec<&str> = closure[&ServiceName::new("web-portal")]
        .iter()
        .map(|s| s.as_str())
        .collect();
    assert_eq!(reach, vec!["user-management-service", "mysql-database"]);
}
