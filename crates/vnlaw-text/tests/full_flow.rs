use std::sync::Arc;

use tempfile::TempDir;
use vnlaw_core::traits::TextBackend;
use vnlaw_core::types::{LegalMetadata, RetrievableUnit, StrategyKind};
use vnlaw_text::{MemoryTextBackend, MultiStrategyRetriever, TantivyBackend};

fn unit(id: &str, title: &str, body: &str) -> RetrievableUnit {
    RetrievableUnit {
        id: id.to_string(),
        title: title.to_string(),
        body: body.to_string(),
        parent_document_id: id.split("-p").next().unwrap_or(id).to_string(),
        order_index: 0,
        metadata: LegalMetadata { document_name: "Bộ luật Dân sự".into(), article_order: 1, ..Default::default() },
    }
}

fn corpus() -> Vec<RetrievableUnit> {
    vec![
        unit("91-1", "Điều 1. Phạm vi điều chỉnh", "Bộ luật này quy định địa vị pháp lý, chuẩn mực pháp lý về cách ứng xử của cá nhân."),
        unit("91-2", "Điều 2. Công nhận quyền dân sự", "Ở nước Cộng hòa xã hội chủ nghĩa Việt Nam, các quyền dân sự được công nhận."),
        unit("38-1", "Điều 1. Phạm vi điều chỉnh", "Luật này quy định về quản lý thuế đối với các loại thuế."),
        unit("38-2", "Điều 2. Đối tượng áp dụng", "Người nộp thuế, cơ quan quản lý thuế."),
    ]
}

#[test]
fn tantivy_contains_is_case_insensitive_substring_match() {
    let backend = TantivyBackend::in_memory().expect("index");
    backend.index(&corpus()).expect("index units");

    let hits = backend.contains("PHẠM VI ĐIỀU CHỈNH", 10).expect("contains");
    let ids: Vec<&str> = hits.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(ids, vec!["91-1", "38-1"]);

    // words present but not adjacent: no substring match
    assert!(backend.contains("quản lý cá nhân", 10).unwrap().is_empty());

    let limited = backend.contains("thuế", 1).unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].id, "38-1");
    assert_eq!(limited[0].metadata.document_name, "Bộ luật Dân sự");
}

#[test]
fn tantivy_and_memory_agree_on_partial_needles() {
    let units = vec![
        unit("38-0", "Căn cứ", "Căn cứ Luật số 38/2019/QH14 về quản lý thuế."),
        unit("91-2", "Điều 2", "Quyền dân sự được công nhận."),
    ];
    let tantivy = TantivyBackend::in_memory().unwrap();
    tantivy.index(&units).unwrap();
    let memory = MemoryTextBackend::with_units(units);

    for needle in ["2019/QH", "ân sự", "quản l", "38/2019/QH14", "QH", "d", "CĂN CỨ LUẬT", "không có"] {
        let ids = |hits: Vec<RetrievableUnit>| hits.into_iter().map(|u| u.id).collect::<Vec<_>>();
        let from_tantivy = ids(tantivy.contains(needle, 10).unwrap());
        let from_memory = ids(memory.contains(needle, 10).unwrap());
        assert_eq!(from_tantivy, from_memory, "needle {:?}", needle);
    }
    assert_eq!(tantivy.contains("2019/QH", 10).unwrap()[0].id, "38-0");
    assert_eq!(tantivy.contains("ân sự", 10).unwrap()[0].id, "91-2");
}

#[test]
fn tantivy_recency_and_first_follow_insertion_order() {
    let backend = TantivyBackend::in_memory().unwrap();
    backend.index(&corpus()).unwrap();

    let recent: Vec<String> = backend.most_recent(3).unwrap().into_iter().map(|u| u.id).collect();
    assert_eq!(recent, vec!["38-2", "38-1", "91-2"]);
    let first: Vec<String> = backend.first(2).unwrap().into_iter().map(|u| u.id).collect();
    assert_eq!(first, vec!["91-1", "91-2"]);
    assert!(backend.most_recent(0).unwrap().is_empty());
}

#[test]
fn tantivy_upsert_replaces_by_id() {
    let backend = TantivyBackend::in_memory().unwrap();
    backend.index(&corpus()).unwrap();
    backend.index(&[unit("91-1", "Điều 1. Phạm vi điều chỉnh", "Nội dung đã sửa đổi.")]).unwrap();

    assert_eq!(backend.num_units(), 4);
    let recent = backend.most_recent(1).unwrap();
    assert_eq!(recent[0].id, "91-1");
    assert_eq!(recent[0].body, "Nội dung đã sửa đổi.");
    assert!(backend.contains("địa vị pháp lý", 10).unwrap().is_empty());
}

#[test]
fn tantivy_reopen_keeps_units_and_order() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("tantivy");
    {
        let backend = TantivyBackend::open(&dir).unwrap();
        backend.index(&corpus()[..2]).unwrap();
    }
    let backend = TantivyBackend::open(&dir).unwrap();
    backend.index(&corpus()[2..]).unwrap();

    let recent: Vec<String> = backend.most_recent(4).unwrap().into_iter().map(|u| u.id).collect();
    assert_eq!(recent, vec!["38-2", "38-1", "91-2", "91-1"]);
}

#[test]
fn cascade_over_tantivy() {
    let tmp = TempDir::new().unwrap();
    let backend = Arc::new(TantivyBackend::recreate(&tmp.path().join("idx")).unwrap());
    backend.index(&corpus()).unwrap();
    let retriever = MultiStrategyRetriever::new(backend, 2);

    let results = retriever.retrieve("quyền dân sự", 3);
    let ids: Vec<&str> = results.iter().map(|r| r.unit.id.as_str()).collect();
    assert_eq!(ids, vec!["91-2", "38-2", "38-1"]);
    assert_eq!(results[0].strategy_used, StrategyKind::ExactPhrase);
    assert_eq!(results[1].strategy_used, StrategyKind::Recency);
}
