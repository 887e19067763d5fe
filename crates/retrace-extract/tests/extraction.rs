//! End-to-end extraction scenarios over literal event streams.

use retrace_extract::{Extractor, RecordingParser, Tolerance, identify_variables};

use retrace_core::{ActionType, InteractionRank};

fn extract_json(data: &str, tolerance: Tolerance) -> Vec<retrace_core::SemanticAction> {
    let mut parser = RecordingParser::new();
    parser.parse_json(data.as_bytes()).unwrap();
    let mut extractor = Extractor::new(tolerance);
    extractor.extract(parser.events())
}

#[test]
fn single_click_with_stable_id() {
    let events = r#"[
        {"source":"rrweb","timestamp":1,"type":4,"data":{"href":"https://x.test/","width":1280,"height":720}},
        {"source":"rrweb","timestamp":2,"type":2,"data":{"node":{"id":1,"type":0,"tagName":"html","childNodes":[{"id":2,"type":2,"tagName":"body","childNodes":[{"id":7,"type":2,"tagName":"button","attributes":{"id":"submit"},"childNodes":[]}]}]}}},
        {"source":"rrweb","timestamp":3,"type":3,"data":{"source":0,"adds":[{"parentId":7,"node":{"id":8,"type":2,"tagName":"div","childNodes":[]}}]}},
        {"source":"rrweb","timestamp":4,"type":3,"data":{"source":2,"type":2,"id":7,"x":10,"y":20}}
    ]"#;

    let actions = extract_json(events, Tolerance::Medium);
    assert_eq!(actions.len(), 2);

    assert_eq!(actions[0].sequence_id, 1);
    assert_eq!(actions[0].action_type, ActionType::Navigate);
    assert_eq!(actions[0].value, "https://x.test/");
    assert_eq!(actions[0].interaction_rank, InteractionRank::High);

    assert_eq!(actions[1].sequence_id, 2);
    assert_eq!(actions[1].action_type, ActionType::Click);
    assert_eq!(actions[1].target.selector, "#submit");
    assert_eq!(actions[1].interaction_rank, InteractionRank::High);
}

#[test]
fn debounced_search_drops_consequential_navigation() {
    let events = r#"[
        {"source":"rrweb","timestamp":1,"type":4,"data":{"href":"https://g.test/"}},
        {"source":"custom","timestamp":2,"type":"input","value":"c","target":{"tag":"input","selector":"input[name='q']"}},
        {"source":"custom","timestamp":3,"type":"input","value":"ca","target":{"tag":"input","selector":"input[name='q']"}},
        {"source":"custom","timestamp":4,"type":"input","value":"cat","target":{"tag":"input","selector":"input[name='q']"}},
        {"source":"custom","timestamp":5,"type":"input","value":"cats","target":{"tag":"input","selector":"input[name='q']"}},
        {"source":"rrweb","timestamp":6,"type":4,"data":{"href":"https://g.test/search?q=cats"}}
    ]"#;

    let actions = extract_json(events, Tolerance::Medium);
    assert_eq!(actions.len(), 2);
    assert_eq!(actions[0].action_type, ActionType::Navigate);
    assert_eq!(actions[1].action_type, ActionType::Input);
    assert_eq!(actions[1].value, "cats");
    assert_eq!(actions[1].target.selector, "input[name='q']");
}

#[test]
fn dynamic_id_falls_through_to_structural_selector() {
    let events = r#"[
        {"source":"rrweb","timestamp":1,"type":2,"data":{"node":{"id":1,"type":0,"tagName":"body","childNodes":[{"id":5,"type":2,"tagName":"button","attributes":{"id":"btn-a7f3d2","class":"css-x9k2p"},"childNodes":[]}]}}},
        {"source":"rrweb","timestamp":2,"type":3,"data":{"source":2,"type":2,"id":5}}
    ]"#;

    let actions = extract_json(events, Tolerance::Medium);
    assert_eq!(actions.len(), 1);
    let selector = &actions[0].target.selector;
    assert_ne!(selector, "#btn-a7f3d2");
    assert_eq!(selector, "body > button:nth-child(1)");
}

#[test]
fn stray_en_input_becomes_enter_keypress() {
    let events = r##"[
        {"source":"custom","timestamp":1,"type":"input","value":"cats","target":{"tag":"input","selector":"#search"}},
        {"source":"custom","timestamp":2,"type":"input","value":"en"}
    ]"##;

    let actions = extract_json(events, Tolerance::Medium);
    assert_eq!(actions.len(), 2);
    assert_eq!(actions[1].action_type, ActionType::Keypress);
    assert_eq!(actions[1].value, "Enter");
    assert_eq!(actions[1].target.selector, "#search");
}

#[test]
fn low_tolerance_keeps_only_high_rank() {
    let events = r#"[
        {"source":"custom","timestamp":1,"type":"click","target":{"tag":"button","selector":".submit","text":"Go"}},
        {"source":"custom","timestamp":2,"type":"click","target":{"tag":"div","selector":".btn-styled","text":"Maybe"}}
    ]"#;

    let actions = extract_json(events, Tolerance::Low);
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].sequence_id, 1);
    assert_eq!(actions[0].target.tag, "button");
}

#[test]
fn empty_event_list_yields_nothing() {
    let actions = extract_json("[]", Tolerance::Medium);
    assert!(actions.is_empty());

    let params = futures_block_on(identify_variables(&actions, None));
    assert!(params.is_empty());
}

#[test]
fn snapshot_only_recording_yields_no_actions() {
    let events = r#"[
        {"source":"rrweb","timestamp":1,"type":2,"data":{"node":{"id":1,"type":0,"tagName":"html","childNodes":[]}}}
    ]"#;
    let actions = extract_json(events, Tolerance::Medium);
    assert!(actions.is_empty());
}

#[test]
fn sequence_ids_are_dense_after_filtering() {
    let events = r#"[
        {"source":"rrweb","timestamp":1,"type":4,"data":{"href":"https://x.test/"}},
        {"source":"custom","timestamp":2,"type":"keydown","key":"Shift"},
        {"source":"custom","timestamp":3,"type":"click","target":{"tag":"a","selector":".link","text":"Next"}},
        {"source":"custom","timestamp":4,"type":"keydown","key":"k"}
    ]"#;

    let actions = extract_json(events, Tolerance::Medium);
    let ids: Vec<u32> = actions.iter().map(|action| action.sequence_id).collect();
    let expected: Vec<u32> = (1..=actions.len() as u32).collect();
    assert_eq!(ids, expected);
}

#[test]
fn mutation_context_attaches_to_next_click() {
    let events = r#"[
        {"source":"rrweb","timestamp":1,"type":2,"data":{"node":{"id":1,"type":0,"tagName":"body","childNodes":[{"id":2,"type":2,"tagName":"button","attributes":{"id":"open"},"childNodes":[]}]}}},
        {"source":"rrweb","timestamp":2,"type":3,"data":{"source":0,"adds":[{"parentId":1,"node":{"id":9,"type":2,"tagName":"a","attributes":{"aria-label":"New item"},"childNodes":[]}}]}},
        {"source":"rrweb","timestamp":3,"type":3,"data":{"source":2,"type":2,"id":2}}
    ]"#;

    let actions = extract_json(events, Tolerance::Medium);
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].action_type, ActionType::Click);
    assert_eq!(actions[0].context.len(), 1);
    assert_eq!(actions[0].context[0].tag, "a");
    assert_eq!(actions[0].context[0].selector, "a[aria-label='New item']");
}

fn futures_block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(future)
}
