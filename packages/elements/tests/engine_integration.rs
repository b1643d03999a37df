//! Integration tests for the extraction engine.
//!
//! These tests drive the full extraction workflow the way a site
//! module would:
//! 1. Build record specs and extractor templates
//! 2. Run them against JSON and HTML documents
//! 3. Follow pagination signals across documents
//! 4. Check dedup, skip and condition semantics end to end

use std::sync::Arc;

use elements::testing::{
    account_spec, accounts_json, history_html, init_tracing, transaction_spec, RecordingHighlighter,
};
use elements::{
    CleanDecimal, CleanText, Condition, Date, Dict, Document, ExtractError, Filter, ItemElement,
    ListElement, NextPage, Record, RecordSpec, Scope, Selector, TableCell, TableElement, Value,
};

/// Helper: the identities of a page's records.
fn ids(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.identity().unwrap_or_default())
        .collect()
}

/// Helper: a minimal spec with `id` (identity) and `label`.
fn entry_spec() -> Arc<RecordSpec> {
    RecordSpec::builder("entry")
        .identity("id")
        .field("label")
        .build()
}

#[test]
fn test_json_dict_extraction_in_document_order() {
    init_tracing();
    let doc = Document::json(
        r#"{"items": {"1": {"id": "1", "label": "  hello "}, "2": {"id": "2", "label": "world"}}}"#,
    )
    .unwrap();

    let list = ListElement::new().item_path("items").item(
        ItemElement::new(entry_spec())
            .field("id", Dict::path("id"))
            .field("label", CleanText::new(Dict::path("label"))),
    );

    let page = list.collect_page(&Scope::new(&doc)).unwrap();
    assert_eq!(ids(&page.records), ["1", "2"]);
    assert_eq!(page.records[0].get("label"), Some(&Value::from("hello")));
    assert_eq!(page.records[1].get("label"), Some(&Value::from("world")));
    assert_eq!(page.next_page, None);
}

#[test]
fn test_item_condition_drops_nodes_without_error() {
    init_tracing();
    // "should_be_even" exists only on item "1"; the bare miss on item
    // "2" gates it off silently.
    let doc = Document::json(
        r#"{"items": {"1": {"id": "1", "should_be_even": 2}, "2": {"id": "2"}}}"#,
    )
    .unwrap();

    let even = Condition::when(Selector::from_fn(|scope| {
        let value = Dict::path("should_be_even").evaluate(scope)?.into_value();
        Ok(Value::Bool(matches!(value, Value::Int(n) if n % 2 == 0)))
    }));

    let list = ListElement::new().item_path("items").item(
        ItemElement::new(entry_spec())
            .condition(even)
            .field("id", Dict::path("id")),
    );

    let page = list.collect_page(&Scope::new(&doc)).unwrap();
    assert_eq!(ids(&page.records), ["1"]);
}

#[test]
fn test_dict_lookup_contract() {
    init_tracing();
    let doc = Document::json(r#"{"a": {"b": "c", "d": null}}"#).unwrap();
    let scope = Scope::new(&doc);

    assert_eq!(
        Dict::path("a/b").evaluate(&scope).unwrap().into_value(),
        Value::from("c")
    );
    assert!(Dict::path("notfound")
        .evaluate(&scope)
        .unwrap_err()
        .is_not_found());
    assert_eq!(
        Dict::path("notfound")
            .with_default(Value::Null)
            .evaluate(&scope)
            .unwrap()
            .into_value(),
        Value::Null
    );
}

#[test]
fn test_duplicate_identity_in_table_raises_data_error() {
    init_tracing();
    let doc = Document::html(
        r#"
        <table>
          <thead><tr><th>Id</th><th>Label</th></tr></thead>
          <tbody>
            <tr><td>42</td><td>first</td></tr>
            <tr><td>42</td><td>second</td></tr>
          </tbody>
        </table>
        "#,
    );

    let table = TableElement::new("thead th")
        .column("id", ["Id"])
        .column("label", ["Label"])
        .item_path("tbody tr")
        .item(
            ItemElement::new(entry_spec())
                .field("id", CleanText::new(TableCell::new("id")))
                .field("label", CleanText::new(TableCell::new("label"))),
        );

    let err = table.collect_page(&Scope::new(&doc)).unwrap_err();
    match err {
        ExtractError::DuplicateIdentity { identity } => assert_eq!(identity, "42"),
        other => panic!("expected a duplicate-identity error, got {other:?}"),
    }
}

#[test]
fn test_pagination_loop_across_documents() {
    init_tracing();
    let pages = [
        r#"{"items": [{"id": "1"}], "next": "/page/2"}"#,
        r#"{"items": [{"id": "2"}]}"#,
    ];

    let list = ListElement::new()
        .item_path("items")
        .item(ItemElement::new(entry_spec()).field("id", Dict::path("id")))
        .next_page(Dict::path("next"));

    // The fetch loop the engine expects around itself: catch the
    // signal, fetch the target, run the same template again.
    let mut collected = Vec::new();
    let mut fetched = Vec::new();
    let mut current = Document::json(pages[0]).unwrap();
    loop {
        let page = list.collect_page(&Scope::new(&current)).unwrap();
        collected.extend(page.records);
        match page.next_page {
            Some(target) => {
                fetched.push(target.clone());
                assert_eq!(target, Value::from("/page/2"));
                current = Document::json(pages[1]).unwrap();
            }
            None => break,
        }
    }

    assert_eq!(ids(&collected), ["1", "2"]);
    assert_eq!(fetched.len(), 1);
}

#[test]
fn test_lazy_iteration_surfaces_next_page_last() {
    init_tracing();
    let doc = Document::json(r#"{"items": [{"id": "1"}, {"id": "2"}], "next": "more"}"#).unwrap();
    let list = ListElement::new()
        .item_path("items")
        .item(ItemElement::new(entry_spec()).field("id", Dict::path("id")))
        .next_page(Dict::path("next"));

    let scope = Scope::new(&doc);
    let mut iter = list.run(&scope);
    assert_eq!(iter.next().unwrap().unwrap().identity().as_deref(), Some("1"));
    assert_eq!(iter.next().unwrap().unwrap().identity().as_deref(), Some("2"));
    let signal = iter.next().unwrap().unwrap_err();
    assert!(matches!(
        signal,
        ExtractError::NextPage(NextPage(ref v)) if *v == Value::from("more")
    ));
    assert!(iter.next().is_none());
}

#[test]
fn test_determinism_across_runs() {
    init_tracing();
    let doc = accounts_json();
    let list = ListElement::new().item_path("accounts").item(
        ItemElement::new(account_spec())
            .field("id", Dict::path("id"))
            .field("label", CleanText::new(Dict::path("label")))
            .field("balance", CleanDecimal::french(Dict::path("balance"))),
    );

    let first = list.collect_page(&Scope::new(&doc)).unwrap();
    let second = list.collect_page(&Scope::new(&doc)).unwrap();
    assert_eq!(first.records, second.records);
    assert_eq!(ids(&first.records), ["FR-001", "FR-002"]);
    assert_eq!(
        first.records[0].get("balance"),
        Some(&Value::Decimal("1234.56".parse().unwrap()))
    );
}

#[test]
fn test_skip_isolates_to_one_candidate() {
    init_tracing();
    let doc = Document::json(
        r#"{"items": [{"id": "1"}, {"id": "SKIP"}, {"id": "3"}]}"#,
    )
    .unwrap();

    let item = ItemElement::new(entry_spec()).field(
        "id",
        Selector::from_fn(|scope| {
            let id = Dict::path("id").evaluate(scope)?.into_value();
            if id == Value::from("SKIP") {
                return Err(ExtractError::Skip);
            }
            Ok(id)
        }),
    );

    let list = ListElement::new().item_path("items").item(item);
    let page = list.collect_page(&Scope::new(&doc)).unwrap();
    assert_eq!(ids(&page.records), ["1", "3"]);
}

#[test]
fn test_full_table_extraction_with_aliases_and_dates() {
    init_tracing();
    let doc = history_html();

    let table = TableElement::new("table#history thead th")
        .column("date", ["Date"])
        .column("label", ["Libellé", "Description"])
        .column("amount", ["Montant", "Montant TTC"])
        .item_path("table#history tbody tr")
        .item(
            ItemElement::new(transaction_spec())
                .field("id", CleanText::new(TableCell::new("label")))
                .field("label", CleanText::new(TableCell::new("label")))
                .field("date", Date::new(TableCell::new("date"), ["%d/%m/%Y"]))
                .field("amount", CleanDecimal::french(TableCell::new("amount"))),
        )
        .next_page(elements::Link::new("a.next"));

    let page = table.collect_page(&Scope::new(&doc)).unwrap();
    assert_eq!(page.records.len(), 2);
    assert_eq!(
        page.records[0].get("amount"),
        Some(&Value::Decimal("-12.34".parse().unwrap()))
    );
    assert_eq!(
        page.records[1].get("amount"),
        Some(&Value::Decimal("2000.00".parse().unwrap()))
    );
    assert_eq!(page.next_page, Some(Value::from("/history?page=2")));
}

#[test]
fn test_nested_item_and_list_as_field_selectors() {
    init_tracing();
    let doc = Document::json(
        r#"{
            "owner": {"id": "o-1", "label": "Alice"},
            "items": [{"id": "1", "label": "a"}, {"id": "2", "label": "b"}]
        }"#,
    )
    .unwrap();

    let holder_spec = RecordSpec::builder("holder")
        .identity("id")
        .field("owner")
        .field("entries")
        .build();

    let owner_item = ItemElement::new(entry_spec())
        .reroot("owner")
        .field("id", Dict::path("id"))
        .field("label", Dict::path("label"));
    let entries_list = ListElement::new().item_path("items").item(
        ItemElement::new(entry_spec())
            .field("id", Dict::path("id"))
            .field("label", Dict::path("label")),
    );

    let holder = ItemElement::new(holder_spec)
        .field("id", Selector::constant(Value::from("h-1")))
        .field("owner", owner_item)
        .field("entries", entries_list);

    let record = holder.extract(&Scope::new(&doc)).unwrap().unwrap();
    match record.get("owner") {
        Some(Value::Record(owner)) => {
            assert_eq!(owner.get("label"), Some(&Value::from("Alice")));
        }
        other => panic!("expected a nested record, got {other:?}"),
    }
    match record.get("entries") {
        Some(Value::Array(entries)) => assert_eq!(entries.len(), 2),
        other => panic!("expected a nested list, got {other:?}"),
    }
}

#[test]
fn test_environment_threads_from_list_to_items() {
    init_tracing();
    let doc = Document::json(r#"{"items": [{"id": "1"}, {"id": "2"}]}"#).unwrap();

    let spec = RecordSpec::builder("entry")
        .identity("id")
        .field("label")
        .field("note")
        .build();

    let item = ItemElement::new(spec)
        .parse(|scope| {
            // Visible to this item's fields only.
            scope.set("note", Value::from("local"));
            Ok(())
        })
        .field("id", Dict::path("id"))
        .field("label", elements::Env::new("listing"))
        .field("note", elements::Env::new("note"));

    let list = ListElement::new()
        .item_path("items")
        .parse(|scope| {
            scope.set("listing", Value::from("checking"));
            Ok(())
        })
        .item(item);

    let doc_scope = Scope::with_params(&doc, [("listing", Value::from("ignored"))]);
    let page = list.collect_page(&doc_scope).unwrap();
    // The list parse hook overwrote the page parameter, and the item
    // parse hook's binding stayed item-local.
    assert_eq!(page.records[0].get("label"), Some(&Value::from("checking")));
    assert_eq!(page.records[0].get("note"), Some(&Value::from("local")));
    assert_eq!(doc_scope.get("listing"), Some(&Value::from("ignored")));
}

#[test]
fn test_highlighter_brackets_every_item_attempt() {
    init_tracing();
    let doc = Document::json(r#"{"items": [{"id": "1"}, {"id": "x"}]}"#).unwrap();
    let recorder = Arc::new(RecordingHighlighter::new());

    let item = ItemElement::new(entry_spec()).field(
        "id",
        Selector::from_fn(|scope| {
            let id = Dict::path("id").evaluate(scope)?.into_value();
            if id == Value::from("x") {
                return Err(ExtractError::Skip);
            }
            Ok(id)
        }),
    );
    let list = ListElement::new().item_path("items").item(item);

    let scope = Scope::new(&doc).with_highlighter(recorder.clone());
    let page = list.collect_page(&scope).unwrap();
    assert_eq!(page.records.len(), 1);

    // Both attempts were bracketed, the skipped one included.
    let events = recorder.events();
    assert_eq!(
        events,
        [
            "enter a JSON object",
            "leave a JSON object",
            "enter a JSON object",
            "leave a JSON object"
        ]
    );
}
