use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use chrono::Duration;

use super::common::*;
use crate::workflows::arrears::LetterType;
use crate::workflows::collections::domain::{LetterChannel, LetterFilter, LetterStatus};
use crate::workflows::collections::repository::LetterRepository;

#[test]
fn next_consecutive_peeks_without_reserving() {
    let (service, store, _) = build_service();
    let property = create_property(&service, "Edificio Central");

    let peek = service
        .next_consecutive(&property.id, LetterType::Simple)
        .expect("peek");
    assert_eq!(peek, "CS-0001");
    let again = service
        .next_consecutive(&property.id, LetterType::Simple)
        .expect("peek");
    assert_eq!(again, "CS-0001");
    assert_eq!(
        store
            .last_issued(&property.id, LetterType::Simple)
            .expect("counter"),
        0
    );

    service
        .generate_letter(&property.id, letter_request("L101", LetterType::Simple, "2026-01"))
        .expect("generate");
    let after = service
        .next_consecutive(&property.id, LetterType::Simple)
        .expect("peek");
    assert_eq!(after, "CS-0002");
}

#[test]
fn repeated_generation_returns_the_original_letter() {
    let (service, store, clock) = build_service();
    let property = create_property(&service, "Edificio Central");

    let first = service
        .generate_letter(&property.id, letter_request("L101", LetterType::Simple, "2026-01"))
        .expect("first");
    assert!(first.created);
    assert_eq!(first.record.consecutive, "CS-0001");
    assert_eq!(first.record.status, LetterStatus::Generated);

    clock.advance(Duration::hours(2));
    let mut retry = letter_request("L101", LetterType::Simple, "2026-01");
    retry.amount = 1.0;
    let second = service
        .generate_letter(&property.id, retry)
        .expect("retry");
    assert!(!second.created);
    assert_eq!(second.record, first.record);

    assert_eq!(count_rows(&store, "letter_records"), 1);
    assert_eq!(
        store
            .last_issued(&property.id, LetterType::Simple)
            .expect("counter"),
        1
    );
}

#[test]
fn each_category_keeps_its_own_sequence() {
    let (service, _, _) = build_service();
    let property = create_property(&service, "Edificio Central");

    let codes: Vec<String> = [
        ("L101", LetterType::Simple),
        ("L102", LetterType::Simple),
        ("L103", LetterType::Persuasive),
        ("L104", LetterType::Judicial),
        ("L105", LetterType::Simple),
    ]
    .into_iter()
    .map(|(unit, letter_type)| {
        service
            .generate_letter(&property.id, letter_request(unit, letter_type, "2026-01"))
            .expect("generate")
            .record
            .consecutive
    })
    .collect();

    assert_eq!(
        codes,
        vec!["CS-0001", "CS-0002", "CP-0001", "AB-0001", "CS-0003"]
    );
}

#[test]
fn sequences_are_scoped_per_property() {
    let (service, _, _) = build_service();
    let north = create_property(&service, "Torre Norte");
    let south = create_property(&service, "Torre Sur");

    let a = service
        .generate_letter(&north.id, letter_request("101", LetterType::Persuasive, "2026-01"))
        .expect("north");
    let b = service
        .generate_letter(&south.id, letter_request("101", LetterType::Persuasive, "2026-01"))
        .expect("south");
    assert_eq!(a.record.consecutive, "CP-0001");
    assert_eq!(b.record.consecutive, "CP-0001");
    assert!(b.created);
}

#[test]
fn a_new_period_issues_a_new_letter_for_the_same_unit() {
    let (service, _, _) = build_service();
    let property = create_property(&service, "Edificio Central");

    service
        .generate_letter(&property.id, letter_request("L101", LetterType::Simple, "2026-01"))
        .expect("january");
    let february = service
        .generate_letter(&property.id, letter_request("L101", LetterType::Simple, "2026-02"))
        .expect("february");
    assert!(february.created);
    assert_eq!(february.record.consecutive, "CS-0002");
}

#[test]
fn concurrent_generation_for_distinct_units_has_no_gaps() {
    let (service, _, _) = build_service();
    let property = create_property(&service, "Edificio Central");
    let service = Arc::new(service);

    let handles: Vec<_> = (1..=16)
        .map(|index| {
            let service = Arc::clone(&service);
            let property_id = property.id.clone();
            thread::spawn(move || {
                service
                    .generate_letter(
                        &property_id,
                        letter_request(&format!("L{index:03}"), LetterType::Simple, "2026-01"),
                    )
                    .expect("generate")
                    .record
                    .consecutive
            })
        })
        .collect();

    let codes: BTreeSet<String> = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread"))
        .collect();
    let expected: BTreeSet<String> = (1..=16).map(|n| format!("CS-{n:04}")).collect();
    assert_eq!(codes, expected);
}

#[test]
fn concurrent_generation_for_one_key_yields_one_record() {
    let (service, store, _) = build_service();
    let property = create_property(&service, "Edificio Central");
    let service = Arc::new(service);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = Arc::clone(&service);
            let property_id = property.id.clone();
            thread::spawn(move || {
                service
                    .generate_letter(
                        &property_id,
                        letter_request("L101", LetterType::Judicial, "2026-01"),
                    )
                    .expect("generate")
            })
        })
        .collect();

    let issued: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread"))
        .collect();
    assert_eq!(issued.iter().filter(|letter| letter.created).count(), 1);
    assert!(issued
        .iter()
        .all(|letter| letter.record.consecutive == "AB-0001"));
    assert_eq!(count_rows(&store, "letter_records"), 1);
}

#[test]
fn bulk_generation_is_safe_to_retry() {
    let (service, store, _) = build_service();
    let property = create_property(&service, "Edificio Central");
    ingest(
        &service,
        &property.id,
        "2026-01",
        vec![
            debtor("L101", "A", 100.0, 0.5),
            debtor("L102", "B", 200.0, 1.5),
            debtor("L103", "C", 300.0, 2.5),
            debtor("L104", "D", 400.0, 0.2),
        ],
    );

    let first = service
        .generate_bulk(&property.id, &period("2026-01"), &[LetterType::Simple])
        .expect("bulk");
    assert_eq!(first.created, 2);
    assert_eq!(first.reused, 0);
    let codes: Vec<&str> = first
        .letters
        .iter()
        .map(|letter| letter.consecutive.as_str())
        .collect();
    assert_eq!(codes, vec!["CS-0001", "CS-0002"]);
    assert_eq!(first.letters[1].amount, 400.0);

    let all = service
        .generate_bulk(&property.id, &period("2026-01"), &[])
        .expect("bulk all");
    assert_eq!(all.created, 2);
    assert_eq!(all.reused, 2);

    let retry = service
        .generate_bulk(&property.id, &period("2026-01"), &[])
        .expect("retry");
    assert_eq!(retry.created, 0);
    assert_eq!(retry.reused, 4);
    assert_eq!(count_rows(&store, "letter_records"), 4);
}

#[test]
fn bulk_generation_needs_a_report_for_the_period() {
    let (service, _, _) = build_service();
    let property = create_property(&service, "Edificio Central");
    let result = service.generate_bulk(&property.id, &period("2026-05"), &[]);
    assert!(matches!(result, Err(ref error) if error.is_not_found()));
}

#[test]
fn status_and_follow_up_updates_persist() {
    let (service, _, _) = build_service();
    let property = create_property(&service, "Edificio Central");
    let letter = service
        .generate_letter(&property.id, letter_request("L101", LetterType::Persuasive, "2026-01"))
        .expect("generate")
        .record;

    service
        .update_status(&letter.id, LetterStatus::Sent, Some(LetterChannel::Whatsapp))
        .expect("status");
    let delivered = service
        .update_status(&letter.id, LetterStatus::Delivered, None)
        .expect("status");
    assert_eq!(delivered.channel, Some(LetterChannel::Whatsapp));

    service
        .update_follow_up(
            &letter.id,
            "Llamó el propietario".to_string(),
            Some("Pago el 30 de enero".to_string()),
        )
        .expect("follow up");

    let stored = service.get_letter(&letter.id).expect("fetch");
    assert_eq!(stored.status, LetterStatus::Delivered);
    assert_eq!(stored.channel, Some(LetterChannel::Whatsapp));
    assert_eq!(stored.notes, "Llamó el propietario");
    assert_eq!(stored.payment_commitment.as_deref(), Some("Pago el 30 de enero"));
    assert_eq!(stored.consecutive, letter.consecutive);

    let cleared = service
        .update_follow_up(&letter.id, String::new(), Some("  ".to_string()))
        .expect("clear");
    assert_eq!(cleared.payment_commitment, None);
}

#[test]
fn deleting_a_letter_does_not_rewind_the_counter() {
    let (service, _, _) = build_service();
    let property = create_property(&service, "Edificio Central");
    let letter = service
        .generate_letter(&property.id, letter_request("L101", LetterType::Simple, "2026-01"))
        .expect("generate")
        .record;

    service.delete_letter(&letter.id).expect("delete");
    assert!(matches!(service.get_letter(&letter.id), Err(ref error) if error.is_not_found()));

    let regenerated = service
        .generate_letter(&property.id, letter_request("L101", LetterType::Simple, "2026-01"))
        .expect("regenerate");
    assert!(regenerated.created);
    assert_eq!(regenerated.record.consecutive, "CS-0002");
}

#[test]
fn reset_clears_records_and_restarts_numbering() {
    let (service, store, _) = build_service();
    let property = create_property(&service, "Edificio Central");
    for unit in ["L101", "L102", "L103"] {
        service
            .generate_letter(&property.id, letter_request(unit, LetterType::Simple, "2026-01"))
            .expect("generate");
    }

    let removed = service.reset_letters(&property.id).expect("reset");
    assert_eq!(removed, 3);
    assert_eq!(count_rows(&store, "letter_records"), 0);
    assert_eq!(count_rows(&store, "letter_counters"), 0);

    let fresh = service
        .generate_letter(&property.id, letter_request("L101", LetterType::Simple, "2026-01"))
        .expect("generate");
    assert_eq!(fresh.record.consecutive, "CS-0001");
}

#[test]
fn letters_list_newest_first_and_filter() {
    let (service, _, clock) = build_service();
    let property = create_property(&service, "Edificio Central");
    let requests = [
        ("L101", LetterType::Simple, "2026-01"),
        ("L102", LetterType::Persuasive, "2026-01"),
        ("L101", LetterType::Simple, "2026-02"),
    ];
    for (unit, letter_type, period_raw) in requests {
        service
            .generate_letter(&property.id, letter_request(unit, letter_type, period_raw))
            .expect("generate");
        clock.advance(Duration::minutes(5));
    }

    let all = service
        .list_letters(&property.id, &LetterFilter::default())
        .expect("list");
    let codes: Vec<&str> = all.iter().map(|letter| letter.consecutive.as_str()).collect();
    assert_eq!(codes, vec!["CS-0002", "CP-0001", "CS-0001"]);

    let by_unit = service
        .list_letters(
            &property.id,
            &LetterFilter {
                unit: Some("L101".to_string()),
                letter_type: Some(LetterType::Simple),
                period: None,
            },
        )
        .expect("filtered");
    assert_eq!(by_unit.len(), 2);

    let by_period = service
        .list_letters(
            &property.id,
            &LetterFilter {
                period: Some(period("2026-01")),
                ..LetterFilter::default()
            },
        )
        .expect("filtered");
    assert_eq!(by_period.len(), 2);
}

#[test]
fn ledger_operations_reject_unknown_properties_and_blank_units() {
    let (service, _, _) = build_service();

    let missing = service.generate_letter("missing", letter_request("L101", LetterType::Simple, "2026-01"));
    assert!(matches!(missing, Err(ref error) if error.is_not_found()), "{missing:?}");

    let missing = service.next_consecutive("missing", LetterType::Simple);
    assert!(matches!(missing, Err(ref error) if error.is_not_found()));

    let property = create_property(&service, "Edificio Central");
    let blank = service.generate_letter(&property.id, letter_request("  ", LetterType::Simple, "2026-01"));
    assert!(matches!(blank, Err(ref error) if error.is_validation()));
}
