use ledger_engine::facts::{Charge, EntityDirectory};
use ledger_engine::{
    ChargeType, Decimal, EngineConfig, ErrorKind, GenerateOptions, LedgerRecord, LedgerStatus,
    LedgerStore, Leg, MemoryLedgerStore, ValidateOptions, compute_balance, generate_ledger,
    reconcile, validate_charge,
};
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Deserialize)]
struct Fixture {
    config: EngineConfig,
    entities: EntityDirectory,
    charges: Vec<Charge>,
}

fn fixture() -> Fixture {
    serde_json::from_str(include_str!("fixtures/ledger.json")).unwrap()
}

fn entity(name: &str, directory: &EntityDirectory) -> Uuid {
    let id = (1..0x40)
        .map(Uuid::from_u128)
        .find(|id| directory.get(*id).is_some_and(|entity| entity.name == name));
    id.unwrap_or_else(|| panic!("no entity named {name}"))
}

fn stored(records: Vec<LedgerRecord>, first_id: u128) -> Vec<LedgerRecord> {
    records
        .into_iter()
        .enumerate()
        .map(|(i, record)| LedgerRecord {
            id: Uuid::from_u128(first_id + i as u128),
            ..record
        })
        .collect()
}

#[test]
fn every_charge_type_balances() {
    let Fixture {
        config,
        entities,
        charges,
    } = fixture();

    let mut seen = BTreeSet::new();
    for charge in &charges {
        let ledger =
            generate_ledger(charge, &entities, &config, GenerateOptions::default()).unwrap();
        assert!(
            ledger.errors.is_empty(),
            "{}: {:?}",
            ledger.charge_type,
            ledger.errors
        );
        assert!(ledger.balance.is_balanced, "{}", ledger.charge_type);
        assert!(!ledger.records.is_empty(), "{}", ledger.charge_type);
        for record in &ledger.records {
            assert_eq!(record.charge_id, charge.id);
            let debit = record.debit_local_total();
            assert!((debit - record.credit_local_total()).abs() <= config.balance_epsilon);
        }
        seen.insert(ledger.charge_type);
    }
    assert_eq!(seen, BTreeSet::from(ChargeType::ALL));
}

#[test]
fn generation_is_deterministic() {
    let Fixture {
        config,
        entities,
        charges,
    } = fixture();
    for charge in &charges {
        let first =
            generate_ledger(charge, &entities, &config, GenerateOptions::default()).unwrap();
        let second =
            generate_ledger(charge, &entities, &config, GenerateOptions::default()).unwrap();
        assert_eq!(first.records, second.records);
    }
}

#[test]
fn stored_ledger_converges_and_stays_converged() {
    let Fixture {
        config,
        entities,
        charges,
    } = fixture();
    let options = GenerateOptions {
        insert_if_not_exists: true,
    };

    let mut store = MemoryLedgerStore::new();
    for charge in &charges {
        let ledger = generate_ledger(charge, &entities, &config, options).unwrap();
        assert!(ledger.is_persistable());
        let plan = reconcile(charge.id, &store.records(charge.id), &ledger.records);
        assert_eq!(plan.to_insert.len(), ledger.records.len());
        store.apply(charge.id, &plan).unwrap();
    }

    for charge in &charges {
        let validation = validate_charge(
            charge,
            &store.records(charge.id),
            &entities,
            &config,
            ValidateOptions {
                check_stored_balance: true,
                insert_if_not_exists: true,
            },
        )
        .unwrap();
        assert_eq!(validation.status, LedgerStatus::Valid);
        assert!(validation.persistable);
        let plan = validation.plan.unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.unchanged, store.records(charge.id).len());
        assert!(validation.stored_balance.unwrap().is_balanced);
    }
}

#[test]
fn changed_rate_updates_records_in_place() {
    let Fixture {
        config,
        entities,
        mut charges,
    } = fixture();
    let mut charge = charges.remove(0);
    assert_eq!(charge.charge_type().unwrap(), ChargeType::Common);

    let generated = generate_ledger(&charge, &entities, &config, GenerateOptions::default())
        .unwrap()
        .records;
    let stored = stored(generated, 500);

    charge.transactions[0].exchange_rate = Some(dec!(3.75));
    let validation =
        validate_charge(&charge, &stored, &entities, &config, ValidateOptions::default()).unwrap();
    assert_eq!(validation.status, LedgerStatus::Diff);

    let plan = validation.plan.unwrap();
    assert_eq!(plan.unchanged, 1);
    assert!(plan.to_insert.is_empty());
    assert!(plan.to_remove.is_empty());
    let updated: BTreeSet<_> = plan.to_update.iter().map(|record| record.id).collect();
    assert_eq!(
        updated,
        BTreeSet::from([Uuid::from_u128(501), Uuid::from_u128(502)])
    );

    let converged = plan.apply(&stored);
    let again =
        validate_charge(&charge, &converged, &entities, &config, ValidateOptions::default())
            .unwrap();
    assert_eq!(again.status, LedgerStatus::Valid);
}

#[test]
fn fact_errors_make_the_charge_invalid() {
    let Fixture {
        config,
        entities,
        mut charges,
    } = fixture();
    let mut charge = charges.remove(2);
    charge.transactions[0].exchange_rate = None;

    let validation =
        validate_charge(&charge, &[], &entities, &config, ValidateOptions::default()).unwrap();
    assert_eq!(validation.status, LedgerStatus::Invalid);
    assert!(validation.plan.is_none());
    assert!(
        validation
            .errors
            .iter()
            .all(|error| error.kind() == ErrorKind::MissingFact)
    );
}

#[test]
fn unknown_charge_type_is_rejected() {
    let Fixture {
        config,
        entities,
        mut charges,
    } = fixture();
    let mut charge = charges.remove(0);
    charge.kind = "lottery".into();
    let error =
        generate_ledger(&charge, &entities, &config, GenerateOptions::default()).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::UnsupportedType);
    assert_eq!(error.to_string(), "unsupported charge type: lottery");
}

#[test]
fn conversion_drift_within_epsilon_is_balanced() {
    let Fixture {
        config, entities, ..
    } = fixture();
    let exchanger = entity("Exchanger", &entities);
    let bank_usd = entity("Bank USD", &entities);
    let bank_ils = entity("Bank ILS", &entities);
    let allowed = entities.balance_exempt();

    let pair = |received: Decimal| {
        let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let charge = Uuid::from_u128(0xc003);
        let owner = Uuid::from_u128(0x100);
        vec![
            LedgerRecord::new(charge, owner, date, date, "USD".into())
                .debit(Leg::new(exchanger, dec!(3650)))
                .credit(Leg::new(bank_usd, dec!(3650))),
            LedgerRecord::new(charge, owner, date, date, "ILS".into())
                .debit(Leg::new(bank_ils, received))
                .credit(Leg::new(exchanger, received)),
        ]
    };

    let balance = compute_balance(&pair(dec!(3649.996)), &allowed);
    assert!(balance.is_balanced);
    assert!(balance.unbalanced_entities.is_empty());

    let balance = compute_balance(&pair(dec!(3649.99)), &allowed);
    assert!(!balance.is_balanced);
    assert_eq!(balance.unbalanced_entities[&exchanger], dec!(-0.01));
    assert_eq!(config.balance_epsilon, Decimal::from_str("0.005").unwrap());
}
