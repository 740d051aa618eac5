//! Integration tests for ledger-types

use ledger_types::{AccountId, LedgerId, NodeId, Status, TransactionId, TypesError};

// ==================== Identifier Tests ====================

#[test]
fn test_node_ids_sort_numerically() {
    let mut ids: Vec<NodeId> = ["0.0.10", "0.0.3", "0.0.4"]
        .iter()
        .map(|s| s.parse().unwrap())
        .collect();
    ids.sort();
    assert_eq!(
        ids,
        vec![NodeId::from_num(3), NodeId::from_num(4), NodeId::from_num(10)]
    );
}

#[test]
fn test_checksum_suffix_is_ignored_when_parsing() {
    let id: AccountId = "0.0.1001-vfmkw".parse().unwrap();
    assert_eq!(id, AccountId::from_num(1001));
    assert_eq!(id.to_string(), "0.0.1001");
}

#[test]
fn test_transaction_id_names_its_payer() {
    let tx: TransactionId = "0.0.1001@1700000000.000000042".parse().unwrap();
    assert_eq!(tx.account_id, AccountId::from_num(1001));
    assert_eq!(tx.valid_start_nanos, 42);

    let generated = TransactionId::generate(AccountId::from_num(2));
    assert_eq!(generated.account_id, AccountId::from_num(2));
    assert!(generated.valid_start_seconds > 0);
}

#[test]
fn test_invalid_identifiers() {
    assert!(matches!(
        "0.0".parse::<AccountId>(),
        Err(TypesError::InvalidEntityId(_))
    ));
    assert!(matches!(
        "0.0.1@1.1000000000".parse::<TransactionId>(),
        Err(TypesError::InvalidTransactionId(_))
    ));
    assert!(matches!(
        "".parse::<LedgerId>(),
        Err(TypesError::InvalidLedgerId(_))
    ));
}

// ==================== Status Tests ====================

#[test]
fn test_status_codes_are_unique() {
    let mut codes: Vec<i32> = Status::KNOWN.iter().map(|s| s.code()).collect();
    let total = codes.len();
    codes.sort_unstable();
    codes.dedup();
    assert_eq!(codes.len(), total);
}

#[test]
fn test_unrecognized_status_stays_representable() {
    let status = Status::from(9999);
    assert!(!status.is_known());
    assert_eq!(status.name(), None);
    assert_eq!(status.to_string(), "UNRECOGNIZED(9999)");
    assert_eq!(Status::from(12), Status::BUSY);
}

#[test]
fn test_ledger_bytes_map_to_named_ledgers() {
    assert_eq!(LedgerId::from_bytes(&[0x00]), LedgerId::Mainnet);
    assert_eq!(LedgerId::Previewnet.to_bytes(), vec![0x02]);
    assert_eq!(
        "0xdeadbeef".parse::<LedgerId>().unwrap(),
        LedgerId::Other(vec![0xde, 0xad, 0xbe, 0xef])
    );
}
