use pretty_assertions::assert_eq;
use pybounce::{Error, TclDict};

#[test]
fn test_membership() {
    let d: TclDict = "a 1 b 2 c 3 d 4 e 5".parse().unwrap();

    assert!(d.contains("c"));
    assert!(!d.contains("f"));
    // Values are not keys.
    assert!(!d.contains("3"));
}

#[test]
fn test_item_access() {
    let d: TclDict = "a 1 b 2 c 3 d 4 e 5".parse().unwrap();

    assert_eq!(d.get("c").unwrap(), "3");
    assert_eq!(d.len(), 5);
    assert_eq!(d.try_get("c"), Some("3"));
    assert_eq!(d.try_get("zzz"), None);

    match d.get("zzz") {
        Err(Error::KeyError(key)) => assert_eq!(key, "zzz"),
        other => panic!("expected a KeyError, got {:?}", other),
    }
}

#[test]
fn test_insertion_and_modification() {
    let mut d: TclDict = "a 1 b 2 c 3 d 4 e 5".parse().unwrap();

    // Update in place: order and size unchanged.
    d.set("d", "42");
    assert_eq!(d.get("c").unwrap(), "3");
    assert_eq!(d.get("d").unwrap(), "42");
    assert_eq!(d.len(), 5);

    // New key: appended at the end.
    d.set("f", "6");
    assert_eq!(d.get("f").unwrap(), "6");
    assert_eq!(d.len(), 6);
    assert_eq!(d.to_string(), "a 1 b 2 c 3 d 42 e 5 f 6");
}

#[test]
fn test_round_trip_is_token_equivalent() {
    let flat = "a 1 b 2 c 3 d 4 e 5";
    let d: TclDict = flat.parse().unwrap();
    assert_eq!(d.to_string(), flat);

    // Irregular whitespace normalizes but stays token-equivalent.
    let d: TclDict = "  a   1\tb\n2  ".parse().unwrap();
    assert_eq!(d.to_string(), "a 1 b 2");
    assert_eq!(d.to_string().parse::<TclDict>().unwrap(), d);
}

#[test]
fn test_removal_preserves_remaining_order() {
    let mut d: TclDict = "a 1 b 2 c 3".parse().unwrap();

    assert_eq!(d.remove("b"), Some("2".to_string()));
    assert_eq!(d.to_string(), "a 1 c 3");
    assert_eq!(d.len(), 2);

    // Removing a missing key is a no-op.
    assert_eq!(d.remove("b"), None);
    assert_eq!(d.to_string(), "a 1 c 3");
}
