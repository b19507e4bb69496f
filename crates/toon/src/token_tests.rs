// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{detect, Dialect, ToonType};

#[yare::parameterized(
    string  = { "string", ToonType::String },
    number  = { "number", ToonType::Number },
    boolean = { "boolean", ToonType::Boolean },
    null    = { "null", ToonType::Null },
    object  = { "object", ToonType::Object },
    array   = { "array", ToonType::Array },
)]
fn type_round_trips_through_str(name: &str, ty: ToonType) {
    assert_eq!(ToonType::parse(name), Some(ty));
    assert_eq!(ty.as_str(), name);
}

#[test]
fn unknown_type_is_none() {
    assert_eq!(ToonType::parse("integer"), None);
    assert_eq!(ToonType::parse("STRING"), None);
    assert_eq!(ToonType::parse(""), None);
}

#[yare::parameterized(
    typed_single     = { "string:S1:ok", Dialect::Typed },
    typed_multi      = { "string:S1:ok|number:N1:3", Dialect::Typed },
    typed_colon_val  = { "string:A3:2025-01-01T09:00:00Z|null:L1:NULL", Dialect::Typed },
    legacy_single    = { "S1:ok", Dialect::Legacy },
    legacy_multi     = { "D1:dev_1|HB1:77", Dialect::Legacy },
    mixed_is_legacy  = { "string:S1:ok|D1:dev_1", Dialect::Legacy },
    unknown_type_tag = { "int:S1:ok", Dialect::Legacy },
    empty            = { "", Dialect::Legacy },
    only_separators  = { "|||", Dialect::Legacy },
)]
fn dialect_detection(input: &str, expected: Dialect) {
    assert_eq!(detect(input), expected);
}

#[test]
fn legacy_value_that_happens_to_contain_colons() {
    // Two colons but an unknown first part: legacy.
    assert_eq!(detect("A3:2025-01-01T09:00:00Z"), Dialect::Legacy);
}
