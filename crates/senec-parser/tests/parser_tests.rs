use senec_parser::{
    decode_document, decode_value, poll_request, probe_request, EncodingError, Numeral,
    ParserError,
};

#[test]
fn decode_float_and_unsigned_numerals() {
    assert_eq!(decode_value("fl_3F800000").expect("float"), Numeral::Float(1.0));
    assert_eq!(decode_value("u8_0F").expect("unsigned"), Numeral::Unsigned(15));
    assert_eq!(decode_value("fl_00000000").expect("zero"), Numeral::Float(0.0));
    assert_eq!(decode_value("u3_0001E240").expect("u32"), Numeral::Unsigned(123_456));
}

#[test]
fn decode_curated_float_patterns() {
    let cases = [
        ("fl_43480000", 200.0),
        ("fl_3FC00000", 1.5),
        ("fl_40490FDB", 3.14),
        ("fl_3DCCCCCD", 0.1),
        ("fl_C1200000", -10.0),
        ("fl_C2F6E979", -123.46),
        ("fl_447A0000", 1000.0),
    ];

    for (raw, expected) in cases {
        match decode_value(raw).expect(raw) {
            Numeral::Float(value) => {
                assert!((value - expected).abs() < 0.005, "{raw}: {value} != {expected}")
            }
            other => panic!("{raw} decoded to {other:?}"),
        }
    }
}

#[test]
fn negative_zero_pattern_is_plain_zero() {
    match decode_value("fl_80000000").expect("negative zero") {
        Numeral::Float(value) => {
            assert_eq!(value, 0.0);
            assert!(value.is_sign_positive());
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn decode_is_pure() {
    let first = decode_value("fl_42C80000").expect("first");
    let second = decode_value("fl_42C80000").expect("second");
    assert_eq!(first, second);
    assert_eq!(first, Numeral::Float(100.0));
}

#[test]
fn reject_unknown_conventions() {
    assert!(matches!(
        decode_value("st_HELLO"),
        Err(EncodingError::UnknownPrefix(_))
    ));
    assert!(matches!(decode_value("42"), Err(EncodingError::UnknownPrefix(_))));
    assert!(matches!(decode_value("u8"), Err(EncodingError::UnknownPrefix(_))));
    assert!(matches!(decode_value("u8_"), Err(EncodingError::UnknownPrefix(_))));
    assert!(matches!(decode_value("u8_XYZ"), Err(EncodingError::InvalidHex(_))));
    assert!(matches!(decode_value("u8_+1"), Err(EncodingError::InvalidHex(_))));
    assert!(matches!(decode_value("fl_3F80"), Err(EncodingError::FloatWidth(_))));
    assert!(matches!(
        decode_value("fl_3F80000G"),
        Err(EncodingError::InvalidHex(_))
    ));
}

#[test]
fn decode_document_keeps_source_order() {
    let body = r#"{"ENERGY":{"STAT_STATE":"u8_05","GUI_HOUSE_POW":"fl_43480000"},"WIZARD":{"CONFIG_LOADED":"u8_01"}}"#;
    let snapshot = decode_document(body).expect("decode");

    let keys: Vec<String> = snapshot.fields().iter().map(|f| f.key()).collect();
    assert_eq!(
        keys,
        vec![
            "ENERGY.STAT_STATE",
            "ENERGY.GUI_HOUSE_POW",
            "WIZARD.CONFIG_LOADED"
        ]
    );
    assert_eq!(
        snapshot.get("ENERGY", "STAT_STATE"),
        Some(Numeral::Unsigned(5))
    );
    assert_eq!(
        snapshot.get("ENERGY", "GUI_HOUSE_POW"),
        Some(Numeral::Float(200.0))
    );
    assert_eq!(snapshot.get("ENERGY", "MISSING"), None);
}

#[test]
fn empty_category_decodes_to_nothing() {
    let snapshot = decode_document(r#"{"ENERGY":{}}"#).expect("decode");
    assert!(snapshot.is_empty());
}

#[test]
fn reject_malformed_documents() {
    assert!(matches!(decode_document("not json"), Err(ParserError::Json(_))));
    assert!(matches!(
        decode_document(r#"["ENERGY"]"#),
        Err(ParserError::NotAnObject(_))
    ));
    assert!(matches!(
        decode_document(r#"{"ENERGY":"u8_01"}"#),
        Err(ParserError::NotAnObject(ref category)) if category == "ENERGY"
    ));
    assert!(matches!(
        decode_document(r#"{"ENERGY":{"STAT_STATE":{"DEEP":"u8_01"}}}"#),
        Err(ParserError::TooDeep(ref key)) if key == "ENERGY.STAT_STATE"
    ));
    assert!(matches!(
        decode_document(r#"{"ENERGY":{"STAT_STATE":5}}"#),
        Err(ParserError::NotAString(_))
    ));
}

#[test]
fn invalid_leaf_names_the_key() {
    let err = decode_document(r#"{"ENERGY":{"STAT_STATE":"u8_05","GUI_GRID_POW":"xx_00"}}"#)
        .expect_err("should fail");
    match err {
        ParserError::Encoding { key, source } => {
            assert_eq!(key, "ENERGY.GUI_GRID_POW");
            assert_eq!(source, EncodingError::UnknownPrefix("xx_00".to_string()));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn request_bodies_match_device_contract() {
    assert_eq!(probe_request(), r#"{"STATISTIC":{"STAT_DAY_E_HOUSE":""}}"#);
    assert_eq!(
        poll_request(),
        concat!(
            r#"{"STATISTIC":{"STAT_DAY_E_HOUSE":"","STAT_DAY_E_PV":"","STAT_DAY_BAT_CHARGE":"","#,
            r#""STAT_DAY_BAT_DISCHARGE":"","STAT_DAY_E_GRID_IMPORT":"","STAT_DAY_E_GRID_EXPORT":""},"#,
            r#""ENERGY":{"STAT_STATE":"","GUI_BAT_DATA_POWER":"","GUI_INVERTER_POWER":"","#,
            r#""GUI_HOUSE_POW":"","GUI_GRID_POW":"","STAT_MAINT_REQUIRED":"","#,
            r#""GUI_BAT_DATA_FUEL_CHARGE":"","GUI_CHARGING_INFO":"","GUI_BOOSTING_INFO":""},"#,
            r#""WIZARD":{"CONFIG_LOADED":""},"SYS_UPDATE":{"UPDATE_AVAILABLE":""}}"#
        )
    );
}
