use henkan_protocol::*;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn sample_key_event() -> KeyEvent {
    KeyEvent::special(SpecialKey::Space).with_modifier(ModifierKey::Shift)
}

fn sample_config() -> Config {
    Config {
        verbose_level: Some(2),
        incognito_mode: Some(true),
        session_keymap: Some(SessionKeymap::Msime),
        ..Config::default()
    }
}

fn sample_output() -> Output {
    Output {
        id: SessionId(123),
        consumed: true,
        error_code: ErrorCode::SessionSuccess,
        preedit: Some(Preedit {
            cursor: 2,
            segments: vec![
                PreeditSegment {
                    value: "かん".to_string(),
                    highlighted: true,
                },
                PreeditSegment {
                    value: "じ".to_string(),
                    highlighted: false,
                },
            ],
        }),
        candidates: Some(Candidates {
            focused_index: Some(0),
            size: 2,
            candidates: vec![
                Candidate {
                    id: 0,
                    value: "漢字".to_string(),
                    annotation: None,
                },
                Candidate {
                    id: 1,
                    value: "感じ".to_string(),
                    annotation: Some("feeling".to_string()),
                },
            ],
        }),
        result: None,
        elapsed_time: Some(850),
        config: None,
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap()
}

#[test]
fn create_session_omits_sentinel_id() {
    let input = Input::new(CommandType::CreateSession);
    assert_eq!(to_value(&input), json!({ "type": "CREATE_SESSION" }));
}

#[test]
fn send_key_request_shape() {
    let input = Input::new(CommandType::SendKey)
        .with_id(SessionId(7))
        .with_key(sample_key_event());

    assert_eq!(
        to_value(&input),
        json!({
            "type": "SEND_KEY",
            "id": 7,
            "key": { "special_key": "SPACE", "modifier_keys": ["SHIFT"] }
        })
    );
}

#[test]
fn every_command_type_uses_wire_name() {
    for kind in CommandType::ALL {
        let value = to_value(&Input::new(kind));
        assert_eq!(value["type"], Value::String(kind.as_str().to_string()));
    }
}

#[test]
fn overlay_config_is_carried_only_when_set() {
    let input = Input::new(CommandType::NoOperation);
    assert!(to_value(&input).get("config").is_none());

    let overlay = Config {
        use_cascading_window: Some(false),
        ..Config::default()
    };
    let input = Input::new(CommandType::NoOperation).with_config(overlay);
    assert_eq!(
        to_value(&input)["config"],
        json!({ "use_cascading_window": false })
    );
}

#[test]
fn session_command_request_shape() {
    let mut command = SessionCommand::new(SessionCommandType::SelectCandidate);
    command.id = Some(3);
    let input = Input::new(CommandType::SendCommand)
        .with_id(SessionId(9))
        .with_command(command);

    assert_eq!(
        to_value(&input)["command"],
        json!({ "type": "SELECT_CANDIDATE", "id": 3 })
    );
}

#[test]
fn output_parses_from_minimal_body() {
    let output = Output::from_json(r#"{"id":5}"#).unwrap();
    assert_eq!(output.id, SessionId(5));
    assert!(!output.consumed);
    assert!(output.is_success());
    assert!(output.preedit.is_none());
}

#[test]
fn output_preserves_rich_payload() {
    let json = sample_output().to_json().unwrap();
    let parsed = Output::from_json(&json).unwrap();
    assert_eq!(parsed, sample_output());
    assert_eq!(parsed.preedit.unwrap().text(), "かんじ");
}

#[test]
fn output_rejects_garbage() {
    assert!(Output::from_json("this is not json").is_err());
    assert!(Output::from_json(r#"{"id":"abc"}"#).is_err());
    assert!(Output::from_json(r#"{"error_code":"EXPLODED"}"#).is_err());
}

#[test]
fn get_config_snapshot_keeps_unknown_fields() {
    let body = json!({
        "id": 0,
        "config": {
            "verbose_level": 2,
            "incognito_mode": true,
            "preedit_method": "KANA",
            "suggestions_size": 3
        }
    });
    let output: Output = serde_json::from_value(body).unwrap();
    let config = output.config.unwrap();

    assert_eq!(config.verbose_level, Some(2));
    assert_eq!(config.incognito_mode, Some(true));
    assert_eq!(config.extra.get("preedit_method"), Some(&json!("KANA")));
    assert_eq!(config.extra.get("suggestions_size"), Some(&json!(3)));

    let echoed = to_value(&config);
    assert_eq!(echoed["preedit_method"], json!("KANA"));
}

#[test]
fn set_config_payload_shape() {
    let input = Input::new(CommandType::SetConfig).with_config(sample_config());
    assert_eq!(
        to_value(&input),
        json!({
            "type": "SET_CONFIG",
            "config": {
                "verbose_level": 2,
                "incognito_mode": true,
                "session_keymap": "MSIME"
            }
        })
    );
}

#[test]
fn request_frame_carries_client_versions() {
    let frame = RequestFrame::new("{}".to_string());
    assert_eq!(frame.protocol_version, PROTOCOL_VERSION);
    assert_eq!(frame.product_version, PRODUCT_VERSION);

    let line = frame.to_json().unwrap();
    assert!(!line.contains('\n'));
    assert_eq!(RequestFrame::from_json(&line).unwrap(), frame);
}

#[test]
fn response_frame_header_is_readable_with_broken_body() {
    let line = r#"{"protocol_version":2,"product_version":"0.9.1.0","pid":4242,"body":"%%garbage%%"}"#;
    let frame = ResponseFrame::from_json(line).unwrap();

    assert_eq!(frame.protocol_version, 2);
    assert_eq!(frame.product_version.as_deref(), Some("0.9.1.0"));
    assert_eq!(frame.pid, Some(4242));
    assert!(Output::from_json(&frame.body).is_err());
}

#[test]
fn response_frame_without_product_version() {
    let frame = ResponseFrame::from_json(r#"{"protocol_version":3,"body":"{}"}"#).unwrap();
    assert_eq!(frame.product_version, None);
    assert_eq!(frame.pid, None);
}
