//! SSAP wire protocol for webOS TVs: the register handshake, correlated
//! request frames, and the inbound message envelope.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::RemoteError;
use crate::model::PairingKind;

pub const SECURE_PORT: u16 = 3001;
pub const INSECURE_PORT: u16 = 3000;

/// Fixed correlation id of the register request; the TV reuses it on the
/// pairing-mode reply and the final `registered` frame.
pub const REGISTER_ID: &str = "register_0";

pub mod uri {
    pub const TURN_OFF: &str = "ssap://system/turnOff";
    pub const VOLUME_UP: &str = "ssap://audio/volumeUp";
    pub const VOLUME_DOWN: &str = "ssap://audio/volumeDown";
    pub const PLAY: &str = "ssap://media.controls/play";
    pub const PAUSE: &str = "ssap://media.controls/pause";
    pub const REWIND: &str = "ssap://media.controls/rewind";
    pub const FAST_FORWARD: &str = "ssap://media.controls/fastForward";
    pub const CHANNEL_UP: &str = "ssap://tv/channelUp";
    pub const CHANNEL_DOWN: &str = "ssap://tv/channelDown";
    pub const SWITCH_INPUT: &str = "ssap://tv/switchInput";
    pub const INSERT_TEXT: &str = "ssap://com.webos.service.ime/insertText";
    pub const SEND_ENTER: &str = "ssap://com.webos.service.ime/sendEnterKey";
    pub const LAUNCH: &str = "ssap://system.launcher/launch";
    pub const LIST_APPS: &str = "ssap://com.webos.applicationManager/listApps";
    pub const SYSTEM_INFO: &str = "ssap://system/getSystemInfo";
    pub const POINTER_SOCKET: &str = "ssap://com.webos.service.networkinput/getPointerInputSocket";
    pub const SET_PIN: &str = "ssap://pairing/setPin";
}

/// One outbound SSAP request: a service URI plus optional payload.
#[derive(Debug, Clone)]
pub struct SsapRequest {
    pub uri: String,
    pub payload: Option<Value>,
}

impl SsapRequest {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            payload: None,
        }
    }

    pub fn with_payload(uri: impl Into<String>, payload: Value) -> Self {
        Self {
            uri: uri.into(),
            payload: Some(payload),
        }
    }

    pub fn launch_app(app_id: &str) -> Self {
        Self::with_payload(uri::LAUNCH, json!({ "id": app_id }))
    }

    pub fn insert_text(text: &str) -> Self {
        Self::with_payload(uri::INSERT_TEXT, json!({ "text": text, "replace": true }))
    }

    pub fn set_pin(pin: &str) -> Self {
        Self::with_payload(uri::SET_PIN, json!({ "pin": pin }))
    }
}

/// Serialize a correlated request frame.
pub fn request_frame(id: &str, request: &SsapRequest) -> String {
    let mut frame = json!({
        "type": "request",
        "id": id,
        "uri": request.uri,
    });
    if let Some(payload) = &request.payload {
        frame["payload"] = payload.clone();
    }
    frame.to_string()
}

/// Frame written to the pointer input socket for one physical key press.
pub fn button_frame(name: &str) -> String {
    format!("type:button\nname:{}\n\n", name)
}

/// The register handshake. Carries the permission manifest the TV shows the
/// user on first pairing, the requested pairing mode, and the stored client
/// key when one exists.
pub fn register_frame(pairing: PairingKind, client_key: Option<&str>) -> String {
    let pairing_type = match pairing {
        PairingKind::Prompt => "PROMPT",
        PairingKind::Pin => "PIN",
    };

    let permissions = json!([
        "LAUNCH",
        "LAUNCH_WEBAPP",
        "APP_TO_APP",
        "CLOSE",
        "TEST_OPEN",
        "TEST_PROTECTED",
        "CONTROL_AUDIO",
        "CONTROL_DISPLAY",
        "CONTROL_INPUT_JOYSTICK",
        "CONTROL_INPUT_MEDIA_RECORDING",
        "CONTROL_INPUT_MEDIA_PLAYBACK",
        "CONTROL_INPUT_TEXT",
        "CONTROL_INPUT_TV",
        "CONTROL_MOUSE_AND_KEYBOARD",
        "CONTROL_POWER",
        "READ_APP_STATUS",
        "READ_CURRENT_CHANNEL",
        "READ_INPUT_DEVICE_LIST",
        "READ_INSTALLED_APPS",
        "READ_NETWORK_STATE",
        "READ_RUNNING_APPS",
        "READ_TV_CHANNEL_LIST",
        "WRITE_NOTIFICATION_TOAST",
        "READ_POWER_STATE",
        "READ_COUNTRY_INFO"
    ]);

    let mut payload = json!({
        "forcePairing": false,
        "pairingType": pairing_type,
        "manifest": {
            "manifestVersion": 1,
            "appVersion": "1.1",
            "signed": {
                "created": "20140509",
                "appId": "com.lge.test",
                "vendorId": "com.lge",
                "localizedAppNames": {
                    "": "Universal Remote",
                    "en-US": "Universal Remote"
                },
                "localizedVendorNames": {
                    "": "LG Electronics"
                },
                "permissions": permissions.clone(),
                "serial": "2f930e2d2cfe083771f68e4fe7bb07"
            },
            "permissions": permissions,
            "signatures": [
                {
                    "signatureVersion": 1,
                    "signature": "eyJhbGdvcml0aG0iOiJSU0EtU0hBMjU2Iiwia2V5SWQiOiJ0ZXN0LXNpZ25pbmctY2VydCIsInNpZ25hdHVyZVZlcnNpb24iOjF9.hrVRgjCwXVvE2OOSpDZ58hR+59aFNwYDyjQgKk3auukd7pcegmE2CzPCa0bJ0ZsRAcKkCTJrWo5iDzNhMBWRyaMOv5zWSrthlf7G128qvIlpMT0YNY+n/FaOHE73uLrS/g7swl3/qH/BGFG2Hu4RlL48eb3lLKqTt2xKHdCs6Cd4RMfJPYnzgvI4BNrFUKsjkcu+WD4OO2A27Pq1n50cMchmcaXadJhGrOqH5YmHdOCj5NSHzJYrsW0HPlpuAx/ECMeIZYDh6RMqaFM2DXzdKX9NmmyqzJ3o/0lkk/N97gfVRLW5hA29yeAwaCViZNCP8iC9aO0q9fQojoa7NQnAtw=="
                }
            ]
        }
    });

    if let Some(key) = client_key {
        payload["client-key"] = Value::String(key.to_string());
    }

    json!({
        "type": "register",
        "id": REGISTER_ID,
        "payload": payload,
    })
    .to_string()
}

/// Inbound message envelope. `kind` distinguishes request replies
/// (`response`), the terminal pairing frame (`registered`), and failures
/// (`error`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SsapMessage {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub payload: Option<Value>,
}

impl SsapMessage {
    pub fn parse(text: &str) -> Result<Self, RemoteError> {
        serde_json::from_str(text).map_err(|_| RemoteError::InvalidResponse)
    }

    pub fn is_registered(&self) -> bool {
        self.kind.as_deref() == Some("registered")
    }

    pub fn is_error(&self) -> bool {
        self.kind.as_deref() == Some("error")
    }

    /// Pairing mode the TV chose, from the register reply.
    pub fn pairing_kind(&self) -> Option<PairingKind> {
        match self.payload.as_ref()?.get("pairingType")?.as_str()? {
            "PROMPT" => Some(PairingKind::Prompt),
            "PIN" => Some(PairingKind::Pin),
            _ => None,
        }
    }

    pub fn client_key(&self) -> Option<&str> {
        self.payload.as_ref()?.get("client-key")?.as_str()
    }

    pub fn device_id(&self) -> Option<&str> {
        self.payload.as_ref()?.get("deviceId")?.as_str()
    }

    pub fn socket_path(&self) -> Option<&str> {
        self.payload.as_ref()?.get("socketPath")?.as_str()
    }

    pub fn return_value(&self) -> bool {
        self.payload
            .as_ref()
            .and_then(|payload| payload.get("returnValue"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_frame_without_key() {
        let frame = register_frame(PairingKind::Prompt, None);
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["type"], "register");
        assert_eq!(value["id"], REGISTER_ID);
        assert_eq!(value["payload"]["pairingType"], "PROMPT");
        assert!(value["payload"].get("client-key").is_none());
    }

    #[test]
    fn test_register_frame_carries_stored_key_and_pin_mode() {
        let frame = register_frame(PairingKind::Pin, Some("secret-key"));
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["payload"]["pairingType"], "PIN");
        assert_eq!(value["payload"]["client-key"], "secret-key");
    }

    #[test]
    fn test_request_frame_shape() {
        let request = SsapRequest::launch_app("netflix");
        let frame = request_frame("req-1", &request);
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["type"], "request");
        assert_eq!(value["id"], "req-1");
        assert_eq!(value["uri"], uri::LAUNCH);
        assert_eq!(value["payload"]["id"], "netflix");
    }

    #[test]
    fn test_parse_register_reply_extracts_pairing_kind() {
        let message = SsapMessage::parse(
            r#"{"type":"response","id":"register_0","payload":{"pairingType":"PIN","returnValue":true}}"#,
        )
        .unwrap();
        assert_eq!(message.pairing_kind(), Some(PairingKind::Pin));
        assert!(message.return_value());
        assert!(!message.is_registered());
    }

    #[test]
    fn test_parse_registered_frame_extracts_client_key() {
        let message = SsapMessage::parse(
            r#"{"type":"registered","id":"register_0","payload":{"client-key":"abcd"}}"#,
        )
        .unwrap();
        assert!(message.is_registered());
        assert_eq!(message.client_key(), Some("abcd"));
    }

    #[test]
    fn test_parse_error_frame() {
        let message =
            SsapMessage::parse(r#"{"type":"error","id":"register_0","error":"403 pairing denied"}"#)
                .unwrap();
        assert!(message.is_error());
        assert_eq!(message.error.as_deref(), Some("403 pairing denied"));
    }

    #[test]
    fn test_parse_garbage_is_invalid_response() {
        assert_eq!(
            SsapMessage::parse("not json").unwrap_err(),
            RemoteError::InvalidResponse
        );
    }

    #[test]
    fn test_button_frame_layout() {
        assert_eq!(button_frame("UP"), "type:button\nname:UP\n\n");
    }
}
