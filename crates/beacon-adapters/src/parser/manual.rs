use beacon_ports::error::ParseError;
use beacon_ports::outbound::AlertSourceParser;
use beacon_ports::types::{Intake, ManualAlert, RawAlert};

/// Accepts one manual alert object or an array of them.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManualParser;

const SOURCE: &str = "manual";

fn decode(value: serde_json::Value) -> Result<RawAlert, (String, serde_json::Value)> {
    match serde_json::from_value::<ManualAlert>(value.clone()) {
        Ok(alert) => Ok(RawAlert::from(alert)),
        Err(e) => Err((e.to_string(), value)),
    }
}

impl AlertSourceParser for ManualParser {
    fn parse(&self, payload: &[u8]) -> Result<Vec<RawAlert>, ParseError> {
        let value: serde_json::Value =
            serde_json::from_slice(payload).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

        match value {
            // A lone object is the whole request, so a bad one fails it.
            serde_json::Value::Object(_) => decode(value)
                .map(|alert| vec![alert])
                .map_err(|(reason, _)| ParseError::InvalidPayload(reason)),
            serde_json::Value::Array(items) => Ok(items
                .into_iter()
                .enumerate()
                .map(|(index, item)| {
                    decode(item).unwrap_or_else(|(reason, item)| {
                        RawAlert::malformed(Intake::Manual, SOURCE, format!("[{index}]: {reason}"), item)
                    })
                })
                .collect()),
            _ => Err(ParseError::InvalidPayload(
                "expected an alert object or an array of alerts".into(),
            )),
        }
    }

    fn source_name(&self) -> &str {
        SOURCE
    }
}
