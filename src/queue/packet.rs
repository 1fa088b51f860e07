use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, VerifyError};
use crate::verification::VerificationRequest;

pub const VERIFY_COMMAND: &str = "verify";

/// Metadata keys carried by a verify packet
pub mod meta {
    pub const AVATAR_HASH: &str = "userAvatarHash";
    pub const USER_NAME: &str = "userName";
    pub const DISCRIMINATOR: &str = "discriminator";
    pub const JOINED_AT: &str = "discordJoinedAt";
    pub const CHANNEL_ID: &str = "channelId";
    pub const TOKEN: &str = "token";
    pub const APPLICATION_ID: &str = "applicationId";
}

/// Envelope carried on the queue between the command handler and the workers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPacket {
    /// Correlation id used in logs
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub user_id: String,
    pub command_name: String,
    #[serde(default)]
    pub meta_data: HashMap<String, String>,
}

impl DataPacket {
    pub fn verify(user_id: impl Into<String>, meta_data: HashMap<String, String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            command_name: VERIFY_COMMAND.to_string(),
            meta_data,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl From<&VerificationRequest> for DataPacket {
    fn from(request: &VerificationRequest) -> Self {
        let meta_data = HashMap::from([
            (meta::AVATAR_HASH.to_string(), request.avatar_hash.clone()),
            (meta::USER_NAME.to_string(), request.user_name.clone()),
            (meta::DISCRIMINATOR.to_string(), request.discriminator.clone()),
            (meta::JOINED_AT.to_string(), request.joined_at.clone()),
            (meta::CHANNEL_ID.to_string(), request.channel_id.clone()),
            (meta::TOKEN.to_string(), request.interaction_token.clone()),
            (meta::APPLICATION_ID.to_string(), request.application_id.clone()),
        ]);
        DataPacket::verify(request.user_id.clone(), meta_data)
    }
}

impl TryFrom<DataPacket> for VerificationRequest {
    type Error = VerifyError;

    fn try_from(packet: DataPacket) -> Result<Self> {
        if packet.command_name != VERIFY_COMMAND {
            return Err(VerifyError::InvalidPacket {
                message: format!("unexpected command '{}'", packet.command_name),
            });
        }
        if packet.user_id.trim().is_empty() {
            return Err(VerifyError::InvalidPacket {
                message: "missing user id".to_string(),
            });
        }

        let mut fields = packet.meta_data;
        let interaction_token = required_field(&mut fields, meta::TOKEN)?;
        let application_id = required_field(&mut fields, meta::APPLICATION_ID)?;

        Ok(VerificationRequest {
            user_id: packet.user_id,
            user_name: fields.remove(meta::USER_NAME).unwrap_or_default(),
            discriminator: fields.remove(meta::DISCRIMINATOR).unwrap_or_default(),
            avatar_hash: fields.remove(meta::AVATAR_HASH).unwrap_or_default(),
            joined_at: fields.remove(meta::JOINED_AT).unwrap_or_default(),
            channel_id: fields.remove(meta::CHANNEL_ID).unwrap_or_default(),
            interaction_token,
            application_id,
        })
    }
}

fn required_field(fields: &mut HashMap<String, String>, key: &str) -> Result<String> {
    fields
        .remove(key)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| VerifyError::InvalidPacket {
            message: format!("missing metadata '{}'", key),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> VerificationRequest {
        VerificationRequest {
            user_id: "123".to_string(),
            user_name: "ankush".to_string(),
            discriminator: "0".to_string(),
            avatar_hash: "a1b2c3".to_string(),
            joined_at: "2024-01-01T00:00:00Z".to_string(),
            channel_id: "456".to_string(),
            interaction_token: "interaction-token".to_string(),
            application_id: "789".to_string(),
        }
    }

    #[test]
    fn test_packet_wire_format() {
        let packet = DataPacket::from(&request());
        let json: serde_json::Value = serde_json::from_slice(&packet.encode().unwrap()).unwrap();

        assert_eq!(json["userId"], "123");
        assert_eq!(json["commandName"], "verify");
        assert_eq!(json["metaData"]["userAvatarHash"], "a1b2c3");
        assert_eq!(json["metaData"]["token"], "interaction-token");
    }

    #[test]
    fn test_packet_converts_to_request() {
        let packet = DataPacket::decode(&DataPacket::from(&request()).encode().unwrap()).unwrap();
        assert_eq!(VerificationRequest::try_from(packet).unwrap(), request());
    }

    #[test]
    fn test_packet_without_id_gets_one() {
        let packet = DataPacket::decode(
            br#"{"userId":"1","commandName":"verify","metaData":{"token":"t","applicationId":"2"}}"#,
        )
        .unwrap();
        assert!(!packet.id.is_nil());

        let request = VerificationRequest::try_from(packet).unwrap();
        assert_eq!(request.avatar_hash, "");
        assert_eq!(request.application_id, "2");
    }

    #[test]
    fn test_invalid_packets() {
        let mut wrong_command = DataPacket::from(&request());
        wrong_command.command_name = "hello".to_string();
        assert!(matches!(
            VerificationRequest::try_from(wrong_command),
            Err(VerifyError::InvalidPacket { .. })
        ));

        let mut missing_token = DataPacket::from(&request());
        missing_token.meta_data.remove(meta::TOKEN);
        assert!(matches!(
            VerificationRequest::try_from(missing_token),
            Err(VerifyError::InvalidPacket { .. })
        ));

        assert!(matches!(
            DataPacket::decode(b"not json"),
            Err(VerifyError::InvalidPacket { .. })
        ));
    }
}
