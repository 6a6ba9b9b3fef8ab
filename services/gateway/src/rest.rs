//! REST chat transport.
//!
//! Talks to a Discord-style message API: POST to create, PATCH to edit,
//! DELETE to remove. Mentions ride in the content prefix and the
//! allowed-mentions object, so a silent message can still spell out a role
//! without pinging it.

use serde_json::json;

use inu_types::{ChatError, ChatTransport, ChannelId, Mention, MessageId, OutboundMessage};

pub struct RestChat {
    http: reqwest::Client,
    base: String,
    token: String,
}

impl RestChat {
    pub fn new(base: impl Into<String>, token: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()?;
        Ok(Self {
            http,
            base: base.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn messages_url(&self, channel: ChannelId) -> String {
        format!("{}/channels/{}/messages", self.base, channel)
    }

    fn message_url(&self, channel: ChannelId, message: MessageId) -> String {
        format!("{}/channels/{}/messages/{}", self.base, channel, message)
    }

    fn auth(&self) -> String {
        format!("Bot {}", self.token)
    }
}

fn body(message: &OutboundMessage) -> serde_json::Value {
    let (prefix, allowed) = match message.mention {
        Mention::None => (String::new(), json!({ "parse": [] })),
        Mention::Role(role) => (format!("<@&{role}> "), json!({ "parse": ["roles"] })),
        Mention::Everyone => ("@everyone ".to_string(), json!({ "parse": ["everyone"] })),
    };
    json!({
        "content": format!("{prefix}{}", message.content),
        "allowed_mentions": allowed,
    })
}

fn transport(err: reqwest::Error) -> ChatError {
    ChatError::Transport(err.to_string())
}

fn map_status(status: reqwest::StatusCode) -> ChatError {
    match status.as_u16() {
        404 => ChatError::NotFound,
        403 => ChatError::Forbidden,
        other => ChatError::Transport(format!("unexpected status {other}")),
    }
}

impl ChatTransport for RestChat {
    async fn send(
        &self,
        channel: ChannelId,
        message: &OutboundMessage,
    ) -> Result<MessageId, ChatError> {
        let response = self
            .http
            .post(self.messages_url(channel))
            .header("Authorization", self.auth())
            .json(&body(message))
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            return Err(map_status(response.status()));
        }
        let value: serde_json::Value = response.json().await.map_err(transport)?;
        value
            .get("id")
            .and_then(|id| id.as_str())
            .and_then(|id| id.parse::<u64>().ok())
            .map(MessageId)
            .ok_or_else(|| ChatError::Transport("response carried no message id".into()))
    }

    async fn edit(
        &self,
        channel: ChannelId,
        message: MessageId,
        update: &OutboundMessage,
    ) -> Result<(), ChatError> {
        let response = self
            .http
            .patch(self.message_url(channel, message))
            .header("Authorization", self.auth())
            .json(&body(update))
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            return Err(map_status(response.status()));
        }
        Ok(())
    }

    async fn delete(&self, channel: ChannelId, message: MessageId) -> Result<(), ChatError> {
        let response = self
            .http
            .delete(self.message_url(channel, message))
            .header("Authorization", self.auth())
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            return Err(map_status(response.status()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_prefixes_role_mention() {
        let message = OutboundMessage::with_mention("update", Mention::Role(inu_types::RoleId(5)));
        let value = body(&message);
        assert_eq!(value["content"], "<@&5> update");
        assert_eq!(value["allowed_mentions"]["parse"][0], "roles");
    }

    #[test]
    fn test_body_without_mention_allows_nothing() {
        let value = body(&OutboundMessage::plain("update"));
        assert_eq!(value["content"], "update");
        assert_eq!(
            value["allowed_mentions"]["parse"]
                .as_array()
                .unwrap()
                .len(),
            0
        );
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            map_status(reqwest::StatusCode::NOT_FOUND),
            ChatError::NotFound
        ));
        assert!(matches!(
            map_status(reqwest::StatusCode::FORBIDDEN),
            ChatError::Forbidden
        ));
        assert!(matches!(
            map_status(reqwest::StatusCode::INTERNAL_SERVER_ERROR),
            ChatError::Transport(_)
        ));
    }
}
