//! Messaging between users and associations.

use std::collections::HashMap;

use db::models::{
    association::{Association, AssociationSummary},
    message::{CreateMessage, Message, Party, PartyType},
    user::{User, UserSummary},
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info};
use ts_rs::TS;
use utils::validation::ValidationErrors;
use uuid::Uuid;

pub const MAX_MESSAGE_LEN: usize = 1000;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),
    #[error("{0}")]
    NotFound(&'static str),
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct SendMessage {
    pub message_content: Option<String>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct Conversation {
    pub messages: Vec<Message>,
    pub association: AssociationSummary,
    pub user: UserSummary,
}

/// Who sent an inbox message. `None` on the message when the sender is gone.
#[derive(Debug, Clone, Serialize, TS)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParticipantSummary {
    User(UserSummary),
    Association(AssociationSummary),
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct InboxMessage {
    #[serde(flatten)]
    #[ts(flatten)]
    pub message: Message,
    pub sender: Option<ParticipantSummary>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct Inbox {
    pub messages: Vec<InboxMessage>,
    pub total_unread: usize,
}

pub struct ChatService {
    pool: SqlitePool,
}

impl ChatService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn conversation(
        &self,
        user: &User,
        association_id: Uuid,
    ) -> Result<Conversation, ChatError> {
        let association = Association::find_by_id(&self.pool, association_id)
            .await?
            .ok_or(ChatError::NotFound("Association not found"))?;
        let messages = Message::find_conversation(&self.pool, user.id, association.id).await?;
        Ok(Conversation {
            messages,
            association: association.summary(),
            user: user.summary(),
        })
    }

    pub async fn send_to_association(
        &self,
        user: &User,
        association_id: Uuid,
        payload: SendMessage,
    ) -> Result<Message, ChatError> {
        let content = validate_content(payload)?;
        let association = Association::find_by_id(&self.pool, association_id)
            .await?
            .ok_or(ChatError::NotFound("Association not found"))?;
        self.send(Party::user(user.id), Party::association(association.id), content)
            .await
    }

    pub async fn send_to_user(
        &self,
        association: &Association,
        user_id: Uuid,
        payload: SendMessage,
    ) -> Result<Message, ChatError> {
        let content = validate_content(payload)?;
        let user = User::find_by_id(&self.pool, user_id)
            .await?
            .ok_or(ChatError::NotFound("User not found"))?;
        self.send(Party::association(association.id), Party::user(user.id), content)
            .await
    }

    async fn send(
        &self,
        sender: Party,
        receiver: Party,
        message_content: String,
    ) -> Result<Message, ChatError> {
        let message = Message::create(
            &self.pool,
            Uuid::new_v4(),
            &CreateMessage {
                sender,
                receiver,
                message_content,
            },
        )
        .await?;
        info!(
            message_id = %message.id,
            sender_type = %sender.kind,
            receiver_type = %receiver.kind,
            "Message sent"
        );
        Ok(message)
    }

    pub async fn mark_read(&self, receiver: Party, sender_id: Uuid) -> Result<u64, ChatError> {
        let updated = Message::mark_read(&self.pool, receiver, sender_id).await?;
        debug!(receiver_id = %receiver.id, sender_id = %sender_id, updated, "Marked messages read");
        Ok(updated)
    }

    /// Messages received by `receiver`, newest first, with their senders.
    pub async fn inbox(&self, receiver: Party) -> Result<Inbox, ChatError> {
        let received = Message::find_received(&self.pool, receiver).await?;

        let mut senders: HashMap<Party, Option<ParticipantSummary>> = HashMap::new();
        for message in &received {
            let party = message.sender();
            if senders.contains_key(&party) {
                continue;
            }
            let summary = match party.kind {
                PartyType::User => User::find_by_id_with_trashed(&self.pool, party.id)
                    .await?
                    .map(|user| ParticipantSummary::User(user.summary())),
                PartyType::Association => {
                    Association::find_by_id_with_trashed(&self.pool, party.id)
                        .await?
                        .map(|association| ParticipantSummary::Association(association.summary()))
                }
            };
            senders.insert(party, summary);
        }

        let total_unread = received.iter().filter(|m| m.is_unread()).count();
        let messages = received
            .into_iter()
            .map(|message| {
                let sender = senders.get(&message.sender()).cloned().flatten();
                InboxMessage { message, sender }
            })
            .collect();

        Ok(Inbox {
            messages,
            total_unread,
        })
    }
}

fn validate_content(payload: SendMessage) -> Result<String, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let content = payload.message_content.filter(|c| !c.trim().is_empty());
    if errors.required("message_content", content.as_deref()) {
        errors.max_len("message_content", content.as_deref(), MAX_MESSAGE_LEN);
    }
    errors.into_result()?;
    Ok(content.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use db::{
        DBService,
        models::{
            association::CreateAssociation,
            user::{CreateUser, UserType},
        },
    };

    use super::*;

    async fn seed() -> (DBService, User, Association) {
        let db = DBService::new_in_memory().await.unwrap();
        let user = User::create(
            &db.pool,
            Uuid::new_v4(),
            &CreateUser {
                first_name: "Imane".to_string(),
                last_name: "Chraibi".to_string(),
                email: "imane@example.org".to_string(),
                password_hash: "hash".to_string(),
                phone: None,
                address: None,
                user_type: UserType::Recipient,
            },
        )
        .await
        .unwrap();
        let association = Association::create(
            &db.pool,
            Uuid::new_v4(),
            &CreateAssociation {
                user_id: None,
                name: "Dar Al Atfal".to_string(),
                email: "dar@example.org".to_string(),
                password_hash: "hash".to_string(),
                phone: None,
                address: None,
                description: None,
                category: None,
            },
        )
        .await
        .unwrap();
        (db, user, association)
    }

    fn text(content: &str) -> SendMessage {
        SendMessage {
            message_content: Some(content.to_string()),
        }
    }

    #[tokio::test]
    async fn conversation_round_trip() {
        let (db, user, association) = seed().await;
        let chat = ChatService::new(db.pool.clone());

        chat.send_to_association(&user, association.id, text("Salam"))
            .await
            .unwrap();
        chat.send_to_user(&association, user.id, text("Wa alaykum salam"))
            .await
            .unwrap();

        let conversation = chat.conversation(&user, association.id).await.unwrap();
        assert_eq!(conversation.messages.len(), 2);
        assert_eq!(conversation.messages[0].message_content, "Salam");
        assert_eq!(conversation.association.name, "Dar Al Atfal");
        assert_eq!(conversation.user.first_name, "Imane");
    }

    #[tokio::test]
    async fn content_is_validated_and_receivers_must_exist() {
        let (db, user, association) = seed().await;
        let chat = ChatService::new(db.pool.clone());

        assert!(matches!(
            chat.send_to_association(&user, association.id, text("   "))
                .await,
            Err(ChatError::Validation(e)) if e.has("message_content")
        ));
        let too_long = "x".repeat(MAX_MESSAGE_LEN + 1);
        assert!(matches!(
            chat.send_to_association(&user, association.id, text(&too_long))
                .await,
            Err(ChatError::Validation(_))
        ));
        assert!(matches!(
            chat.send_to_association(&user, Uuid::new_v4(), text("hello"))
                .await,
            Err(ChatError::NotFound(_))
        ));
        assert!(matches!(
            chat.send_to_user(&association, Uuid::new_v4(), text("hello"))
                .await,
            Err(ChatError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn inbox_counts_unread_and_names_senders() {
        let (db, user, association) = seed().await;
        let chat = ChatService::new(db.pool.clone());

        chat.send_to_user(&association, user.id, text("first"))
            .await
            .unwrap();
        chat.send_to_user(&association, user.id, text("second"))
            .await
            .unwrap();

        let inbox = chat.inbox(Party::user(user.id)).await.unwrap();
        assert_eq!(inbox.total_unread, 2);
        assert_eq!(inbox.messages[0].message.message_content, "second");
        assert!(matches!(
            &inbox.messages[0].sender,
            Some(ParticipantSummary::Association(a)) if a.id == association.id
        ));

        assert_eq!(
            chat.mark_read(Party::user(user.id), association.id)
                .await
                .unwrap(),
            2
        );
        let inbox = chat.inbox(Party::user(user.id)).await.unwrap();
        assert_eq!(inbox.total_unread, 0);

        let json = serde_json::to_value(&inbox.messages[0]).unwrap();
        assert_eq!(json["sender"]["type"], "association");
        assert_eq!(json["message_content"], "second");
    }
}
