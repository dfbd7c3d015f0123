//! Newsletter subscriptions and contact messages.

use crate::error::{AppError, Result};
use crate::models::{
    is_valid_email, new_id, Contact, ContactRequest, SubscribeRequest, Subscription,
};
use crate::BlogCollections;
use chrono::Utc;
use tracing::info;

const MAX_MESSAGE_CHARS: usize = 5000;

#[derive(Clone)]
pub struct ContactService {
    collections: BlogCollections,
}

impl ContactService {
    pub fn new(collections: BlogCollections) -> Self {
        Self { collections }
    }

    /// Returns the subscription and whether it was newly created.
    pub async fn subscribe(&self, request: SubscribeRequest) -> Result<(Subscription, bool)> {
        let email = request.email.trim().to_ascii_lowercase();
        if !is_valid_email(&email) {
            return Err(AppError::ValidationError("A valid email is required".to_string()));
        }
        let subscription = Subscription {
            id: email.clone(),
            email,
            created_at: Utc::now(),
        };

        let created = self
            .collections
            .subscriptions
            .insert_if_absent(subscription.clone())
            .await?;
        if created {
            info!(email = %subscription.email, "Newsletter subscription created");
            return Ok((subscription, true));
        }
        let existing = self
            .collections
            .subscriptions
            .get(&subscription.id)
            .await?
            .map(|v| v.doc)
            .unwrap_or(subscription);
        Ok((existing, false))
    }

    pub async fn contact(&self, request: ContactRequest) -> Result<Contact> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(AppError::ValidationError("Name is required".to_string()));
        }
        let email = request.email.trim().to_ascii_lowercase();
        if !is_valid_email(&email) {
            return Err(AppError::ValidationError("A valid email is required".to_string()));
        }
        let message = request.message.trim();
        if message.is_empty() {
            return Err(AppError::ValidationError("Message is required".to_string()));
        }
        if message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(AppError::ValidationError(format!(
                "Message must be at most {} characters",
                MAX_MESSAGE_CHARS
            )));
        }

        let contact = Contact {
            id: new_id(),
            name: name.to_string(),
            email,
            subject: request.subject.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
            message: message.to_string(),
            created_at: Utc::now(),
        };
        let contact = self.collections.contacts.insert(contact).await?.doc;
        info!(contact_id = %contact.id, "Contact message received");
        Ok(contact)
    }
}
