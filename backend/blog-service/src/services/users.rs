//! Accounts and profile data. Account creation is announced to the quota services.

use crate::error::{AppError, Result};
use crate::models::{
    is_valid_email, new_id, CreateUserRequest, EmailClaim, SocialMedia, SocialMediaRequest,
    UpdateUserRequest, User, UserProfile,
};
use crate::BlogCollections;
use chrono::Utc;
use document_store::{modify, Filter, StoreError};
use quota_events::{Destination, QuotaEvent, UserCreated};
use tracing::{info, warn};
use transactional_outbox::EventPropagator;

const MAX_NAME_CHARS: usize = 100;
const MAX_BIO_CHARS: usize = 500;

#[derive(Clone)]
pub struct UserService {
    collections: BlogCollections,
    propagator: EventPropagator,
}

impl UserService {
    pub fn new(collections: BlogCollections, propagator: EventPropagator) -> Self {
        Self {
            collections,
            propagator,
        }
    }

    /// Create an account and emit `UserCreated` to every quota destination.
    pub async fn create(&self, request: CreateUserRequest) -> Result<User> {
        let name = validate_name(&request.name)?;
        let email = request.email.trim().to_ascii_lowercase();
        if !is_valid_email(&email) {
            return Err(AppError::ValidationError("A valid email is required".to_string()));
        }
        if let Some(bio) = &request.bio {
            validate_bio(bio)?;
        }
        let username = match request.username.as_deref().map(str::trim) {
            Some(username) if !username.is_empty() => username.to_string(),
            _ => email.split('@').next().unwrap_or_default().to_string(),
        };

        if self
            .collections
            .users
            .find_one(&Filter::new().eq("email", email.as_str()))
            .await?
            .is_some()
        {
            return Err(email_taken());
        }

        let now = Utc::now();
        let user_id = new_id();
        let claim = EmailClaim {
            id: email.clone(),
            user_id: user_id.clone(),
            created_at: now,
        };
        match self.collections.emails.insert(claim).await {
            Ok(_) => {}
            Err(StoreError::AlreadyExists { .. }) => return Err(email_taken()),
            Err(e) => return Err(e.into()),
        }

        let user_email = email.clone();
        let user = User {
            id: user_id,
            name,
            username,
            email,
            bio: request.bio,
            avatar: request.avatar,
            created_at: now,
            updated_at: now,
        };
        let user = match self.collections.users.insert(user).await {
            Ok(stored) => stored.doc,
            Err(e) => {
                if let Err(release) = self.collections.emails.delete(&user_email).await {
                    warn!(error = %release, "Failed to release email claim");
                }
                return Err(e.into());
            }
        };
        info!(user_id = %user.id, "User created");

        let event = QuotaEvent::UserCreated(UserCreated {
            user_id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
        });
        self.propagator.emit_logged(&Destination::ALL, &event).await;

        Ok(user)
    }

    pub async fn get(&self, user_id: &str) -> Result<User> {
        self.collections
            .users
            .get(user_id)
            .await?
            .map(|v| v.doc)
            .ok_or_else(AppError::user_not_found)
    }

    pub async fn profile(&self, user_id: &str) -> Result<UserProfile> {
        let user = self.get(user_id).await?;
        let social_media = self
            .collections
            .social_media
            .get(user_id)
            .await?
            .map(|v| v.doc);
        let followers = self
            .collections
            .follows
            .find(&Filter::new().eq("followeeId", user_id))
            .await?
            .len();
        let following = self
            .collections
            .follows
            .find(&Filter::new().eq("followerId", user_id))
            .await?
            .len();

        Ok(UserProfile {
            user,
            social_media,
            followers,
            following,
        })
    }

    /// Change name and/or bio.
    pub async fn update(&self, user_id: &str, request: UpdateUserRequest) -> Result<User> {
        let name = request.name.as_deref().map(validate_name).transpose()?;
        if let Some(bio) = &request.bio {
            validate_bio(bio)?;
        }
        if name.is_none() && request.bio.is_none() {
            return Err(AppError::ValidationError("Nothing to update".to_string()));
        }

        let updated = modify(self.collections.users.as_ref(), user_id, |user| {
            if let Some(name) = &name {
                user.name = name.clone();
            }
            if let Some(bio) = &request.bio {
                user.bio = Some(bio.trim().to_string());
            }
            user.updated_at = Utc::now();
            Ok::<_, AppError>(())
        })
        .await?;

        updated
            .map(|(v, _)| v.doc)
            .ok_or_else(AppError::user_not_found)
    }

    /// Create or overwrite the user's social media links.
    pub async fn set_social_media(
        &self,
        user_id: &str,
        request: SocialMediaRequest,
    ) -> Result<SocialMedia> {
        self.get(user_id).await?;
        let links = SocialMedia {
            id: user_id.to_string(),
            website: request.website,
            twitter: request.twitter,
            facebook: request.facebook,
            instagram: request.instagram,
            linkedin: request.linkedin,
            github: request.github,
        };

        let replaced = modify(self.collections.social_media.as_ref(), user_id, |current| {
            *current = links.clone();
            Ok::<_, AppError>(())
        })
        .await?;
        if let Some((stored, _)) = replaced {
            return Ok(stored.doc);
        }
        match self.collections.social_media.insert(links.clone()).await {
            Ok(stored) => Ok(stored.doc),
            // Created concurrently; overwrite it.
            Err(document_store::StoreError::AlreadyExists { .. }) => {
                modify(self.collections.social_media.as_ref(), user_id, |current| {
                    *current = links.clone();
                    Ok::<_, AppError>(())
                })
                .await?
                .map(|(v, _)| v.doc)
                .ok_or_else(|| AppError::Internal("Social media record vanished".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn email_taken() -> AppError {
    AppError::BadRequest("Email is already registered".to_string())
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::ValidationError("Name is required".to_string()));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(AppError::ValidationError(format!(
            "Name must be at most {} characters",
            MAX_NAME_CHARS
        )));
    }
    Ok(name.to_string())
}

fn validate_bio(bio: &str) -> Result<()> {
    if bio.trim().chars().count() > MAX_BIO_CHARS {
        return Err(AppError::ValidationError(format!(
            "Bio must be at most {} characters",
            MAX_BIO_CHARS
        )));
    }
    Ok(())
}
