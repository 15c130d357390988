//! Profile business logic - sign-up records, login resolution and role checks.
//!
//! Passwords and sessions stay with the identity provider; this module only
//! owns the `profiles` rows the rest of the marketplace reads.

use crate::{
    config::settings::AdminSeed,
    entities::{Profile, Role, profile},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::{debug, info};

/// Sign-up fields.
#[derive(Debug, Clone)]
pub struct NewProfile {
    /// Identity id issued by the identity provider
    pub id: String,
    /// Login name
    pub username: String,
    /// Email
    pub email: String,
    /// Contact phone
    pub phone: Option<String>,
    /// Area
    pub location: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Creates a profile with the given role.
///
/// # Errors
/// Returns a validation error for blank fields or a malformed email, and a
/// database error when the username or email is already taken.
pub async fn create_profile(
    db: &DatabaseConnection,
    new: NewProfile,
    role: Role,
) -> Result<profile::Model> {
    let username = new.username.trim();
    let email = new.email.trim().to_lowercase();

    if new.id.trim().is_empty() {
        return Err(Error::Validation {
            message: "Profile id cannot be empty".to_string(),
        });
    }
    if username.is_empty() {
        return Err(Error::Validation {
            message: "اسم المستخدم مطلوب".to_string(),
        });
    }
    if username.contains('@') {
        return Err(Error::Validation {
            message: "اسم المستخدم لا يمكن أن يحتوي على @".to_string(),
        });
    }
    if !email.contains('@') {
        return Err(Error::Validation {
            message: "البريد الإلكتروني غير صحيح".to_string(),
        });
    }

    let model = profile::ActiveModel {
        id: Set(new.id.trim().to_string()),
        username: Set(username.to_string()),
        email: Set(email),
        phone: Set(non_blank(new.phone)),
        location: Set(non_blank(new.location)),
        role: Set(role),
        created_at: Set(chrono::Utc::now()),
    };
    let created = model.insert(db).await?;
    debug!(profile = %created.id, "Profile created");
    Ok(created)
}

/// Finds a profile by id.
pub async fn get_profile(db: &DatabaseConnection, id: &str) -> Result<Option<profile::Model>> {
    Profile::find_by_id(id.to_string())
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a profile by id, failing when absent.
pub async fn require_profile(db: &DatabaseConnection, id: &str) -> Result<profile::Model> {
    get_profile(db, id)
        .await?
        .ok_or_else(|| Error::ProfileNotFound { id: id.to_string() })
}

/// Ensures `user_id` is a moderator before a moderator-only `action`.
pub async fn require_admin(
    db: &DatabaseConnection,
    user_id: &str,
    action: &str,
) -> Result<profile::Model> {
    match get_profile(db, user_id).await? {
        Some(profile) if profile.is_admin() => Ok(profile),
        _ => Err(Error::Unauthorized {
            user_id: user_id.to_string(),
            action: action.to_string(),
        }),
    }
}

/// Maps a username-or-email login identifier to the email the identity
/// provider signs in with.
///
/// # Errors
/// Returns [`Error::InvalidCredentials`] when a username has no profile.
pub async fn resolve_login_email(db: &DatabaseConnection, identifier: &str) -> Result<String> {
    let identifier = identifier.trim();
    if identifier.is_empty() {
        return Err(Error::InvalidCredentials);
    }
    if identifier.contains('@') {
        return Ok(identifier.to_lowercase());
    }
    Profile::find()
        .filter(profile::Column::Username.eq(identifier))
        .one(db)
        .await?
        .map(|p| p.email)
        .ok_or(Error::InvalidCredentials)
}

/// All moderators.
pub async fn list_admins(db: &DatabaseConnection) -> Result<Vec<profile::Model>> {
    Profile::find()
        .filter(profile::Column::Role.eq(Role::Admin))
        .order_by_asc(profile::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Profiles whose location equals `location` exactly, except `exclude_id`.
pub async fn neighbors_of(
    db: &DatabaseConnection,
    location: &str,
    exclude_id: &str,
) -> Result<Vec<profile::Model>> {
    Profile::find()
        .filter(profile::Column::Location.eq(location))
        .filter(profile::Column::Id.ne(exclude_id))
        .order_by_asc(profile::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Profiles in `location`, or every profile when `None`.
pub async fn profiles_in(
    db: &DatabaseConnection,
    location: Option<&str>,
) -> Result<Vec<profile::Model>> {
    let mut query = Profile::find();
    if let Some(location) = location {
        query = query.filter(profile::Column::Location.eq(location));
    }
    query
        .order_by_asc(profile::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Creates or promotes the configured moderators. Safe to run repeatedly.
pub async fn seed_admins(db: &DatabaseConnection, seeds: &[AdminSeed]) -> Result<usize> {
    let mut changed = 0;
    for seed in seeds {
        match get_profile(db, &seed.id).await? {
            Some(existing) if existing.is_admin() => {}
            Some(existing) => {
                let mut active: profile::ActiveModel = existing.into();
                active.role = Set(Role::Admin);
                active.update(db).await?;
                changed += 1;
            }
            None => {
                create_profile(
                    db,
                    NewProfile {
                        id: seed.id.clone(),
                        username: seed.username.clone(),
                        email: seed.email.clone(),
                        phone: seed.phone.clone(),
                        location: seed.location.clone(),
                    },
                    Role::Admin,
                )
                .await?;
                changed += 1;
            }
        }
    }
    info!("Seeded {changed} of {} configured admins", seeds.len());
    Ok(changed)
}
