//! Unified error type for the marketplace.
//!
//! Validation errors are raised before any store call. Store, lifecycle and
//! authorization errors carry enough context for the caller to show a message.

use thiserror::Error;

/// Every failure the marketplace can report.
#[derive(Debug, Error)]
pub enum Error {
    /// Settings file could not be read or parsed.
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// A required field is missing or malformed.
    #[error("Validation error: {message}")]
    Validation {
        /// What went wrong
        message: String,
    },

    /// Price is above the platform ceiling.
    #[error("Price {price} exceeds the platform ceiling of {ceiling}")]
    PriceCeilingExceeded {
        /// Offending price
        price: f64,
        /// The ceiling in force
        ceiling: f64,
    },

    /// Amount is not a positive finite number.
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// Offending amount
        amount: f64,
    },

    /// Uploaded image rejected (type, size or count).
    #[error("Invalid image: {message}")]
    InvalidImage {
        /// What went wrong
        message: String,
    },

    /// Listing does not exist.
    #[error("Listing not found: {id}")]
    ListingNotFound {
        /// Listing id
        id: i64,
    },

    /// Profile does not exist.
    #[error("Profile not found: {id}")]
    ProfileNotFound {
        /// Profile id, username or email
        id: String,
    },

    /// Offer does not exist.
    #[error("Offer not found: {id}")]
    OfferNotFound {
        /// Offer id
        id: i64,
    },

    /// Login identifier did not resolve to an account.
    #[error("Invalid login credentials")]
    InvalidCredentials,

    /// Actor is not allowed to perform the action.
    #[error("User {user_id} is not allowed to {action}")]
    Unauthorized {
        /// Acting user
        user_id: String,
        /// Attempted action
        action: String,
    },

    /// The transition table has no edge for this action from this status.
    #[error("Cannot {action} a listing that is {from}")]
    InvalidTransition {
        /// Current status
        from: String,
        /// Attempted action
        action: String,
    },

    /// Another actor changed the listing between read and write.
    #[error("Listing {id} changed concurrently: expected {expected}, found {actual}")]
    StaleState {
        /// Listing id
        id: i64,
        /// Status observed before the update
        expected: String,
        /// Status found after the update was refused
        actual: String,
    },

    /// A store call did not finish in time.
    #[error("Request timed out after {seconds}s")]
    Timeout {
        /// Configured deadline
        seconds: u64,
    },

    /// Underlying store error.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// I/O error (settings file, object store).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Environment variable error.
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// JSON (de)serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Short Arabic message suitable for showing to the end user.
    #[must_use]
    pub fn localized(&self) -> String {
        match self {
            Self::Validation { message } | Self::InvalidImage { message } => message.clone(),
            Self::PriceCeilingExceeded { ceiling, .. } => {
                format!("السعر لا يمكن أن يتجاوز {ceiling} جنيه")
            }
            Self::InvalidAmount { .. } => "من فضلك أدخل سعر صحيح".to_string(),
            Self::InvalidCredentials => "اسم المستخدم أو كلمة المرور غير صحيحة".to_string(),
            Self::Unauthorized { .. } => "غير مسموح لك بتنفيذ هذا الإجراء".to_string(),
            Self::ListingNotFound { .. } => "المنتج غير موجود".to_string(),
            Self::ProfileNotFound { .. } => "المستخدم غير موجود".to_string(),
            Self::OfferNotFound { .. } => "العرض غير موجود".to_string(),
            Self::InvalidTransition { .. } | Self::StaleState { .. } => {
                "تم تحديث حالة المنتج بالفعل، من فضلك أعد تحميل الصفحة".to_string()
            }
            Self::Timeout { .. } => "انتهت مهلة الاتصال، حاول مرة أخرى".to_string(),
            Self::Config { .. }
            | Self::Database(_)
            | Self::Io(_)
            | Self::EnvVar(_)
            | Self::Serialization(_) => "حدث خطأ غير متوقع، حاول لاحقاً".to_string(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
