//! Family member (notification target) model.

use safehome_core::notification::{NotificationPreferences, Recipient};
use safehome_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `family_members` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FamilyMember {
    pub id: DbId,
    /// The resident this member watches over.
    pub user_id: DbId,
    /// Linked platform account, used for push delivery.
    pub family_user_id: Option<DbId>,
    pub name: String,
    pub relationship: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub is_emergency_contact: bool,
    pub notification_preferences: serde_json::Value,
    pub priority_order: i32,
    pub avatar: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl FamilyMember {
    pub fn preferences(&self) -> NotificationPreferences {
        NotificationPreferences::from_json(&self.notification_preferences)
    }

    /// View of this member for the notification planning rules.
    pub fn recipient<'a>(&'a self, preferences: &'a NotificationPreferences) -> Recipient<'a> {
        Recipient {
            is_emergency_contact: self.is_emergency_contact,
            phone: self.phone.as_deref(),
            email: self.email.as_deref(),
            preferences,
        }
    }
}
