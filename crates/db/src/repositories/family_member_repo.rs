//! Repository for the `family_members` table.

use safehome_core::types::DbId;
use sqlx::PgPool;

use crate::models::family::FamilyMember;

/// Column list for `family_members` queries.
const COLUMNS: &str = "id, user_id, family_user_id, name, relationship, phone, email, \
                       is_emergency_contact, notification_preferences, priority_order, avatar, \
                       created_at, updated_at";

/// Notification and escalation chain order.
const CHAIN_ORDER: &str = "is_emergency_contact DESC, priority_order, id";

/// Provides lookups of a resident's notification targets.
pub struct FamilyMemberRepo;

impl FamilyMemberRepo {
    /// All members for a resident in chain order.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<FamilyMember>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM family_members \
             WHERE user_id = $1 \
             ORDER BY {CHAIN_ORDER}"
        );
        sqlx::query_as::<_, FamilyMember>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// The member at 0-based `position` in chain order, if there is one.
    pub async fn at_position(
        pool: &PgPool,
        user_id: DbId,
        position: i64,
    ) -> Result<Option<FamilyMember>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM family_members \
             WHERE user_id = $1 \
             ORDER BY {CHAIN_ORDER} \
             OFFSET $2 LIMIT 1"
        );
        sqlx::query_as::<_, FamilyMember>(&query)
            .bind(user_id)
            .bind(position)
            .fetch_optional(pool)
            .await
    }

    /// Highest-priority emergency contact that can be phoned.
    pub async fn primary_emergency_contact(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Option<FamilyMember>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM family_members \
             WHERE user_id = $1 \
               AND is_emergency_contact = true \
               AND phone IS NOT NULL AND btrim(phone) <> '' \
             ORDER BY priority_order, id \
             LIMIT 1"
        );
        sqlx::query_as::<_, FamilyMember>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }
}
