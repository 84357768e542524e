//! Rule lookups for the evaluation worker.

use sqlx::PgPool;

use crate::error::DbError;
use crate::models::Rule;

const COLUMNS: &str = "r.id, r.factory_id, r.name, r.description, r.scope, r.conditions, \
                       r.cooldown_minutes, r.is_active, r.schedule_type, r.schedule_config, \
                       r.severity, r.notification_channels, r.created_by, r.created_at, \
                       r.updated_at";

/// All active rules applicable to a device: global-scope rules for the
/// factory plus rules linked to the device through the join set.
pub async fn active_for_device(
    pool: &PgPool,
    factory_id: i64,
    device_id: i64,
) -> Result<Vec<Rule>, DbError> {
    let rules = sqlx::query_as::<_, Rule>(&format!(
        "SELECT DISTINCT {COLUMNS}
         FROM rules r
         LEFT JOIN rule_devices rd ON rd.rule_id = r.id
         WHERE r.factory_id = $1
           AND r.is_active = TRUE
           AND (r.scope = 'global' OR rd.device_id = $2)"
    ))
    .bind(factory_id)
    .bind(device_id)
    .fetch_all(pool)
    .await?;

    Ok(rules)
}
