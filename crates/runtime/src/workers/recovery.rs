//! Startup recovery of live battles from the durable store.

use std::sync::Arc;

use tracing::{info, warn};

use battle_core::SessionStatus;

use crate::api::{Result, RuntimeError};
use crate::events::{CombatEvent, EventContext, EventPayload, EventSeverity};
use crate::repository::BattleStore;

use super::session::SessionContext;

/// Reloads every `Active` session from `store` and spawns its worker.
///
/// A store that cannot be read at all is fatal: starting without the live
/// battles would silently abandon them. Returns how many sessions came back.
pub(crate) async fn recover_sessions(
    context: &Arc<SessionContext>,
    store: &dyn BattleStore,
) -> Result<usize> {
    let stored = store
        .load_by_status(SessionStatus::Active)
        .await
        .map_err(RuntimeError::StoreUnavailable)?;

    let mut recovered = 0;
    for record in stored {
        let session = record.into_session();
        let id = session.id;
        if context.registry.get(id).is_some() {
            warn!(session = %id, "Session already live, skipping stored copy");
            continue;
        }

        context.registry.observe_id(id);
        info!(
            session = %id,
            round = session.round,
            turn_serial = session.turn_serial,
            units = session.units.len(),
            "Recovered session"
        );
        context.restore(session);
        recovered += 1;
    }

    if recovered > 0 {
        context.event_bus.publish(CombatEvent::new(
            EventContext::System,
            EventSeverity::Notice,
            format!("Recovered {recovered} live battle(s) after restart"),
            EventPayload::Notice {
                text: format!("recovered {recovered}"),
            },
        ));
    }
    Ok(recovered)
}
