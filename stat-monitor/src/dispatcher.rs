/**
 * DISPATCHER - Rafraîchissement périodique de l'affichage
 *
 * RÔLE : Toutes les secondes :
 * 1. calcule le texte de statut de connexion (frais / inactif / erreur)
 * 2. pour chaque source batterie connue : snapshot => schéma => formatage => sink,
 *    avec une notification d'allocation la première fois qu'une source apparaît
 * 3. formate et pousse le panneau système
 *
 * Ne lit que des snapshots : aucun verrou du store n'est tenu pendant le rendu.
 */

use crate::connection::{ConnectionState, ConnectionStatus, ConnectionTracker};
use crate::display::{self, ConnectionDisplay};
use crate::format::ColorClass;
use crate::models::{Fields, SourceId};
use crate::sink::PresentationSink;
use crate::state::SourceStore;
use std::sync::Arc;
use time::macros::format_description;
use time::{Duration, OffsetDateTime, UtcOffset};
use tokio::task::{self, JoinHandle};
use tracing::{debug, info, warn};

pub const TICK_PERIOD: std::time::Duration = std::time::Duration::from_secs(1);
/// Au-delà (strictement) de ce délai sans message, la connexion est signalée inactive.
pub const STALE_AFTER: Duration = Duration::seconds(30);

pub struct Dispatcher {
    store: Arc<SourceStore>,
    connection: ConnectionTracker,
    sink: Arc<dyn PresentationSink>,
    allocated: Vec<SourceId>,
    local_offset: UtcOffset,
}

impl Dispatcher {
    pub fn new(
        store: Arc<SourceStore>,
        connection: ConnectionTracker,
        sink: Arc<dyn PresentationSink>,
        local_offset: UtcOffset,
    ) -> Self {
        Self { store, connection, sink, allocated: Vec::new(), local_offset }
    }

    /// Sources dont la section a été allouée, dans l'ordre d'allocation.
    #[cfg(test)]
    pub fn allocated(&self) -> &[SourceId] {
        &self.allocated
    }

    pub fn tick(&mut self, now: OffsetDateTime) {
        let status = connection_display(&self.connection.snapshot(), now, self.local_offset);
        if let Err(e) = self.sink.render_connection(&status) {
            warn!("connection status render failed: {e}");
        }

        self.allocate_new_sources();
        for &id in &self.allocated {
            let Some(state) = self.store.snapshot(id) else { continue };
            let model = display::source_model(&state);
            if let Err(e) = self.sink.render_source(&model) {
                warn!("render failed for {id}: {e}");
            }
        }

        let system = self
            .store
            .snapshot(SourceId::System)
            .map(|s| s.fields)
            .unwrap_or_else(Fields::new);
        if let Err(e) = self.sink.render_system(&display::system_model(&system)) {
            warn!("system render failed: {e}");
        }
    }

    fn allocate_new_sources(&mut self) {
        let mut fresh: Vec<_> = self
            .store
            .all_ids()
            .into_iter()
            .filter(|id| id.is_battery() && !self.allocated.contains(id))
            .filter_map(|id| self.store.snapshot(id).map(|s| (s.first_seen, id)))
            .collect();
        fresh.sort();

        for (_, id) in fresh {
            match self.sink.allocate_section(id) {
                Ok(()) => {
                    debug!("allocated section for {id}");
                    self.allocated.push(id);
                }
                // réessayé au tick suivant
                Err(e) => warn!("section allocation failed for {id}: {e}"),
            }
        }
    }

    pub fn spawn(mut self) -> JoinHandle<()> {
        info!("dispatcher started (period: {:?})", TICK_PERIOD);
        task::spawn(async move {
            let mut interval = tokio::time::interval(TICK_PERIOD);
            loop {
                interval.tick().await;
                self.tick(OffsetDateTime::now_utc());
            }
        })
    }
}

pub fn connection_display(
    state: &ConnectionState,
    now: OffsetDateTime,
    local_offset: UtcOffset,
) -> ConnectionDisplay {
    match (&state.status, state.last_message_at) {
        (ConnectionStatus::Connected, Some(last)) => {
            let age = now - last;
            if age > STALE_AFTER {
                ConnectionDisplay {
                    text: format!("Connected (No data for {}s)", age.whole_seconds()),
                    color: ColorClass::Warning,
                }
            } else {
                let clock = last
                    .to_offset(local_offset)
                    .format(format_description!("[hour]:[minute]:[second]"))
                    .unwrap_or_else(|_| crate::format::PLACEHOLDER.to_string());
                ConnectionDisplay { text: format!("Connected (Last: {clock})"), color: ColorClass::Normal }
            }
        }
        (status, _) => ConnectionDisplay { text: status.to_string(), color: ColorClass::Critical },
    }
}
