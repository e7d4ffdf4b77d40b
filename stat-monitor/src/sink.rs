/**
 * SINK DE PRÉSENTATION - Frontière entre le cœur et le rendu
 *
 * RÔLE : Le dispatcher pousse ses modèles ici en fire-and-forget ; un sink ne
 * rappelle jamais le cœur. Une erreur de rendu est loggée par l'appelant et
 * n'empêche pas les autres sources d'être rendues.
 *
 * `DisplayBoard` garde le dernier modèle de chaque section, dans l'ordre
 * d'allocation, pour l'API HTTP.
 */

use crate::display::{ConnectionDisplay, DisplayModel, SystemDisplayModel};
use crate::models::SourceId;
use crate::state::{new_state, Shared};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("no section allocated for {0}")]
    SectionMissing(SourceId),
    #[error("display rejected: {0}")]
    Rejected(String),
}

pub trait PresentationSink: Send + Sync {
    /// Notification unique, la première fois qu'une source est vue.
    fn allocate_section(&self, id: SourceId) -> Result<(), RenderError>;
    fn render_connection(&self, status: &ConnectionDisplay) -> Result<(), RenderError>;
    fn render_source(&self, model: &DisplayModel) -> Result<(), RenderError>;
    fn render_system(&self, model: &SystemDisplayModel) -> Result<(), RenderError>;
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BoardView {
    pub connection: Option<ConnectionDisplay>,
    pub sections: Vec<DisplayModel>,
    pub system: Option<SystemDisplayModel>,
}

#[derive(Default)]
struct Board {
    order: Vec<SourceId>,
    sections: HashMap<SourceId, Option<DisplayModel>>,
    connection: Option<ConnectionDisplay>,
    system: Option<SystemDisplayModel>,
}

#[derive(Clone)]
pub struct DisplayBoard {
    inner: Shared<Board>,
}

impl DisplayBoard {
    pub fn new() -> Self {
        Self { inner: new_state(Board::default()) }
    }

    pub fn view(&self) -> BoardView {
        let board = self.inner.lock();
        BoardView {
            connection: board.connection.clone(),
            sections: board
                .order
                .iter()
                .filter_map(|id| board.sections.get(id).cloned().flatten())
                .collect(),
            system: board.system.clone(),
        }
    }

    pub fn section(&self, id: SourceId) -> Option<DisplayModel> {
        self.inner.lock().sections.get(&id).cloned().flatten()
    }

    pub fn allocated(&self) -> Vec<SourceId> {
        self.inner.lock().order.clone()
    }

    pub fn system(&self) -> Option<SystemDisplayModel> {
        self.inner.lock().system.clone()
    }

    pub fn connection(&self) -> Option<ConnectionDisplay> {
        self.inner.lock().connection.clone()
    }
}

impl Default for DisplayBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl PresentationSink for DisplayBoard {
    fn allocate_section(&self, id: SourceId) -> Result<(), RenderError> {
        // le panneau système est fixe, pas de section dynamique
        if !id.is_battery() {
            return Err(RenderError::Rejected(format!("{id} has no battery section")));
        }
        let mut board = self.inner.lock();
        if !board.sections.contains_key(&id) {
            board.order.push(id);
            board.sections.insert(id, None);
        }
        Ok(())
    }

    fn render_connection(&self, status: &ConnectionDisplay) -> Result<(), RenderError> {
        self.inner.lock().connection = Some(status.clone());
        Ok(())
    }

    fn render_source(&self, model: &DisplayModel) -> Result<(), RenderError> {
        let mut board = self.inner.lock();
        match board.sections.get_mut(&model.source_id) {
            Some(slot) => {
                *slot = Some(model.clone());
                Ok(())
            }
            None => Err(RenderError::SectionMissing(model.source_id)),
        }
    }

    fn render_system(&self, model: &SystemDisplayModel) -> Result<(), RenderError> {
        self.inner.lock().system = Some(model.clone());
        Ok(())
    }
}
