//! Manual matching of listings across DomRF, Avito and DomClick.
//!
//! [`MatchingSelector`] owns the candidate panels, the unified list and the
//! current three-slot selection. Every mutation goes through `&mut self`, so
//! a second save cannot start while one is in flight.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use estatehub_api::{ApiError, BackendApi};
use estatehub_schema::{
    RatingUpdate, SaveMatchRequest, Source, SourceRecord, UnifiedRecord, UnmatchedData,
    UnmatchedTotals,
};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const SAVED_TEXT: &str = "✓ Сопоставление успешно сохранено!";
pub const RATING_SAVED_TEXT: &str = "✓ Оценка сохранена";
pub const NOTHING_SELECTED_TEXT: &str = "Выберите хотя бы одну запись для сопоставления";
pub const CONNECTION_ERROR_TEXT: &str = "Ошибка подключения к серверу";
pub const LOAD_ERROR_TEXT: &str = "Ошибка загрузки данных";
pub const SAVE_ERROR_TEXT: &str = "Ошибка сохранения данных";
pub const LOW_RATING_HINT: &str = "Для оценки 3 и ниже желательно указать причину";
pub const NOT_SELECTED_LABEL: &str = "Не выбрано";

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// At most one record id per source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    domrf: Option<String>,
    avito: Option<String>,
    domclick: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionChange {
    Selected,
    Replaced { previous: String },
    Cleared,
}

impl SelectionState {
    pub fn get(&self, source: Source) -> Option<&str> {
        match source {
            Source::Domrf => self.domrf.as_deref(),
            Source::Avito => self.avito.as_deref(),
            Source::Domclick => self.domclick.as_deref(),
        }
    }

    fn slot_mut(&mut self, source: Source) -> &mut Option<String> {
        match source {
            Source::Domrf => &mut self.domrf,
            Source::Avito => &mut self.avito,
            Source::Domclick => &mut self.domclick,
        }
    }

    /// Selecting the already selected id clears the slot; any other id
    /// replaces it.
    pub fn toggle(&mut self, source: Source, id: &str) -> SelectionChange {
        let slot = self.slot_mut(source);
        match slot.take() {
            Some(current) if current == id => SelectionChange::Cleared,
            Some(previous) => {
                *slot = Some(id.to_string());
                SelectionChange::Replaced { previous }
            }
            None => {
                *slot = Some(id.to_string());
                SelectionChange::Selected
            }
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        self.filled() == 0
    }

    pub fn filled(&self) -> usize {
        Source::ALL
            .iter()
            .filter(|s| self.get(**s).is_some())
            .count()
    }

    pub fn to_request(&self, created_at: DateTime<Utc>) -> SaveMatchRequest {
        SaveMatchRequest {
            domrf_id: self.domrf.clone(),
            avito_id: self.avito.clone(),
            domclick_id: self.domclick.clone(),
            created_at,
        }
    }
}

/// Ratings of 3 and below should carry a description. The backend accepts
/// them without one, so this only produces a warning.
pub fn rating_warning(rating: u8, description: &str) -> Option<&'static str> {
    (rating <= 3 && description.trim().is_empty()).then_some(LOW_RATING_HINT)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatingPrompt {
    pub unified_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    fn new(level: NoticeLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("select at least one record before saving")]
    NothingSelected,
    #[error("rating must be between {MIN_RATING} and {MAX_RATING}, got {0}")]
    InvalidRating(u8),
    #[error("no saved match is waiting for a rating")]
    NoPendingRating,
    #[error("{panel} panel has no record #{position}")]
    NoSuchRecord { panel: Source, position: usize },
    #[error("loading data failed: {0}")]
    Load(#[source] ApiError),
    #[error("saving data failed: {0}")]
    Save(#[source] ApiError),
}

impl MatchError {
    /// Operator-facing text for the notice area.
    pub fn notice_text(&self) -> String {
        match self {
            Self::NothingSelected => NOTHING_SELECTED_TEXT.to_string(),
            Self::InvalidRating(_) => {
                format!("Оценка должна быть от {MIN_RATING} до {MAX_RATING}")
            }
            Self::NoPendingRating => "Нет сохраненного сопоставления для оценки".to_string(),
            Self::NoSuchRecord { panel, position } => {
                format!("В списке {} нет записи №{position}", panel.label())
            }
            Self::Load(e) => backend_notice(e, LOAD_ERROR_TEXT),
            Self::Save(e) => backend_notice(e, SAVE_ERROR_TEXT),
        }
    }
}

/// The backend's own `error` text when it sent one, otherwise a fixed message.
/// Raw status bodies never reach the operator.
fn backend_notice(err: &ApiError, fallback: &str) -> String {
    match err.backend_message() {
        Some(message) => format!("Ошибка: {message}"),
        None if err.is_transport() => CONNECTION_ERROR_TEXT.to_string(),
        None => fallback.to_string(),
    }
}

pub struct MatchingSelector {
    backend: Arc<dyn BackendApi>,
    search: String,
    candidates: UnmatchedData,
    totals: UnmatchedTotals,
    unified: Vec<UnifiedRecord>,
    unified_total: u64,
    selection: SelectionState,
    rating_prompt: Option<RatingPrompt>,
    notices: Vec<Notice>,
}

impl MatchingSelector {
    pub fn new(backend: Arc<dyn BackendApi>) -> Self {
        Self {
            backend,
            search: String::new(),
            candidates: UnmatchedData::default(),
            totals: UnmatchedTotals::default(),
            unified: Vec::new(),
            unified_total: 0,
            selection: SelectionState::default(),
            rating_prompt: None,
            notices: Vec::new(),
        }
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn candidates(&self) -> &UnmatchedData {
        &self.candidates
    }

    pub fn totals(&self) -> &UnmatchedTotals {
        &self.totals
    }

    pub fn unified(&self) -> &[UnifiedRecord] {
        &self.unified
    }

    pub fn unified_total(&self) -> u64 {
        self.unified_total
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn rating_prompt(&self) -> Option<&RatingPrompt> {
        self.rating_prompt.as_ref()
    }

    pub fn can_save(&self) -> bool {
        !self.selection.is_empty()
    }

    /// Unmatched records shown plus the unified list size.
    pub fn grand_total(&self) -> u64 {
        Source::ALL
            .iter()
            .map(|s| self.totals.shown(*s))
            .sum::<u64>()
            + self.unified_total
    }

    /// Display name of the selected record, falling back to the raw id when
    /// the record is not in the loaded panel.
    pub fn selected_name(&self, source: Source) -> &str {
        match self.selection.get(source) {
            Some(id) => self
                .candidates
                .find(source, id)
                .map(|r| r.name.as_str())
                .unwrap_or(id),
            None => NOT_SELECTED_LABEL,
        }
    }

    /// Drain queued notices, oldest first.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn notify(&mut self, level: NoticeLevel, text: impl Into<String>) {
        self.notices.push(Notice::new(level, text));
    }

    fn fail(&mut self, err: MatchError) -> MatchError {
        self.notify(NoticeLevel::Error, err.notice_text());
        err
    }

    /// Replace the candidate panels with the backend's answer for `search`.
    /// The previous panels stay in place if the request fails.
    pub async fn load_candidates(&mut self, search: &str) -> Result<(), MatchError> {
        self.search = search.trim().to_string();
        let result = self.backend.fetch_unmatched(&self.search).await;
        match result {
            Ok(resp) => {
                debug!(
                    search = %self.search,
                    domrf = resp.data.domrf.len(),
                    avito = resp.data.avito.len(),
                    domclick = resp.data.domclick.len(),
                    "candidates loaded"
                );
                self.candidates = resp.data;
                self.totals = resp.totals;
                Ok(())
            }
            Err(e) => {
                warn!(search = %self.search, "loading candidates failed: {e}");
                Err(self.fail(MatchError::Load(e)))
            }
        }
    }

    pub async fn load_unified(&mut self) -> Result<(), MatchError> {
        let result = self.backend.fetch_unified().await;
        match result {
            Ok(resp) => {
                debug!(count = resp.data.len(), total = resp.pagination.total, "unified list loaded");
                self.unified = resp.data;
                self.unified_total = resp.pagination.total;
                Ok(())
            }
            Err(e) => {
                warn!("loading unified list failed: {e}");
                Err(self.fail(MatchError::Load(e)))
            }
        }
    }

    pub fn select(&mut self, source: Source, id: &str) -> SelectionChange {
        let change = self.selection.toggle(source, id);
        debug!(%source, id, ?change, "selection changed");
        change
    }

    /// Select by 1-based position in the loaded panel.
    pub fn select_at(&mut self, source: Source, position: usize) -> Result<SelectionChange, MatchError> {
        let id = position
            .checked_sub(1)
            .and_then(|i| self.candidates.records(source).get(i))
            .map(|r: &SourceRecord| r.id.clone());
        match id {
            Some(id) => Ok(self.select(source, &id)),
            None => Err(self.fail(MatchError::NoSuchRecord {
                panel: source,
                position,
            })),
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Persist the current selection as a unified record. On success both
    /// lists are reloaded, the selection is cleared and a rating prompt opens
    /// for the new record.
    pub async fn save_match(&mut self) -> Result<Option<RatingPrompt>, MatchError> {
        if self.selection.is_empty() {
            return Err(self.fail(MatchError::NothingSelected));
        }

        let request = self.selection.to_request(Utc::now());
        let result = self.backend.save_match(&request).await;
        let resp = match result {
            Ok(resp) => resp,
            Err(e) => {
                warn!(?request, "saving match failed: {e}");
                return Err(self.fail(MatchError::Save(e)));
            }
        };

        info!(
            unified_id = resp.unified_id.as_deref().unwrap_or("-"),
            slots = self.selection.filled(),
            "manual match saved"
        );
        self.notify(NoticeLevel::Success, SAVED_TEXT);
        self.selection.clear();

        // Reload failures are already queued as notices
        let search = self.search.clone();
        let _ = self.load_candidates(&search).await;
        let _ = self.load_unified().await;

        self.rating_prompt = resp.unified_id.map(|unified_id| RatingPrompt { unified_id });
        Ok(self.rating_prompt.clone())
    }

    /// Rate a unified record and refresh the unified list. The rating is
    /// validated before any request.
    pub async fn save_rating(
        &mut self,
        unified_id: &str,
        rating: u8,
        description: &str,
    ) -> Result<(), MatchError> {
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(self.fail(MatchError::InvalidRating(rating)));
        }
        if let Some(hint) = rating_warning(rating, description) {
            self.notify(NoticeLevel::Warning, hint);
        }

        let update = RatingUpdate {
            rating,
            rating_description: description.trim().to_string(),
        };
        let result = self.backend.update_rating(unified_id, &update).await;
        if let Err(e) = result {
            warn!(unified_id, rating, "saving rating failed: {e}");
            return Err(self.fail(MatchError::Save(e)));
        }

        info!(unified_id, rating, "rating saved");
        if self
            .rating_prompt
            .as_ref()
            .is_some_and(|p| p.unified_id == unified_id)
        {
            self.rating_prompt = None;
        }
        self.notify(NoticeLevel::Success, RATING_SAVED_TEXT);
        let _ = self.load_unified().await;
        Ok(())
    }

    /// Rate the record opened by the last successful save.
    pub async fn rate_pending(&mut self, rating: u8, description: &str) -> Result<(), MatchError> {
        let Some(prompt) = self.rating_prompt.clone() else {
            return Err(self.fail(MatchError::NoPendingRating));
        };
        self.save_rating(&prompt.unified_id, rating, description).await
    }

    pub fn dismiss_rating(&mut self) {
        self.rating_prompt = None;
    }
}
