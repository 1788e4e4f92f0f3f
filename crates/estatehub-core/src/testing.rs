//! In-memory backend double shared by the unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use estatehub_api::{ApiError, BackendApi};
use estatehub_schema::{
    LeadRequest, LeadResponse, Pagination, RatingUpdate, SaveMatchRequest, SaveMatchResponse,
    SourceRecord, UnifiedListResponse, UnifiedRecord, UnmatchedData, UnmatchedResponse,
    UnmatchedTotals,
};

#[derive(Default)]
pub(crate) struct FakeBackend {
    pub leads: Mutex<Vec<LeadRequest>>,
    pub lead_attempts: AtomicUsize,
    pub fail_leads: AtomicBool,
    pub searches: Mutex<Vec<String>>,
    pub fail_unmatched: AtomicBool,
    pub unmatched: Mutex<UnmatchedData>,
    pub saves: Mutex<Vec<SaveMatchRequest>>,
    pub reject_saves: Mutex<Option<String>>,
    pub unified_id: Mutex<Option<String>>,
    pub unified: Mutex<Vec<UnifiedRecord>>,
    pub unified_fetches: AtomicUsize,
    pub ratings: Mutex<Vec<(String, RatingUpdate)>>,
    pub fail_ratings: AtomicBool,
}

impl FakeBackend {
    pub fn with_candidates(data: UnmatchedData) -> Self {
        let backend = Self::default();
        *backend.unmatched.lock().unwrap() = data;
        *backend.unified_id.lock().unwrap() = Some("u1".to_string());
        backend
    }
}

pub(crate) fn record(id: &str, name: &str) -> SourceRecord {
    SourceRecord {
        id: id.to_string(),
        name: name.to_string(),
        address: None,
        url: None,
    }
}

pub(crate) fn sample_candidates() -> UnmatchedData {
    UnmatchedData {
        domrf: vec![record("r1", "ЖК Гринвич"), record("r2", "ЖК Акварель")],
        avito: vec![record("a1", "Гринвич"), record("a2", "Акварель парк")],
        domclick: vec![record("c1", "Гринвич квартал")],
    }
}

fn server_error(message: &str) -> ApiError {
    ApiError::Rejected {
        status: 500,
        message: Some(message.to_string()),
    }
}

#[async_trait]
impl BackendApi for FakeBackend {
    async fn submit_lead(&self, lead: &LeadRequest) -> Result<LeadResponse, ApiError> {
        self.lead_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_leads.load(Ordering::SeqCst) {
            return Err(server_error("db down"));
        }
        self.leads.lock().unwrap().push(lead.clone());
        Ok(LeadResponse {
            success: true,
            request_id: Some("lead-1".to_string()),
            ..Default::default()
        })
    }

    async fn fetch_unmatched(&self, search: &str) -> Result<UnmatchedResponse, ApiError> {
        self.searches.lock().unwrap().push(search.to_string());
        if self.fail_unmatched.load(Ordering::SeqCst) {
            return Err(server_error("mongo timeout"));
        }
        let data = self.unmatched.lock().unwrap().clone();
        let totals = UnmatchedTotals {
            domrf: data.domrf.len() as u64,
            avito: data.avito.len() as u64,
            domclick: data.domclick.len() as u64,
            total_domrf: data.domrf.len() as i64,
            total_avito: data.avito.len() as i64,
            total_domclick: data.domclick.len() as i64,
        };
        Ok(UnmatchedResponse {
            success: true,
            data,
            totals,
            error: None,
        })
    }

    async fn save_match(&self, request: &SaveMatchRequest) -> Result<SaveMatchResponse, ApiError> {
        self.saves.lock().unwrap().push(request.clone());
        if let Some(message) = self.reject_saves.lock().unwrap().clone() {
            return Err(ApiError::Rejected {
                status: 400,
                message: Some(message),
            });
        }

        // Matched records leave the unmatched pools
        let mut guard = self.unmatched.lock().unwrap();
        let pools = &mut *guard;
        let ids = [&request.domrf_id, &request.avito_id, &request.domclick_id];
        for list in [&mut pools.domrf, &mut pools.avito, &mut pools.domclick] {
            list.retain(|r| !ids.iter().any(|id| id.as_deref() == Some(r.id.as_str())));
        }

        Ok(SaveMatchResponse {
            success: true,
            unified_id: self.unified_id.lock().unwrap().clone(),
            ..Default::default()
        })
    }

    async fn fetch_unified(&self) -> Result<UnifiedListResponse, ApiError> {
        self.unified_fetches.fetch_add(1, Ordering::SeqCst);
        let data = self.unified.lock().unwrap().clone();
        Ok(UnifiedListResponse {
            success: true,
            pagination: Pagination {
                page: 1,
                per_page: 20,
                total: data.len() as u64,
                pages: 1,
            },
            data,
            error: None,
        })
    }

    async fn update_rating(&self, unified_id: &str, update: &RatingUpdate) -> Result<(), ApiError> {
        if self.fail_ratings.load(Ordering::SeqCst) {
            return Err(server_error("Рейтинг должен быть от 1 до 5"));
        }
        self.ratings
            .lock()
            .unwrap()
            .push((unified_id.to_string(), update.clone()));
        Ok(())
    }
}
