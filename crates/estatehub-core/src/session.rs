//! Event loop driving a [`MatchingSelector`] from operator input.
//!
//! Search input is debounced: the candidate request goes out only once no
//! newer query arrived within the debounce window. Requests are awaited
//! inside the loop, so a slow response can never overwrite a newer one.

use std::time::Duration;

use estatehub_schema::Source;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

use crate::matching::{MatchingSelector, Notice};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchEvent {
    Search(String),
    Select { source: Source, id: String },
    SelectAt { source: Source, position: usize },
    Clear,
    Save,
    Rate { rating: u8, description: String },
    SkipRating,
    Refresh,
    Quit,
}

/// Output side of the matching screen.
pub trait MatchingView {
    fn render(&mut self, selector: &MatchingSelector);

    fn notify(&mut self, notice: &Notice);
}

pub async fn run_matching_loop<V: MatchingView>(
    selector: &mut MatchingSelector,
    mut events: mpsc::Receiver<MatchEvent>,
    debounce: Duration,
    view: &mut V,
) {
    let mut pending: Option<(String, Instant)> = None;
    flush(selector, view);

    loop {
        let deadline = pending.as_ref().map(|(_, at)| *at);
        let event = match deadline {
            Some(at) => tokio::select! {
                event = events.recv() => event,
                _ = sleep_until(at) => {
                    if let Some((query, _)) = pending.take() {
                        debug!(query = %query, "debounced search fired");
                        let _ = selector.load_candidates(&query).await;
                        flush(selector, view);
                    }
                    continue;
                }
            },
            None => events.recv().await,
        };

        let Some(event) = event else {
            debug!("matching input closed");
            break;
        };

        match event {
            MatchEvent::Search(query) => {
                pending = Some((query, Instant::now() + debounce));
                continue;
            }
            MatchEvent::Quit => break,
            other => apply(selector, other).await,
        }
        flush(selector, view);
    }
}

/// Errors surface through the selector's notice queue.
async fn apply(selector: &mut MatchingSelector, event: MatchEvent) {
    match event {
        MatchEvent::Select { source, id } => {
            selector.select(source, &id);
        }
        MatchEvent::SelectAt { source, position } => {
            let _ = selector.select_at(source, position);
        }
        MatchEvent::Clear => selector.clear_selection(),
        MatchEvent::Save => {
            let _ = selector.save_match().await;
        }
        MatchEvent::Rate {
            rating,
            description,
        } => {
            let _ = selector.rate_pending(rating, &description).await;
        }
        MatchEvent::SkipRating => selector.dismiss_rating(),
        MatchEvent::Refresh => {
            let search = selector.search().to_string();
            let _ = selector.load_candidates(&search).await;
            let _ = selector.load_unified().await;
        }
        MatchEvent::Search(_) | MatchEvent::Quit => {}
    }
}

fn flush<V: MatchingView>(selector: &mut MatchingSelector, view: &mut V) {
    for notice in selector.take_notices() {
        view.notify(&notice);
    }
    view.render(selector);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::matching::NoticeLevel;
    use crate::testing::{sample_candidates, FakeBackend};

    #[derive(Default)]
    struct RecordingView {
        renders: usize,
        notices: Vec<Notice>,
    }

    impl MatchingView for RecordingView {
        fn render(&mut self, _selector: &MatchingSelector) {
            self.renders += 1;
        }

        fn notify(&mut self, notice: &Notice) {
            self.notices.push(notice.clone());
        }
    }

    const DEBOUNCE: Duration = Duration::from_millis(500);

    #[tokio::test(start_paused = true)]
    async fn only_the_last_query_in_a_burst_is_sent() {
        let backend = Arc::new(FakeBackend::with_candidates(sample_candidates()));
        let mut selector = MatchingSelector::new(backend.clone());
        let mut view = RecordingView::default();
        let (tx, rx) = mpsc::channel(16);

        let input = async move {
            for query in ["Г", "Гр", "Грин"] {
                tx.send(MatchEvent::Search(query.into())).await.unwrap();
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            tokio::time::sleep(Duration::from_millis(600)).await;
            tx.send(MatchEvent::Quit).await.unwrap();
        };
        tokio::join!(
            run_matching_loop(&mut selector, rx, DEBOUNCE, &mut view),
            input
        );

        assert_eq!(*backend.searches.lock().unwrap(), vec!["Грин".to_string()]);
        assert_eq!(selector.search(), "Грин");
    }

    #[tokio::test(start_paused = true)]
    async fn pauses_longer_than_the_window_send_each_query() {
        let backend = Arc::new(FakeBackend::with_candidates(sample_candidates()));
        let mut selector = MatchingSelector::new(backend.clone());
        let mut view = RecordingView::default();
        let (tx, rx) = mpsc::channel(16);

        let input = async move {
            tx.send(MatchEvent::Search("ЖК".into())).await.unwrap();
            tokio::time::sleep(Duration::from_millis(700)).await;
            tx.send(MatchEvent::Search("".into())).await.unwrap();
            tokio::time::sleep(Duration::from_millis(700)).await;
        };
        tokio::join!(
            run_matching_loop(&mut selector, rx, DEBOUNCE, &mut view),
            input
        );

        assert_eq!(
            *backend.searches.lock().unwrap(),
            vec!["ЖК".to_string(), String::new()]
        );
    }

    #[tokio::test]
    async fn save_flow_reports_notices_and_rerenders() {
        let backend = Arc::new(FakeBackend::with_candidates(sample_candidates()));
        let mut selector = MatchingSelector::new(backend.clone());
        selector.load_candidates("").await.unwrap();
        let mut view = RecordingView::default();
        let (tx, rx) = mpsc::channel(16);

        for event in [
            MatchEvent::Save,
            MatchEvent::SelectAt {
                source: Source::Domrf,
                position: 1,
            },
            MatchEvent::Select {
                source: Source::Avito,
                id: "a1".into(),
            },
            MatchEvent::Save,
            MatchEvent::Rate {
                rating: 4,
                description: String::new(),
            },
            MatchEvent::Quit,
        ] {
            tx.send(event).await.unwrap();
        }
        run_matching_loop(&mut selector, rx, DEBOUNCE, &mut view).await;

        let levels: Vec<_> = view.notices.iter().map(|n| n.level).collect();
        assert_eq!(
            levels,
            vec![NoticeLevel::Error, NoticeLevel::Success, NoticeLevel::Success]
        );
        assert_eq!(backend.saves.lock().unwrap().len(), 1);
        assert_eq!(backend.ratings.lock().unwrap()[0].0, "u1");
        // initial render plus one per applied event
        assert_eq!(view.renders, 6);
    }

    #[tokio::test]
    async fn closed_channel_ends_the_loop() {
        let backend = Arc::new(FakeBackend::default());
        let mut selector = MatchingSelector::new(backend);
        let mut view = RecordingView::default();
        let (tx, rx) = mpsc::channel(1);
        drop(tx);

        run_matching_loop(&mut selector, rx, DEBOUNCE, &mut view).await;
        assert_eq!(view.renders, 1);
    }
}
