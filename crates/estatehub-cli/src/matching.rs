use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use console::{style, Term};
use tokio::sync::mpsc;

use estatehub_core::api::BackendApi;
use estatehub_core::render::{render_matching, render_unified};
use estatehub_core::schema::Source;
use estatehub_core::{run_matching_loop, MatchEvent, MatchingSelector, MatchingView, Notice};

use crate::ui;

const HELP: &str = "\
Команды:
  <текст> или /search <текст>  поиск по названию
  d <n> | a <n> | c <n>        выбрать запись DomRF / Avito / DomClick
  clear                        сбросить выбор
  save                         сохранить сопоставление
  rate <1-5> [описание]        оценить сохраненное сопоставление
  skip                         пропустить оценку
  refresh                      обновить списки
  quit                         выход
Запросы, которые начинаются с команды (save, clear, a 2 ...), вводите через /search.";

/// Turn one console line into an event. Blank lines yield `None`. A line is
/// a command when its first word is one; anything else searches, and
/// `/search` forces a search.
pub fn parse_command(line: &str) -> Result<Option<MatchEvent>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };

    let event = match head {
        "/search" => MatchEvent::Search(rest.to_string()),
        "clear" => MatchEvent::Clear,
        "save" => MatchEvent::Save,
        "skip" => MatchEvent::SkipRating,
        "refresh" => MatchEvent::Refresh,
        "quit" | "exit" => MatchEvent::Quit,
        "rate" => {
            let (rating, description) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            let rating = rating
                .parse::<u8>()
                .map_err(|_| anyhow!("оценка должна быть числом от 1 до 5: {rating:?}"))?;
            MatchEvent::Rate {
                rating,
                description: description.trim().to_string(),
            }
        }
        "d" | "a" | "c" if !rest.is_empty() => {
            let source = Source::parse(head).ok_or_else(|| anyhow!("unknown source {head}"))?;
            let position = rest
                .parse::<usize>()
                .map_err(|_| anyhow!("номер записи должен быть числом: {rest:?}"))?;
            MatchEvent::SelectAt { source, position }
        }
        _ => MatchEvent::Search(line.to_string()),
    };
    Ok(Some(event))
}

struct TerminalView {
    term: Term,
}

impl MatchingView for TerminalView {
    fn render(&mut self, selector: &MatchingSelector) {
        let _ = self.term.write_line("");
        let _ = self.term.write_line(&render_matching(selector));
        let _ = self.term.write_line(&format!("{}", style("> ").dim()));
    }

    fn notify(&mut self, notice: &Notice) {
        ui::print_notice(&self.term, notice);
    }
}

fn read_commands(tx: mpsc::Sender<MatchEvent>) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else {
            break;
        };
        match parse_command(&line) {
            Ok(Some(event)) => {
                let quit = event == MatchEvent::Quit;
                if tx.blocking_send(event).is_err() || quit {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => eprintln!("{}", style(e).red()),
        }
    }
}

pub async fn run_match(
    backend: Arc<dyn BackendApi>,
    search: &str,
    debounce: Duration,
) -> Result<()> {
    let term = Term::stdout();
    ui::print_banner(&term, "Ручное сопоставление объектов");
    let _ = term.write_line(HELP);

    let mut selector = MatchingSelector::new(backend);
    // Load failures are reported through the notice queue on first render
    let _ = selector.load_candidates(search).await;
    let _ = selector.load_unified().await;

    let (tx, rx) = mpsc::channel(32);
    // stdin reads block, so they stay off the runtime
    std::thread::spawn(move || read_commands(tx));

    let mut view = TerminalView { term };
    run_matching_loop(&mut selector, rx, debounce, &mut view).await;
    Ok(())
}

pub async fn print_unified(backend: Arc<dyn BackendApi>) -> Result<()> {
    let term = Term::stdout();
    let mut selector = MatchingSelector::new(backend);
    let loaded = selector.load_unified().await;
    for notice in selector.take_notices() {
        ui::print_notice(&term, &notice);
    }
    loaded?;
    let _ = term.write_line(&render_unified(&selector));
    Ok(())
}

pub async fn rate(
    backend: Arc<dyn BackendApi>,
    unified_id: &str,
    rating: u8,
    description: &str,
) -> Result<()> {
    let term = Term::stdout();
    let mut selector = MatchingSelector::new(backend);
    let saved = selector.save_rating(unified_id, rating, description).await;
    for notice in selector.take_notices() {
        ui::print_notice(&term, &notice);
    }
    saved?;
    Ok(())
}
