//! Plain-text rendering of the chat and matching screens.

use std::fmt::Write as _;

use estatehub_schema::{MatchOrigin, Source, SourceRecord, UnifiedRecord};

use crate::conversation::{Author, ChatMessage};
use crate::matching::{MatchingSelector, Notice, NoticeLevel};

pub const BOT_NAME: &str = "Поддержка C21";
pub const EMPTY_PANEL_TEXT: &str = "Нет данных";
pub const EMPTY_UNIFIED_TEXT: &str = "Пока нет объединенных записей";
pub const SAVE_HINT_TEXT: &str = "Команда `save` сохранит сопоставление";
pub const SELECT_HINT_TEXT: &str = "Выберите записи для сопоставления";

pub fn origin_badge(origin: MatchOrigin) -> &'static str {
    match origin {
        MatchOrigin::Manual => "👤 Ручное",
        MatchOrigin::Auto => "🤖 Авто",
        MatchOrigin::Unknown => "",
    }
}

pub fn render_message(message: &ChatMessage) -> String {
    let author = match message.author {
        Author::Bot => BOT_NAME,
        Author::User => "Вы",
    };
    let mut out = format!("{author}: {}", message.text);
    for option in &message.options {
        let _ = write!(out, " [{}]", option.label);
    }
    out
}

pub fn render_notice(notice: &Notice) -> String {
    match notice.level {
        // success texts already carry their check mark
        NoticeLevel::Success => notice.text.clone(),
        NoticeLevel::Warning => format!("! {}", notice.text),
        NoticeLevel::Error => format!("✗ {}", notice.text),
    }
}

fn record_line(out: &mut String, position: usize, record: &SourceRecord, selected: bool) {
    let marker = if selected { "[x]" } else { "[ ]" };
    let _ = write!(out, "\n  {marker} {position}. {}", record.name);
    if let Some(address) = &record.address {
        let _ = write!(out, " ({address})");
    }
    if let Some(url) = &record.url {
        let _ = write!(out, " {url}");
    }
}

pub fn render_panel(selector: &MatchingSelector, source: Source) -> String {
    let totals = selector.totals();
    let records = selector.candidates().records(source);
    let selected = selector.selection().get(source);

    let mut out = format!(
        "{} ({} из {})",
        source.label(),
        totals.shown(source),
        totals.total(source)
    );
    if records.is_empty() {
        let _ = write!(out, "\n  {EMPTY_PANEL_TEXT}");
    }
    for (i, record) in records.iter().enumerate() {
        record_line(&mut out, i + 1, record, selected == Some(record.id.as_str()));
    }
    out
}

pub fn render_selection(selector: &MatchingSelector) -> String {
    Source::ALL
        .iter()
        .map(|s| format!("{}: {}", s.label(), selector.selected_name(*s)))
        .collect::<Vec<_>>()
        .join(" | ")
}

fn unified_name(record: &UnifiedRecord) -> &str {
    record.name.as_deref().unwrap_or(&record.domrf_name)
}

pub fn render_unified(selector: &MatchingSelector) -> String {
    let records = selector.unified();
    let mut out = format!("Объединенные записи ({})", selector.unified_total());
    if records.is_empty() {
        let _ = write!(out, "\n  {EMPTY_UNIFIED_TEXT}");
    }
    for record in records {
        let _ = write!(
            out,
            "\n  {} | DomRF: {} | Avito: {} | DomClick: {}",
            unified_name(record),
            record.domrf_name,
            record.avito_name,
            record.domclick_name
        );
        let badge = origin_badge(record.source);
        if !badge.is_empty() {
            let _ = write!(out, " | {badge}");
        }
        if record.is_featured {
            out.push_str(" ★");
        }
    }
    out
}

/// The whole matching screen.
pub fn render_matching(selector: &MatchingSelector) -> String {
    let mut sections: Vec<String> = Vec::new();
    if !selector.search().is_empty() {
        sections.push(format!("Поиск: {}", selector.search()));
    }
    sections.extend(Source::ALL.iter().map(|s| render_panel(selector, *s)));
    sections.push(format!("Выбрано: {}", render_selection(selector)));
    sections.push(
        if selector.can_save() {
            SAVE_HINT_TEXT
        } else {
            SELECT_HINT_TEXT
        }
        .to_string(),
    );
    sections.push(render_unified(selector));
    sections.push(format!("Всего записей: {}", selector.grand_total()));
    if let Some(prompt) = selector.rating_prompt() {
        sections.push(format!(
            "Оцените сопоставление {} командой `rate <1-5> [описание]` или `skip`",
            prompt.unified_id
        ));
    }
    sections.join("\n\n")
}
