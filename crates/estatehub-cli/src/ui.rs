use console::{style, Emoji, Term};

use estatehub_core::conversation::{Author, ChatMessage};
use estatehub_core::matching::{Notice, NoticeLevel};
use estatehub_core::render::{render_message, render_notice};

pub static HOUSE: Emoji<'_, '_> = Emoji("🏠 ", "");

pub fn print_banner(term: &Term, title: &str) {
    let _ = term.write_line("");
    let _ = term.write_line(&format!("{}{}", HOUSE, style(title).bold().cyan()));
    let _ = term.write_line(&format!("{}", style("-".repeat(40)).dim()));
}

pub fn print_message(term: &Term, message: &ChatMessage) {
    let line = render_message(message);
    let line = match message.author {
        Author::Bot => style(line).cyan(),
        Author::User => style(line).dim(),
    };
    let _ = term.write_line(&line.to_string());
}

pub fn print_notice(term: &Term, notice: &Notice) {
    let text = render_notice(notice);
    let line = match notice.level {
        NoticeLevel::Success => style(text).green(),
        NoticeLevel::Warning => style(text).yellow(),
        NoticeLevel::Error => style(text).red(),
    };
    let _ = term.write_line(&line.to_string());
}
