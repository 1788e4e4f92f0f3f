use std::sync::Arc;

use anyhow::Result;
use console::{style, Term};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Select};

use estatehub_core::api::BackendApi;
use estatehub_core::phone::format_progressive;
use estatehub_core::schema::Intent;
use estatehub_core::{ConversationEngine, FlowError, InputKind, Prompt, Reply};

use crate::ui;

const QUICK_ACTIONS: [(&str, Intent); 3] = [
    ("Хочу продать", Intent::Sell),
    ("Хочу купить", Intent::Buy),
    ("Задать вопрос", Intent::Question),
];

const PHONE_MASK: &str = "+7 (XXX) XXX-XX-XX";

pub async fn run_chat(backend: Arc<dyn BackendApi>, intent: Option<&str>) -> Result<()> {
    let term = Term::stdout();
    let theme = ColorfulTheme::default();
    let mut engine = ConversationEngine::new(backend);

    ui::print_banner(&term, "Century 21 - чат с консультантом");

    let mut pending_action = intent.map(str::to_string);
    let mut shown = 0;
    loop {
        if engine.current_prompt().is_none() {
            let started = match pending_action.take() {
                Some(action) => engine.handle_action(&action),
                None => match pick_action(&theme)? {
                    Some(intent) => Some(engine.start_flow(intent)),
                    None => break,
                },
            };
            let Some(prompt) = started else {
                let _ = term.write_line(&format!(
                    "{}",
                    style("Выберите одно из действий: sell, buy или question").yellow()
                ));
                continue;
            };
            tracing::debug!(trace_id = %engine.trace_id(), state = %prompt.state, "flow opened");
            print_new_messages(&term, &engine, &mut shown);
        }

        let Some(prompt) = engine.current_prompt() else {
            continue;
        };
        let value = ask(&theme, &prompt)?;
        let result = engine.submit_answer(prompt.state, &value).await;
        print_new_messages(&term, &engine, &mut shown);

        match result {
            Ok(Reply::Prompt(_)) | Err(FlowError::Rejected { .. }) => {}
            Ok(Reply::Finished(ack)) => {
                if !ack.delivered {
                    tracing::warn!(trace_id = %engine.trace_id(), "lead was not delivered");
                }
                let again = Confirm::with_theme(&theme)
                    .with_prompt("Оставить еще одну заявку?")
                    .default(false)
                    .interact()?;
                if !again {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(trace_id = %engine.trace_id(), "answer dropped: {e}");
            }
        }
    }

    Ok(())
}

/// Echo transcript lines added since the last call.
fn print_new_messages(term: &Term, engine: &ConversationEngine, shown: &mut usize) {
    for message in engine.transcript().iter().skip(*shown) {
        ui::print_message(term, message);
    }
    *shown = engine.transcript().len();
}

/// What the masked phone field holds for raw keyboard input. The engine
/// normalizes this value, so the lead carries exactly what was shown.
fn phone_answer(raw: &str) -> String {
    format_progressive(raw)
}

fn pick_action(theme: &ColorfulTheme) -> Result<Option<Intent>> {
    let mut labels: Vec<&str> = QUICK_ACTIONS.iter().map(|(label, _)| *label).collect();
    labels.push("Выход");

    let selected = Select::with_theme(theme)
        .with_prompt("Чем мы можем помочь?")
        .items(&labels)
        .default(0)
        .interact()?;
    Ok(QUICK_ACTIONS.get(selected).map(|(_, intent)| *intent))
}

// The question itself is already on screen from the transcript.
fn ask(theme: &ColorfulTheme, prompt: &Prompt) -> Result<String> {
    let value = match prompt.input {
        InputKind::Choice => {
            let labels: Vec<&str> = prompt.options.iter().map(|o| o.label).collect();
            let selected = Select::with_theme(theme)
                .with_prompt("Выберите вариант")
                .items(&labels)
                .default(0)
                .interact()?;
            prompt
                .options
                .get(selected)
                .map(|o| o.value.to_string())
                .unwrap_or_default()
        }
        InputKind::Text => Input::<String>::with_theme(theme)
            .with_prompt("Ваш ответ")
            .allow_empty(true)
            .interact_text()?,
        InputKind::Phone => {
            let raw = Input::<String>::with_theme(theme)
                .with_prompt(PHONE_MASK)
                .allow_empty(true)
                .interact_text()?;
            phone_answer(&raw)
        }
    };
    Ok(value)
}
