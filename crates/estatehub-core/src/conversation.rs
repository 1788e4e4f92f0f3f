//! Scripted lead-capture chat: sell / buy / ask-a-question flows that end
//! with exactly one lead submission.

use std::fmt;
use std::sync::Arc;

use estatehub_api::BackendApi;
use estatehub_schema::{Intent, LeadRequest, PropertyType, RoomCount};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::phone::{self, PhoneError, PhoneNumber};

pub const SELL_TYPE_TEXT: &str = "Что вы хотите продать?";
pub const SELL_ROOMS_TEXT: &str = "Сколько комнат в квартире?";
pub const BUY_TYPE_TEXT: &str = "Что вы хотите купить?";
pub const BUY_ROOMS_TEXT: &str = "Сколько комнат вас интересует?";
pub const QUESTION_TEXT: &str = "Напишите ваш вопрос:";
pub const PHONE_TEXT: &str = "Укажите ваш номер телефона для связи:";
pub const INVALID_PHONE_TEXT: &str = "Пожалуйста, введите корректный номер телефона";
pub const EMPTY_QUESTION_TEXT: &str = "Пожалуйста, введите ваш вопрос";
pub const UNKNOWN_OPTION_TEXT: &str = "Пожалуйста, выберите один из предложенных вариантов";
pub const SUCCESS_TEXT: &str = "Спасибо за вашу заявку! Мы свяжемся с вами в ближайшее время.";
pub const FAILURE_TEXT: &str =
    "Произошла ошибка при отправке заявки. Попробуйте позже или позвоните нам.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConversationState {
    #[default]
    Idle,
    SellType,
    SellRooms,
    SellPhone,
    BuyType,
    BuyRooms,
    BuyPhone,
    QuestionText,
    QuestionPhone,
}

impl ConversationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::SellType => "sell_type",
            Self::SellRooms => "sell_rooms",
            Self::SellPhone => "sell_phone",
            Self::BuyType => "buy_type",
            Self::BuyRooms => "buy_rooms",
            Self::BuyPhone => "buy_phone",
            Self::QuestionText => "question_text",
            Self::QuestionPhone => "question_phone",
        }
    }

    /// First question asked for an intent.
    pub fn opening(intent: Intent) -> Self {
        match intent {
            Intent::Sell => Self::SellType,
            Intent::Buy => Self::BuyType,
            Intent::Question => Self::QuestionText,
        }
    }

    pub fn input(&self) -> Option<InputKind> {
        match self {
            Self::Idle => None,
            Self::SellType | Self::SellRooms | Self::BuyType | Self::BuyRooms => {
                Some(InputKind::Choice)
            }
            Self::QuestionText => Some(InputKind::Text),
            Self::SellPhone | Self::BuyPhone | Self::QuestionPhone => Some(InputKind::Phone),
        }
    }

    /// The question shown while this state is active; `None` for idle.
    pub fn prompt(&self) -> Option<Prompt> {
        let (text, options) = match self {
            Self::Idle => return None,
            Self::SellType => (SELL_TYPE_TEXT, property_options()),
            Self::BuyType => (BUY_TYPE_TEXT, property_options()),
            Self::SellRooms => (SELL_ROOMS_TEXT, room_options()),
            Self::BuyRooms => (BUY_ROOMS_TEXT, room_options()),
            Self::QuestionText => (QUESTION_TEXT, Vec::new()),
            Self::SellPhone | Self::BuyPhone | Self::QuestionPhone => (PHONE_TEXT, Vec::new()),
        };
        let input = self.input()?;
        Some(Prompt {
            state: *self,
            text,
            options,
            input,
        })
    }
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Choice,
    Text,
    Phone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChoiceOption {
    pub label: &'static str,
    pub value: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub state: ConversationState,
    pub text: &'static str,
    pub options: Vec<ChoiceOption>,
    pub input: InputKind,
}

impl Prompt {
    pub fn option_label(&self, value: &str) -> Option<&'static str> {
        self.options
            .iter()
            .find(|o| o.value == value)
            .map(|o| o.label)
    }
}

fn property_options() -> Vec<ChoiceOption> {
    vec![
        ChoiceOption {
            label: "Квартиру",
            value: PropertyType::Apartment.as_str(),
        },
        ChoiceOption {
            label: "Дом",
            value: PropertyType::House.as_str(),
        },
    ]
}

fn room_options() -> Vec<ChoiceOption> {
    RoomCount::ALL
        .into_iter()
        .map(|rooms| ChoiceOption {
            label: room_label(rooms),
            value: rooms.as_str(),
        })
        .collect()
}

pub fn room_label(rooms: RoomCount) -> &'static str {
    match rooms {
        RoomCount::Studio => "Студия",
        RoomCount::One => "1 комната",
        RoomCount::Two => "2 комнаты",
        RoomCount::Three => "3 комнаты",
        RoomCount::FourPlus => "4+ комнаты",
    }
}

/// Answers collected so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeadForm {
    pub intent: Option<Intent>,
    pub property_type: Option<PropertyType>,
    pub rooms: Option<RoomCount>,
    pub question_text: Option<String>,
    pub phone: Option<PhoneNumber>,
}

impl LeadForm {
    fn apply(&mut self, update: FormUpdate) {
        match update {
            FormUpdate::PropertyType(kind) => self.property_type = Some(kind),
            FormUpdate::Rooms(rooms) => self.rooms = Some(rooms),
            FormUpdate::Question(text) => self.question_text = Some(text),
            FormUpdate::Phone(phone) => self.phone = Some(phone),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Request body, available once both intent and phone are known.
    pub fn to_request(&self) -> Option<LeadRequest> {
        Some(LeadRequest {
            intent: self.intent?,
            property_type: self.property_type,
            rooms: self.rooms,
            question: self.question_text.clone(),
            phone: self.phone.as_ref()?.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormUpdate {
    PropertyType(PropertyType),
    Rooms(RoomCount),
    Question(String),
    Phone(PhoneNumber),
}

/// Result of a valid answer: the next state, the field it fills, and the
/// next question (`None` once the flow is complete).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: ConversationState,
    pub update: FormUpdate,
    pub prompt: Option<Prompt>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("state {0} does not accept answers")]
    NotAsking(ConversationState),
    #[error("unknown option {0:?}")]
    UnknownOption(String),
    #[error("question text is empty")]
    EmptyQuestion,
    #[error(transparent)]
    InvalidPhone(#[from] PhoneError),
}

impl Rejection {
    /// Text the bot shows before asking again.
    pub fn message(&self) -> &'static str {
        match self {
            Self::NotAsking(_) | Self::UnknownOption(_) => UNKNOWN_OPTION_TEXT,
            Self::EmptyQuestion => EMPTY_QUESTION_TEXT,
            Self::InvalidPhone(_) => INVALID_PHONE_TEXT,
        }
    }
}

/// Pure transition function of the dialogue.
pub fn transition(state: ConversationState, value: &str) -> Result<Transition, Rejection> {
    use ConversationState::*;

    let (next, update) = match state {
        Idle => return Err(Rejection::NotAsking(state)),
        SellType | BuyType => {
            let kind = PropertyType::parse(value)
                .ok_or_else(|| Rejection::UnknownOption(value.to_string()))?;
            let next = match (state, kind) {
                (SellType, PropertyType::Apartment) => SellRooms,
                (SellType, PropertyType::House) => SellPhone,
                (_, PropertyType::Apartment) => BuyRooms,
                (_, PropertyType::House) => BuyPhone,
            };
            (next, FormUpdate::PropertyType(kind))
        }
        SellRooms | BuyRooms => {
            let rooms =
                RoomCount::parse(value).ok_or_else(|| Rejection::UnknownOption(value.to_string()))?;
            let next = if state == SellRooms { SellPhone } else { BuyPhone };
            (next, FormUpdate::Rooms(rooms))
        }
        QuestionText => {
            let text = value.trim();
            if text.is_empty() {
                return Err(Rejection::EmptyQuestion);
            }
            (QuestionPhone, FormUpdate::Question(text.to_string()))
        }
        SellPhone | BuyPhone | QuestionPhone => (Idle, FormUpdate::Phone(phone::normalize(value)?)),
    };

    Ok(Transition {
        next,
        update,
        prompt: next.prompt(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Author {
    Bot,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub author: Author,
    pub text: String,
    pub options: Vec<ChoiceOption>,
}

impl ChatMessage {
    fn bot(text: impl Into<String>, options: Vec<ChoiceOption>) -> Self {
        Self {
            author: Author::Bot,
            text: text.into(),
            options,
        }
    }

    fn user(text: impl Into<String>) -> Self {
        Self {
            author: Author::User,
            text: text.into(),
            options: Vec::new(),
        }
    }
}

/// Terminal message of a flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgement {
    pub delivered: bool,
    pub text: &'static str,
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Next question of the flow
    Prompt(Prompt),
    /// Lead submitted (or failed); the engine is idle again
    Finished(Acknowledgement),
}

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("no conversation in progress")]
    Idle,
    #[error("answer addressed to {answered} while the conversation is at {current}")]
    StaleAnswer {
        answered: ConversationState,
        current: ConversationState,
    },
    #[error("answer rejected at {state}: {rejection}")]
    Rejected {
        state: ConversationState,
        rejection: Rejection,
        reprompt: Prompt,
    },
}

pub struct ConversationEngine {
    backend: Arc<dyn BackendApi>,
    state: ConversationState,
    form: LeadForm,
    transcript: Vec<ChatMessage>,
    trace_id: Uuid,
}

impl ConversationEngine {
    pub fn new(backend: Arc<dyn BackendApi>) -> Self {
        Self {
            backend,
            state: ConversationState::Idle,
            form: LeadForm::default(),
            transcript: Vec::new(),
            trace_id: Uuid::new_v4(),
        }
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    pub fn form(&self) -> &LeadForm {
        &self.form
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn trace_id(&self) -> Uuid {
        self.trace_id
    }

    pub fn current_prompt(&self) -> Option<Prompt> {
        self.state.prompt()
    }

    /// Quick-action entry point. Unrecognized actions leave the engine untouched.
    pub fn handle_action(&mut self, action: &str) -> Option<Prompt> {
        match Intent::parse(action) {
            Some(intent) => Some(self.start_flow(intent)),
            None => {
                debug!(action, "ignoring unrecognized chat action");
                None
            }
        }
    }

    pub fn start_flow(&mut self, intent: Intent) -> Prompt {
        self.reset();
        self.trace_id = Uuid::new_v4();
        self.form.intent = Some(intent);
        self.state = ConversationState::opening(intent);
        info!(trace_id = %self.trace_id, %intent, "chat flow started");

        let prompt = opening_prompt(intent);
        self.transcript
            .push(ChatMessage::bot(prompt.text, prompt.options.clone()));
        prompt
    }

    pub async fn submit_answer(
        &mut self,
        state: ConversationState,
        value: &str,
    ) -> Result<Reply, FlowError> {
        if self.state == ConversationState::Idle {
            return Err(FlowError::Idle);
        }
        if state != self.state {
            return Err(FlowError::StaleAnswer {
                answered: state,
                current: self.state,
            });
        }

        let current_prompt = prompt_or_blank(self.state);
        let step = match transition(self.state, value) {
            Ok(step) => step,
            Err(rejection) => {
                debug!(trace_id = %self.trace_id, state = %self.state, %rejection, "answer rejected");
                let reprompt = Prompt {
                    text: rejection.message(),
                    ..current_prompt
                };
                self.transcript
                    .push(ChatMessage::bot(reprompt.text, reprompt.options.clone()));
                return Err(FlowError::Rejected {
                    state: self.state,
                    rejection,
                    reprompt,
                });
            }
        };

        let echo = match &step.update {
            FormUpdate::PropertyType(_) | FormUpdate::Rooms(_) => current_prompt
                .option_label(value.trim())
                .map(str::to_string)
                .unwrap_or_else(|| value.trim().to_string()),
            FormUpdate::Question(text) => text.clone(),
            FormUpdate::Phone(phone) => phone.formatted(),
        };
        self.transcript.push(ChatMessage::user(echo));
        self.form.apply(step.update);
        self.state = step.next;
        debug!(trace_id = %self.trace_id, state = %self.state, "conversation advanced");

        match step.prompt {
            Some(prompt) => {
                self.transcript
                    .push(ChatMessage::bot(prompt.text, prompt.options.clone()));
                Ok(Reply::Prompt(prompt))
            }
            None => match self.finalize().await {
                Some(ack) => Ok(Reply::Finished(ack)),
                None => Err(FlowError::Idle),
            },
        }
    }

    /// Submit the collected lead. Does nothing (returns `None`) until a phone
    /// number has been accepted; afterwards the engine is idle and the form
    /// is cleared whatever the backend answered.
    pub async fn finalize(&mut self) -> Option<Acknowledgement> {
        let request = self.form.to_request()?;

        self.state = ConversationState::Idle;
        self.form = LeadForm::default();

        let ack = match self.backend.submit_lead(&request).await {
            Ok(resp) => {
                info!(
                    trace_id = %self.trace_id,
                    intent = %request.intent,
                    request_id = resp.request_id.as_deref().unwrap_or("-"),
                    "lead submitted"
                );
                Acknowledgement {
                    delivered: true,
                    text: SUCCESS_TEXT,
                    request_id: resp.request_id,
                }
            }
            Err(e) => {
                warn!(trace_id = %self.trace_id, intent = %request.intent, "lead submission failed: {e}");
                Acknowledgement {
                    delivered: false,
                    text: FAILURE_TEXT,
                    request_id: None,
                }
            }
        };

        self.transcript.push(ChatMessage::bot(ack.text, Vec::new()));
        Some(ack)
    }

    /// Drop any half-finished flow.
    pub fn reset(&mut self) {
        self.state = ConversationState::Idle;
        self.form = LeadForm::default();
    }
}

fn opening_prompt(intent: Intent) -> Prompt {
    prompt_or_blank(ConversationState::opening(intent))
}

fn prompt_or_blank(state: ConversationState) -> Prompt {
    state.prompt().unwrap_or(Prompt {
        state,
        text: "",
        options: Vec::new(),
        input: InputKind::Text,
    })
}
