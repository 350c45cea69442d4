//! Interactive prompts
//!
//! Questions are data (loaded from the configuration file); a `Prompter`
//! turns one question into one answer. The terminal implementation talks
//! to the user, the others answer from defaults or a fixed map so runs can
//! be scripted and tested.

use std::collections::HashMap;
use std::io::{self, BufRead, Write};

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::style::Stylize;
use crossterm::terminal::{self, ClearType};
use crossterm::{cursor, execute, queue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::answers::Answers;
use crate::error::{Result, RolloutError};
use crate::types::QuestionKind;

/// Name of the question whose default is the current date
pub const DATE_QUESTION: &str = "rollout_date";

/// One entry of a `list` question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Choice {
    Plain(String),
    Named {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
}

impl Choice {
    /// Text shown to the user
    pub fn label(&self) -> &str {
        match self {
            Choice::Plain(s) => s,
            Choice::Named { name, .. } => name,
        }
    }

    /// Value stored in the answers
    pub fn value(&self) -> &str {
        match self {
            Choice::Plain(s) => s,
            Choice::Named { name, value } => value.as_deref().unwrap_or(name),
        }
    }
}

impl From<&str> for Choice {
    fn from(s: &str) -> Self {
        Choice::Plain(s.to_string())
    }
}

/// A question definition as written in the configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "type", default)]
    pub kind: QuestionKind,
    /// Answer field this question fills
    pub name: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice>,
}

impl Question {
    pub fn new(kind: QuestionKind, name: &str, message: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            message: message.to_string(),
            default: None,
            choices: Vec::new(),
        }
    }

    pub fn with_default(mut self, default: &str) -> Self {
        self.default = Some(Value::String(default.to_string()));
        self
    }

    pub fn with_choices(mut self, choices: &[&str]) -> Self {
        self.choices = choices.iter().map(|c| Choice::from(*c)).collect();
        self
    }

    /// The configured default rendered as text
    pub fn default_text(&self) -> Option<String> {
        match self.default.as_ref()? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            Value::Bool(b) => Some(b.to_string()),
            other => Some(other.to_string()),
        }
    }

    fn has_choice(&self, value: &str) -> bool {
        self.choices.iter().any(|c| c.value() == value)
    }
}

/// Set the default of the date question to `date`.
///
/// Questions are returned unchanged if there is no date question.
pub fn with_date_default(mut questions: Vec<Question>, date: &str) -> Vec<Question> {
    if let Some(q) = questions.iter_mut().find(|q| q.name == DATE_QUESTION) {
        q.default = Some(Value::String(date.to_string()));
    }
    questions
}

/// Source of answers for questions
pub trait Prompter {
    /// Answer one question. `default` is what an empty reply resolves to.
    fn ask(&mut self, question: &Question, default: Option<&str>) -> Result<String>;
}

/// Ask every question in order, storing the replies in `answers`.
///
/// The effective default of a question is the current answer when one is
/// already set, otherwise the question's own default; a `list` question
/// without either falls back to its first choice.
pub fn ask_all<P: Prompter + ?Sized>(
    questions: &[Question],
    prompter: &mut P,
    answers: &mut Answers,
) -> Result<()> {
    for question in questions {
        if question.kind == QuestionKind::List && question.choices.is_empty() {
            return Err(RolloutError::prompt(format!(
                "list question '{}' has no choices",
                question.name
            )));
        }

        let current = answers.get(&question.name)?;
        let default = if current.is_empty() {
            question.default_text().or_else(|| {
                (question.kind == QuestionKind::List)
                    .then(|| question.choices[0].value().to_string())
            })
        } else {
            Some(current.to_string())
        };

        let reply = prompter.ask(question, default.as_deref())?;
        let reply = if reply.trim().is_empty() {
            default.unwrap_or_default()
        } else {
            reply
        };

        if question.kind == QuestionKind::List && !question.has_choice(reply.trim()) {
            return Err(RolloutError::prompt(format!(
                "'{}' is not a valid choice for '{}'",
                reply.trim(),
                question.name
            )));
        }

        if question.kind == QuestionKind::Password {
            debug!(field = %question.name, "answered");
        } else {
            debug!(field = %question.name, value = %reply.trim(), "answered");
        }
        answers.set(&question.name, reply)?;
    }

    Ok(())
}

/// Accepts every default without asking
#[derive(Debug, Default)]
pub struct DefaultsPrompter;

impl Prompter for DefaultsPrompter {
    fn ask(&mut self, _question: &Question, default: Option<&str>) -> Result<String> {
        Ok(default.unwrap_or_default().to_string())
    }
}

/// Answers from a fixed map; unknown questions take their default
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    replies: HashMap<String, String>,
    asked: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new<I, K, V>(replies: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            replies: replies
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            asked: Vec::new(),
        }
    }

    /// Names of the questions asked so far, in order
    pub fn asked(&self) -> &[String] {
        &self.asked
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, question: &Question, default: Option<&str>) -> Result<String> {
        self.asked.push(question.name.clone());
        Ok(self
            .replies
            .get(&question.name)
            .cloned()
            .unwrap_or_else(|| default.unwrap_or_default().to_string()))
    }
}

/// Prompts on the controlling terminal.
///
/// Everything is drawn on stderr; stdout is kept for command output.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

/// Leave raw mode and show the cursor again.
///
/// Safe to call when raw mode was never enabled.
pub fn restore_terminal() {
    let _ = execute!(io::stderr(), cursor::Show);
    let _ = terminal::disable_raw_mode();
}

/// Leaves raw mode (and restores the cursor) on every exit path
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        restore_terminal();
    }
}

fn aborted() -> RolloutError {
    RolloutError::prompt("input aborted by user")
}

impl TerminalPrompter {
    fn header(out: &mut impl Write, question: &Question, default: Option<&str>) -> io::Result<()> {
        write!(out, "{} {}", "?".green().bold(), question.message.clone().bold())?;
        if let Some(default) = default.filter(|d| !d.is_empty()) {
            if question.kind != QuestionKind::Password {
                write!(out, " {}", format!("({})", default).dark_grey())?;
            }
        }
        write!(out, " ")?;
        out.flush()
    }

    fn read_line(&self) -> Result<String> {
        let mut line = String::new();
        let read = io::stdin().lock().read_line(&mut line)?;
        if read == 0 {
            return Err(aborted());
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    fn input(&self, question: &Question, default: Option<&str>) -> Result<String> {
        let mut out = io::stderr();
        Self::header(&mut out, question, default)?;
        self.read_line()
    }

    fn confirm(&self, question: &Question, default: Option<&str>) -> Result<String> {
        let default_yes = matches!(default, Some("true" | "yes" | "y"));
        let mut out = io::stderr();
        Self::header(&mut out, question, None)?;
        write!(out, "{} ", if default_yes { "(Y/n)" } else { "(y/N)" })?;
        out.flush()?;

        let reply = self.read_line()?.to_lowercase();
        let yes = match reply.trim() {
            "" => default_yes,
            "y" | "yes" | "true" => true,
            _ => false,
        };
        Ok(yes.to_string())
    }

    fn password(&self, question: &Question, default: Option<&str>) -> Result<String> {
        let mut out = io::stderr();
        Self::header(&mut out, question, default)?;

        let mut secret = String::new();
        {
            let _raw = RawModeGuard::enable()?;
            loop {
                let Event::Key(key) = event::read()? else {
                    continue;
                };
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Enter => break,
                    KeyCode::Esc => return Err(aborted()),
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        return Err(aborted());
                    }
                    KeyCode::Backspace => {
                        if secret.pop().is_some() {
                            queue!(out, cursor::MoveLeft(1), terminal::Clear(ClearType::UntilNewLine))?;
                        }
                    }
                    KeyCode::Char(c) => {
                        secret.push(c);
                        write!(out, "*")?;
                    }
                    _ => {}
                }
                out.flush()?;
            }
        }
        writeln!(out)?;
        Ok(secret)
    }

    fn render_choices(out: &mut impl Write, question: &Question, selected: usize) -> io::Result<()> {
        for (i, choice) in question.choices.iter().enumerate() {
            queue!(out, cursor::MoveToColumn(0), terminal::Clear(ClearType::CurrentLine))?;
            if i == selected {
                write!(out, "{} {}\r\n", "❯".cyan(), choice.label().cyan())?;
            } else {
                write!(out, "  {}\r\n", choice.label())?;
            }
        }
        out.flush()
    }

    fn select(&self, question: &Question, default: Option<&str>) -> Result<String> {
        let len = question.choices.len();
        if len == 0 {
            return Err(RolloutError::prompt(format!(
                "list question '{}' has no choices",
                question.name
            )));
        }
        let mut selected = default
            .and_then(|d| question.choices.iter().position(|c| c.value() == d))
            .unwrap_or(0);

        let mut out = io::stderr();
        Self::header(&mut out, question, None)?;
        write!(out, "{}\r\n", "(use arrow keys)".dark_grey())?;

        {
            let _raw = RawModeGuard::enable()?;
            execute!(out, cursor::Hide)?;
            Self::render_choices(&mut out, question, selected)?;

            loop {
                let Event::Key(key) = event::read()? else {
                    continue;
                };
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Up | KeyCode::Char('k') => {
                        selected = selected.checked_sub(1).unwrap_or(len - 1);
                    }
                    KeyCode::Down | KeyCode::Char('j') => {
                        selected = (selected + 1) % len;
                    }
                    KeyCode::Enter => break,
                    KeyCode::Esc => return Err(aborted()),
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        return Err(aborted());
                    }
                    _ => continue,
                }
                queue!(out, cursor::MoveUp(len as u16))?;
                Self::render_choices(&mut out, question, selected)?;
            }
        }

        Ok(question.choices[selected].value().to_string())
    }
}

impl Prompter for TerminalPrompter {
    fn ask(&mut self, question: &Question, default: Option<&str>) -> Result<String> {
        match question.kind {
            QuestionKind::Input => self.input(question, default),
            QuestionKind::List => self.select(question, default),
            QuestionKind::Confirm => self.confirm(question, default),
            QuestionKind::Password => self.password(question, default),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn questions() -> Vec<Question> {
        vec![
            Question::new(QuestionKind::List, "country_name", "Which country?")
                .with_choices(&["Nigeria", "Kenya"]),
            Question::new(QuestionKind::Input, "rollout_date", "Rollout date?"),
        ]
    }

    #[test]
    fn test_with_date_default() {
        let qs = with_date_default(questions(), "2024-05-17");
        assert_eq!(qs[1].default_text().as_deref(), Some("2024-05-17"));
        assert!(qs[0].default.is_none());
    }

    #[test]
    fn test_with_date_default_without_date_question() {
        let qs = vec![Question::new(QuestionKind::Input, "country_code", "Code?")];
        let qs = with_date_default(qs, "2024-05-17");
        assert!(qs[0].default.is_none());
    }

    #[test]
    fn test_defaults_prompter_picks_first_choice_and_date() {
        let qs = with_date_default(questions(), "2024-05-17");
        let mut answers = Answers::new();
        ask_all(&qs, &mut DefaultsPrompter, &mut answers).unwrap();

        assert_eq!(answers.country_name, "Nigeria");
        assert_eq!(answers.rollout_date, "2024-05-17");
    }

    #[test]
    fn test_scripted_prompter() {
        let qs = with_date_default(questions(), "2024-05-17");
        let mut prompter = ScriptedPrompter::new([("country_name", "Kenya")]);
        let mut answers = Answers::new();
        ask_all(&qs, &mut prompter, &mut answers).unwrap();

        assert_eq!(answers.country_name, "Kenya");
        assert_eq!(answers.rollout_date, "2024-05-17");
        assert_eq!(prompter.asked(), ["country_name", "rollout_date"]);
    }

    #[test]
    fn test_invalid_choice_rejected() {
        let mut prompter = ScriptedPrompter::new([("country_name", "Atlantis")]);
        let mut answers = Answers::new();
        let err = ask_all(&questions(), &mut prompter, &mut answers).unwrap_err();
        assert!(err.to_string().contains("not a valid choice"));
    }

    #[test]
    fn test_current_answer_is_default() {
        let qs = vec![Question::new(QuestionKind::Input, "country_code", "Code?")];
        let mut answers = Answers::new();
        answers.set("country_code", "NGA").unwrap();
        ask_all(&qs, &mut DefaultsPrompter, &mut answers).unwrap();
        assert_eq!(answers.country_code, "NGA");
    }

    #[test]
    fn test_list_without_choices_is_error() {
        let qs = vec![Question::new(QuestionKind::List, "country_name", "Which?")];
        let mut answers = Answers::new();
        assert!(ask_all(&qs, &mut DefaultsPrompter, &mut answers).is_err());
    }

    #[test]
    fn test_named_choice_value() {
        let choice: Choice =
            serde_json::from_str(r#"{ "name": "Côte d'Ivoire", "value": "CIV" }"#).unwrap();
        assert_eq!(choice.label(), "Côte d'Ivoire");
        assert_eq!(choice.value(), "CIV");

        let choice: Choice = serde_json::from_str(r#"{ "name": "Kenya" }"#).unwrap();
        assert_eq!(choice.value(), "Kenya");
    }

    #[test]
    fn test_header_shows_message_and_default() {
        let q = Question::new(QuestionKind::Input, "country_code", "Country code?");
        let mut buf = Vec::new();
        TerminalPrompter::header(&mut buf, &q, Some("NGA")).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Country code?"));
        assert!(text.contains("(NGA)"));
    }

    #[test]
    fn test_header_hides_password_default() {
        let q = Question::new(QuestionKind::Password, "country_code", "Secret?");
        let mut buf = Vec::new();
        TerminalPrompter::header(&mut buf, &q, Some("hunter2")).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Secret?"));
        assert!(!text.contains("hunter2"));
    }

    #[test]
    fn test_render_choices_marks_selection() {
        let q = &questions()[0];
        let mut buf = Vec::new();
        TerminalPrompter::render_choices(&mut buf, q, 1).unwrap();
        let text = String::from_utf8(buf).unwrap();

        let lines: Vec<&str> = text.split("\r\n").collect();
        assert!(lines[0].contains("Nigeria") && !lines[0].contains('❯'));
        assert!(lines[1].contains("Kenya") && lines[1].contains('❯'));
    }

    #[test]
    fn test_restore_terminal_without_raw_mode() {
        restore_terminal();
        assert!(!terminal::is_raw_mode_enabled().unwrap_or(false));
    }

    #[test]
    fn test_question_deserialize() {
        let q: Question = serde_json::from_str(
            r#"{ "type": "confirm", "name": "notebook_type", "message": "Ok?", "default": true }"#,
        )
        .unwrap();
        assert_eq!(q.kind, QuestionKind::Confirm);
        assert_eq!(q.default_text().as_deref(), Some("true"));
    }
}
